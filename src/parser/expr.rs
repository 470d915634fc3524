//! Expression grammar: one routine per precedence tier, lowest first.
//!
//! Every tier is a left-to-right chain. The chain's type is folded as operands
//! arrive, so a bad pairing is reported once at the operator that caused it
//! and the `error` type silences everything above it.

use log::trace;

use crate::ast::{
  AdditiveExpr, AndExpr, BinaryOp, Call, Chain, EqualityExpr, Expr, Factor, Node, OrExpr,
  RelationalExpr, TermExpr, VarRef,
};
use crate::error::Diagnostic;
use crate::tokenizer::{Tag, Token};
use crate::ty::{Combined, OpClass, Type};

use super::Parser;

const OR_OPS: &[Tag] = &[Tag::OrOr];
const AND_OPS: &[Tag] = &[Tag::AndAnd];
const EQUALITY_OPS: &[Tag] = &[Tag::EqEq, Tag::Ne];
const RELATIONAL_OPS: &[Tag] = &[Tag::Lt, Tag::Le, Tag::Gt, Tag::Ge];
const ADDITIVE_OPS: &[Tag] = &[Tag::Plus, Tag::Minus];
const TERM_OPS: &[Tag] = &[Tag::Star, Tag::Slash, Tag::Percent];

impl Parser<'_> {
  /// `or ('=' expr)?`
  pub fn expr(&mut self) -> Expr {
    let lhs = Expr::Or(self.or_expr());
    if !self.tokens.at(Tag::Assign) {
      return lhs;
    }

    let line = self.tokens.bump().line;
    let value = self.expr();
    let Some(target) = self.place(&lhs, line) else {
      return lhs;
    };
    if !target.ty.accepts(value.ty()) {
      self.report(Diagnostic::TypeMismatch {
        line,
        expected: target.ty,
        found: value.ty(),
      });
    }
    Expr::Assign {
      target,
      value: Box::new(value),
    }
  }

  fn or_expr(&mut self) -> OrExpr {
    self.chain(OR_OPS, Self::and_expr)
  }

  fn and_expr(&mut self) -> AndExpr {
    self.chain(AND_OPS, Self::equality_expr)
  }

  fn equality_expr(&mut self) -> EqualityExpr {
    self.chain(EQUALITY_OPS, Self::relational_expr)
  }

  fn relational_expr(&mut self) -> RelationalExpr {
    self.chain(RELATIONAL_OPS, Self::additive_expr)
  }

  fn additive_expr(&mut self) -> AdditiveExpr {
    self.chain(ADDITIVE_OPS, Self::term_expr)
  }

  fn term_expr(&mut self) -> TermExpr {
    self.chain(TERM_OPS, Self::factor)
  }

  /// Parse `operand (op operand)*` for the operators in `ops`, folding the
  /// chain's type after every operand.
  fn chain<T: Node>(&mut self, ops: &[Tag], mut operand: impl FnMut(&mut Self) -> T) -> Chain<T> {
    let mut chain = Chain::single(operand(self));
    loop {
      let tag = self.tokens.peek().tag;
      let Some(op) = ops.contains(&tag).then(|| BinaryOp::from_tag(tag)).flatten() else {
        break;
      };
      let line = self.tokens.bump().line;
      let next = operand(self);
      chain.ty = self.combine(op.class(), chain.ty, next.ty(), line);
      chain.rest.push((op, next));
    }
    chain
  }

  /// Type of `lhs op rhs`, reporting anything new that is wrong with it.
  fn combine(&mut self, class: OpClass, lhs: Type, rhs: Type, line: usize) -> Type {
    match Type::combine(class, lhs, rhs) {
      Combined::Ok(ty) => ty,
      Combined::Absorbed => Type::Error,
      Combined::VoidOperand => {
        self.contract(line, "void value used in an expression");
        Type::Error
      }
      Combined::Mismatch => {
        self.report(Diagnostic::TypeMismatch {
          line,
          expected: lhs,
          found: rhs,
        });
        Type::Error
      }
    }
  }

  fn factor(&mut self) -> Factor {
    let token = self.tokens.peek().clone();
    match token.tag {
      Tag::Ident => {
        self.tokens.bump();
        if self.tokens.at(Tag::LParen) {
          Factor::Call(self.call(token))
        } else {
          Factor::Var(self.resolve_var(&token))
        }
      }
      Tag::Num => {
        self.tokens.bump();
        self.number(&token)
      }
      Tag::True | Tag::False => {
        self.tokens.bump();
        Factor::Bool(token.tag == Tag::True)
      }
      Tag::LParen => {
        self.tokens.bump();
        let inner = self.expr();
        self.expect(Tag::RParen);
        Factor::Paren(Box::new(inner))
      }
      Tag::Not => {
        self.tokens.bump();
        let operand = self.factor();
        let ty = match Type::negate(operand.ty()) {
          Combined::Ok(ty) => ty,
          Combined::Absorbed => Type::Error,
          Combined::VoidOperand => {
            self.contract(token.line, "void value used in an expression");
            Type::Error
          }
          Combined::Mismatch => {
            self.report(Diagnostic::TypeMismatch {
              line: token.line,
              expected: Type::Bool,
              found: operand.ty(),
            });
            Type::Error
          }
        };
        Factor::Not {
          operand: Box::new(operand),
          ty,
        }
      }
      _ => {
        self.contract(token.line, format!("expected an expression before {}", describe(&token)));
        Factor::Missing
      }
    }
  }

  fn number(&mut self, token: &Token) -> Factor {
    match token.text.parse::<i64>() {
      Ok(value) => {
        let ty = if i32::try_from(value).is_ok() {
          Type::Int
        } else {
          Type::Long
        };
        Factor::Num { value, ty }
      }
      Err(_) => {
        self.contract(
          token.line,
          format!("integer literal {} is out of range", token.text),
        );
        Factor::Num {
          value: 0,
          ty: Type::Error,
        }
      }
    }
  }

  fn resolve_var(&mut self, token: &Token) -> VarRef {
    if let Some(symbol) = self.session.symbols.lookup_var(&token.text, &self.session.scopes) {
      trace!(
        "resolved {} to offset {} in {}",
        symbol.name,
        symbol.offset,
        self.session.scopes.current_function().unwrap_or("<none>")
      );
      return VarRef {
        name: symbol.name.clone(),
        ty: symbol.ty,
        offset: symbol.offset,
        mutable: symbol.mutable,
      };
    }
    self.contract(token.line, format!("undeclared identifier '{}'", token.text));
    VarRef {
      name: token.text.clone(),
      ty: Type::Error,
      offset: 0,
      mutable: true,
    }
  }

  /// `name '(' (expr (',' expr)*)? ')'`, the name already consumed.
  fn call(&mut self, name: Token) -> Call {
    self.tokens.bump();
    let mut args = Vec::new();
    if !self.tokens.at(Tag::RParen) {
      loop {
        args.push(self.expr());
        if !self.tokens.eat(Tag::Comma) {
          break;
        }
      }
    }
    self.expect(Tag::RParen);

    let signature = self
      .session
      .symbols
      .lookup_fn(&name.text)
      .map(|f| (f.ret, f.params.clone()));
    let Some((ret, params)) = signature else {
      self.contract(name.line, format!("undeclared function '{}'", name.text));
      return Call {
        name: name.text,
        args,
        ty: Type::Error,
        line: name.line,
      };
    };

    if params.len() != args.len() {
      self.contract(
        name.line,
        format!(
          "function '{}' expects {} argument(s), got {}",
          name.text,
          params.len(),
          args.len()
        ),
      );
    } else {
      for (param, arg) in params.iter().zip(&args) {
        if !param.accepts(arg.ty()) {
          self.report(Diagnostic::TypeMismatch {
            line: name.line,
            expected: *param,
            found: arg.ty(),
          });
        }
      }
    }

    Call {
      name: name.text,
      args,
      ty: ret,
      line: name.line,
    }
  }
}

fn describe(token: &Token) -> String {
  match token.tag {
    Tag::Eof => Tag::Eof.describe().to_string(),
    _ => format!("'{}'", token.text),
  }
}
