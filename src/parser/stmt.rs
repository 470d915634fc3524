//! Statement grammar.

use crate::ast::{Expr, Node, Stmt, VarRef};
use crate::error::Diagnostic;
use crate::tokenizer::Tag;
use crate::ty::Type;

use super::Parser;

fn starts_expression(tag: Tag) -> bool {
  matches!(
    tag,
    Tag::Ident | Tag::Num | Tag::True | Tag::False | Tag::LParen | Tag::Not
  )
}

impl Parser<'_> {
  /// Parse one statement. Returns `None` when the current token cannot start a
  /// statement; it is reported and skipped.
  pub(super) fn statement(&mut self) -> Option<Stmt> {
    let tag = self.tokens.peek().tag;
    let stmt = match tag {
      Tag::LBrace => Stmt::Block(self.block()),
      Tag::If => self.if_stmt(),
      Tag::While => self.while_stmt(),
      Tag::For => self.for_stmt(),
      Tag::Write => self.write_stmt(),
      Tag::Read => self.read_stmt(),
      Tag::Return => self.return_stmt(),
      Tag::Semi => {
        self.tokens.bump();
        Stmt::Empty
      }
      tag if starts_expression(tag) => self.expr_stmt(),
      _ => {
        self.skip_unknown();
        return None;
      }
    };
    Some(stmt)
  }

  /// Body of a control-flow statement; a skipped token leaves an empty body.
  fn body(&mut self) -> Box<Stmt> {
    Box::new(self.statement().unwrap_or(Stmt::Empty))
  }

  /// An expression that must be `bool`.
  fn condition(&mut self) -> Expr {
    let line = self.tokens.peek().line;
    let cond = self.expr();
    let ty = cond.ty();
    if ty != Type::Bool && !ty.is_error() {
      self.report(Diagnostic::TypeMismatch {
        line,
        expected: Type::Bool,
        found: ty,
      });
    }
    cond
  }

  fn if_stmt(&mut self) -> Stmt {
    self.tokens.bump();
    self.expect(Tag::LParen);
    let cond = self.condition();
    self.expect(Tag::RParen);
    let then = self.body();
    let els = if self.tokens.eat(Tag::Else) {
      Some(self.body())
    } else {
      None
    };
    Stmt::If { cond, then, els }
  }

  fn while_stmt(&mut self) -> Stmt {
    self.tokens.bump();
    self.expect(Tag::LParen);
    let cond = self.condition();
    self.expect(Tag::RParen);
    let body = self.body();
    Stmt::While { cond, body }
  }

  fn for_stmt(&mut self) -> Stmt {
    self.tokens.bump();
    self.expect(Tag::LParen);
    let init = (!self.tokens.at(Tag::Semi)).then(|| self.expr());
    self.expect(Tag::Semi);
    let cond = (!self.tokens.at(Tag::Semi)).then(|| self.condition());
    self.expect(Tag::Semi);
    let step = (!self.tokens.at(Tag::RParen)).then(|| self.expr());
    self.expect(Tag::RParen);
    let body = self.body();
    Stmt::For {
      init,
      cond,
      step,
      body,
    }
  }

  fn write_stmt(&mut self) -> Stmt {
    let line = self.tokens.bump().line;
    let value = self.expr();
    if value.ty() == Type::Void {
      self.contract(line, "cannot write a void value");
    }
    self.session.gen_state.uses_write = true;
    self.expect(Tag::Semi);
    Stmt::Write(value)
  }

  fn read_stmt(&mut self) -> Stmt {
    let line = self.tokens.bump().line;
    let target = self.expr();
    let place = self.place(&target, line);
    self.session.gen_state.uses_read = true;
    self.expect(Tag::Semi);
    place.map_or(Stmt::Empty, Stmt::Read)
  }

  fn return_stmt(&mut self) -> Stmt {
    let line = self.tokens.bump().line;
    let expected = self.ret;
    let value = (!self.tokens.at(Tag::Semi)).then(|| self.expr());
    let found = value.as_ref().map_or(Type::Void, |v| v.ty());
    let compatible = found == expected || expected.accepts(found);
    if !compatible {
      self.report(Diagnostic::TypeMismatch {
        line,
        expected,
        found,
      });
    }
    self.expect(Tag::Semi);
    Stmt::Return(value)
  }

  fn expr_stmt(&mut self) -> Stmt {
    let expr = self.expr();
    self.expect(Tag::Semi);
    if let Some(call) = expr.as_call() {
      return Stmt::Call(call.clone());
    }
    Stmt::Expr(expr)
  }

  /// The mutable variable `target` names, or an InvalidLeftValue report.
  /// Unresolved names were already reported and stay silent here.
  pub(super) fn place(&mut self, target: &Expr, line: usize) -> Option<VarRef> {
    match target.as_var() {
      Some(var) if var.ty.is_error() => None,
      Some(var) if var.mutable => Some(var.clone()),
      _ => {
        self.report(Diagnostic::InvalidLeftValue { line });
        None
      }
    }
  }
}
