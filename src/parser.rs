//! Recursive-descent parser with embedded semantic actions.
//!
//! There is one routine per grammar rule, split by tier: function headers
//! and declarations live here, statements in `stmt`, expressions in `expr`.
//! Symbols are registered and types checked as soon as each construct is
//! recognised, so the tree that comes out is already analysed. Problems are
//! reported to the session and parsing carries on: a missing token is treated
//! as present, and an unusable token is skipped.

mod expr;
mod stmt;

use log::debug;

use crate::ast::{Block, Decl, Function, Item, Node, Program, VarRef};
use crate::error::{Diagnostic, Diagnostics};
use crate::scope::ScopeId;
use crate::session::Session;
use crate::symbol::{FnRegistration, VarSymbol};
use crate::tokenizer::{Tag, Token};
use crate::ty::Type;

/// Cursor over the parser-facing token stream.
///
/// Comments are gone and lexical errors have already been reported, so the
/// grammar only ever sees meaningful tokens. The buffer always ends with `Eof`
/// and reading past the end keeps returning it.
#[derive(Debug)]
pub struct TokenBuffer {
  tokens: Vec<Token>,
  pos: usize,
  prev_line: usize,
}

impl TokenBuffer {
  pub fn new(tokens: Vec<Token>, diagnostics: &mut Diagnostics) -> Self {
    let mut kept: Vec<Token> = Vec::with_capacity(tokens.len());
    for token in tokens {
      match token.tag {
        Tag::Comment => {}
        Tag::Error => diagnostics.report(Diagnostic::Lexical {
          line: token.line,
          text: token.text,
        }),
        _ => kept.push(token),
      }
    }
    if kept.last().is_none_or(|t| t.tag != Tag::Eof) {
      let line = kept.last().map_or(1, |t| t.line);
      kept.push(Token::new(Tag::Eof, "", line));
    }
    Self {
      tokens: kept,
      pos: 0,
      prev_line: 1,
    }
  }

  pub fn peek(&self) -> &Token {
    self.peek_nth(0)
  }

  /// Look `n` tokens ahead without consuming anything.
  pub fn peek_nth(&self, n: usize) -> &Token {
    let last = self.tokens.len() - 1;
    &self.tokens[(self.pos + n).min(last)]
  }

  pub fn at(&self, tag: Tag) -> bool {
    self.peek().tag == tag
  }

  pub fn is_eof(&self) -> bool {
    self.at(Tag::Eof)
  }

  /// Consume the current token. `Eof` is never consumed.
  pub fn bump(&mut self) -> Token {
    let token = self.peek().clone();
    if token.tag != Tag::Eof {
      self.pos += 1;
    }
    self.prev_line = token.line;
    token
  }

  /// Consume the current token if it has the given tag.
  pub fn eat(&mut self, tag: Tag) -> bool {
    if self.at(tag) {
      self.bump();
      true
    } else {
      false
    }
  }

  /// Line of the most recently consumed token.
  pub fn prev_line(&self) -> usize {
    self.prev_line
  }

  /// Tags still ahead of the cursor, `Eof` included.
  pub fn remaining(&self) -> impl Iterator<Item = Tag> + '_ {
    self.tokens[self.pos..].iter().map(|t| t.tag)
  }
}

/// Parser state for one program. Borrows the session for its whole run.
pub struct Parser<'s> {
  tokens: TokenBuffer,
  session: &'s mut Session,
  /// Running local footprint of the function being parsed.
  frame_size: i64,
  /// Declared return type of the function being parsed.
  ret: Type,
}

/// Parse a whole program, recording diagnostics on the session.
pub fn parse(tokens: Vec<Token>, session: &mut Session) -> Program {
  Parser::new(tokens, session).parse_program()
}

impl<'s> Parser<'s> {
  pub fn new(tokens: Vec<Token>, session: &'s mut Session) -> Self {
    let tokens = TokenBuffer::new(tokens, &mut session.diagnostics);
    Self {
      tokens,
      session,
      frame_size: 0,
      ret: Type::Unconstrained,
    }
  }

  fn report(&mut self, diagnostic: Diagnostic) {
    self.session.diagnostics.report(diagnostic);
  }

  fn contract(&mut self, line: usize, message: impl Into<String>) {
    self.report(Diagnostic::Contract {
      line,
      message: message.into(),
    });
  }

  /// Consume `tag`, or report it missing and carry on as if it were there.
  fn expect(&mut self, tag: Tag) -> bool {
    if self.tokens.eat(tag) {
      return true;
    }
    let line = self.tokens.prev_line();
    self.report(Diagnostic::MissingExpectedToken {
      line,
      expected: tag,
    });
    false
  }

  /// Consume an identifier, returning its text and line.
  fn expect_ident(&mut self) -> Option<(String, usize)> {
    if self.tokens.at(Tag::Ident) {
      let token = self.tokens.bump();
      return Some((token.text, token.line));
    }
    self.expect(Tag::Ident);
    None
  }

  fn skip_unknown(&mut self) {
    let token = self.tokens.bump();
    let text = if token.tag == Tag::Eof {
      Tag::Eof.describe().to_string()
    } else {
      token.text
    };
    self.report(Diagnostic::UnknownStatementToken {
      line: token.line,
      text,
    });
  }

  pub fn parse_program(mut self) -> Program {
    let mut program = Program::default();
    while !self.tokens.is_eof() {
      if self.tokens.peek().tag.is_type() {
        program.functions.push(self.function());
      } else {
        self.skip_unknown();
      }
    }
    debug!(
      "parsed {} function(s), {} diagnostic(s)",
      program.functions.len(),
      self.session.error_count()
    );
    program
  }

  fn function(&mut self) -> Function {
    let ret_token = self.tokens.bump();
    let ret = Type::from_keyword(ret_token.tag).unwrap_or(Type::Error);
    let (name, line) = self
      .expect_ident()
      .unwrap_or_else(|| (String::new(), ret_token.line));

    self.session.scopes.enter_function(&name);
    let scope = self.session.scopes.enter_scope();
    self.frame_size = 0;
    self.ret = ret;

    self.expect(Tag::LParen);
    let params = self.params(scope);
    self.expect(Tag::RParen);

    let is_definition = self.tokens.at(Tag::LBrace);
    let param_types: Vec<Type> = params.iter().map(|p| p.ty).collect();
    let registration = if name.is_empty() {
      FnRegistration::Conflict
    } else {
      self
        .session
        .symbols
        .register_fn(&name, ret, &param_types, is_definition)
    };
    if registration == FnRegistration::Conflict && !name.is_empty() {
      self.report(Diagnostic::ConflictingDeclaration {
        line,
        name: name.clone(),
      });
    }

    let body = if is_definition {
      // Parameters and top-level locals share one scope.
      Some(self.block_contents())
    } else {
      self.expect(Tag::Semi);
      None
    };

    if body.is_some() && registration != FnRegistration::Conflict {
      self.session.symbols.set_frame_size(&name, self.frame_size);
    }
    debug!(
      "function {name}: {} param(s), frame {} byte(s), {}",
      params.len(),
      self.frame_size,
      if body.is_some() { "defined" } else { "declared" }
    );

    self.session.scopes.leave_scope();
    self.session.scopes.leave_function();
    Function {
      name,
      ret,
      params,
      body,
      frame_size: self.frame_size,
      line,
    }
  }

  /// Parameter list between the parentheses. Names are optional, so
  /// prototypes like `int f(int);` work; unnamed parameters still take a slot.
  fn params(&mut self, scope: ScopeId) -> Vec<VarRef> {
    let mut params = Vec::new();
    if !self.tokens.peek().tag.is_type() {
      return params;
    }
    if self.tokens.at(Tag::Void) && self.tokens.peek_nth(1).tag == Tag::RParen {
      self.tokens.bump();
      return params;
    }

    loop {
      let token = self.tokens.peek().clone();
      let ty = match Type::from_keyword(token.tag) {
        Some(ty) => {
          self.tokens.bump();
          ty
        }
        None => {
          self.contract(token.line, "expected a parameter type");
          Type::Error
        }
      };
      if ty == Type::Void {
        self.contract(token.line, "'void' must be the only parameter");
      }

      let mut var = VarRef {
        name: String::new(),
        ty,
        offset: -(16 + 8 * params.len() as i64),
        mutable: true,
      };
      if self.tokens.at(Tag::Ident) {
        let ident = self.tokens.bump();
        var.name = ident.text;
        self.declare(&var, scope, ident.line);
      }
      params.push(var);

      if !self.tokens.eat(Tag::Comma) {
        break;
      }
    }
    params
  }

  /// Register a variable in `scope`; a name clash is reported and the first
  /// declaration stays in force. Returns whether the insert happened.
  fn declare(&mut self, var: &VarRef, scope: ScopeId, line: usize) -> bool {
    let symbol = VarSymbol {
      name: var.name.clone(),
      ty: var.ty,
      scope,
      offset: var.offset,
      mutable: var.mutable,
    };
    if self.session.symbols.insert_var(symbol).is_ok() {
      return true;
    }
    self.report(Diagnostic::ConflictingDeclaration {
      line,
      name: var.name.clone(),
    });
    false
  }

  /// `{ item* }` in a fresh scope.
  fn block(&mut self) -> Block {
    self.session.scopes.enter_scope();
    let block = self.block_contents();
    self.session.scopes.leave_scope();
    block
  }

  /// `{ item* }` in whatever scope is current.
  fn block_contents(&mut self) -> Block {
    self.expect(Tag::LBrace);
    let mut block = Block::default();
    while !self.tokens.at(Tag::RBrace) && !self.tokens.is_eof() {
      if let Some(item) = self.item() {
        block.items.push(item);
      }
    }
    self.expect(Tag::RBrace);
    block
  }

  fn item(&mut self) -> Option<Item> {
    let tag = self.tokens.peek().tag;
    if tag == Tag::Const || tag.is_type() {
      return Some(Item::Decl(self.decl()));
    }
    self.statement().map(Item::Stmt)
  }

  /// `const? type ident (= expr)? ;`
  fn decl(&mut self) -> Decl {
    let is_const = self.tokens.eat(Tag::Const);
    let type_token = self.tokens.peek().clone();
    let ty = match Type::from_keyword(type_token.tag) {
      Some(ty) => {
        self.tokens.bump();
        ty
      }
      None => {
        self.contract(type_token.line, "expected a type after 'const'");
        Type::Error
      }
    };

    let ident = self.expect_ident();
    let line = ident.as_ref().map_or(type_token.line, |(_, line)| *line);
    let init = if self.tokens.eat(Tag::Assign) {
      Some(self.expr())
    } else {
      if is_const {
        self.expect(Tag::Assign);
      }
      None
    };

    if ty == Type::Void {
      self.contract(line, "variable declared void");
    } else if let Some(init) = &init
      && !ty.accepts(init.ty())
    {
      self.report(Diagnostic::TypeMismatch {
        line,
        expected: ty,
        found: init.ty(),
      });
    }

    let mut target = VarRef {
      name: ident.map(|(name, _)| name).unwrap_or_default(),
      ty,
      offset: self.frame_size + ty.size(),
      mutable: !is_const,
    };
    if !target.name.is_empty()
      && let Some(scope) = self.session.scopes.current()
      && self.declare(&target, scope, line)
    {
      self.frame_size = target.offset;
    } else {
      target.ty = Type::Error;
    }

    self.expect(Tag::Semi);
    Decl { target, init }
  }
}
