//! Syntax tree produced by the parser.
//!
//! Each precedence tier has its own node type. A tier is a `Chain`: the first
//! operand plus `(operator, operand)` pairs, where each operator joins its
//! operand to the running result on the left. Static types are computed while
//! the parser builds a node and are stored on it, so nothing here re-derives
//! them.

use crate::tokenizer::Tag;
use crate::ty::{OpClass, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Or,
  And,
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
  Add,
  Sub,
  Mul,
  Div,
  Mod,
}

impl BinaryOp {
  pub fn from_tag(tag: Tag) -> Option<Self> {
    let op = match tag {
      Tag::OrOr => BinaryOp::Or,
      Tag::AndAnd => BinaryOp::And,
      Tag::EqEq => BinaryOp::Eq,
      Tag::Ne => BinaryOp::Ne,
      Tag::Lt => BinaryOp::Lt,
      Tag::Le => BinaryOp::Le,
      Tag::Gt => BinaryOp::Gt,
      Tag::Ge => BinaryOp::Ge,
      Tag::Plus => BinaryOp::Add,
      Tag::Minus => BinaryOp::Sub,
      Tag::Star => BinaryOp::Mul,
      Tag::Slash => BinaryOp::Div,
      Tag::Percent => BinaryOp::Mod,
      _ => return None,
    };
    Some(op)
  }

  pub fn class(self) -> OpClass {
    match self {
      BinaryOp::Or | BinaryOp::And => OpClass::Logical,
      BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
        OpClass::Comparison
      }
      BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
        OpClass::Arithmetic
      }
    }
  }
}

/// Behaviour shared by every expression tier.
pub trait Node {
  /// Static type, fixed when the node was built.
  fn ty(&self) -> Type;

  /// The variable this node names, if it is nothing more than a variable.
  fn as_var(&self) -> Option<&VarRef>;

  /// The call this node is, if it is nothing more than a call.
  fn as_call(&self) -> Option<&Call>;
}

/// A resolved variable reference. Carries everything codegen needs so the
/// symbol table is not consulted after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarRef {
  pub name: String,
  pub ty: Type,
  pub offset: i64,
  pub mutable: bool,
}

#[derive(Debug, Clone)]
pub struct Call {
  pub name: String,
  pub args: Vec<Expr>,
  pub ty: Type,
  pub line: usize,
}

/// Operator-joined operands at one precedence level.
#[derive(Debug, Clone)]
pub struct Chain<T> {
  pub first: T,
  pub rest: Vec<(BinaryOp, T)>,
  pub ty: Type,
}

impl<T: Node> Chain<T> {
  pub fn single(first: T) -> Self {
    let ty = first.ty();
    Self {
      first,
      rest: Vec::new(),
      ty,
    }
  }

  /// Operands in source order, each with the operator joining it to its left
  /// neighbour (`None` for the first).
  pub fn operands(&self) -> impl Iterator<Item = (Option<BinaryOp>, &T)> {
    std::iter::once((None, &self.first)).chain(self.rest.iter().map(|(op, t)| (Some(*op), t)))
  }
}

impl<T: Node> Node for Chain<T> {
  fn ty(&self) -> Type {
    self.ty
  }

  fn as_var(&self) -> Option<&VarRef> {
    if self.rest.is_empty() {
      self.first.as_var()
    } else {
      None
    }
  }

  fn as_call(&self) -> Option<&Call> {
    if self.rest.is_empty() {
      self.first.as_call()
    } else {
      None
    }
  }
}

pub type OrExpr = Chain<AndExpr>;
pub type AndExpr = Chain<EqualityExpr>;
pub type EqualityExpr = Chain<RelationalExpr>;
pub type RelationalExpr = Chain<AdditiveExpr>;
pub type AdditiveExpr = Chain<TermExpr>;
pub type TermExpr = Chain<Factor>;

#[derive(Debug, Clone)]
pub enum Factor {
  Var(VarRef),
  Num { value: i64, ty: Type },
  Bool(bool),
  Paren(Box<Expr>),
  Not { operand: Box<Factor>, ty: Type },
  Call(Call),
  /// Placeholder left where an operand was missing.
  Missing,
}

impl Node for Factor {
  fn ty(&self) -> Type {
    match self {
      Factor::Var(var) => var.ty,
      Factor::Num { ty, .. } | Factor::Not { ty, .. } => *ty,
      Factor::Bool(_) => Type::Bool,
      Factor::Paren(inner) => inner.ty(),
      Factor::Call(call) => call.ty,
      Factor::Missing => Type::Error,
    }
  }

  fn as_var(&self) -> Option<&VarRef> {
    match self {
      Factor::Var(var) => Some(var),
      _ => None,
    }
  }

  fn as_call(&self) -> Option<&Call> {
    match self {
      Factor::Call(call) => Some(call),
      _ => None,
    }
  }
}

#[derive(Debug, Clone)]
pub enum Expr {
  Assign { target: VarRef, value: Box<Expr> },
  Or(OrExpr),
}

impl Node for Expr {
  fn ty(&self) -> Type {
    match self {
      Expr::Assign { target, value } => {
        if value.ty().is_error() {
          Type::Error
        } else {
          target.ty
        }
      }
      Expr::Or(chain) => chain.ty(),
    }
  }

  fn as_var(&self) -> Option<&VarRef> {
    match self {
      Expr::Assign { .. } => None,
      Expr::Or(chain) => chain.as_var(),
    }
  }

  fn as_call(&self) -> Option<&Call> {
    match self {
      Expr::Assign { .. } => None,
      Expr::Or(chain) => chain.as_call(),
    }
  }
}

/// Wrap a lone factor all the way up to a full expression.
pub fn factor_expr(factor: Factor) -> Expr {
  Expr::Or(Chain::single(Chain::single(Chain::single(Chain::single(
    Chain::single(Chain::single(factor)),
  )))))
}

#[derive(Debug, Clone)]
pub struct Decl {
  pub target: VarRef,
  pub init: Option<Expr>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
  Expr(Expr),
  Call(Call),
  If {
    cond: Expr,
    then: Box<Stmt>,
    els: Option<Box<Stmt>>,
  },
  While {
    cond: Expr,
    body: Box<Stmt>,
  },
  For {
    init: Option<Expr>,
    cond: Option<Expr>,
    step: Option<Expr>,
    body: Box<Stmt>,
  },
  Write(Expr),
  Read(VarRef),
  Return(Option<Expr>),
  Block(Block),
  Empty,
}

#[derive(Debug, Clone)]
pub enum Item {
  Decl(Decl),
  Stmt(Stmt),
}

#[derive(Debug, Clone, Default)]
pub struct Block {
  pub items: Vec<Item>,
}

#[derive(Debug, Clone)]
pub struct Function {
  pub name: String,
  pub ret: Type,
  pub params: Vec<VarRef>,
  /// `None` for a prototype.
  pub body: Option<Block>,
  /// Bytes of locals, before alignment.
  pub frame_size: i64,
  pub line: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Program {
  pub functions: Vec<Function>,
}

impl Program {
  pub fn definitions(&self) -> impl Iterator<Item = &Function> {
    self.functions.iter().filter(|f| f.body.is_some())
  }

  pub fn defines(&self, name: &str) -> bool {
    self.definitions().any(|f| f.name == name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn int_var(name: &str) -> VarRef {
    VarRef {
      name: name.into(),
      ty: Type::Int,
      offset: 4,
      mutable: true,
    }
  }

  #[test]
  fn bare_variable_is_visible_through_every_tier() {
    let expr = factor_expr(Factor::Var(int_var("x")));
    assert_eq!(expr.as_var().map(|v| v.name.as_str()), Some("x"));
    assert_eq!(expr.ty(), Type::Int);
    assert!(expr.as_call().is_none());
  }

  #[test]
  fn chained_operand_is_not_a_place() {
    let mut term = Chain::single(Factor::Var(int_var("x")));
    term.rest.push((BinaryOp::Mul, Factor::Num { value: 2, ty: Type::Int }));
    assert!(term.as_var().is_none());
    let ops: Vec<_> = term.operands().map(|(op, _)| op).collect();
    assert_eq!(ops, vec![None, Some(BinaryOp::Mul)]);
  }

  #[test]
  fn negation_and_parens_are_not_places() {
    let not = Factor::Not {
      operand: Box::new(Factor::Var(int_var("b"))),
      ty: Type::Error,
    };
    assert!(not.as_var().is_none());
    let paren = Factor::Paren(Box::new(factor_expr(Factor::Var(int_var("x")))));
    assert!(paren.as_var().is_none());
    assert_eq!(paren.ty(), Type::Int);
  }

  #[test]
  fn operator_classes() {
    assert_eq!(BinaryOp::from_tag(Tag::Percent), Some(BinaryOp::Mod));
    assert_eq!(BinaryOp::Le.class(), OpClass::Comparison);
    assert_eq!(BinaryOp::And.class(), OpClass::Logical);
    assert_eq!(BinaryOp::from_tag(Tag::Assign), None);
  }
}
