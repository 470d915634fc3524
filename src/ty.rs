//! Static types and the rules for combining them.
//!
//! `Error` is absorbing: once an operand is erroneous every combination yields
//! `Error` without asking the caller to report anything new.

use std::fmt;

use crate::tokenizer::Tag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
  Bool,
  Char,
  Int,
  Long,
  Void,
  Pointer,
  Error,
  /// Placeholder for an absent operand; combines as the identity.
  Unconstrained,
}

/// Outcome of combining two operand types under an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combined {
  Ok(Type),
  /// One side was already erroneous; nothing new to report.
  Absorbed,
  /// A `void` value took part in the operation.
  VoidOperand,
  /// The operand types are not valid for the operator.
  Mismatch,
}

/// Operator families with distinct typing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
  Logical,
  Comparison,
  Arithmetic,
}

impl Type {
  pub fn from_keyword(tag: Tag) -> Option<Self> {
    match tag {
      Tag::Bool => Some(Type::Bool),
      Tag::Char => Some(Type::Char),
      Tag::Int => Some(Type::Int),
      Tag::Long => Some(Type::Long),
      Tag::Void => Some(Type::Void),
      _ => None,
    }
  }

  fn rank(self) -> Option<u8> {
    match self {
      Type::Char => Some(0),
      Type::Int => Some(1),
      Type::Long => Some(2),
      _ => None,
    }
  }

  pub fn is_numeric(self) -> bool {
    self.rank().is_some()
  }

  pub fn is_error(self) -> bool {
    self == Type::Error
  }

  /// Frame footprint in bytes.
  pub fn size(self) -> i64 {
    match self {
      Type::Bool | Type::Char => 1,
      Type::Int => 4,
      Type::Long | Type::Pointer => 8,
      Type::Void | Type::Error | Type::Unconstrained => 0,
    }
  }

  /// The wider of two numeric types.
  pub fn promote(self, other: Type) -> Option<Type> {
    let (a, b) = (self.rank()?, other.rank()?);
    Some(if a >= b { self } else { other })
  }

  /// Whether a value of type `value` may be stored into a slot of type `self`.
  /// Erroneous or unconstrained sides are accepted so they never cascade.
  pub fn accepts(self, value: Type) -> bool {
    if matches!(self, Type::Error | Type::Unconstrained)
      || matches!(value, Type::Error | Type::Unconstrained)
    {
      return true;
    }
    if self == Type::Void || value == Type::Void {
      return false;
    }
    self == value || (self.is_numeric() && value.is_numeric())
  }

  pub fn combine(class: OpClass, lhs: Type, rhs: Type) -> Combined {
    if lhs.is_error() || rhs.is_error() {
      return Combined::Absorbed;
    }
    if lhs == Type::Void || rhs == Type::Void {
      return Combined::VoidOperand;
    }
    match (lhs, rhs) {
      (Type::Unconstrained, other) | (other, Type::Unconstrained) => return Combined::Ok(other),
      _ => {}
    }
    let result = match class {
      OpClass::Logical => (lhs == Type::Bool && rhs == Type::Bool).then_some(Type::Bool),
      OpClass::Comparison => {
        (lhs == rhs || (lhs.is_numeric() && rhs.is_numeric())).then_some(Type::Bool)
      }
      OpClass::Arithmetic => lhs.promote(rhs),
    };
    result.map_or(Combined::Mismatch, Combined::Ok)
  }

  /// Typing of unary `!`.
  pub fn negate(operand: Type) -> Combined {
    match operand {
      Type::Error => Combined::Absorbed,
      Type::Void => Combined::VoidOperand,
      Type::Bool | Type::Unconstrained => Combined::Ok(Type::Bool),
      _ => Combined::Mismatch,
    }
  }
}

impl fmt::Display for Type {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Type::Bool => "bool",
      Type::Char => "char",
      Type::Int => "int",
      Type::Long => "long",
      Type::Void => "void",
      Type::Pointer => "pointer",
      Type::Error => "<error>",
      Type::Unconstrained => "<unconstrained>",
    };
    f.write_str(name)
  }
}
