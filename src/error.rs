//! Shared error utilities used across the compilation pipeline.
//!
//! Two layers: `Diagnostic` is one finding about the source program, recorded
//! and compilation carries on; `CompileError` is what the public entry points
//! return once a run has been abandoned.

use std::io;
use std::path::PathBuf;

use log::debug;
use snafu::Snafu;

use crate::tokenizer::Tag;
use crate::ty::Type;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CompileError {
  #[snafu(display("{count} error(s) generated"))]
  Rejected { count: usize },

  #[snafu(display("cannot read {}: {source}", path.display()))]
  ReadSource { path: PathBuf, source: io::Error },

  #[snafu(display("cannot write {}: {source}", path.display()))]
  WriteArtifact { path: PathBuf, source: io::Error },
}

/// A problem found in the source program, anchored at a 1-based line.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum Diagnostic {
  #[snafu(display("line {line}: lexical error: unexpected '{text}'"))]
  Lexical { line: usize, text: String },

  #[snafu(display("line {line}: unexpected token '{text}'"))]
  UnknownStatementToken { line: usize, text: String },

  #[snafu(display("line {line}: expected {expected}"))]
  MissingExpectedToken { line: usize, expected: Tag },

  #[snafu(display("line {line}: conflicting declaration of '{name}'"))]
  ConflictingDeclaration { line: usize, name: String },

  #[snafu(display("line {line}: type mismatch: expected {expected}, found {found}"))]
  TypeMismatch {
    line: usize,
    expected: Type,
    found: Type,
  },

  #[snafu(display("line {line}: invalid left value"))]
  InvalidLeftValue { line: usize },

  #[snafu(display("line {line}: {message}"))]
  Contract { line: usize, message: String },
}

impl Diagnostic {
  pub fn line(&self) -> usize {
    match self {
      Diagnostic::Lexical { line, .. }
      | Diagnostic::UnknownStatementToken { line, .. }
      | Diagnostic::MissingExpectedToken { line, .. }
      | Diagnostic::ConflictingDeclaration { line, .. }
      | Diagnostic::TypeMismatch { line, .. }
      | Diagnostic::InvalidLeftValue { line }
      | Diagnostic::Contract { line, .. } => *line,
    }
  }
}

const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Collects diagnostics for one compilation session.
#[derive(Debug, Default)]
pub struct Diagnostics {
  items: Vec<Diagnostic>,
  echo: bool,
}

impl Diagnostics {
  pub fn new(echo: bool) -> Self {
    Self {
      items: Vec::new(),
      echo,
    }
  }

  /// Record a diagnostic; when echoing, print it straight away.
  pub fn report(&mut self, diagnostic: Diagnostic) {
    debug!("diagnostic: {diagnostic}");
    if self.echo {
      eprintln!("{RED}error{RESET}: {diagnostic}");
    }
    self.items.push(diagnostic);
  }

  pub fn count(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
    self.items.iter()
  }

  pub fn clear(&mut self) {
    self.items.clear();
  }
}
