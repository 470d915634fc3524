//! One compilation session: every piece of mutable state the pipeline touches.
//!
//! Nothing in the crate is global. Parser and generator borrow the session
//! mutably, so independent sessions can compile in parallel.

use crate::codegen::GenState;
use crate::error::Diagnostics;
use crate::scope::ScopeManager;
use crate::symbol::SymbolTable;

/// Knobs a caller can set before compiling.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
  /// Print each diagnostic to stderr as soon as it is found.
  pub echo_diagnostics: bool,
}

#[derive(Debug, Default)]
pub struct Session {
  pub options: CompileOptions,
  pub scopes: ScopeManager,
  pub symbols: SymbolTable,
  pub diagnostics: Diagnostics,
  pub gen_state: GenState,
}

impl Session {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_options(options: CompileOptions) -> Self {
    Self {
      diagnostics: Diagnostics::new(options.echo_diagnostics),
      options,
      ..Self::default()
    }
  }

  /// Clear all per-program state so the session can compile another program.
  pub fn reset(&mut self) {
    self.scopes.reset();
    self.symbols.reset();
    self.diagnostics.clear();
    self.gen_state = GenState::default();
  }

  pub fn error_count(&self) -> usize {
    self.diagnostics.count()
  }
}
