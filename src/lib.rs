//! Crate root: wires together the compilation pipeline.
//!
//! The stages run strictly in order over one `Session`:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` builds the AST and, in the same pass, resolves names through
//!   `scope`/`symbol` and checks types with the rules in `ty`.
//! - `codegen` lowers the analysed AST into x86-64 AT&T assembly.
//! - `error` holds the diagnostics shared by all of them.
//!
//! Assembly is only produced when the parse pass reported nothing.

pub mod ast;
pub mod codegen;
pub mod error;
pub mod parser;
pub mod scope;
pub mod session;
pub mod symbol;
pub mod tokenizer;
pub mod ty;

use log::debug;

pub use error::{CompileError, CompileResult, Diagnostic};
pub use session::{CompileOptions, Session};

/// Drives one compilation over a borrowed session.
pub struct Generator<'s> {
  session: &'s mut Session,
}

impl<'s> Generator<'s> {
  pub fn new(session: &'s mut Session) -> Self {
    Self { session }
  }

  /// Compile `source`. The session is reset first, so a generator can be run
  /// repeatedly and every run sees fresh scopes, symbols and counters.
  pub fn run(&mut self, source: &str) -> CompileResult<String> {
    self.session.reset();
    let tokens = tokenizer::tokenize(source);
    let program = parser::parse(tokens, self.session);

    let count = self.session.error_count();
    if count > 0 {
      debug!("compilation rejected with {count} diagnostic(s)");
      return Err(CompileError::Rejected { count });
    }
    Ok(codegen::generate(&program, &mut self.session.gen_state))
  }
}

/// Compile a source string into AT&T assembly with a throwaway session.
pub fn generate_assembly(source: &str) -> CompileResult<String> {
  let mut session = Session::new();
  Generator::new(&mut session).run(source)
}
