//! Lexical scope tracking.
//!
//! Every block gets a fresh id from a monotonically increasing counter. A
//! symbol is visible while its scope id is on the stack.

use log::trace;

pub type ScopeId = u32;

#[derive(Debug, Default)]
pub struct ScopeManager {
  next_id: ScopeId,
  stack: Vec<ScopeId>,
  function: Option<String>,
}

impl ScopeManager {
  pub fn new() -> Self {
    Self::default()
  }

  /// Forget every scope and restart the id counter.
  pub fn reset(&mut self) {
    self.next_id = 0;
    self.stack.clear();
    self.function = None;
  }

  pub fn enter_scope(&mut self) -> ScopeId {
    let id = self.next_id;
    self.next_id += 1;
    self.stack.push(id);
    trace!("enter scope {id} (depth {})", self.stack.len());
    id
  }

  pub fn leave_scope(&mut self) -> Option<ScopeId> {
    let id = self.stack.pop();
    trace!("leave scope {id:?}");
    id
  }

  /// Innermost open scope, if any.
  pub fn current(&self) -> Option<ScopeId> {
    self.stack.last().copied()
  }

  pub fn is_visible(&self, id: ScopeId) -> bool {
    self.stack.contains(&id)
  }

  pub fn enter_function(&mut self, name: &str) {
    self.function = Some(name.to_string());
  }

  pub fn leave_function(&mut self) {
    self.function = None;
  }

  pub fn current_function(&self) -> Option<&str> {
    self.function.as_deref()
  }
}
