//! Flat registries of variable and function symbols.
//!
//! Variables are filtered by name and scope visibility, so shadowing works
//! without nested tables. Functions have a single global namespace with no
//! overloading.

use log::trace;

use crate::scope::{ScopeId, ScopeManager};
use crate::ty::Type;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarSymbol {
  pub name: String,
  pub ty: Type,
  pub scope: ScopeId,
  /// Displacement below `%rbp`; parameters are negative, locals positive.
  pub offset: i64,
  pub mutable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnSymbol {
  pub name: String,
  pub ret: Type,
  pub params: Vec<Type>,
  pub frame_size: i64,
  pub declared_only: bool,
}

impl FnSymbol {
  pub fn same_signature(&self, ret: Type, params: &[Type]) -> bool {
    self.ret == ret && self.params == params
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlreadyExists;

/// Result of registering a function header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FnRegistration {
  /// First time this name was seen.
  New,
  /// An identical prototype was already known.
  Redeclared,
  /// A prior prototype is now backed by this body.
  Defined,
  /// Different signature, or a second body.
  Conflict,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
  vars: Vec<VarSymbol>,
  funcs: Vec<FnSymbol>,
}

impl SymbolTable {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn reset(&mut self) {
    self.vars.clear();
    self.funcs.clear();
  }

  /// Insert a variable unless its name is already taken in the same scope.
  pub fn insert_var(&mut self, symbol: VarSymbol) -> Result<(), AlreadyExists> {
    if self
      .vars
      .iter()
      .any(|v| v.scope == symbol.scope && v.name == symbol.name)
    {
      return Err(AlreadyExists);
    }
    trace!(
      "declare {} : {} in scope {} at offset {}",
      symbol.name, symbol.ty, symbol.scope, symbol.offset
    );
    self.vars.push(symbol);
    Ok(())
  }

  /// Most recently declared visible variable with this name.
  pub fn lookup_var(&self, name: &str, scopes: &ScopeManager) -> Option<&VarSymbol> {
    self
      .vars
      .iter()
      .rev()
      .find(|v| v.name == name && scopes.is_visible(v.scope))
  }

  pub fn lookup_fn(&self, name: &str) -> Option<&FnSymbol> {
    self.funcs.iter().find(|f| f.name == name)
  }

  /// Register a function header. `is_definition` is true when a body follows.
  pub fn register_fn(
    &mut self,
    name: &str,
    ret: Type,
    params: &[Type],
    is_definition: bool,
  ) -> FnRegistration {
    let Some(existing) = self.funcs.iter_mut().find(|f| f.name == name) else {
      trace!("register function {name}");
      self.funcs.push(FnSymbol {
        name: name.to_string(),
        ret,
        params: params.to_vec(),
        frame_size: 0,
        declared_only: !is_definition,
      });
      return FnRegistration::New;
    };

    if !existing.same_signature(ret, params) {
      return FnRegistration::Conflict;
    }
    match (is_definition, existing.declared_only) {
      (false, _) => FnRegistration::Redeclared,
      (true, true) => {
        existing.declared_only = false;
        FnRegistration::Defined
      }
      (true, false) => FnRegistration::Conflict,
    }
  }

  /// Record the local footprint once a definition's body has been parsed.
  pub fn set_frame_size(&mut self, name: &str, frame_size: i64) {
    if let Some(func) = self.funcs.iter_mut().find(|f| f.name == name) {
      func.frame_size = frame_size;
    }
  }
}
