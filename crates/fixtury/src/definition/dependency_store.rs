use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::value::Value;

use super::Definition;

/// Access to the declared dependencies of one definition during its build.
///
/// In strict mode (the default) only declared accessors can be read. In
/// permissive mode an undeclared accessor is treated as a search relative to the
/// store's current namespace.
pub struct DependencyStore<'a> {
  definition: &'a Definition,
  store: &'a Store,
}

impl<'a> DependencyStore<'a> {
  pub(crate) fn new(definition: &'a Definition, store: &'a Store) -> Self {
    Self { definition, store }
  }

  pub fn definition(&self) -> &Definition {
    self.definition
  }

  /// Declared accessor names.
  pub fn accessors(&self) -> impl Iterator<Item = &str> {
    self.definition.dependencies().keys().map(String::as_str)
  }

  /// Build or fetch the dependency bound to `accessor`.
  pub fn get(&self, accessor: &str) -> Result<Value> {
    if let Some(dependency) = self.definition.dependencies().get(accessor) {
      let namespace = self.definition.namespace().unwrap_or_else(|| self.store.schema().clone());
      let target = namespace.get_definition(dependency.search())?;
      trace!(
        pathname = %self.definition.pathname(),
        accessor,
        dependency = %target.pathname(),
        "resolving dependency"
      );
      return self.store.get(target.pathname());
    }

    if self.store.strict_dependencies() {
      return Err(Error::UnknownDependency {
        pathname: self.definition.pathname().to_string(),
        accessor: accessor.to_string(),
      });
    }

    self.store.get(accessor)
  }

  /// [`DependencyStore::get`], downcast to `T`.
  pub fn get_as<T: Any + Send + Sync>(&self, accessor: &str) -> Result<Arc<T>> {
    let value = self.get(accessor)?;
    value.downcast::<T>().ok_or_else(|| Error::TypeMismatch {
      accessor: accessor.to_string(),
      expected: type_name::<T>(),
      actual: value.kind(),
    })
  }
}

impl fmt::Debug for DependencyStore<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "DependencyStore(definition: {:?}, dependencies: {:?})",
      self.definition.pathname(),
      self.accessors().collect::<Vec<_>>()
    )
  }
}
