use tracing::debug;

use crate::error::{Error, Result};
use crate::hooks::{Execution, Trigger};
use crate::store::Store;
use crate::value::Value;

use super::Definition;

/// Lifecycle of a single executor run.
#[derive(Debug, Clone)]
pub enum ExecutorState {
  Pending,
  Running,
  Succeeded(Value),
  Failed,
}

/// Runs one [`Definition`] in the context of a [`Store`].
///
/// An executor is single use: a second `call` fails with [`Error::ExecutorReused`].
pub struct DefinitionExecutor<'s> {
  store: &'s Store,
  definition: Definition,
  execution: Execution,
  state: ExecutorState,
}

impl<'s> DefinitionExecutor<'s> {
  pub fn new(store: &'s Store, definition: Definition) -> Self {
    let execution = Execution::new(definition.pathname(), definition.isolation_key());
    Self {
      store,
      definition,
      execution,
      state: ExecutorState::Pending,
    }
  }

  pub fn definition(&self) -> &Definition {
    &self.definition
  }

  pub fn state(&self) -> &ExecutorState {
    &self.state
  }

  /// Hook-visible information about this run, including metadata hooks recorded.
  pub fn execution(&self) -> &Execution {
    &self.execution
  }

  /// The built value once the run succeeded.
  pub fn value(&self) -> Option<&Value> {
    match &self.state {
      ExecutorState::Succeeded(value) => Some(value),
      _ => None,
    }
  }

  /// Build the value.
  ///
  /// The build runs with the store's current namespace set to the definition's
  /// namespace and is wrapped by the store's execution hooks. Errors raised by
  /// this crate pass through; anything else is wrapped in
  /// [`Error::DefinitionExecution`].
  pub fn call(&mut self) -> Result<Value> {
    if !matches!(self.state, ExecutorState::Pending) {
      return Err(Error::ExecutorReused(self.definition.pathname().to_string()));
    }
    self.state = ExecutorState::Running;

    let store = self.store;
    let definition = &self.definition;
    let execution = &self.execution;
    let namespace = definition.namespace().unwrap_or_else(|| store.schema().clone());

    debug!(pathname = %definition.pathname(), "executing definition");
    let outcome = store.with_relative_schema(namespace, || {
      store
        .hooks()
        .call(Trigger::Execution, execution, &mut || definition.run(store))
    });

    match outcome {
      Ok(value) => {
        self.state = ExecutorState::Succeeded(value.clone());
        Ok(value)
      }
      Err(err) => {
        self.state = ExecutorState::Failed;
        Err(Error::from_build_failure(definition.pathname(), err))
      }
    }
  }
}
