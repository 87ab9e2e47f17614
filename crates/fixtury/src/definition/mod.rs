//! Fixture definitions and their execution.
//!
//! A [`Definition`] is a leaf of the schema tree: a build [`Callable`], the
//! dependencies it declared and an optional chain of enhancements. Running a
//! definition goes through a single-use [`DefinitionExecutor`].

mod dependency_store;
mod execute;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::error::Result;
use crate::schema::{Dependency, FixtureOptions, NodeMeta, Options, Schema};
use crate::store::Store;
use crate::util::sync::{read, write};
use crate::value::Value;

pub use dependency_store::DependencyStore;
pub use execute::{DefinitionExecutor, ExecutorState};

type PlainFn = dyn Fn() -> anyhow::Result<Value> + Send + Sync;
type DependentFn = dyn for<'a> Fn(&DependencyStore<'a>) -> anyhow::Result<Value> + Send + Sync;

/// Post-processing step applied to a built value.
pub type Enhancement = Arc<dyn Fn(Value) -> anyhow::Result<Value> + Send + Sync>;

/// The build procedure of a fixture.
#[derive(Clone)]
pub enum Callable {
  /// Takes no arguments.
  Plain(Arc<PlainFn>),
  /// Receives access to the declared dependencies.
  WithDependencies(Arc<DependentFn>),
}

impl Callable {
  pub fn new<F>(build: F) -> Self
  where
    F: Fn() -> anyhow::Result<Value> + Send + Sync + 'static,
  {
    Callable::Plain(Arc::new(build))
  }

  pub fn with_dependencies<F>(build: F) -> Self
  where
    F: for<'a> Fn(&DependencyStore<'a>) -> anyhow::Result<Value> + Send + Sync + 'static,
  {
    Callable::WithDependencies(Arc::new(build))
  }

  /// Whether the callable wants a [`DependencyStore`].
  pub fn takes_dependencies(&self) -> bool {
    matches!(self, Callable::WithDependencies(_))
  }

  /// Same underlying closure.
  pub fn ptr_eq(&self, other: &Callable) -> bool {
    match (self, other) {
      (Callable::Plain(a), Callable::Plain(b)) => Arc::ptr_eq(a, b),
      (Callable::WithDependencies(a), Callable::WithDependencies(b)) => Arc::ptr_eq(a, b),
      _ => false,
    }
  }
}

impl fmt::Debug for Callable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Callable::Plain(_) => f.write_str("Callable::Plain"),
      Callable::WithDependencies(_) => f.write_str("Callable::WithDependencies"),
    }
  }
}

/// A buildable fixture. Cheap to clone; clones share the same node.
#[derive(Clone)]
pub struct Definition {
  inner: Arc<DefinitionInner>,
}

struct DefinitionInner {
  meta: NodeMeta,
  callable: Callable,
  dependencies: BTreeMap<String, Dependency>,
  enhancements: RwLock<Vec<Enhancement>>,
}

impl Definition {
  pub(crate) fn build(parent: &Schema, name: &str, options: FixtureOptions, callable: Callable) -> Result<Self> {
    let meta = NodeMeta::child(parent, name)?;
    meta.apply_options(&options.options)?;

    let mut dependencies = BTreeMap::new();
    for decl in &options.deps {
      for dep in Dependency::resolve(decl)? {
        dependencies.insert(dep.accessor().to_string(), dep);
      }
    }

    Ok(Self {
      inner: Arc::new(DefinitionInner {
        meta,
        callable,
        dependencies,
        enhancements: RwLock::new(Vec::new()),
      }),
    })
  }

  pub fn name(&self) -> &str {
    &self.inner.meta.name
  }

  pub fn pathname(&self) -> &str {
    &self.inner.meta.pathname
  }

  pub fn options(&self) -> Options {
    self.inner.meta.options()
  }

  /// The namespace this fixture was defined in.
  pub fn namespace(&self) -> Option<Schema> {
    self.inner.meta.parent()
  }

  /// The isolation group of this fixture; its own pathname when no ancestor isolates it.
  pub fn isolation_key(&self) -> String {
    self
      .inner
      .meta
      .isolation_key(true)
      .unwrap_or_else(|| self.pathname().to_string())
  }

  pub fn callable(&self) -> &Callable {
    &self.inner.callable
  }

  /// Declared dependencies keyed by accessor.
  pub fn dependencies(&self) -> &BTreeMap<String, Dependency> {
    &self.inner.dependencies
  }

  pub fn enhancements(&self) -> Vec<Enhancement> {
    read(&self.inner.enhancements).clone()
  }

  pub(crate) fn push_enhancement(&self, enhancement: Enhancement) {
    write(&self.inner.enhancements).push(enhancement);
  }

  /// Build this fixture against `store`.
  pub fn call(&self, store: &Store) -> Result<Value> {
    DefinitionExecutor::new(store, self.clone()).call()
  }

  /// Primary callable followed by each enhancement, threading the value through.
  pub(crate) fn run(&self, store: &Store) -> anyhow::Result<Value> {
    let mut value = match &self.inner.callable {
      Callable::Plain(build) => build()?,
      Callable::WithDependencies(build) => build(&DependencyStore::new(self, store))?,
    };

    for enhancement in self.enhancements() {
      value = enhancement(value)?;
    }
    Ok(value)
  }

  pub(crate) fn meta(&self) -> &NodeMeta {
    &self.inner.meta
  }

  pub fn ptr_eq(&self, other: &Definition) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }
}

impl fmt::Debug for Definition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Definition")
      .field("pathname", &self.pathname())
      .field("dependencies", &self.inner.dependencies.keys().collect::<Vec<_>>())
      .field("enhancements", &read(&self.inner.enhancements).len())
      .finish()
  }
}
