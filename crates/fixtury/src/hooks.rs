//! Lifecycle hooks.
//!
//! Hooks let outside code observe or wrap fixture builds, for example to
//! record which database rows a build created. For each [`Trigger`] hooks run in
//! this order: `before`, the `around` chain (first registered is outermost),
//! `on`, then `after` with the produced value.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value as Json;

use crate::value::Value;

/// Points in the lifecycle hooks can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
  /// The build of a single definition.
  Execution,
}

type InlineHook = Arc<dyn Fn(&Execution) -> anyhow::Result<()> + Send + Sync>;
type AfterHook = Arc<dyn Fn(&Value, &Execution) -> anyhow::Result<()> + Send + Sync>;
type AroundHook = Arc<
  dyn Fn(&Execution, &mut dyn FnMut() -> anyhow::Result<Value>) -> anyhow::Result<Value> + Send + Sync,
>;

#[derive(Clone, Default)]
struct HookList {
  before: Vec<InlineHook>,
  around: Vec<AroundHook>,
  on: Vec<InlineHook>,
  after: Vec<AfterHook>,
}

/// Registry of lifecycle hooks.
#[derive(Clone, Default)]
pub struct Hooks {
  hooks: HashMap<Trigger, HookList>,
}

impl Hooks {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn before<F>(&mut self, trigger: Trigger, hook: F) -> &mut Self
  where
    F: Fn(&Execution) -> anyhow::Result<()> + Send + Sync + 'static,
  {
    self.list(trigger).before.push(Arc::new(hook));
    self
  }

  /// Wrap the triggered work. The hook receives a continuation and must
  /// return a value, normally the one the continuation produced.
  pub fn around<F>(&mut self, trigger: Trigger, hook: F) -> &mut Self
  where
    F: Fn(&Execution, &mut dyn FnMut() -> anyhow::Result<Value>) -> anyhow::Result<Value> + Send + Sync + 'static,
  {
    self.list(trigger).around.push(Arc::new(hook));
    self
  }

  /// Like [`Hooks::after`] without access to the value.
  pub fn on<F>(&mut self, trigger: Trigger, hook: F) -> &mut Self
  where
    F: Fn(&Execution) -> anyhow::Result<()> + Send + Sync + 'static,
  {
    self.list(trigger).on.push(Arc::new(hook));
    self
  }

  pub fn after<F>(&mut self, trigger: Trigger, hook: F) -> &mut Self
  where
    F: Fn(&Value, &Execution) -> anyhow::Result<()> + Send + Sync + 'static,
  {
    self.list(trigger).after.push(Arc::new(hook));
    self
  }

  pub fn is_empty(&self) -> bool {
    self.hooks.is_empty()
  }

  /// Run `work` wrapped in the hooks registered for `trigger`.
  pub fn call(
    &self,
    trigger: Trigger,
    execution: &Execution,
    work: &mut dyn FnMut() -> anyhow::Result<Value>,
  ) -> anyhow::Result<Value> {
    let Some(list) = self.hooks.get(&trigger) else {
      return work();
    };

    for hook in &list.before {
      hook(execution)?;
    }
    let value = call_around(&list.around, execution, work)?;
    for hook in &list.on {
      hook(execution)?;
    }
    for hook in &list.after {
      hook(&value, execution)?;
    }
    Ok(value)
  }

  fn list(&mut self, trigger: Trigger) -> &mut HookList {
    self.hooks.entry(trigger).or_default()
  }
}

fn call_around(
  hooks: &[AroundHook],
  execution: &Execution,
  work: &mut dyn FnMut() -> anyhow::Result<Value>,
) -> anyhow::Result<Value> {
  match hooks.split_first() {
    None => work(),
    Some((hook, rest)) => hook(execution, &mut || call_around(rest, execution, work)),
  }
}

impl std::fmt::Debug for Hooks {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let mut map = f.debug_map();
    for (trigger, list) in &self.hooks {
      map.entry(
        trigger,
        &format_args!(
          "before: {}, around: {}, on: {}, after: {}",
          list.before.len(),
          list.around.len(),
          list.on.len(),
          list.after.len()
        ),
      );
    }
    map.finish()
  }
}

/// What hooks see of a running build.
#[derive(Debug)]
pub struct Execution {
  pathname: String,
  isolation_key: String,
  metadata: RefCell<BTreeMap<String, Json>>,
}

impl Execution {
  pub fn new(pathname: impl Into<String>, isolation_key: impl Into<String>) -> Self {
    Self {
      pathname: pathname.into(),
      isolation_key: isolation_key.into(),
      metadata: RefCell::new(BTreeMap::new()),
    }
  }

  pub fn pathname(&self) -> &str {
    &self.pathname
  }

  pub fn isolation_key(&self) -> &str {
    &self.isolation_key
  }

  /// Record metadata; it ends up on the stored reference.
  pub fn set_metadata(&self, key: impl Into<String>, value: impl Into<Json>) {
    self.metadata.borrow_mut().insert(key.into(), value.into());
  }

  pub fn metadata(&self) -> BTreeMap<String, Json> {
    self.metadata.borrow().clone()
  }
}
