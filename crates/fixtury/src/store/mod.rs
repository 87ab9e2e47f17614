//! Resolution and caching of built fixtures.
//!
//! A [`Store`] resolves a search to a definition, builds it at most once and
//! remembers a [`Reference`] to the result. On every later access the value is
//! loaded back through the [`Locator`], so a reference can outlive the process
//! that built it.
//!
//! # Cache rules
//!
//! - A reference is stale once it is older than the TTL or its locator key is no
//!   longer recognized. Stale references are rebuilt.
//! - While a fixture builds its slot holds a holder reference. Reaching a holder
//!   again means the dependency graph has a cycle.
//! - Fixtures sharing an isolation key are built together the first time any of
//!   them is requested.

mod clock;
mod reference;

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use globset::GlobBuilder;
use serde_json::Value as Json;
use tracing::{debug, info, trace};

use crate::definition::{Definition, DefinitionExecutor};
use crate::error::{Error, Result};
use crate::hooks::Hooks;
use crate::locator::Locator;
use crate::path;
use crate::schema::{Schema, SchemaNode};
use crate::value::Value;

pub use clock::{Clock, ManualClock, SystemClock};
pub use reference::{HOLDER_KEY, Reference, StoredReference};

/// Metadata key recording a fixture's isolation group.
pub const ISOLATION_KEY: &str = "isolation_key";

/// The per-run fixture cache.
///
/// A store is meant to be owned by one thread. Builds re-enter the store through
/// `&self`, so its state lives in `RefCell`s.
pub struct Store {
  schema: Schema,
  locator: Locator,
  hooks: Hooks,
  ttl: Option<u64>,
  strict_dependencies: bool,
  clock: Arc<dyn Clock>,
  references: RefCell<BTreeMap<String, Reference>>,
  loaded_isolation_keys: RefCell<BTreeSet<String>>,
  current: RefCell<Schema>,
}

impl Store {
  pub fn new(schema: Schema) -> Self {
    Self {
      current: RefCell::new(schema.clone()),
      schema,
      locator: Locator::default(),
      hooks: Hooks::default(),
      ttl: None,
      strict_dependencies: true,
      clock: Arc::new(SystemClock),
      references: RefCell::new(BTreeMap::new()),
      loaded_isolation_keys: RefCell::new(BTreeSet::new()),
    }
  }

  pub fn with_locator(mut self, locator: Locator) -> Self {
    self.locator = locator;
    self
  }

  /// Maximum reference age in seconds.
  pub fn with_ttl(mut self, ttl: Option<u64>) -> Self {
    self.ttl = ttl;
    self
  }

  /// When false, builds may read undeclared dependencies by search.
  pub fn with_strict_dependencies(mut self, strict: bool) -> Self {
    self.strict_dependencies = strict;
    self
  }

  pub fn with_hooks(mut self, hooks: Hooks) -> Self {
    self.hooks = hooks;
    self
  }

  pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
    self.clock = Arc::new(clock);
    self
  }

  /// Seed the cache, e.g. from a state file. Holder references are dropped.
  pub fn with_references(self, references: impl IntoIterator<Item = Reference>) -> Self {
    {
      let mut current = self.references.borrow_mut();
      for reference in references.into_iter().filter(Reference::is_real) {
        current.insert(reference.name().to_string(), reference);
      }
    }
    self
  }

  /// The schema this store was created for.
  pub fn schema(&self) -> &Schema {
    &self.schema
  }

  pub fn locator(&self) -> &Locator {
    &self.locator
  }

  pub fn hooks(&self) -> &Hooks {
    &self.hooks
  }

  pub fn ttl(&self) -> Option<u64> {
    self.ttl
  }

  pub fn strict_dependencies(&self) -> bool {
    self.strict_dependencies
  }

  /// The namespace searches are currently resolved from.
  pub fn current_namespace(&self) -> Schema {
    self.current.borrow().clone()
  }

  /// Snapshot of every reference, holders included.
  pub fn references(&self) -> BTreeMap<String, Reference> {
    self.references.borrow().clone()
  }

  pub fn reference(&self, pathname: &str) -> Option<Reference> {
    self.references.borrow().get(pathname).cloned()
  }

  /// Whether the fixture found by `search` has a built reference.
  pub fn loaded(&self, search: &str) -> Result<bool> {
    let definition = self.current_namespace().get_definition(search)?;
    let loaded = self
      .reference(definition.pathname())
      .is_some_and(|reference| reference.is_real());
    trace!(pathname = %definition.pathname(), loaded, "probing fixture");
    Ok(loaded)
  }

  /// Fetch a fixture, building it and its dependencies when needed.
  pub fn get(&self, search: &str) -> Result<Value> {
    let namespace = self.current_namespace();
    debug!(search, namespace = %namespace.pathname(), "getting fixture");

    let definition = namespace.get_definition(search)?;
    let pathname = definition.pathname().to_string();
    let isolation_key = definition.isolation_key();

    self.load_isolation_group(&isolation_key, &pathname)?;

    if let Some(reference) = self.reference(&pathname) {
      if reference.is_holder() {
        return Err(Error::CircularDependency(pathname));
      }

      if self.is_stale(&reference) {
        debug!(pathname = %pathname, "refreshing stale fixture");
        self.clear_reference(&pathname);
      } else {
        trace!(pathname = %pathname, "cache hit");
        match self.locator.load(reference.locator_key())? {
          Some(value) => return Ok(value),
          None => {
            debug!(pathname = %pathname, "fixture no longer locatable");
            self.clear_reference(&pathname);
          }
        }
      }
    }

    self.build(&definition, &isolation_key)
  }

  fn build(&self, definition: &Definition, isolation_key: &str) -> Result<Value> {
    let pathname = definition.pathname();
    self
      .references
      .borrow_mut()
      .insert(pathname.to_string(), Reference::holder(pathname));
    let holder = ReleaseHolder {
      references: &self.references,
      pathname,
    };

    let mut executor = DefinitionExecutor::new(self, definition.clone());
    let (value, key) = executor.call().and_then(|value| {
      let key = self.locator.dump(&value, Some(pathname))?;
      Ok((value, key))
    })?;

    let mut metadata = executor.execution().metadata();
    if isolation_key != pathname {
      metadata.insert(ISOLATION_KEY.to_string(), Json::from(isolation_key));
    }

    debug!(pathname, locator_key = %key, "storing fixture");
    let reference = Reference::new(pathname, key, self.clock.now()).with_metadata(metadata);
    self.references.borrow_mut().insert(pathname.to_string(), reference);
    holder.disarm();
    Ok(value)
  }

  /// Build every other fixture of an isolation group the first time the group is seen.
  fn load_isolation_group(&self, isolation_key: &str, requested: &str) -> Result<()> {
    if !self.loaded_isolation_keys.borrow_mut().insert(isolation_key.to_string()) {
      return Ok(());
    }

    let members: Vec<Definition> = self
      .schema
      .root()
      .definitions()
      .into_iter()
      .filter(|dfn| dfn.pathname() != requested && dfn.isolation_key() == isolation_key)
      .collect();
    if members.is_empty() {
      return Ok(());
    }

    debug!(isolation_key, members = members.len(), "loading isolation group");
    let trigger = ReleaseIsolationKey {
      keys: &self.loaded_isolation_keys,
      isolation_key,
    };
    for member in members {
      if self.references.borrow().contains_key(member.pathname()) {
        continue;
      }
      self.get(member.pathname())?;
    }
    trigger.disarm();
    Ok(())
  }

  fn is_stale(&self, reference: &Reference) -> bool {
    if let Some(ttl) = self.ttl
      && reference.created_at() < self.clock.now().saturating_sub(ttl)
    {
      return true;
    }
    !self.locator.recognizable_key(reference.locator_key())
  }

  fn clear_reference(&self, pathname: &str) {
    let removed = self.references.borrow_mut().remove(pathname);
    if let Some(reference) = removed {
      self.forget(&reference);
    }
  }

  /// Let the locator drop what it kept alive for a real reference.
  fn forget(&self, reference: &Reference) {
    if reference.is_real() {
      self.locator.forget(reference.locator_key());
    }
  }

  /// Drop references that expired or are no longer recognizable. Returns how many.
  pub fn clear_stale_references(&self) -> usize {
    let stale: Vec<String> = self
      .references
      .borrow()
      .iter()
      .filter(|(_, reference)| reference.is_real() && self.is_stale(reference))
      .map(|(pathname, _)| pathname.clone())
      .collect();

    for pathname in &stale {
      debug!(pathname = %pathname, "expiring fixture");
      self.clear_reference(pathname);
    }
    stale.len()
  }

  /// Build every fixture under the store's schema.
  pub fn load_all(&self) -> Result<()> {
    self.load_namespace(&self.schema)
  }

  /// Build every fixture under `namespace`, depth first.
  pub fn load_namespace(&self, namespace: &Schema) -> Result<()> {
    info!(namespace = %namespace.pathname(), "loading all fixtures");
    for child in namespace.children() {
      match child {
        SchemaNode::Definition(definition) => {
          self.get(definition.pathname())?;
        }
        SchemaNode::Namespace(nested) => self.load_namespace(&nested)?,
      }
    }
    Ok(())
  }

  /// Run `f` with searches resolved from `namespace`, restoring the previous
  /// namespace afterwards even when `f` fails or panics.
  pub fn with_relative_schema<T>(&self, namespace: Schema, f: impl FnOnce() -> T) -> T {
    let prior = self.current.replace(namespace);
    let _restore = RestoreNamespace {
      current: &self.current,
      prior: Some(prior),
    };
    f()
  }

  /// Forget every reference and isolation group.
  pub fn reset(&self) {
    let references = std::mem::take(&mut *self.references.borrow_mut());
    info!(references = references.len(), "resetting store");
    for reference in references.values() {
      self.forget(reference);
    }
    self.loaded_isolation_keys.borrow_mut().clear();
  }

  /// Evict references whose pathname matches a glob pattern. Returns how many.
  ///
  /// Relative patterns are anchored at the schema root. `*` also matches `/`,
  /// so `countries/*` evicts everything below `/countries`, nested namespaces
  /// included. Fixtures that are mid-build are kept. Isolation groups of
  /// evicted fixtures load together again on next access.
  pub fn clear_cache(&self, pattern: &str) -> Result<usize> {
    let anchored = if pattern.starts_with(path::SEPARATOR) {
      pattern.to_string()
    } else {
      path::join(self.schema.root().pathname(), pattern)
    };
    let matcher = GlobBuilder::new(&anchored)
      .build()
      .map_err(|err| Error::InvalidArgument(format!("invalid cache pattern `{pattern}`: {err}")))?
      .compile_matcher();

    let evicted: Vec<String> = self
      .references
      .borrow()
      .iter()
      .filter(|(pathname, reference)| reference.is_real() && matcher.is_match(pathname.as_str()))
      .map(|(pathname, _)| pathname.clone())
      .collect();

    let root = self.schema.root();
    for pathname in &evicted {
      self.clear_reference(pathname);
      if let Some(SchemaNode::Definition(definition)) = root.get(pathname) {
        self.loaded_isolation_keys.borrow_mut().remove(&definition.isolation_key());
      }
    }

    debug!(pattern, evicted = evicted.len(), "cleared cache");
    Ok(evicted.len())
  }
}

/// Removes the holder claimed by a build unless the build stored its reference.
/// Runs on error returns and on unwinding panics alike.
struct ReleaseHolder<'a> {
  references: &'a RefCell<BTreeMap<String, Reference>>,
  pathname: &'a str,
}

impl ReleaseHolder<'_> {
  fn disarm(self) {
    std::mem::forget(self);
  }
}

impl Drop for ReleaseHolder<'_> {
  fn drop(&mut self) {
    if let Ok(mut references) = self.references.try_borrow_mut()
      && references.get(self.pathname).is_some_and(Reference::is_holder)
    {
      references.remove(self.pathname);
    }
  }
}

/// Un-triggers an isolation group whose preload did not finish.
struct ReleaseIsolationKey<'a> {
  keys: &'a RefCell<BTreeSet<String>>,
  isolation_key: &'a str,
}

impl ReleaseIsolationKey<'_> {
  fn disarm(self) {
    std::mem::forget(self);
  }
}

impl Drop for ReleaseIsolationKey<'_> {
  fn drop(&mut self) {
    if let Ok(mut keys) = self.keys.try_borrow_mut() {
      keys.remove(self.isolation_key);
    }
  }
}

struct RestoreNamespace<'a> {
  current: &'a RefCell<Schema>,
  prior: Option<Schema>,
}

impl Drop for RestoreNamespace<'_> {
  fn drop(&mut self) {
    if let Some(prior) = self.prior.take() {
      self.current.replace(prior);
    }
  }
}

impl fmt::Debug for Store {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut out = f.debug_struct("Store");
    out.field("schema", &self.schema);
    if let Some(ttl) = self.ttl {
      out.field("ttl", &ttl);
    }
    out.field("references", &self.references.borrow().len()).finish()
  }
}
