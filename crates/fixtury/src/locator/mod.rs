//! Translation between built values and serializable keys.
//!
//! The store never keeps built values itself; it keeps a [`LocatorKey`] and asks
//! the [`Locator`] to load the value again on every access. Backends decide what a
//! key looks like:
//!
//! - [`MemoryBackend`]: object identity inside the current process
//! - [`GlobalIdBackend`]: `gid://app/Model/id` identifiers that survive a restart
//!
//! Lists and maps of values are handled structurally, so a fixture can be a
//! collection of locatable objects.

mod global_id;
mod memory;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::Value;

pub use global_id::{GlobalId, GlobalIdBackend};
pub use memory::MemoryBackend;

/// Serializable handle to a built value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocatorKey {
  Id(String),
  List(Vec<LocatorKey>),
  Map(BTreeMap<String, LocatorKey>),
}

impl LocatorKey {
  pub fn id(key: impl Into<String>) -> Self {
    LocatorKey::Id(key.into())
  }

  pub fn as_id(&self) -> Option<&str> {
    match self {
      LocatorKey::Id(id) => Some(id),
      _ => None,
    }
  }
}

impl fmt::Display for LocatorKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match serde_json::to_string(self) {
      Ok(json) => f.write_str(&json),
      Err(_) => write!(f, "{self:?}"),
    }
  }
}

impl From<&str> for LocatorKey {
  fn from(key: &str) -> Self {
    LocatorKey::Id(key.to_string())
  }
}

impl From<String> for LocatorKey {
  fn from(key: String) -> Self {
    LocatorKey::Id(key)
  }
}

/// A storage strategy for fixture values.
///
/// Implementors handle single values; the provided `load` and `dump` recurse
/// into lists and maps before giving up with [`Error::UnrecognizableLocator`].
pub trait LocatorBackend: Send + Sync {
  /// Whether `key` is a single key this backend produced.
  fn recognizable_key(&self, key: &LocatorKey) -> bool;

  /// Whether `value` can be dumped as a single key.
  fn recognizable_value(&self, value: &Value) -> bool;

  /// Load one value. `Ok(None)` means the value no longer exists.
  fn load_reference(&self, key: &LocatorKey) -> Result<Option<Value>>;

  fn dump_value(&self, value: &Value) -> Result<LocatorKey>;

  /// Load a key, recursing into lists and maps.
  ///
  /// A collection loads as `None` when any of its members is gone.
  fn load(&self, key: &LocatorKey) -> Result<Option<Value>> {
    if self.recognizable_key(key) {
      return self.load_reference(key);
    }

    match key {
      LocatorKey::List(keys) => {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
          match self.load(key)? {
            Some(value) => values.push(value),
            None => return Ok(None),
          }
        }
        Ok(Some(Value::List(values)))
      }
      LocatorKey::Map(keys) => {
        let mut values = BTreeMap::new();
        for (name, key) in keys {
          match self.load(key)? {
            Some(value) => {
              values.insert(name.clone(), value);
            }
            None => return Ok(None),
          }
        }
        Ok(Some(Value::Map(values)))
      }
      LocatorKey::Id(_) => Err(Error::UnrecognizableLocator {
        action: "load",
        thing: key.to_string(),
      }),
    }
  }

  /// Dump a value, recursing into lists and maps.
  fn dump(&self, value: &Value) -> Result<LocatorKey> {
    if self.recognizable_value(value) {
      return self.dump_value(value);
    }

    match value {
      Value::List(values) => values
        .iter()
        .map(|value| self.dump(value))
        .collect::<Result<Vec<_>>>()
        .map(LocatorKey::List),
      Value::Map(values) => values
        .iter()
        .map(|(name, value)| -> Result<(String, LocatorKey)> { Ok((name.clone(), self.dump(value)?)) })
        .collect::<Result<BTreeMap<_, _>>>()
        .map(LocatorKey::Map),
      other => Err(Error::UnrecognizableLocator {
        action: "dump",
        thing: other.kind(),
      }),
    }
  }

  /// Whether every leaf of `key` is recognizable.
  fn recognizes(&self, key: &LocatorKey) -> bool {
    if self.recognizable_key(key) {
      return true;
    }
    match key {
      LocatorKey::List(keys) => keys.iter().all(|key| self.recognizes(key)),
      LocatorKey::Map(keys) => keys.values().all(|key| self.recognizes(key)),
      LocatorKey::Id(_) => false,
    }
  }

  /// Let go of anything kept alive for a single key. Returns whether anything was held.
  fn forget_reference(&self, _key: &LocatorKey) -> bool {
    false
  }

  /// Forget a key that is no longer referenced, recursing into lists and maps.
  fn forget(&self, key: &LocatorKey) {
    if self.recognizable_key(key) {
      self.forget_reference(key);
      return;
    }
    match key {
      LocatorKey::List(keys) => keys.iter().for_each(|key| self.forget(key)),
      LocatorKey::Map(keys) => keys.values().for_each(|key| self.forget(key)),
      LocatorKey::Id(_) => {}
    }
  }
}

/// Validating front for a [`LocatorBackend`].
#[derive(Clone)]
pub struct Locator {
  backend: Arc<dyn LocatorBackend>,
}

impl Locator {
  pub fn new<B: LocatorBackend + 'static>(backend: B) -> Self {
    Self {
      backend: Arc::new(backend),
    }
  }

  pub fn from_arc(backend: Arc<dyn LocatorBackend>) -> Self {
    Self { backend }
  }

  /// In-process locator backed by a fresh [`MemoryBackend`].
  pub fn memory() -> Self {
    Self::new(MemoryBackend::new())
  }

  pub fn backend(&self) -> &Arc<dyn LocatorBackend> {
    &self.backend
  }

  pub fn load(&self, key: &LocatorKey) -> Result<Option<Value>> {
    if is_blank(key) {
      return Err(Error::InvalidArgument("unable to load a blank locator key".to_string()));
    }
    self.backend.load(key)
  }

  /// Dump `value`; `context` names the fixture in error messages.
  pub fn dump(&self, value: &Value, context: Option<&str>) -> Result<LocatorKey> {
    let suffix = context.map(|c| format!(" for {c}")).unwrap_or_default();

    if value.is_nil() {
      return Err(Error::InvalidArgument(format!("unable to dump a nil value{suffix}")));
    }

    let key = self.backend.dump(value)?;
    if is_blank(&key) {
      return Err(Error::InvalidArgument(format!("the value resulted in a blank locator key{suffix}")));
    }
    Ok(key)
  }

  pub fn recognizable_key(&self, key: &LocatorKey) -> bool {
    self.backend.recognizes(key)
  }

  /// Tell the backend a stored key was dropped.
  pub fn forget(&self, key: &LocatorKey) {
    if !is_blank(key) {
      self.backend.forget(key);
    }
  }
}

impl Default for Locator {
  fn default() -> Self {
    Self::memory()
  }
}

impl fmt::Debug for Locator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Locator").finish_non_exhaustive()
  }
}

fn is_blank(key: &LocatorKey) -> bool {
  matches!(key, LocatorKey::Id(id) if id.trim().is_empty())
}
