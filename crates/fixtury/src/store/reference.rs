use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::locator::LocatorKey;

/// Locator key marking a fixture whose build is in progress.
pub const HOLDER_KEY: &str = "__BUILDING_FIXTURE__";

/// What the store remembers about a built fixture.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
  name: String,
  locator_key: LocatorKey,
  created_at: u64,
  metadata: BTreeMap<String, Json>,
}

impl Reference {
  pub fn new(name: impl Into<String>, locator_key: LocatorKey, created_at: u64) -> Self {
    Self {
      name: name.into(),
      locator_key,
      created_at,
      metadata: BTreeMap::new(),
    }
  }

  /// Placeholder claiming `name` while it builds.
  pub fn holder(name: impl Into<String>) -> Self {
    Self::new(name, LocatorKey::id(HOLDER_KEY), 0)
  }

  pub fn with_metadata(mut self, metadata: BTreeMap<String, Json>) -> Self {
    self.metadata.extend(metadata);
    self
  }

  /// Pathname of the fixture.
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn locator_key(&self) -> &LocatorKey {
    &self.locator_key
  }

  pub fn created_at(&self) -> u64 {
    self.created_at
  }

  pub fn metadata(&self) -> &BTreeMap<String, Json> {
    &self.metadata
  }

  pub fn is_holder(&self) -> bool {
    self.locator_key.as_id() == Some(HOLDER_KEY)
  }

  pub fn is_real(&self) -> bool {
    !self.is_holder()
  }

  pub fn to_stored(&self) -> StoredReference {
    StoredReference {
      locator_key: self.locator_key.clone(),
      created_at: self.created_at,
      metadata: self.metadata.clone(),
    }
  }

  pub fn from_stored(name: impl Into<String>, stored: StoredReference) -> Self {
    Self {
      name: name.into(),
      locator_key: stored.locator_key,
      created_at: stored.created_at,
      metadata: stored.metadata,
    }
  }
}

/// Serialized form of a [`Reference`], keyed by pathname in the state file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReference {
  pub locator_key: LocatorKey,
  pub created_at: u64,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub metadata: BTreeMap<String, Json>,
}
