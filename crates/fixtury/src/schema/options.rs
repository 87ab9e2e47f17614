use std::collections::BTreeMap;

use serde_json::Value as Json;

use crate::error::{Error, Result};

use super::dependency::DependencyDecl;

/// Option key marking a node as the root of an isolation group.
pub const ISOLATE: &str = "isolate";

/// Options attached to a schema node.
///
/// Options are set-once: re-applying a key with the same value is a no-op, a
/// different value is an [`Error::OptionCollision`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options(BTreeMap<String, Json>);

impl Options {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(mut self, key: impl Into<String>, value: impl Into<Json>) -> Self {
    self.0.insert(key.into(), value.into());
    self
  }

  /// `isolate: true`, the node's own pathname becomes the isolation key.
  pub fn isolate(self) -> Self {
    self.with(ISOLATE, true)
  }

  /// `isolate: "<key>"`, an explicit isolation key shared across namespaces.
  pub fn isolate_as(self, key: impl Into<String>) -> Self {
    self.with(ISOLATE, key.into())
  }

  pub fn get(&self, key: &str) -> Option<&Json> {
    self.0.get(key)
  }

  pub fn contains_key(&self, key: &str) -> bool {
    self.0.contains_key(key)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &Json)> {
    self.0.iter()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Merge `other` into self, refusing to change any key already set.
  ///
  /// Nothing is applied when any key collides.
  pub(crate) fn apply(&mut self, node: &str, other: &Options) -> Result<()> {
    for (key, value) in other.iter() {
      if let Some(existing) = self.0.get(key)
        && existing != value
      {
        return Err(Error::OptionCollision {
          node: node.to_string(),
          key: key.clone(),
          old: existing.clone(),
          new: value.clone(),
        });
      }
    }

    for (key, value) in other.iter() {
      self.0.insert(key.clone(), value.clone());
    }
    Ok(())
  }
}

impl<K: Into<String>, V: Into<Json>> FromIterator<(K, V)> for Options {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
  }
}

/// Options for a fixture definition: node options plus declared dependencies.
#[derive(Debug, Clone, Default)]
pub struct FixtureOptions {
  pub(crate) options: Options,
  pub(crate) deps: Vec<DependencyDecl>,
}

impl FixtureOptions {
  pub fn new() -> Self {
    Self::default()
  }

  /// Declare a dependency by search; the accessor is the last path segment.
  pub fn dep(mut self, search: impl Into<String>) -> Self {
    self.deps.push(DependencyDecl::Search(search.into()));
    self
  }

  /// Declare a dependency under an explicit accessor name.
  pub fn dep_as(mut self, accessor: impl Into<String>, search: impl Into<String>) -> Self {
    self.deps.push(DependencyDecl::Pair {
      accessor: accessor.into(),
      search: search.into(),
    });
    self
  }

  /// Declare dependencies from any supported declaration shape.
  pub fn deps(mut self, decl: impl Into<DependencyDecl>) -> Self {
    self.deps.push(decl.into());
    self
  }

  pub fn option(mut self, key: impl Into<String>, value: impl Into<Json>) -> Self {
    self.options = self.options.with(key, value);
    self
  }

  pub fn isolate(mut self) -> Self {
    self.options = self.options.isolate();
    self
  }

  pub fn isolate_as(mut self, key: impl Into<String>) -> Self {
    self.options = self.options.isolate_as(key);
    self
  }

  pub fn options(&self) -> &Options {
    &self.options
  }
}

impl From<Options> for FixtureOptions {
  fn from(options: Options) -> Self {
    Self {
      options,
      deps: Vec::new(),
    }
  }
}
