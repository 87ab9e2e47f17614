use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

use tracing::debug;

use crate::definition::{Callable, Definition, DependencyStore};
use crate::error::{Error, Result};
use crate::path;
use crate::util::sync::{read, write};
use crate::value::Value;

use super::dependency::DependencyDecl;
use super::node::{NodeMeta, SchemaNode};
use super::options::{FixtureOptions, Options};

/// A namespace in the fixture tree. The root namespace is the schema itself.
///
/// `Schema` is a cheap handle; clones refer to the same node.
#[derive(Clone)]
pub struct Schema {
  inner: Arc<NamespaceInner>,
}

pub(crate) struct NamespaceInner {
  meta: NodeMeta,
  children: RwLock<BTreeMap<String, SchemaNode>>,
  // Only consulted on the root.
  frozen: AtomicBool,
}

impl Schema {
  /// A new, unnamed root schema with pathname `/`.
  pub fn new() -> Self {
    Self::from_meta(NodeMeta::root_unchecked(""))
  }

  /// A named root schema, e.g. `test` with pathname `/test`.
  pub fn named(name: &str) -> Result<Self> {
    Ok(Self::from_meta(NodeMeta::root(name)?))
  }

  fn from_meta(meta: NodeMeta) -> Self {
    Self {
      inner: Arc::new(NamespaceInner {
        meta,
        children: RwLock::new(BTreeMap::new()),
        frozen: AtomicBool::new(false),
      }),
    }
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

  pub fn parent(&self) -> Option<Schema> {
    self.inner.meta.parent()
  }

  pub fn is_root(&self) -> bool {
    self.inner.meta.is_root()
  }

  /// The top of the tree this namespace belongs to.
  pub fn root(&self) -> Schema {
    let mut current = self.clone();
    while let Some(parent) = current.parent() {
      current = parent;
    }
    current
  }

  pub fn schema_node_type(&self) -> &'static str {
    if self.is_root() { "schema" } else { "namespace" }
  }

  /// Isolation key inherited from the nearest isolating ancestor, or set on this namespace.
  pub fn isolation_key(&self) -> Option<String> {
    self.inner.meta.isolation_key(false)
  }

  /// Apply options, raising on any conflicting re-application.
  pub fn apply_options(&self, options: &Options) -> Result<()> {
    self.inner.meta.apply_options(options)
  }

  /// Direct children ordered by name.
  pub fn children(&self) -> Vec<SchemaNode> {
    read(&self.inner.children).values().cloned().collect()
  }

  pub fn child(&self, name: &str) -> Option<SchemaNode> {
    read(&self.inner.children).get(name).cloned()
  }

  /// Every definition below this namespace, depth first.
  pub fn definitions(&self) -> Vec<Definition> {
    let mut out = Vec::new();
    self.collect_definitions(&mut out);
    out
  }

  fn collect_definitions(&self, out: &mut Vec<Definition>) {
    for child in self.children() {
      match child {
        SchemaNode::Definition(dfn) => out.push(dfn),
        SchemaNode::Namespace(ns) => ns.collect_definitions(out),
      }
    }
  }

  /// Open this namespace for child definitions.
  pub fn define<F>(&self, block: F) -> Result<&Self>
  where
    F: FnOnce(&Schema) -> Result<()>,
  {
    block(self)?;
    Ok(self)
  }

  /// Find or create the child namespace `name` and define content inside it.
  ///
  /// Reopening an existing namespace is allowed; a fixture at that name is an
  /// [`Error::AlreadyDefined`].
  pub fn namespace<F>(&self, name: &str, block: F) -> Result<Schema>
  where
    F: FnOnce(&Schema) -> Result<()>,
  {
    self.namespace_with(name, Options::new(), block)
  }

  /// Like [`Schema::namespace`], applying `options` to the child first.
  pub fn namespace_with<F>(&self, name: &str, options: Options, block: F) -> Result<Schema>
  where
    F: FnOnce(&Schema) -> Result<()>,
  {
    self.ensure_mutable()?;

    let child = {
      let mut children = write(&self.inner.children);
      match children.get(name) {
        Some(SchemaNode::Namespace(existing)) => {
          debug!(pathname = %existing.pathname(), "reopening namespace");
          existing.clone()
        }
        Some(SchemaNode::Definition(existing)) => {
          return Err(Error::AlreadyDefined(existing.pathname().to_string()));
        }
        None => {
          let created = Schema::from_meta(NodeMeta::child(self, name)?);
          children.insert(name.to_string(), SchemaNode::Namespace(created.clone()));
          created
        }
      }
    };

    child.apply_options(&options)?;
    block(&child)?;
    Ok(child)
  }

  /// Define a fixture whose build takes no dependencies.
  pub fn fixture<F>(&self, name: &str, build: F) -> Result<Definition>
  where
    F: Fn() -> anyhow::Result<Value> + Send + Sync + 'static,
  {
    self.define_fixture(name, FixtureOptions::new(), Callable::new(build))
  }

  /// Define a fixture whose build reads its declared dependencies.
  pub fn fixture_with<F>(&self, name: &str, options: FixtureOptions, build: F) -> Result<Definition>
  where
    F: for<'a> Fn(&DependencyStore<'a>) -> anyhow::Result<Value> + Send + Sync + 'static,
  {
    self.define_fixture(name, options, Callable::with_dependencies(build))
  }

  /// Define a fixture from an explicit callable.
  pub fn define_fixture(&self, name: &str, options: FixtureOptions, callable: Callable) -> Result<Definition> {
    self.ensure_mutable()?;

    let mut children = write(&self.inner.children);
    if let Some(existing) = children.get(name) {
      return Err(Error::AlreadyDefined(existing.pathname().to_string()));
    }

    let definition = Definition::build(self, name, options, callable)?;
    children.insert(name.to_string(), SchemaNode::Definition(definition.clone()));
    debug!(pathname = %definition.pathname(), "defined fixture");
    Ok(definition)
  }

  /// Chain a post-processing step onto an existing fixture.
  pub fn enhance<F>(&self, search: &str, enhancement: F) -> Result<()>
  where
    F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
  {
    self.ensure_mutable()?;
    let definition = self.get_definition(search)?;
    definition.push_enhancement(Arc::new(enhancement));
    Ok(())
  }

  /// Resolve `search` relative to this namespace.
  ///
  /// Candidates come from [`path::possible_absolute_paths`]; the first one that
  /// names an existing node wins.
  pub fn get(&self, search: &str) -> Option<SchemaNode> {
    if search.trim().is_empty() {
      return None;
    }

    let root = self.root();
    for candidate in path::possible_absolute_paths(self.pathname(), search) {
      if let Some(node) = root.walk(&candidate) {
        return Some(node);
      }
    }
    None
  }

  /// [`Schema::get`], raising [`Error::NotDefined`] on a miss.
  pub fn get_required(&self, search: &str) -> Result<SchemaNode> {
    self.get(search).ok_or_else(|| Error::NotDefined {
      search: search.to_string(),
      from: self.pathname().to_string(),
    })
  }

  /// Resolve `search` to a fixture definition.
  pub fn get_definition(&self, search: &str) -> Result<Definition> {
    self.get_required(search)?.into_definition()
  }

  /// Walk an absolute path down from this (root) node.
  fn walk(&self, absolute: &str) -> Option<SchemaNode> {
    let mut segments = path::segments(absolute).peekable();
    if !self.name().is_empty() && segments.peek() == Some(&self.name()) {
      segments.next();
    }

    let mut target = SchemaNode::Namespace(self.clone());
    for segment in segments {
      target = match target {
        SchemaNode::Namespace(ns) => ns.child(segment)?,
        SchemaNode::Definition(_) => return None,
      };
    }
    Some(target)
  }

  /// Deep-copy the namespaces, fixtures and enhancements of `other` into self.
  ///
  /// `other` is left untouched. Collisions follow the normal definition rules.
  pub fn merge(&self, other: &Schema) -> Result<()> {
    self.ensure_mutable()?;

    let mut ancestor = Some(self.clone());
    while let Some(ns) = ancestor {
      if ns.ptr_eq(other) {
        return Err(Error::InvalidArgument(format!(
          "cannot merge `{}` into itself or one of its descendants (`{}`)",
          other.pathname(),
          self.pathname()
        )));
      }
      ancestor = ns.parent();
    }

    for child in other.children() {
      match child {
        SchemaNode::Namespace(source) => {
          self.namespace_with(source.name(), source.options(), |target| target.merge(&source))?;
        }
        SchemaNode::Definition(source) => {
          let deps: Vec<DependencyDecl> = source
            .dependencies()
            .values()
            .map(|dep| (dep.accessor().to_string(), dep.search().to_string()).into())
            .collect();
          let options = FixtureOptions {
            options: source.options(),
            deps,
          };
          let copy = self.define_fixture(source.name(), options, source.callable().clone())?;
          for enhancement in source.enhancements() {
            copy.push_enhancement(enhancement);
          }
        }
      }
    }
    Ok(())
  }

  /// Forbid further namespaces, fixtures, enhancements and merges on the whole tree.
  pub fn freeze(&self) {
    self.root().inner.frozen.store(true, Ordering::SeqCst);
  }

  pub fn is_frozen(&self) -> bool {
    self.root().inner.frozen.load(Ordering::SeqCst)
  }

  fn ensure_mutable(&self) -> Result<()> {
    if self.is_frozen() {
      return Err(Error::SchemaFrozen);
    }
    Ok(())
  }

  /// Indented tree dump: `type:name[isolation_key](options)` per line.
  pub fn structure(&self) -> String {
    SchemaNode::Namespace(self.clone()).structure()
  }

  /// Remove every child. Intended for test teardown of a shared schema.
  pub fn reset(&self) -> Result<()> {
    self.ensure_mutable()?;
    write(&self.inner.children).clear();
    Ok(())
  }

  pub fn ptr_eq(&self, other: &Schema) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }

  pub(crate) fn meta(&self) -> &NodeMeta {
    &self.inner.meta
  }

  pub(crate) fn downgrade(&self) -> Weak<NamespaceInner> {
    Arc::downgrade(&self.inner)
  }

  pub(crate) fn upgrade(weak: &Weak<NamespaceInner>) -> Option<Schema> {
    weak.upgrade().map(|inner| Schema { inner })
  }
}

impl Default for Schema {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for Schema {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "Schema(pathname: {:?}, children: {})",
      self.pathname(),
      read(&self.inner.children).len()
    )
  }
}
