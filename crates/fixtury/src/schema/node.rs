use std::sync::{RwLock, Weak};

use serde_json::Value as Json;

use crate::definition::Definition;
use crate::error::{Error, Result};
use crate::path;
use crate::util::sync::{read, write};

use super::namespace::{NamespaceInner, Schema};
use super::options::{ISOLATE, Options};

/// A node in the schema tree: a traversable namespace or a buildable fixture.
#[derive(Clone, Debug)]
pub enum SchemaNode {
  Namespace(Schema),
  Definition(Definition),
}

impl SchemaNode {
  pub fn name(&self) -> &str {
    &self.meta().name
  }

  pub fn pathname(&self) -> &str {
    &self.meta().pathname
  }

  pub fn options(&self) -> Options {
    self.meta().options()
  }

  pub fn parent(&self) -> Option<Schema> {
    self.meta().parent()
  }

  /// `"schema"` for a root, `"namespace"` for nested namespaces, `"definition"` for fixtures.
  pub fn schema_node_type(&self) -> &'static str {
    match self {
      SchemaNode::Namespace(ns) => ns.schema_node_type(),
      SchemaNode::Definition(_) => "definition",
    }
  }

  /// Isolation key with the node's own pathname as fallback.
  pub fn isolation_key(&self) -> Option<String> {
    self.meta().isolation_key(true)
  }

  pub fn as_namespace(&self) -> Option<&Schema> {
    match self {
      SchemaNode::Namespace(ns) => Some(ns),
      SchemaNode::Definition(_) => None,
    }
  }

  pub fn as_definition(&self) -> Option<&Definition> {
    match self {
      SchemaNode::Definition(dfn) => Some(dfn),
      SchemaNode::Namespace(_) => None,
    }
  }

  pub fn into_definition(self) -> Result<Definition> {
    match self {
      SchemaNode::Definition(dfn) => Ok(dfn),
      SchemaNode::Namespace(ns) => Err(Error::NotADefinition(ns.pathname().to_string())),
    }
  }

  /// Indented, human-readable dump of this node and everything below it.
  pub fn structure(&self) -> String {
    let mut out = String::new();
    self.write_structure("", &mut out);
    out
  }

  pub(crate) fn write_structure(&self, prefix: &str, out: &mut String) {
    if !out.is_empty() {
      out.push('\n');
    }
    out.push_str(&self.meta().structure_line(prefix, self.schema_node_type()));

    if let SchemaNode::Namespace(ns) = self {
      let nested = format!("{prefix}  ");
      for child in ns.children() {
        child.write_structure(&nested, out);
      }
    }
  }

  pub(crate) fn meta(&self) -> &NodeMeta {
    match self {
      SchemaNode::Namespace(ns) => ns.meta(),
      SchemaNode::Definition(dfn) => dfn.meta(),
    }
  }

  pub(crate) fn ptr_eq(&self, other: &SchemaNode) -> bool {
    match (self, other) {
      (SchemaNode::Namespace(a), SchemaNode::Namespace(b)) => a.ptr_eq(b),
      (SchemaNode::Definition(a), SchemaNode::Definition(b)) => a.ptr_eq(b),
      _ => false,
    }
  }
}

impl From<Schema> for SchemaNode {
  fn from(ns: Schema) -> Self {
    SchemaNode::Namespace(ns)
  }
}

impl From<Definition> for SchemaNode {
  fn from(dfn: Definition) -> Self {
    SchemaNode::Definition(dfn)
  }
}

/// Identity shared by both node kinds.
pub(crate) struct NodeMeta {
  pub(crate) name: String,
  pub(crate) pathname: String,
  parent: Option<Weak<NamespaceInner>>,
  options: RwLock<Options>,
}

impl NodeMeta {
  pub(crate) fn root(name: &str) -> Result<Self> {
    validate_name(name, true)?;
    Ok(Self::root_unchecked(name))
  }

  pub(crate) fn root_unchecked(name: &str) -> Self {
    Self {
      name: name.to_string(),
      pathname: path::child_pathname("/", name),
      parent: None,
      options: RwLock::new(Options::new()),
    }
  }

  pub(crate) fn child(parent: &Schema, name: &str) -> Result<Self> {
    validate_name(name, false)?;
    Ok(Self {
      name: name.to_string(),
      pathname: path::child_pathname(parent.pathname(), name),
      parent: Some(parent.downgrade()),
      options: RwLock::new(Options::new()),
    })
  }

  pub(crate) fn parent(&self) -> Option<Schema> {
    self.parent.as_ref().and_then(Schema::upgrade)
  }

  pub(crate) fn is_root(&self) -> bool {
    self.parent.is_none()
  }

  pub(crate) fn options(&self) -> Options {
    read(&self.options).clone()
  }

  pub(crate) fn apply_options(&self, options: &Options) -> Result<()> {
    write(&self.options).apply(&self.name, options)
  }

  /// Determines the isolation key top-down: an ancestor's key wins, then this
  /// node's own `isolate` option, then (when `default_to_pathname`) the pathname.
  pub(crate) fn isolation_key(&self, default_to_pathname: bool) -> Option<String> {
    if let Some(parent) = self.parent()
      && let Some(key) = parent.meta().isolation_key(false)
    {
      return Some(key);
    }

    let key = match read(&self.options).get(ISOLATE) {
      Some(Json::Bool(true)) => Some(self.pathname.clone()),
      Some(Json::String(key)) => Some(key.clone()),
      Some(Json::Bool(false)) | Some(Json::Null) | None => default_to_pathname.then(|| self.pathname.clone()),
      Some(other) => Some(other.to_string()),
    };

    key.filter(|k| !k.is_empty() && k != "/")
  }

  /// `type:name[isolation_key](key: value, ...)`
  fn structure_line(&self, prefix: &str, node_type: &str) -> String {
    let mut line = format!("{prefix}{node_type}:{}", self.name);

    if let Some(key) = self.isolation_key(false) {
      line.push_str(&format!("[{key}]"));
    }

    let options = read(&self.options);
    let shown: Vec<String> = options
      .iter()
      .filter(|(key, value)| key.as_str() != ISOLATE && !value.is_null())
      .map(|(key, value)| format!("{key}: {value}"))
      .collect();
    if !shown.is_empty() {
      line.push_str(&format!("({})", shown.join(", ")));
    }

    line
  }
}

/// Node names are limited to ASCII letters, digits and underscores.
///
/// Only a root may be unnamed.
pub(crate) fn validate_name(name: &str, allow_empty: bool) -> Result<()> {
  let valid = name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
  if !valid || (name.is_empty() && !allow_empty) {
    return Err(Error::InvalidNodeName(name.to_string()));
  }
  Ok(())
}
