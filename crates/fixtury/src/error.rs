//! Error types for fixture definition, resolution and building.

use thiserror::Error;

use crate::state::StateError;

/// Errors raised by the schema, store, locator and executor.
///
/// Build callables return `anyhow::Result`. When a callable fails with one of
/// these variants it reaches the caller unchanged; anything else is wrapped in
/// [`Error::DefinitionExecution`].
#[derive(Debug, Error)]
pub enum Error {
  /// A namespace or fixture already occupies this path.
  #[error("an element identified by `{0}` already exists")]
  AlreadyDefined(String),

  /// A search did not resolve to any schema node.
  #[error("a schema node identified by `{search}` could not be found from `{from}`")]
  NotDefined { search: String, from: String },

  /// A search resolved to a namespace where a fixture was required.
  #[error("`{0}` must refer to a fixture definition")]
  NotADefinition(String),

  /// A build re-entered a fixture that is already being built.
  #[error("one of the dependencies of `{0}` is dependent on `{0}`")]
  CircularDependency(String),

  /// An option was re-applied to a node with a different value.
  #[error("the `{node}` schema `{key}` option value of {old} conflicts with the new value {new}")]
  OptionCollision {
    node: String,
    key: String,
    old: serde_json::Value,
    new: serde_json::Value,
  },

  /// Node names may only contain ASCII letters, digits and underscores.
  #[error("`{0}` is an invalid node name")]
  InvalidNodeName(String),

  /// The schema was frozen and can no longer be changed.
  #[error("schema is frozen: new namespaces, definitions, and enhancements are not allowed")]
  SchemaFrozen,

  /// A build asked for a dependency that its definition did not declare.
  #[error("`{pathname}` does not contain the provided dependency: {accessor}")]
  UnknownDependency { pathname: String, accessor: String },

  /// A dependency value was not of the requested type.
  #[error("dependency `{accessor}` is a {actual}, not a {expected}")]
  TypeMismatch {
    accessor: String,
    expected: &'static str,
    actual: String,
  },

  /// The locator backend could not handle a value or key shape.
  #[error("locator did not recognize {thing} during {action}")]
  UnrecognizableLocator { action: &'static str, thing: String },

  /// A locator backend failed while looking a value up.
  #[error("failed to locate `{key}`: {source}")]
  Locate {
    key: String,
    #[source]
    source: anyhow::Error,
  },

  /// A locator contract was violated (nil values, empty keys).
  #[error("{0}")]
  InvalidArgument(String),

  /// User build code failed.
  #[error("error while building `{pathname}`: {source}")]
  DefinitionExecution {
    pathname: String,
    #[source]
    source: anyhow::Error,
  },

  /// A definition executor was invoked more than once.
  #[error("executor for `{0}` has already run")]
  ExecutorReused(String),

  /// Reading or writing the persisted state failed.
  #[error(transparent)]
  State(#[from] StateError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  /// Recovers a crate error from a build failure, wrapping foreign errors.
  pub(crate) fn from_build_failure(pathname: &str, err: anyhow::Error) -> Self {
    match err.downcast::<Error>() {
      Ok(ours) => ours,
      Err(source) => Error::DefinitionExecution {
        pathname: pathname.to_string(),
        source,
      },
    }
  }
}
