//! The fixture namespace tree.
//!
//! A [`Schema`] is a namespace node: it owns child namespaces and fixture
//! [`Definition`](crate::Definition)s keyed by name. Every node has a unique
//! absolute pathname computed from its ancestors (`/countries/towns/town`).
//!
//! Nodes are looked up with path searches relative to a namespace, see
//! [`crate::path`] for the candidate rules.

mod dependency;
mod namespace;
mod node;
mod options;

pub(crate) use node::NodeMeta;

pub use dependency::{Dependency, DependencyDecl};
pub use namespace::Schema;
pub use node::SchemaNode;
pub use options::{FixtureOptions, ISOLATE, Options};
