//! fixtury: lazily-built, cached test fixtures organized in a namespace tree.
//!
//! This crate provides the pieces a test suite needs to declare fixtures once
//! and build them on demand:
//! - `Schema`: the namespace tree holding fixture `Definition`s
//! - `Store`: resolves fixtures by path, builds them once, and caches them
//! - `Locator`: translates built values to serializable keys and back
//! - `Fixtury`: an explicit context tying configuration, schema and stores together
//!
//! # Example
//!
//! ```
//! use fixtury::{Schema, Store, Value};
//!
//! let schema = Schema::new();
//! schema
//!   .define(|s| {
//!     s.fixture("earth", || Ok(Value::new("Earth".to_string())))?;
//!     s.namespace("countries", |ns| {
//!       ns.fixture_with("country", fixtury::FixtureOptions::new().dep("/earth"), |deps| {
//!         let earth = deps.get_as::<String>("earth")?;
//!         Ok(Value::new(format!("Country on {earth}")))
//!       })?;
//!       Ok(())
//!     })?;
//!     Ok(())
//!   })
//!   .unwrap();
//!
//! let store = Store::new(schema);
//! let country = store.get("countries/country").unwrap();
//! assert_eq!(country.downcast_ref::<String>().unwrap(), "Country on Earth");
//! ```

pub mod config;
pub mod context;
pub mod definition;
pub mod error;
pub mod hooks;
pub mod locator;
pub mod path;
pub mod schema;
pub mod state;
pub mod store;
pub mod util;
pub mod value;

pub use config::Config;
pub use context::Fixtury;
pub use definition::{Callable, Definition, DefinitionExecutor, DependencyStore, ExecutorState};
pub use error::{Error, Result};
pub use hooks::{Execution, Hooks, Trigger};
pub use locator::{GlobalId, GlobalIdBackend, Locator, LocatorBackend, LocatorKey, MemoryBackend};
pub use schema::{Dependency, DependencyDecl, FixtureOptions, Options, Schema, SchemaNode};
pub use state::StateFile;
pub use store::{Clock, ManualClock, Reference, Store, StoredReference, SystemClock};
pub use value::Value;
