//! The explicit fixture context.
//!
//! A [`Fixtury`] ties a [`Config`], the root [`Schema`], a [`Locator`] and the
//! lifecycle [`Hooks`] together. Test harnesses create one at the start of a run,
//! hand out stores from it and persist the results at the end:
//!
//! ```no_run
//! use fixtury::{Config, Fixtury, Value};
//!
//! # fn main() -> fixtury::Result<()> {
//! let fixtury = Fixtury::new(Config::from_env().add_fixture_path("tests/fixtures"));
//! fixtury.define(|s| {
//!   s.fixture("earth", || Ok(Value::new("Earth".to_string())))?;
//!   Ok(())
//! })?;
//!
//! fixtury.start()?;
//! let store = fixtury.store();
//! let earth = store.get("earth")?;
//! # let _ = earth;
//! fixtury.persist(&store)?;
//! # Ok(())
//! # }
//! ```

use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::hooks::Hooks;
use crate::locator::Locator;
use crate::schema::Schema;
use crate::state::{self, StateFile};
use crate::store::{Reference, Store};

pub struct Fixtury {
  config: Config,
  schema: Schema,
  locator: Locator,
  hooks: Hooks,
}

impl Fixtury {
  pub fn new(config: Config) -> Self {
    Self {
      config,
      schema: Schema::new(),
      locator: Locator::default(),
      hooks: Hooks::default(),
    }
  }

  /// Use a different locator, e.g. a [`GlobalIdBackend`](crate::GlobalIdBackend)
  /// so references survive the process.
  pub fn with_locator(mut self, locator: Locator) -> Self {
    self.locator = locator;
    self
  }

  pub fn with_hooks(mut self, hooks: Hooks) -> Self {
    self.hooks = hooks;
    self
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn schema(&self) -> &Schema {
    &self.schema
  }

  pub fn locator(&self) -> &Locator {
    &self.locator
  }

  pub fn hooks_mut(&mut self) -> &mut Hooks {
    &mut self.hooks
  }

  /// Open the root schema for definitions.
  pub fn define<F>(&self, block: F) -> Result<&Schema>
  where
    F: FnOnce(&Schema) -> Result<()>,
  {
    self.schema.define(block)
  }

  /// A new store over the root schema, seeded with the persisted references.
  ///
  /// An unreadable state file is logged and ignored.
  pub fn store(&self) -> Store {
    let references = match self.stored_references() {
      Ok(references) => references,
      Err(err) => {
        warn!(error = %err, "ignoring unreadable state file");
        Vec::new()
      }
    };

    Store::new(self.schema.clone())
      .with_locator(self.locator.clone())
      .with_hooks(self.hooks.clone())
      .with_ttl(self.config.reference_ttl)
      .with_strict_dependencies(self.config.strict_dependencies)
      .with_references(references)
  }

  /// References recorded in the state file, empty when there is none.
  pub fn stored_references(&self) -> Result<Vec<Reference>> {
    let Some(path) = &self.config.state_file else {
      return Ok(Vec::new());
    };
    Ok(StateFile::load(path)?.map(|state| state.references()).unwrap_or_default())
  }

  /// Whether any tracked file changed since the state file was written.
  ///
  /// A missing state file counts as a change.
  pub fn files_changed(&self) -> Result<bool> {
    let Some(path) = &self.config.state_file else {
      return Ok(true);
    };
    match StateFile::load(path)? {
      Some(state) => Ok(state.dependencies_changed(&self.config.tracked_files())?),
      None => Ok(true),
    }
  }

  /// Discard persisted references when tracked files changed. Returns whether it did.
  pub fn start(&self) -> Result<bool> {
    if self.files_changed()? {
      info!("tracked files changed, resetting fixture state");
      self.reset()?;
      Ok(true)
    } else {
      info!("no tracked file changes, keeping fixture state");
      Ok(false)
    }
  }

  /// Delete the state file.
  pub fn reset(&self) -> Result<()> {
    if let Some(path) = &self.config.state_file {
      StateFile::remove(path)?;
    }
    Ok(())
  }

  /// Write tracked checksums and the store's real references to the state file.
  pub fn persist(&self, store: &Store) -> Result<()> {
    let Some(path) = &self.config.state_file else {
      return Ok(());
    };

    let mut state = StateFile {
      dependencies: state::checksums(&self.config.tracked_files())?,
      ..Default::default()
    };
    let references = store.references();
    state.set_references(references.values());
    state.save(path)?;
    Ok(())
  }

  /// Build every fixture in the schema.
  pub fn load_all_fixtures(&self, store: &Store) -> Result<()> {
    store.load_all()
  }
}

impl std::fmt::Debug for Fixtury {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Fixtury")
      .field("config", &self.config)
      .field("schema", &self.schema)
      .field("hooks", &self.hooks)
      .finish()
  }
}
