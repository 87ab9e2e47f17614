use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};

use fixtury::{Config, Fixtury, GlobalIdBackend, Locator, StateFile, Value};
use tempfile::TempDir;

use super::common::Counter;

#[derive(Debug, Clone)]
struct Planet {
  id: u64,
  name: String,
}

type Table = Arc<Mutex<HashMap<u64, Planet>>>;

/// A temp directory with a tracked fixture file and a state file path.
struct TestEnv {
  temp: TempDir,
  table: Table,
  builds: Counter,
}

impl TestEnv {
  fn new() -> Self {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("planets.rs"), "earth").unwrap();
    Self {
      temp,
      table: Arc::default(),
      builds: Counter::default(),
    }
  }

  fn state_path(&self) -> std::path::PathBuf {
    self.temp.path().join("tmp").join("fixtury.json")
  }

  fn config(&self) -> Config {
    Config::new()
      .with_state_file(self.state_path())
      .add_fixture_path(self.temp.path().join("planets.rs"))
  }

  /// A fresh context, as a new test process would create it.
  fn fixtury(&self) -> Fixtury {
    let finder = Arc::clone(&self.table);
    let locator = Locator::new(GlobalIdBackend::new("atlas").register::<Planet, _, _>(
      "Planet",
      |planet| planet.id.to_string(),
      move |id| {
        let id: u64 = id.parse()?;
        Ok(finder.lock().unwrap().get(&id).cloned())
      },
    ));

    let fixtury = Fixtury::new(self.config()).with_locator(locator);
    let (table, builds) = (Arc::clone(&self.table), self.builds.clone());
    fixtury
      .define(|s| {
        s.fixture("earth", move || {
          builds.bump();
          let planet = Planet {
            id: 3,
            name: "Earth".to_string(),
          };
          table.lock().unwrap().insert(planet.id, planet.clone());
          Ok(Value::new(planet))
        })?;
        Ok(())
      })
      .unwrap();
    fixtury
  }
}

#[test]
fn persisted_references_are_reused_by_the_next_run() {
  let env = TestEnv::new();

  let first = env.fixtury();
  assert!(first.start().unwrap());
  let store = first.store();
  store.get("earth").unwrap();
  first.persist(&store).unwrap();

  let state = StateFile::load(&env.state_path()).unwrap().unwrap();
  assert_eq!(state.references.len(), 1);
  assert_eq!(state.dependencies.len(), 1);

  let second = env.fixtury();
  assert!(!second.start().unwrap());
  let earth = second.store().get("earth").unwrap();

  assert_eq!(env.builds.get(), 1);
  assert_eq!(earth.downcast_ref::<Planet>().unwrap().name, "Earth");
}

#[test]
fn changing_a_tracked_file_discards_the_state() {
  let env = TestEnv::new();

  let first = env.fixtury();
  first.start().unwrap();
  let store = first.store();
  first.load_all_fixtures(&store).unwrap();
  first.persist(&store).unwrap();

  fs::write(env.temp.path().join("planets.rs"), "earth and mars").unwrap();

  let second = env.fixtury();
  assert!(second.files_changed().unwrap());
  assert!(second.start().unwrap());
  assert!(!env.state_path().exists());

  second.store().get("earth").unwrap();
  assert_eq!(env.builds.get(), 2);
}

#[test]
fn corrupt_state_files_are_ignored_by_stores() {
  let env = TestEnv::new();
  fs::create_dir_all(env.state_path().parent().unwrap()).unwrap();
  fs::write(env.state_path(), "{ definitely not json").unwrap();

  let fixtury = env.fixtury();
  assert!(fixtury.stored_references().is_err());

  let store = fixtury.store();
  assert!(store.references().is_empty());
  store.get("earth").unwrap();

  fixtury.persist(&store).unwrap();
  assert!(fixtury.stored_references().unwrap().len() == 1);
}

#[test]
fn holders_are_never_persisted() {
  let env = TestEnv::new();
  let fixtury = env.fixtury();
  let store = fixtury
    .store()
    .with_references([fixtury::Reference::holder("/earth")]);

  fixtury.persist(&store).unwrap();
  let state = StateFile::load(&env.state_path()).unwrap().unwrap();
  assert!(state.references.is_empty());
}

#[test]
fn reset_removes_the_state_file() {
  let env = TestEnv::new();
  let fixtury = env.fixtury();
  let store = fixtury.store();
  store.get("earth").unwrap();
  fixtury.persist(&store).unwrap();
  assert!(env.state_path().exists());

  fixtury.reset().unwrap();
  fixtury.reset().unwrap();
  assert!(!env.state_path().exists());
  assert!(fixtury.files_changed().unwrap());
}
