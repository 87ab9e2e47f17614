//! Shared schema and helpers for integration tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use fixtury::{FixtureOptions, Options, Schema, Value};

pub fn text(value: &str) -> anyhow::Result<Value> {
  Ok(Value::new(value.to_string()))
}

/// Read a string fixture value.
pub fn as_text(value: &Value) -> String {
  value.downcast_ref::<String>().cloned().unwrap_or_else(|| panic!("not a string: {value:?}"))
}

/// Shared build counter.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
  pub fn bump(&self) {
    self.0.fetch_add(1, Ordering::SeqCst);
  }

  pub fn get(&self) -> usize {
    self.0.load(Ordering::SeqCst)
  }
}

/// A root `earth`, a `countries` namespace shadowing it, nested `towns` and an
/// isolated `masses` namespace.
pub fn planets() -> Schema {
  let schema = Schema::new();
  schema
    .define(|s| {
      s.fixture("earth", || text("Earth"))?;

      s.namespace("countries", |ns| {
        ns.fixture("earth", || text("Relative Earth"))?;
        ns.fixture_with("relative_country", FixtureOptions::new().dep("earth"), |deps| {
          let earth = deps.get_as::<String>("earth")?;
          text(&format!("Country, {earth}"))
        })?;
        ns.fixture_with("absolute_country", FixtureOptions::new().dep("/earth"), |deps| {
          let earth = deps.get_as::<String>("earth")?;
          text(&format!("Country, {earth}"))
        })?;

        ns.namespace("towns", |towns| {
          towns.fixture_with("relative_town", FixtureOptions::new().dep("../earth"), |deps| {
            let earth = deps.get_as::<String>("earth")?;
            text(&format!("Town, {earth}"))
          })?;
          towns.fixture_with("absolute_town", FixtureOptions::new().dep("/earth"), |deps| {
            let earth = deps.get_as::<String>("earth")?;
            text(&format!("Town, {earth}"))
          })?;
          Ok(())
        })?;
        Ok(())
      })?;

      s.namespace_with("masses", Options::new().isolate(), |ns| {
        ns.fixture("continent", || text("Pangaea"))?;
        ns.fixture("ocean", || text("Panthalassa"))?;
        Ok(())
      })?;
      Ok(())
    })
    .unwrap();
  schema
}
