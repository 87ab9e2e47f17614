use fixtury::{Error, FixtureOptions, Options, Schema, Store};

use super::common::{Counter, planets, text};

#[test]
fn requesting_one_member_builds_the_whole_group() {
  let store = Store::new(planets());

  store.get("masses/continent").unwrap();
  assert!(store.loaded("masses/ocean").unwrap());
  assert!(!store.loaded("earth").unwrap());

  let ocean = store.reference("/masses/ocean").unwrap();
  assert_eq!(ocean.metadata().get("isolation_key").and_then(|v| v.as_str()), Some("/masses"));
}

#[test]
fn fixtures_without_isolation_do_not_record_a_key() {
  let store = Store::new(planets());
  store.get("earth").unwrap();
  assert!(store.reference("/earth").unwrap().metadata().get("isolation_key").is_none());
}

#[test]
fn named_isolation_keys_span_namespaces() {
  let schema = Schema::new();
  schema
    .define(|s| {
      s.namespace("users", |ns| {
        ns.fixture_with("admin", FixtureOptions::new().isolate_as("accounts"), |_| text("admin"))?;
        Ok(())
      })?;
      s.namespace("billing", |ns| {
        ns.fixture_with("invoice", FixtureOptions::new().isolate_as("accounts"), |_| text("invoice"))?;
        Ok(())
      })?;
      s.fixture("unrelated", || text("unrelated"))?;
      Ok(())
    })
    .unwrap();

  let store = Store::new(schema);
  store.get("users/admin").unwrap();
  assert!(store.loaded("billing/invoice").unwrap());
  assert!(!store.loaded("unrelated").unwrap());
}

#[test]
fn nested_namespaces_inherit_the_outer_key() {
  let schema = Schema::new();
  schema
    .namespace_with("world", Options::new().isolate(), |ns| {
      ns.namespace_with("inner", Options::new().isolate_as("ignored"), |inner| {
        inner.fixture("deep", || text("deep"))?;
        Ok(())
      })?;
      ns.fixture("shallow", || text("shallow"))?;
      Ok(())
    })
    .unwrap();

  let deep = schema.get_definition("world/inner/deep").unwrap();
  assert_eq!(deep.isolation_key(), "/world");

  let store = Store::new(schema);
  store.get("world/shallow").unwrap();
  assert!(store.loaded("world/inner/deep").unwrap());
}

#[test]
fn a_failing_member_fails_the_request_and_is_retried_later() {
  let attempts = Counter::default();
  let counter = attempts.clone();
  let schema = Schema::new();
  schema
    .namespace_with("group", Options::new().isolate(), |ns| {
      ns.fixture("good", || text("good"))?;
      ns.fixture("bad", move || {
        counter.bump();
        if counter.get() == 1 {
          anyhow::bail!("first attempt fails");
        }
        text("bad")
      })?;
      Ok(())
    })
    .unwrap();

  let store = Store::new(schema);
  let err = store.get("group/good").unwrap_err();
  assert!(matches!(err, Error::DefinitionExecution { ref pathname, .. } if pathname == "/group/bad"));
  assert!(!store.loaded("group/good").unwrap());

  store.get("group/good").unwrap();
  assert!(store.loaded("group/bad").unwrap());
  assert_eq!(attempts.get(), 2);
}

#[test]
fn evicting_a_member_reloads_the_group_on_next_access() {
  let builds = Counter::default();
  let counter = builds.clone();
  let schema = Schema::new();
  schema
    .namespace_with("group", Options::new().isolate(), |ns| {
      ns.fixture("first", || text("first"))?;
      ns.fixture("second", move || {
        counter.bump();
        text("second")
      })?;
      Ok(())
    })
    .unwrap();

  let store = Store::new(schema);
  store.get("group/first").unwrap();
  assert_eq!(builds.get(), 1);

  assert_eq!(store.clear_cache("group/*").unwrap(), 2);
  store.get("group/first").unwrap();
  assert_eq!(builds.get(), 2);
  assert!(store.loaded("group/second").unwrap());
}
