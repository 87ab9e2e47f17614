use fixtury::{Error, FixtureOptions, ManualClock, Schema, Store, Value};

use super::common::{Counter, as_text, planets, text};

#[test]
fn relative_and_absolute_dependencies_resolve_from_the_defining_namespace() {
  let store = Store::new(planets());

  assert_eq!(as_text(&store.get("earth").unwrap()), "Earth");
  assert_eq!(as_text(&store.get("countries/earth").unwrap()), "Relative Earth");
  assert_eq!(as_text(&store.get("countries/relative_country").unwrap()), "Country, Relative Earth");
  assert_eq!(as_text(&store.get("/countries/absolute_country").unwrap()), "Country, Earth");
  assert_eq!(as_text(&store.get("countries/towns/relative_town").unwrap()), "Town, Relative Earth");
  assert_eq!(as_text(&store.get("countries/towns/absolute_town").unwrap()), "Town, Earth");
}

#[test]
fn searches_follow_the_current_namespace() {
  let schema = planets();
  let store = Store::new(schema.clone());
  let countries = schema.get("countries").unwrap().as_namespace().unwrap().clone();

  let earth = store.with_relative_schema(countries, || store.get("earth")).unwrap();
  assert_eq!(as_text(&earth), "Relative Earth");
  assert!(store.current_namespace().ptr_eq(&schema));
  assert_eq!(as_text(&store.get("earth").unwrap()), "Earth");
}

#[test]
fn fixtures_build_once_and_return_the_same_object() {
  let builds = Counter::default();
  let schema = Schema::new();
  let counter = builds.clone();
  schema
    .fixture("earth", move || {
      counter.bump();
      text("Earth")
    })
    .unwrap();

  let store = Store::new(schema);
  let first = store.get("earth").unwrap();
  let second = store.get("/earth").unwrap();

  assert_eq!(builds.get(), 1);
  assert!(first.ptr_eq(&second));
  assert!(store.loaded("earth").unwrap());
}

#[test]
fn missing_fixtures_and_namespaces_are_rejected() {
  let store = Store::new(planets());

  assert!(matches!(store.get("mars"), Err(Error::NotDefined { ref search, .. }) if search == "mars"));
  assert!(matches!(store.get("countries"), Err(Error::NotADefinition(ref p)) if p == "/countries"));
  assert!(store.references().is_empty());
}

#[test]
fn circular_dependencies_are_detected_and_leave_no_holders() {
  let schema = Schema::new();
  schema
    .define(|s| {
      s.fixture_with("chicken", FixtureOptions::new().dep("egg"), |deps| {
        deps.get("egg")?;
        text("chicken")
      })?;
      s.fixture_with("egg", FixtureOptions::new().dep("chicken"), |deps| {
        deps.get("chicken")?;
        text("egg")
      })?;
      Ok(())
    })
    .unwrap();

  let store = Store::new(schema);
  let err = store.get("chicken").unwrap_err();
  assert!(matches!(err, Error::CircularDependency(ref p) if p == "/chicken"), "{err:?}");
  assert!(store.references().is_empty());
}

#[test]
fn build_failures_are_wrapped_and_can_be_retried() {
  let attempts = Counter::default();
  let schema = Schema::new();
  let counter = attempts.clone();
  schema
    .fixture("flaky", move || {
      counter.bump();
      if counter.get() == 1 {
        anyhow::bail!("database unavailable");
      }
      text("ok")
    })
    .unwrap();

  let store = Store::new(schema);
  let err = store.get("flaky").unwrap_err();
  match err {
    Error::DefinitionExecution { pathname, source } => {
      assert_eq!(pathname, "/flaky");
      assert_eq!(source.to_string(), "database unavailable");
    }
    other => panic!("unexpected error: {other:?}"),
  }
  assert!(store.reference("/flaky").is_none());

  assert_eq!(as_text(&store.get("flaky").unwrap()), "ok");
  assert_eq!(attempts.get(), 2);
}

#[test]
fn nil_values_cannot_be_stored() {
  let schema = Schema::new();
  schema.fixture("nothing", || Ok(Value::Nil)).unwrap();

  let store = Store::new(schema);
  let err = store.get("nothing").unwrap_err();
  assert!(matches!(err, Error::InvalidArgument(ref msg) if msg.contains("/nothing")), "{err:?}");
  assert!(store.reference("/nothing").is_none());
}

#[test]
fn strict_stores_reject_undeclared_dependencies() {
  let schema = planets();
  schema
    .fixture_with("sneaky", FixtureOptions::new(), |deps| {
      deps.get("earth")?;
      text("sneaky")
    })
    .unwrap();

  let strict = Store::new(schema.clone());
  let err = strict.get("sneaky").unwrap_err();
  assert!(matches!(err, Error::UnknownDependency { ref accessor, .. } if accessor == "earth"), "{err:?}");

  let permissive = Store::new(schema).with_strict_dependencies(false);
  assert_eq!(as_text(&permissive.get("sneaky").unwrap()), "sneaky");
  assert!(permissive.loaded("earth").unwrap());
}

#[test]
fn dependency_type_mismatches_name_both_types() {
  let schema = Schema::new();
  schema
    .define(|s| {
      s.fixture("answer", || Ok(Value::new(42_u32)))?;
      s.fixture_with("question", FixtureOptions::new().dep("answer"), |deps| {
        deps.get_as::<String>("answer")?;
        text("unreachable")
      })?;
      Ok(())
    })
    .unwrap();

  let store = Store::new(schema);
  match store.get("question").unwrap_err() {
    Error::TypeMismatch { accessor, expected, actual } => {
      assert_eq!(accessor, "answer");
      assert!(expected.contains("String"));
      assert_eq!(actual, "u32");
    }
    other => panic!("unexpected error: {other:?}"),
  }
}

#[test]
fn expired_references_are_rebuilt() {
  let builds = Counter::default();
  let schema = Schema::new();
  let counter = builds.clone();
  schema
    .fixture("earth", move || {
      counter.bump();
      text("Earth")
    })
    .unwrap();

  let clock = ManualClock::new(1_000);
  let store = Store::new(schema).with_ttl(Some(10)).with_clock(clock.clone());

  store.get("earth").unwrap();
  clock.advance(10);
  store.get("earth").unwrap();
  assert_eq!(builds.get(), 1);

  clock.advance(1);
  store.get("earth").unwrap();
  assert_eq!(builds.get(), 2);
  assert_eq!(store.reference("/earth").unwrap().created_at(), 1_011);
}

#[test]
fn clear_stale_references_only_drops_expired_ones() {
  let schema = planets();
  let clock = ManualClock::new(100);
  let store = Store::new(schema).with_ttl(Some(5)).with_clock(clock.clone());

  store.get("earth").unwrap();
  clock.advance(10);
  store.get("countries/earth").unwrap();

  assert_eq!(store.clear_stale_references(), 1);
  assert!(store.reference("/earth").is_none());
  assert!(store.reference("/countries/earth").is_some());
}

#[test]
fn clear_cache_evicts_matching_pathnames() {
  let store = Store::new(planets());
  store.load_all().unwrap();
  let total = store.references().len();

  assert_eq!(store.clear_cache("countries/towns/*").unwrap(), 2);
  assert_eq!(store.references().len(), total - 2);
  assert!(!store.loaded("countries/towns/relative_town").unwrap());
  assert!(store.loaded("countries/earth").unwrap());

  assert_eq!(store.clear_cache("/earth").unwrap(), 1);
  assert!(!store.loaded("/earth").unwrap());

  assert!(matches!(store.clear_cache("[unclosed"), Err(Error::InvalidArgument(_))));
}

#[test]
fn clear_cache_wildcards_reach_nested_namespaces() {
  let store = Store::new(planets());
  store.load_all().unwrap();

  assert_eq!(store.clear_cache("countries/*").unwrap(), 5);
  assert!(!store.loaded("countries/earth").unwrap());
  assert!(!store.loaded("countries/towns/absolute_town").unwrap());
  assert!(store.loaded("/earth").unwrap());
}

#[test]
fn load_all_builds_every_fixture_and_reset_forgets_them() {
  let schema = planets();
  let store = Store::new(schema.clone());
  store.load_all().unwrap();

  assert_eq!(store.references().len(), schema.definitions().len());
  assert!(store.references().values().all(|reference| reference.is_real()));

  store.reset();
  assert!(store.references().is_empty());
}

#[test]
fn enhancements_run_after_the_build_in_order() {
  let schema = Schema::new();
  schema
    .define(|s| {
      s.fixture("greeting", || text("hello"))?;
      s.enhance("greeting", |value| {
        let base = value.downcast_ref::<String>().cloned().unwrap_or_default();
        text(&format!("{base}, world"))
      })?;
      s.enhance("/greeting", |value| {
        let base = value.downcast_ref::<String>().cloned().unwrap_or_default();
        text(&base.to_uppercase())
      })?;
      Ok(())
    })
    .unwrap();

  let store = Store::new(schema);
  assert_eq!(as_text(&store.get("greeting").unwrap()), "HELLO, WORLD");
}

#[test]
fn collections_of_objects_are_located_member_by_member() {
  let schema = Schema::new();
  schema
    .fixture("pair", || Ok(Value::List(vec![Value::new(1_u8), Value::new(2_u8)])))
    .unwrap();

  let store = Store::new(schema);
  let first = store.get("pair").unwrap();
  let second = store.get("pair").unwrap();
  assert!(first.ptr_eq(&second));
  assert_eq!(first.as_list().unwrap().len(), 2);
}
