use fixtury::{Error, FixtureOptions, Options, Schema, SchemaNode, Store};

use super::common::{Counter, as_text, planets, text};

#[test]
fn lookups_prefer_the_closest_namespace() {
  let schema = planets();
  let countries = schema.get("countries").unwrap().as_namespace().unwrap().clone();
  let towns = countries.get("towns").unwrap().as_namespace().unwrap().clone();

  assert_eq!(countries.get("earth").unwrap().pathname(), "/countries/earth");
  assert_eq!(countries.get("/earth").unwrap().pathname(), "/earth");
  assert_eq!(towns.get("earth").unwrap().pathname(), "/earth");
  assert_eq!(towns.get("../earth").unwrap().pathname(), "/countries/earth");
  assert!(towns.get("./earth").is_none());
  assert!(schema.get("").is_none());
}

#[test]
fn missing_nodes_name_the_search_and_origin() {
  let schema = planets();
  let countries = schema.get("countries").unwrap().as_namespace().unwrap().clone();

  let err = countries.get_required("moon").unwrap_err();
  assert_eq!(
    err.to_string(),
    "a schema node identified by `moon` could not be found from `/countries`"
  );
}

#[test]
fn names_cannot_be_redefined() {
  let schema = planets();

  assert!(matches!(
    schema.fixture("earth", || text("Second Earth")),
    Err(Error::AlreadyDefined(ref p)) if p == "/earth"
  ));
  assert!(matches!(
    schema.namespace("earth", |_| Ok(())),
    Err(Error::AlreadyDefined(ref p)) if p == "/earth"
  ));
  assert!(matches!(
    schema.fixture("countries", || text("nope")),
    Err(Error::AlreadyDefined(ref p)) if p == "/countries"
  ));
}

#[test]
fn invalid_names_are_rejected() {
  let schema = Schema::new();
  for name in ["with space", "dash-ed", "sla/sh", ""] {
    assert!(schema.fixture(name, || text("x")).is_err(), "{name:?} should be rejected");
  }
  assert!(schema.children().is_empty());
}

#[test]
fn namespaces_can_be_reopened_but_options_cannot_change() {
  let schema = Schema::new();
  schema
    .namespace_with("users", Options::new().with("owner", "qa"), |ns| {
      ns.fixture("alice", || text("Alice"))?;
      Ok(())
    })
    .unwrap();
  schema
    .namespace_with("users", Options::new().with("owner", "qa"), |ns| {
      ns.fixture("bob", || text("Bob"))?;
      Ok(())
    })
    .unwrap();

  let users = schema.get("users").unwrap().as_namespace().unwrap().clone();
  assert_eq!(users.children().len(), 2);

  let err = schema
    .namespace_with("users", Options::new().with("owner", "dev"), |_| Ok(()))
    .unwrap_err();
  assert!(matches!(err, Error::OptionCollision { ref key, .. } if key == "owner"), "{err:?}");
}

#[test]
fn merging_copies_definitions_without_touching_the_source() {
  let target = Schema::new();
  target.fixture("earth", || text("Earth")).unwrap();

  let other = Schema::new();
  other
    .define(|s| {
      s.namespace("countries", |ns| {
        ns.fixture_with("usa", FixtureOptions::new().dep("/earth"), |deps| {
          let earth = deps.get_as::<String>("earth")?;
          text(&format!("USA, {earth}"))
        })?;
        Ok(())
      })?;
      s.enhance("countries/usa", |value| {
        let base = value.downcast_ref::<String>().cloned().unwrap_or_default();
        text(&format!("{base}!"))
      })?;
      Ok(())
    })
    .unwrap();

  target.merge(&other).unwrap();
  let usa = target.get_definition("countries/usa").unwrap();
  assert_eq!(usa.pathname(), "/countries/usa");
  assert!(usa.namespace().unwrap().parent().unwrap().ptr_eq(&target));
  assert_eq!(usa.enhancements().len(), 1);
  assert!(other.get("earth").is_none());

  let store = Store::new(target.clone());
  assert_eq!(as_text(&store.get("countries/usa").unwrap()), "USA, Earth!");

  assert!(matches!(target.merge(&other), Err(Error::AlreadyDefined(_))));
}

#[test]
fn merged_copies_build_their_own_values() {
  let built = Counter::default();
  let schema = Schema::new();
  let x = schema
    .namespace("x", |ns| {
      let built = built.clone();
      ns.fixture("a", move || {
        built.bump();
        text("a")
      })?;
      Ok(())
    })
    .unwrap();
  let y = schema.namespace("y", |_| Ok(())).unwrap();
  y.merge(&x).unwrap();

  let store = Store::new(schema);
  let from_x = store.get("x/a").unwrap();
  let from_y = store.get("y/a").unwrap();

  assert_eq!(as_text(&from_x), as_text(&from_y));
  assert!(!from_x.ptr_eq(&from_y));
  assert_eq!(built.get(), 2);
  assert_eq!(store.references().keys().collect::<Vec<_>>(), vec!["/x/a", "/y/a"]);
}

#[test]
fn a_schema_cannot_be_merged_into_itself() {
  let schema = planets();
  let countries = schema.get("countries").unwrap().as_namespace().unwrap().clone();

  assert!(matches!(schema.merge(&schema), Err(Error::InvalidArgument(_))));
  assert!(matches!(countries.merge(&schema), Err(Error::InvalidArgument(_))));
}

#[test]
fn frozen_schemas_reject_changes_everywhere() {
  let schema = planets();
  let countries = schema.get("countries").unwrap().as_namespace().unwrap().clone();
  countries.freeze();

  assert!(schema.is_frozen());
  assert!(matches!(schema.fixture("mars", || text("Mars")), Err(Error::SchemaFrozen)));
  assert!(matches!(countries.namespace("cities", |_| Ok(())), Err(Error::SchemaFrozen)));
  assert!(matches!(schema.enhance("earth", Ok), Err(Error::SchemaFrozen)));
  assert!(matches!(schema.merge(&Schema::new()), Err(Error::SchemaFrozen)));

  let store = Store::new(schema);
  assert_eq!(as_text(&store.get("earth").unwrap()), "Earth");
}

#[test]
fn children_are_listed_by_name() {
  let schema = planets();
  let names: Vec<String> = schema.children().iter().map(|node| node.name().to_string()).collect();
  assert_eq!(names, vec!["countries", "earth", "masses"]);

  let kinds: Vec<bool> = schema
    .children()
    .iter()
    .map(|node| matches!(node, SchemaNode::Namespace(_)))
    .collect();
  assert_eq!(kinds, vec![true, false, true]);
}
