//! Dynamic fixture values.
//!
//! Fixtures can build anything. A [`Value`] carries a built value as a shared,
//! type-erased object, or as a list/map of values so a fixture can return
//! several locatable objects at once.

use std::any::{Any, TypeId, type_name};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A shared, type-erased object.
#[derive(Clone)]
pub struct Object {
  inner: Arc<dyn Any + Send + Sync>,
  type_name: &'static str,
}

impl Object {
  pub fn new<T: Any + Send + Sync>(value: T) -> Self {
    Self::from_arc(Arc::new(value))
  }

  pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
    Self {
      inner: value,
      type_name: type_name::<T>(),
    }
  }

  pub fn type_name(&self) -> &'static str {
    self.type_name
  }

  /// The concrete type of the wrapped value.
  pub fn type_id(&self) -> TypeId {
    Any::type_id(&*self.inner)
  }

  pub fn is<T: Any>(&self) -> bool {
    self.inner.is::<T>()
  }

  pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
    self.inner.downcast_ref::<T>()
  }

  pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
    Arc::clone(&self.inner).downcast::<T>().ok()
  }

  /// Address of the shared allocation, stable for the object's lifetime.
  pub fn address(&self) -> usize {
    Arc::as_ptr(&self.inner) as *const () as usize
  }

  pub fn ptr_eq(&self, other: &Object) -> bool {
    self.address() == other.address()
  }
}

impl fmt::Debug for Object {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Object<{}>({:#x})", self.type_name, self.address())
  }
}

/// A built fixture value.
#[derive(Clone, Debug, Default)]
pub enum Value {
  /// Nothing was built. Locators refuse to store it.
  #[default]
  Nil,
  Object(Object),
  List(Vec<Value>),
  Map(BTreeMap<String, Value>),
}

impl Value {
  pub fn new<T: Any + Send + Sync>(value: T) -> Self {
    Value::Object(Object::new(value))
  }

  pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
    Value::Object(Object::from_arc(value))
  }

  pub fn is_nil(&self) -> bool {
    matches!(self, Value::Nil)
  }

  pub fn as_object(&self) -> Option<&Object> {
    match self {
      Value::Object(obj) => Some(obj),
      _ => None,
    }
  }

  pub fn as_list(&self) -> Option<&[Value]> {
    match self {
      Value::List(items) => Some(items),
      _ => None,
    }
  }

  pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
    match self {
      Value::Map(entries) => Some(entries),
      _ => None,
    }
  }

  pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
    self.as_object().and_then(Object::downcast_ref)
  }

  pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
    self.as_object().and_then(Object::downcast)
  }

  /// Short description used in error messages.
  pub fn kind(&self) -> String {
    match self {
      Value::Nil => "nil".to_string(),
      Value::Object(obj) => obj.type_name().to_string(),
      Value::List(items) => format!("list of {}", items.len()),
      Value::Map(entries) => format!("map of {}", entries.len()),
    }
  }

  /// Identity comparison: objects must share an allocation, collections must
  /// hold identical elements.
  pub fn ptr_eq(&self, other: &Value) -> bool {
    match (self, other) {
      (Value::Nil, Value::Nil) => true,
      (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
      (Value::List(a), Value::List(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.ptr_eq(y)),
      (Value::Map(a), Value::Map(b)) => {
        a.len() == b.len() && a.iter().zip(b).all(|((ka, va), (kb, vb))| ka == kb && va.ptr_eq(vb))
      }
      _ => false,
    }
  }
}

impl From<Object> for Value {
  fn from(obj: Object) -> Self {
    Value::Object(obj)
  }
}

impl From<Vec<Value>> for Value {
  fn from(items: Vec<Value>) -> Self {
    Value::List(items)
  }
}

impl From<BTreeMap<String, Value>> for Value {
  fn from(entries: BTreeMap<String, Value>) -> Self {
    Value::Map(entries)
  }
}
