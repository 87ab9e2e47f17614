use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::value::{Object, Value};

use super::{LocatorBackend, LocatorKey};

const SCHEME: &str = "gid://";

/// A self-describing identifier: `gid://{app}/{model}/{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalId {
  pub app: String,
  pub model: String,
  pub id: String,
}

impl GlobalId {
  pub fn new(app: impl Into<String>, model: impl Into<String>, id: impl Into<String>) -> Self {
    Self {
      app: app.into(),
      model: model.into(),
      id: id.into(),
    }
  }

  /// Parse `gid://app/Model/id`. The id may itself contain `/`.
  pub fn parse(uri: &str) -> Option<Self> {
    let rest = uri.strip_prefix(SCHEME)?;
    let mut parts = rest.splitn(3, '/');
    let app = parts.next().filter(|s| !s.is_empty())?;
    let model = parts.next().filter(|s| !s.is_empty())?;
    let id = parts.next().filter(|s| !s.is_empty())?;
    Some(Self::new(app, model, id))
  }
}

impl fmt::Display for GlobalId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{SCHEME}{}/{}/{}", self.app, self.model, self.id)
  }
}

type Identify = Arc<dyn Fn(&Object) -> Option<String> + Send + Sync>;
type Find = Arc<dyn Fn(&str) -> anyhow::Result<Option<Value>> + Send + Sync>;

struct Model {
  name: String,
  type_id: TypeId,
  identify: Identify,
  find: Find,
}

/// Locates persisted records by global id.
///
/// Each locatable type is registered with a model name, a function producing
/// its primary key and a finder that looks a record up again. Keys survive
/// process restarts, so this backend suits references shared through a state
/// file.
///
/// ```
/// use fixtury::{GlobalIdBackend, Locator, Value};
///
/// #[derive(Clone)]
/// struct User {
///   id: u64,
/// }
///
/// let backend = GlobalIdBackend::new("app").register::<User, _, _>(
///   "User",
///   |user| user.id.to_string(),
///   |id| Ok(id.parse().ok().map(|id| User { id })),
/// );
/// let locator = Locator::new(backend);
///
/// let key = locator.dump(&Value::new(User { id: 7 }), None).unwrap();
/// assert_eq!(key.as_id(), Some("gid://app/User/7"));
///
/// let user = locator.load(&key).unwrap().unwrap();
/// assert_eq!(user.downcast_ref::<User>().unwrap().id, 7);
/// ```
pub struct GlobalIdBackend {
  app: String,
  models: Vec<Model>,
}

impl GlobalIdBackend {
  pub fn new(app: impl Into<String>) -> Self {
    Self {
      app: app.into(),
      models: Vec::new(),
    }
  }

  pub fn app(&self) -> &str {
    &self.app
  }

  /// Register a locatable type under `model`.
  pub fn register<T, I, F>(mut self, model: impl Into<String>, identify: I, find: F) -> Self
  where
    T: Any + Send + Sync,
    I: Fn(&T) -> String + Send + Sync + 'static,
    F: Fn(&str) -> anyhow::Result<Option<T>> + Send + Sync + 'static,
  {
    self.models.push(Model {
      name: model.into(),
      type_id: TypeId::of::<T>(),
      identify: Arc::new(move |object: &Object| object.downcast_ref::<T>().map(&identify)),
      find: Arc::new(move |id: &str| -> anyhow::Result<Option<Value>> { Ok(find(id)?.map(Value::new)) }),
    });
    self
  }

  /// Global id of `value` when its type is registered.
  pub fn global_id(&self, value: &Value) -> Option<GlobalId> {
    let object = value.as_object()?;
    let model = self.model_for_type(object.type_id())?;
    let id = (model.identify)(object)?;
    Some(GlobalId::new(&self.app, &model.name, id))
  }

  fn model_for_type(&self, type_id: TypeId) -> Option<&Model> {
    self.models.iter().find(|model| model.type_id == type_id)
  }

  fn model_for_key(&self, key: &LocatorKey) -> Option<(&Model, GlobalId)> {
    let gid = GlobalId::parse(key.as_id()?)?;
    if gid.app != self.app {
      return None;
    }
    let model = self.models.iter().find(|model| model.name == gid.model)?;
    Some((model, gid))
  }
}

impl LocatorBackend for GlobalIdBackend {
  fn recognizable_key(&self, key: &LocatorKey) -> bool {
    self.model_for_key(key).is_some()
  }

  fn recognizable_value(&self, value: &Value) -> bool {
    value
      .as_object()
      .is_some_and(|object| self.model_for_type(object.type_id()).is_some())
  }

  fn load_reference(&self, key: &LocatorKey) -> Result<Option<Value>> {
    let Some((model, gid)) = self.model_for_key(key) else {
      return Err(Error::UnrecognizableLocator {
        action: "load",
        thing: key.to_string(),
      });
    };

    (model.find)(&gid.id).map_err(|source| Error::Locate {
      key: gid.to_string(),
      source,
    })
  }

  fn dump_value(&self, value: &Value) -> Result<LocatorKey> {
    let gid = self.global_id(value).ok_or_else(|| Error::UnrecognizableLocator {
      action: "dump",
      thing: value.kind(),
    })?;
    Ok(LocatorKey::Id(gid.to_string()))
  }
}

impl fmt::Debug for GlobalIdBackend {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("GlobalIdBackend")
      .field("app", &self.app)
      .field("models", &self.models.iter().map(|m| m.name.as_str()).collect::<Vec<_>>())
      .finish()
  }
}
