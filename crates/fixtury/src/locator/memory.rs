use std::collections::HashMap;
use std::process;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::util::sync::lock;
use crate::value::{Object, Value};

use super::{LocatorBackend, LocatorKey};

const PREFIX: &str = "fixtury-oid-";

/// Locates objects by identity within the current process.
///
/// Keys look like `fixtury-oid-<pid>-<address>`. The backend holds on to every
/// object it dumped so an address stays valid. Each dump takes a hold on the
/// object and each forgotten key gives one back; the object is dropped with its
/// last hold or on [`MemoryBackend::release`]. Keys minted by another process
/// are recognized but never load.
#[derive(Debug)]
pub struct MemoryBackend {
  pid: u32,
  objects: Mutex<HashMap<usize, Held>>,
}

#[derive(Debug)]
struct Held {
  object: Object,
  holds: usize,
}

impl MemoryBackend {
  pub fn new() -> Self {
    Self {
      pid: process::id(),
      objects: Mutex::new(HashMap::new()),
    }
  }

  /// Forget the object behind `key`, as if it was deleted.
  pub fn release(&self, key: &LocatorKey) -> bool {
    match parse(key) {
      Some((pid, address)) if pid == self.pid => lock(&self.objects).remove(&address).is_some(),
      _ => false,
    }
  }

  /// Number of objects currently held.
  pub fn len(&self) -> usize {
    lock(&self.objects).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl Default for MemoryBackend {
  fn default() -> Self {
    Self::new()
  }
}

impl LocatorBackend for MemoryBackend {
  fn recognizable_key(&self, key: &LocatorKey) -> bool {
    parse(key).is_some()
  }

  fn recognizable_value(&self, value: &Value) -> bool {
    value.as_object().is_some()
  }

  fn load_reference(&self, key: &LocatorKey) -> Result<Option<Value>> {
    let Some((pid, address)) = parse(key) else {
      return Err(Error::UnrecognizableLocator {
        action: "load",
        thing: key.to_string(),
      });
    };

    if pid != self.pid {
      return Ok(None);
    }
    Ok(lock(&self.objects).get(&address).map(|held| Value::Object(held.object.clone())))
  }

  fn dump_value(&self, value: &Value) -> Result<LocatorKey> {
    let Some(object) = value.as_object() else {
      return Err(Error::UnrecognizableLocator {
        action: "dump",
        thing: value.kind(),
      });
    };

    let address = object.address();
    lock(&self.objects)
      .entry(address)
      .or_insert_with(|| Held {
        object: object.clone(),
        holds: 0,
      })
      .holds += 1;
    Ok(LocatorKey::Id(format!("{PREFIX}{}-{address}", self.pid)))
  }

  fn forget_reference(&self, key: &LocatorKey) -> bool {
    let Some((pid, address)) = parse(key) else {
      return false;
    };
    if pid != self.pid {
      return false;
    }

    let mut objects = lock(&self.objects);
    let Some(held) = objects.get_mut(&address) else {
      return false;
    };
    held.holds = held.holds.saturating_sub(1);
    if held.holds == 0 {
      objects.remove(&address);
    }
    true
  }
}

fn parse(key: &LocatorKey) -> Option<(u32, usize)> {
  let rest = key.as_id()?.strip_prefix(PREFIX)?;
  let (pid, address) = rest.split_once('-')?;
  Some((pid.parse().ok()?, address.parse().ok()?))
}
