use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of "now" for reference timestamps, in unix seconds.
pub trait Clock: Send + Sync {
  fn now(&self) -> u64;
}

/// Wall clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> u64 {
    SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .map(|elapsed| elapsed.as_secs())
      .unwrap_or_default()
  }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
  now: Arc<AtomicU64>,
}

impl ManualClock {
  pub fn new(start: u64) -> Self {
    Self {
      now: Arc::new(AtomicU64::new(start)),
    }
  }

  pub fn set(&self, now: u64) {
    self.now.store(now, Ordering::SeqCst);
  }

  pub fn advance(&self, seconds: u64) {
    self.now.fetch_add(seconds, Ordering::SeqCst);
  }
}

impl Clock for ManualClock {
  fn now(&self) -> u64 {
    self.now.load(Ordering::SeqCst)
  }
}
