//! Runtime configuration.
//!
//! Settings can be built in code with the `with_*` methods, or read from the
//! environment with [`Config::from_env`]:
//!
//! | Variable | Setting |
//! |---|---|
//! | `FIXTURY_STATE_FILE` | [`Config::state_file`] |
//! | `FIXTURY_REFERENCE_TTL` | [`Config::reference_ttl`], in seconds |
//! | `FIXTURY_STRICT_DEPENDENCIES` | [`Config::strict_dependencies`]; `0`, `false` or `no` disable it |

use std::env;
use std::path::PathBuf;

use tracing::warn;

pub const STATE_FILE_ENV: &str = "FIXTURY_STATE_FILE";
pub const REFERENCE_TTL_ENV: &str = "FIXTURY_REFERENCE_TTL";
pub const STRICT_DEPENDENCIES_ENV: &str = "FIXTURY_STRICT_DEPENDENCIES";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
  /// Maximum age of a reference in seconds. `None` keeps references forever.
  pub reference_ttl: Option<u64>,
  /// Reject dependency lookups that were not declared on the definition.
  pub strict_dependencies: bool,
  /// Where references and tracked checksums persist between runs.
  pub state_file: Option<PathBuf>,
  /// Files or directories that define fixtures.
  pub fixture_files: Vec<PathBuf>,
  /// Other files whose changes invalidate persisted references.
  pub dependency_files: Vec<PathBuf>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      reference_ttl: None,
      strict_dependencies: true,
      state_file: None,
      fixture_files: Vec::new(),
      dependency_files: Vec::new(),
    }
  }
}

impl Config {
  pub fn new() -> Self {
    Self::default()
  }

  /// Defaults overridden by the `FIXTURY_*` environment variables.
  ///
  /// Unparseable values are logged and ignored.
  pub fn from_env() -> Self {
    let mut config = Self::default();

    if let Ok(path) = env::var(STATE_FILE_ENV)
      && !path.trim().is_empty()
    {
      config.state_file = Some(PathBuf::from(path));
    }

    if let Ok(ttl) = env::var(REFERENCE_TTL_ENV) {
      match ttl.trim().parse::<u64>() {
        Ok(seconds) => config.reference_ttl = Some(seconds),
        Err(err) => warn!(variable = REFERENCE_TTL_ENV, value = %ttl, error = %err, "ignoring invalid ttl"),
      }
    }

    if let Ok(strict) = env::var(STRICT_DEPENDENCIES_ENV) {
      config.strict_dependencies = !matches!(strict.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no");
    }

    config
  }

  pub fn with_reference_ttl(mut self, seconds: Option<u64>) -> Self {
    self.reference_ttl = seconds;
    self
  }

  pub fn with_strict_dependencies(mut self, strict: bool) -> Self {
    self.strict_dependencies = strict;
    self
  }

  pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> Self {
    self.state_file = Some(path.into());
    self
  }

  pub fn add_fixture_path(mut self, path: impl Into<PathBuf>) -> Self {
    self.fixture_files.push(path.into());
    self
  }

  pub fn add_dependency_path(mut self, path: impl Into<PathBuf>) -> Self {
    self.dependency_files.push(path.into());
    self
  }

  /// Fixture and dependency paths, sorted and without duplicates.
  pub fn tracked_files(&self) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = self
      .fixture_files
      .iter()
      .chain(&self.dependency_files)
      .cloned()
      .collect();
    files.sort();
    files.dedup();
    files
  }
}
