//! Persisted fixture state.
//!
//! Between test runs the references a store built are written to a state file
//! together with checksums of the files that define fixtures. A later run can
//! pick the references up again as long as none of those files changed.
//!
//! # Example State File
//!
//! ```json
//! {
//!   "dependencies": {
//!     "tests/fixtures/countries.rs": "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
//!   },
//!   "references": {
//!     "/countries/usa": {
//!       "locator_key": "gid://app/Country/1",
//!       "created_at": 1700000000
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::store::{Reference, StoredReference};
use crate::util::hash::{self, Checksum, HashError};

#[derive(Debug, Error)]
pub enum StateError {
  #[error("failed to read state file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write state file {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to create state directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse state file {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to serialize state: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("failed to remove state file {path}: {source}")]
  Remove {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Checksum(#[from] HashError),
}

/// Contents of the state file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
  /// Tracked path to checksum.
  #[serde(default)]
  pub dependencies: BTreeMap<String, Checksum>,
  /// Pathname to stored reference.
  #[serde(default)]
  pub references: BTreeMap<String, StoredReference>,
}

impl StateFile {
  /// Load the state file. `Ok(None)` when it does not exist.
  pub fn load(path: &Path) -> Result<Option<Self>, StateError> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(err) if err.kind() == io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "state file not found");
        return Ok(None);
      }
      Err(source) => {
        return Err(StateError::Read {
          path: path.to_path_buf(),
          source,
        });
      }
    };

    let state: StateFile = serde_json::from_str(&content).map_err(|source| StateError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    debug!(
      path = %path.display(),
      dependencies = state.dependencies.len(),
      references = state.references.len(),
      "loaded state file"
    );
    Ok(Some(state))
  }

  /// Write the state file atomically, creating parent directories.
  pub fn save(&self, path: &Path) -> Result<(), StateError> {
    if let Some(dir) = path.parent()
      && !dir.as_os_str().is_empty()
    {
      fs::create_dir_all(dir).map_err(|source| StateError::CreateDir {
        path: dir.to_path_buf(),
        source,
      })?;
    }

    let content = serde_json::to_string_pretty(self).map_err(StateError::Serialize)?;

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);
    let write_error = |source| StateError::Write {
      path: path.to_path_buf(),
      source,
    };
    fs::write(&temp_path, content).map_err(write_error)?;
    fs::rename(&temp_path, path).map_err(write_error)?;

    info!(
      path = %path.display(),
      references = self.references.len(),
      "state file saved"
    );
    Ok(())
  }

  /// Delete the state file. Succeeds when it is already gone.
  pub fn remove(path: &Path) -> Result<(), StateError> {
    match fs::remove_file(path) {
      Ok(()) => {
        info!(path = %path.display(), "state file removed");
        Ok(())
      }
      Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
      Err(source) => Err(StateError::Remove {
        path: path.to_path_buf(),
        source,
      }),
    }
  }

  /// Store the real references; holders are skipped.
  pub fn set_references<'a>(&mut self, references: impl IntoIterator<Item = &'a Reference>) {
    self.references = references
      .into_iter()
      .filter(|reference| reference.is_real())
      .map(|reference| (reference.name().to_string(), reference.to_stored()))
      .collect();
  }

  /// The stored references as live [`Reference`]s.
  pub fn references(&self) -> Vec<Reference> {
    self
      .references
      .iter()
      .map(|(name, stored)| Reference::from_stored(name, stored.clone()))
      .collect()
  }

  /// Whether the checksums of `paths` differ from the recorded ones.
  ///
  /// Adding or removing a tracked path counts as a change.
  pub fn dependencies_changed(&self, paths: &[PathBuf]) -> Result<bool, StateError> {
    let current = checksums(paths)?;
    let changed = current != self.dependencies;
    if changed {
      for (path, checksum) in &current {
        if self.dependencies.get(path) != Some(checksum) {
          debug!(path = %path, "tracked file changed");
        }
      }
    }
    Ok(changed)
  }
}

/// Checksums of the given tracked paths keyed by their display path.
pub fn checksums(paths: &[PathBuf]) -> Result<BTreeMap<String, Checksum>, StateError> {
  let mut out = BTreeMap::new();
  for path in paths {
    out.insert(path.display().to_string(), hash::hash_path(path)?);
  }
  Ok(out)
}
