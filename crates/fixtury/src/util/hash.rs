//! Checksums for tracked fixture and dependency files.
//!
//! A tracked path may be a file or a directory. Directories hash to a
//! deterministic digest of their relative paths and file contents, so adding,
//! removing or editing any file below them changes the checksum.

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use walkdir::WalkDir;

/// A 64-character lowercase hex SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(pub String);

impl std::fmt::Display for Checksum {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(Debug, Error)]
pub enum HashError {
  #[error("failed to walk directory {path}: {message}")]
  WalkDir { path: String, message: String },

  #[error("failed to read file {path}: {source}")]
  ReadFile {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("tracked path {0} does not exist")]
  Missing(String),
}

/// Checksum a tracked path, dispatching on whether it is a file or a directory.
pub fn hash_path(path: &Path) -> Result<Checksum, HashError> {
  if path.is_dir() {
    hash_directory(path)
  } else if path.is_file() {
    hash_file(path)
  } else {
    Err(HashError::Missing(path.display().to_string()))
  }
}

/// Hash a file's contents.
pub fn hash_file(path: &Path) -> Result<Checksum, HashError> {
  let read_error = |source| HashError::ReadFile {
    path: path.display().to_string(),
    source,
  };

  let mut file = fs::File::open(path).map_err(read_error)?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];
  loop {
    let read = file.read(&mut buffer).map_err(read_error)?;
    if read == 0 {
      break;
    }
    hasher.update(&buffer[..read]);
  }

  Ok(Checksum(hex::encode(hasher.finalize())))
}

/// Hash every regular file below `path`, in sorted order.
///
/// Each entry contributes its relative path and content digest. Directories
/// contribute their relative path so empty directories are noticed too.
pub fn hash_directory(path: &Path) -> Result<Checksum, HashError> {
  let mut lines: Vec<String> = Vec::new();

  for entry in WalkDir::new(path).sort_by_file_name() {
    let entry = entry.map_err(|err| HashError::WalkDir {
      path: path.display().to_string(),
      message: err.to_string(),
    })?;

    let relative = entry
      .path()
      .strip_prefix(path)
      .unwrap_or(entry.path())
      .to_string_lossy()
      .replace('\\', "/");
    if relative.is_empty() {
      continue;
    }

    let file_type = entry.file_type();
    if file_type.is_file() {
      lines.push(format!("F:{relative}:{}", hash_file(entry.path())?));
    } else if file_type.is_dir() {
      lines.push(format!("D:{relative}"));
    }
  }
  lines.sort();

  Ok(hash_bytes(lines.join("\n").as_bytes()))
}

pub fn hash_bytes(data: &[u8]) -> Checksum {
  Checksum(hex::encode(Sha256::digest(data)))
}
