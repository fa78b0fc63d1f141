//! Change events flowing from watchers to the indexer.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// What happened to the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
  Created,
  Modified,
  Deleted,
  /// The file moved; `from` is its previous path.
  Renamed { from: PathBuf },
}

/// One observed filesystem change.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
  /// Current path of the file (the new path for renames).
  pub path: PathBuf,
  pub kind: ChangeKind,
  pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
  pub fn created(path: PathBuf) -> Self {
    Self::new(path, ChangeKind::Created)
  }

  pub fn modified(path: PathBuf) -> Self {
    Self::new(path, ChangeKind::Modified)
  }

  pub fn deleted(path: PathBuf) -> Self {
    Self::new(path, ChangeKind::Deleted)
  }

  pub fn renamed(from: PathBuf, to: PathBuf) -> Self {
    Self::new(to, ChangeKind::Renamed { from })
  }

  fn new(path: PathBuf, kind: ChangeKind) -> Self {
    Self {
      path,
      kind,
      timestamp: Utc::now(),
    }
  }
}
