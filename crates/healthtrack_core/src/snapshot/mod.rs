//! Whole-dataset JSON snapshots for disaster recovery.
//!
//! # Responsibility
//! - Export every workout to a timestamped JSON file.
//! - Restore workouts from a chosen export, keeping their original ids.
//! - Enumerate available exports newest first.
//!
//! # Invariants
//! - Exports list records in ascending id order.
//! - File names carry the export time at second granularity; a second export
//!   in the same second replaces the first.
//! - Restore validates every record before inserting any; an invalid record
//!   makes the whole file corrupt.
//! - Restore is additive and stops at the first failing insert; rows inserted
//!   before the failure stay committed and are counted in the error.
//!
//! All operations are blocking file and database I/O proportional to the
//! number of records.

use crate::repo::workout_repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod document;
mod manager;

pub use document::{
    snapshot_file_name, snapshot_label, snapshot_name_pattern, SnapshotDocument, SnapshotRecord,
    DEFAULT_BACKUP_PREFIX, LABEL_FORMAT,
};
pub use manager::{SnapshotInfo, SnapshotManager};

pub type SnapshotResult<T> = Result<T, SnapshotError>;

type BoxedCause = Box<dyn Error + Send + Sync + 'static>;

#[derive(Debug)]
pub enum SnapshotError {
    /// The export file or backup directory could not be written.
    Write { path: PathBuf, source: BoxedCause },
    /// The export file is unreadable or not a valid snapshot document.
    Corrupt { path: PathBuf, source: BoxedCause },
    /// The referenced export file does not exist.
    NotFound(String),
    /// The file-name prefix is empty or contains a path separator.
    InvalidPrefix(String),
    /// The backup directory could not be enumerated.
    List {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Records could not be read for export.
    Storage(RepoError),
    /// Restore stopped at a failing row after `restored` rows were committed.
    Restore { restored: usize, source: RepoError },
}

impl SnapshotError {
    /// Rows committed before the failure; zero for non-restore errors.
    pub fn restored_count(&self) -> usize {
        match self {
            Self::Restore { restored, .. } => *restored,
            _ => 0,
        }
    }

    /// Returns whether a restore stopped on an id collision.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::Restore { source, .. } if source.is_duplicate_key())
    }
}

impl Display for SnapshotError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Write { path, source } => {
                write!(f, "failed to write snapshot `{}`: {source}", path.display())
            }
            Self::Corrupt { path, source } => {
                write!(f, "snapshot `{}` is corrupt: {source}", path.display())
            }
            Self::NotFound(name) => write!(f, "snapshot not found: {name}"),
            Self::InvalidPrefix(prefix) => write!(
                f,
                "snapshot prefix `{prefix}` must be non-empty and free of path separators"
            ),
            Self::List { path, source } => write!(
                f,
                "failed to list snapshots in `{}`: {source}",
                path.display()
            ),
            Self::Storage(err) => write!(f, "failed to read records for snapshot: {err}"),
            Self::Restore { restored, source } => write!(
                f,
                "restore stopped after {restored} record(s): {source}"
            ),
        }
    }
}

impl Error for SnapshotError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Write { source, .. } | Self::Corrupt { source, .. } => Some(source.as_ref()),
            Self::NotFound(_) | Self::InvalidPrefix(_) => None,
            Self::List { source, .. } => Some(source),
            Self::Storage(err) | Self::Restore { source: err, .. } => Some(err),
        }
    }
}
