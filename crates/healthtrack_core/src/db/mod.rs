//! Embedded SQLite storage engine and schema migration entry points.
//!
//! # Responsibility
//! - Own the single connection to the workout data file.
//! - Bootstrap schema and the identity sequence before any data access.
//! - Execute parameterized statements and classify their failures.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Core code must not read/write application data before migrations succeed.
//! - Identity values are handed out by the persisted sequence only.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod engine;
pub mod migrations;

pub use engine::{ConnectionState, StorageEngine, WORKOUT_SEQUENCE};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    /// The data file (or its parent directory) could not be created or opened.
    Unavailable {
        path: PathBuf,
        source: Box<dyn Error + Send + Sync + 'static>,
    },
    /// A statement was issued while the engine is closed.
    Closed,
    /// A statement failed on an open connection.
    Sqlite(rusqlite::Error),
    /// An insert collided with an existing record id.
    DuplicateKey { id: i64 },
    /// The identity sequence has already handed out `i64::MAX`.
    SequenceExhausted { sequence: &'static str },
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl DbError {
    /// Returns whether this error is a record-id collision.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable { path, source } => {
                write!(f, "storage unavailable at `{}`: {source}", path.display())
            }
            Self::Closed => write!(f, "storage connection is closed"),
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::DuplicateKey { id } => write!(f, "record id {id} already exists"),
            Self::SequenceExhausted { sequence } => {
                write!(f, "identity sequence `{sequence}` has no ids left")
            }
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Unavailable { source, .. } => Some(source.as_ref()),
            Self::Sqlite(err) => Some(err),
            Self::Closed
            | Self::DuplicateKey { .. }
            | Self::SequenceExhausted { .. }
            | Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Returns whether a SQLite failure is a primary-key/unique collision.
pub(crate) fn is_key_collision(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => matches!(
            failure.extended_code,
            rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        ),
        _ => false,
    }
}
