//! Single-connection storage engine.
//!
//! # Responsibility
//! - Open the data file (or an in-memory database) on demand.
//! - Configure connection pragmas and apply migrations before first use.
//! - Hand out identity values from the persisted sequence.
//!
//! # Invariants
//! - The engine is either `Closed` or `Open`; `connect`/`close` are idempotent.
//! - Open connections have `foreign_keys=ON` and migrations fully applied.
//! - Sequence values are strictly increasing and survive reopen.
//! - No internal locking: `connect`/`close` need `&mut self`, so the borrow
//!   checker rules out closing while a repository still holds the engine.

use super::migrations::{apply_migrations, current_user_version};
use super::{DbError, DbResult};
use log::{debug, error, info};
use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Name of the identity sequence backing `workouts.id`.
pub const WORKOUT_SEQUENCE: &str = "workouts";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Open,
}

#[derive(Debug, Clone)]
enum Target {
    File(PathBuf),
    Memory,
}

/// Owner of the one SQLite connection used by the process.
///
/// Construct explicitly and lend it to repositories and the snapshot
/// manager; there is no global instance.
#[derive(Debug)]
pub struct StorageEngine {
    target: Target,
    conn: Option<Connection>,
}

impl StorageEngine {
    /// Creates a closed engine bound to a data file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            target: Target::File(path.into()),
            conn: None,
        }
    }

    /// Creates a closed engine backed by a private in-memory database.
    ///
    /// Closing an in-memory engine discards its data.
    pub fn in_memory() -> Self {
        Self {
            target: Target::Memory,
            conn: None,
        }
    }

    /// Creates an engine for `path` and connects it.
    pub fn open(path: impl Into<PathBuf>) -> DbResult<Self> {
        let mut engine = Self::new(path);
        engine.connect()?;
        Ok(engine)
    }

    /// Creates an in-memory engine and connects it.
    pub fn open_in_memory() -> DbResult<Self> {
        let mut engine = Self::in_memory();
        engine.connect()?;
        Ok(engine)
    }

    /// Data file path, `None` for in-memory engines.
    pub fn path(&self) -> Option<&Path> {
        match &self.target {
            Target::File(path) => Some(path.as_path()),
            Target::Memory => None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.conn.is_some() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    /// Opens the connection if it is not open yet.
    ///
    /// # Side effects
    /// - Creates the parent directory of the data file when missing.
    /// - Creates the record table and identity sequence on first open.
    /// - Emits `db_open` logging events with duration and status.
    ///
    /// # Errors
    /// - `DbError::Unavailable` when the directory or file cannot be opened.
    /// - `DbError::UnsupportedSchemaVersion` for files written by newer builds.
    pub fn connect(&mut self) -> DbResult<()> {
        if self.conn.is_some() {
            return Ok(());
        }

        let started_at = Instant::now();
        let mode = self.mode();
        info!("event=db_open module=db status=start mode={mode}");

        let mut conn = match self.open_connection() {
            Ok(conn) => conn,
            Err(err) => {
                error!(
                    "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                    mode,
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }
        };

        if let Err(err) = bootstrap_connection(&mut conn) {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err);
        }

        info!(
            "event=db_open module=db status=ok mode={} duration_ms={}",
            mode,
            started_at.elapsed().as_millis()
        );
        self.conn = Some(conn);
        Ok(())
    }

    /// Releases the connection. A no-op when already closed.
    ///
    /// If SQLite refuses to close (for example because of an unfinalized
    /// statement), the connection is kept and the engine stays `Open`.
    pub fn close(&mut self) -> DbResult<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };

        match conn.close() {
            Ok(()) => {
                info!("event=db_close module=db status=ok mode={}", self.mode());
                Ok(())
            }
            Err((conn, err)) => {
                error!(
                    "event=db_close module=db status=error mode={} error={}",
                    self.mode(),
                    err
                );
                self.conn = Some(conn);
                Err(err.into())
            }
        }
    }

    /// Borrows the open connection.
    ///
    /// # Errors
    /// - `DbError::Closed` when `connect` has not been called.
    pub fn connection(&self) -> DbResult<&Connection> {
        self.conn.as_ref().ok_or(DbError::Closed)
    }

    /// Runs one parameterized write statement and returns affected rows.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> DbResult<usize> {
        let changed = self.connection()?.execute(sql, params)?;
        Ok(changed)
    }

    /// Runs one parameterized read and maps every returned row.
    pub fn query<T, P, F>(&self, sql: &str, params: P, map: F) -> DbResult<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, map)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Returns the next record id.
    ///
    /// The sequence row is bumped in place, so values are never handed out
    /// twice even when the record holding the largest id is deleted.
    ///
    /// # Errors
    /// - `DbError::SequenceExhausted` once `i64::MAX` has been handed out.
    pub fn next_id(&self) -> DbResult<i64> {
        let id = self
            .connection()?
            .query_row(
                "UPDATE id_sequences
                 SET last_value = last_value + 1
                 WHERE name = ?1 AND last_value < ?2
                 RETURNING last_value;",
                params![WORKOUT_SEQUENCE, i64::MAX],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;

        let Some(id) = id else {
            error!("event=sequence_next module=db status=error error_code=sequence_exhausted");
            return Err(DbError::SequenceExhausted {
                sequence: WORKOUT_SEQUENCE,
            });
        };
        debug!("event=sequence_next module=db status=ok id={id}");
        Ok(id)
    }

    /// Moves the sequence forward so the next id is greater than `at_least`.
    ///
    /// Never moves it backwards.
    pub fn advance_sequence(&self, at_least: i64) -> DbResult<()> {
        self.execute(
            "UPDATE id_sequences
             SET last_value = MAX(last_value, ?2)
             WHERE name = ?1;",
            params![WORKOUT_SEQUENCE, at_least],
        )?;
        Ok(())
    }

    /// Returns the last id handed out (0 when none has been).
    pub fn last_issued_id(&self) -> DbResult<i64> {
        let value = self.connection()?.query_row(
            "SELECT last_value FROM id_sequences WHERE name = ?1;",
            [WORKOUT_SEQUENCE],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(value)
    }

    /// Returns the applied schema version.
    pub fn schema_version(&self) -> DbResult<u32> {
        current_user_version(self.connection()?)
    }

    fn mode(&self) -> &'static str {
        match self.target {
            Target::File(_) => "file",
            Target::Memory => "memory",
        }
    }

    fn open_connection(&self) -> DbResult<Connection> {
        match &self.target {
            Target::Memory => Connection::open_in_memory().map_err(|err| DbError::Unavailable {
                path: PathBuf::from(":memory:"),
                source: Box::new(err),
            }),
            Target::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|err| DbError::Unavailable {
                        path: path.clone(),
                        source: Box::new(err),
                    })?;
                }
                Connection::open(path).map_err(|err| DbError::Unavailable {
                    path: path.clone(),
                    source: Box::new(err),
                })
            }
        }
    }
}

fn bootstrap_connection(conn: &mut Connection) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn)?;
    Ok(())
}
