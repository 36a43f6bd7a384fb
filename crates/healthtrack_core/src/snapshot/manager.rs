//! Snapshot export, restore and listing on top of `StorageEngine`.

use super::document::{
    snapshot_file_name, snapshot_label, snapshot_name_pattern, SnapshotDocument,
    DEFAULT_BACKUP_PREFIX,
};
use super::{SnapshotError, SnapshotResult};
use crate::config::StorageConfig;
use crate::db::StorageEngine;
use crate::model::workout::{now_timestamp, Workout};
use crate::repo::workout_repo::{SqliteWorkoutRepository, WorkoutRepository};
use chrono::{DateTime, Local, NaiveDateTime};
use log::{error, info, warn};
use regex::Regex;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Metadata for one export file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotInfo {
    pub filename: String,
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// File modification time, local wall clock.
    pub created: NaiveDateTime,
}

/// Exports and restores the whole workout table.
///
/// Every call does synchronous file and database I/O on the calling thread.
pub struct SnapshotManager<'e> {
    engine: &'e StorageEngine,
    backup_dir: PathBuf,
    prefix: String,
    name_pattern: Regex,
}

impl<'e> SnapshotManager<'e> {
    /// Creates a manager writing `workouts_backup_*.json` into `backup_dir`.
    ///
    /// # Errors
    /// - `SnapshotError::Write` when the directory cannot be created.
    /// - `SnapshotError::InvalidPrefix` from `with_prefix`.
    pub fn new(engine: &'e StorageEngine, backup_dir: impl Into<PathBuf>) -> SnapshotResult<Self> {
        Self::with_prefix(engine, backup_dir, DEFAULT_BACKUP_PREFIX)
    }

    pub fn from_config(engine: &'e StorageEngine, config: &StorageConfig) -> SnapshotResult<Self> {
        Self::with_prefix(engine, config.backup_dir.clone(), &config.backup_prefix)
    }

    pub fn with_prefix(
        engine: &'e StorageEngine,
        backup_dir: impl Into<PathBuf>,
        prefix: &str,
    ) -> SnapshotResult<Self> {
        if prefix.trim().is_empty() || prefix.contains(['/', '\\']) {
            return Err(SnapshotError::InvalidPrefix(prefix.to_string()));
        }

        let backup_dir = backup_dir.into();
        fs::create_dir_all(&backup_dir).map_err(|err| SnapshotError::Write {
            path: backup_dir.clone(),
            source: Box::new(err),
        })?;

        let name_pattern =
            Regex::new(&snapshot_name_pattern(prefix)).map_err(|err| SnapshotError::Write {
                path: backup_dir.clone(),
                source: Box::new(err),
            })?;

        Ok(Self {
            engine,
            backup_dir,
            prefix: prefix.to_string(),
            name_pattern,
        })
    }

    /// Exports every record using the current local time for the name.
    pub fn backup(&self) -> SnapshotResult<PathBuf> {
        self.backup_at(Local::now().naive_local())
    }

    /// Exports every record, naming the file after `at` (seconds precision).
    ///
    /// An existing export with the same name is replaced. The document is
    /// written to a temp file first and renamed into place.
    pub fn backup_at(&self, at: NaiveDateTime) -> SnapshotResult<PathBuf> {
        let started_at = Instant::now();
        let label = snapshot_label(at);
        let path = self
            .backup_dir
            .join(snapshot_file_name(&self.prefix, &label));

        let workouts = SqliteWorkoutRepository::new(self.engine)
            .list_all_by_id()
            .map_err(SnapshotError::Storage)?;
        let document = SnapshotDocument::new(label, &workouts);

        let result = serde_json::to_vec_pretty(&document)
            .map_err(|err| SnapshotError::Write {
                path: path.clone(),
                source: Box::new(err),
            })
            .and_then(|data| write_replacing(&path, &data));

        match result {
            Ok(()) => {
                info!(
                    "event=snapshot_backup module=snapshot status=ok records={} duration_ms={} path={}",
                    workouts.len(),
                    started_at.elapsed().as_millis(),
                    path.display()
                );
                Ok(path)
            }
            Err(err) => {
                error!(
                    "event=snapshot_backup module=snapshot status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Reads and parses an export file without touching storage.
    pub fn read_snapshot(path: &Path) -> SnapshotResult<SnapshotDocument> {
        let bytes = fs::read(path).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                SnapshotError::NotFound(path.display().to_string())
            } else {
                SnapshotError::Corrupt {
                    path: path.to_path_buf(),
                    source: Box::new(err),
                }
            }
        })?;

        serde_json::from_slice(&bytes).map_err(|err| SnapshotError::Corrupt {
            path: path.to_path_buf(),
            source: Box::new(err),
        })
    }

    /// Inserts every record from `path` with its original id.
    ///
    /// Returns the number of records inserted. Records are validated up
    /// front, so an invalid one fails as `Corrupt` with nothing written.
    /// Existing rows are kept; an id that already exists stops the restore
    /// with a duplicate-key error. Afterwards the identity sequence is moved
    /// past the largest restored id.
    pub fn restore(&self, path: &Path) -> SnapshotResult<usize> {
        let started_at = Instant::now();
        let stamped_at = now_timestamp();
        let workouts = Self::read_snapshot(path)?
            .workouts
            .into_iter()
            .map(|record| record.into_workout(stamped_at))
            .collect::<Vec<_>>();
        check_records(path, &workouts)?;
        let total = workouts.len();

        let repo = SqliteWorkoutRepository::new(self.engine);
        let mut restored = 0usize;
        let mut max_id = 0i64;

        for workout in &workouts {
            if let Err(source) = repo.insert_verbatim(workout) {
                self.sync_sequence(max_id);
                error!(
                    "event=snapshot_restore module=snapshot status=error restored={} total={} failed_id={} error={}",
                    restored, total, workout.id, source
                );
                return Err(SnapshotError::Restore { restored, source });
            }
            restored += 1;
            max_id = max_id.max(workout.id);
        }

        self.engine
            .advance_sequence(max_id)
            .map_err(|err| SnapshotError::Restore {
                restored,
                source: err.into(),
            })?;

        info!(
            "event=snapshot_restore module=snapshot status=ok restored={} duration_ms={} path={}",
            restored,
            started_at.elapsed().as_millis(),
            path.display()
        );
        Ok(restored)
    }

    /// Restores an export identified by its file name in the backup directory.
    ///
    /// # Errors
    /// - `SnapshotError::NotFound` when the name is not an export name or the
    ///   file does not exist.
    pub fn restore_by_name(&self, filename: &str) -> SnapshotResult<usize> {
        let path = self.resolve(filename)?;
        self.restore(&path)
    }

    /// Maps an export file name to its path inside the backup directory.
    pub fn resolve(&self, filename: &str) -> SnapshotResult<PathBuf> {
        if !self.name_pattern.is_match(filename) {
            return Err(SnapshotError::NotFound(filename.to_string()));
        }
        let path = self.backup_dir.join(filename);
        if !path.is_file() {
            return Err(SnapshotError::NotFound(filename.to_string()));
        }
        Ok(path)
    }

    /// Lists export files, newest name first.
    ///
    /// A missing or empty backup directory yields an empty list.
    pub fn list(&self) -> SnapshotResult<Vec<SnapshotInfo>> {
        let list_err = |source| SnapshotError::List {
            path: self.backup_dir.clone(),
            source,
        };

        let entries = match fs::read_dir(&self.backup_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(list_err(err)),
        };

        let mut snapshots = Vec::new();
        for entry in entries {
            let entry = entry.map_err(list_err)?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if !self.name_pattern.is_match(name) {
                continue;
            }

            let metadata = entry.metadata().map_err(list_err)?;
            if !metadata.is_file() {
                continue;
            }
            let modified: DateTime<Local> = metadata.modified().map_err(list_err)?.into();

            snapshots.push(SnapshotInfo {
                filename: name.to_string(),
                path: entry.path(),
                size: metadata.len(),
                created: modified.naive_local(),
            });
        }

        snapshots.sort_by(|a, b| b.filename.cmp(&a.filename));
        Ok(snapshots)
    }

    fn sync_sequence(&self, max_id: i64) {
        if max_id == 0 {
            return;
        }
        if let Err(err) = self.engine.advance_sequence(max_id) {
            warn!(
                "event=sequence_advance module=snapshot status=error max_id={} error={}",
                max_id, err
            );
        }
    }
}

fn check_records(path: &Path, workouts: &[Workout]) -> SnapshotResult<()> {
    for workout in workouts {
        workout.validate().map_err(|err| SnapshotError::Corrupt {
            path: path.to_path_buf(),
            source: format!("record {}: {err}", workout.id).into(),
        })?;
    }
    Ok(())
}

fn write_replacing(path: &Path, data: &[u8]) -> SnapshotResult<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));

    let write_err = |err: std::io::Error| SnapshotError::Write {
        path: path.to_path_buf(),
        source: Box::new(err),
    };

    let written = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&tmp)
        .and_then(|mut file| {
            file.write_all(data)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp, path));

    if let Err(err) = written {
        let _ = fs::remove_file(&tmp);
        return Err(write_err(err));
    }
    Ok(())
}
