//! On-disk snapshot document and file naming.
//!
//! # Invariants
//! - `workouts` is written in ascending id order.
//! - Dates serialize as `YYYY-MM-DD`, timestamps as ISO-8601 without offset.
//! - A missing or `null` `workouts` field reads as an empty list.

use crate::model::workout::{Workout, WorkoutId, WorkoutType};
use chrono::{NaiveDate, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Deserializer, Serialize};

/// File-name prefix used when none is configured.
pub const DEFAULT_BACKUP_PREFIX: &str = "workouts_backup";

/// Label and file-name timestamp format, second granularity.
pub const LABEL_FORMAT: &str = "%Y%m%d_%H%M%S";

const SNAPSHOT_EXTENSION: &str = "json";

/// Whole-dataset export document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    #[serde(default)]
    pub backup_timestamp: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub workouts: Vec<SnapshotRecord>,
}

impl SnapshotDocument {
    /// Builds a document from records already sorted by id.
    pub fn new(label: impl Into<String>, workouts: &[Workout]) -> Self {
        Self {
            backup_timestamp: label.into(),
            workouts: workouts.iter().map(SnapshotRecord::from).collect(),
        }
    }

    pub fn ids(&self) -> Vec<WorkoutId> {
        self.workouts.iter().map(|record| record.id).collect()
    }
}

/// One exported workout.
///
/// `created_at` is optional on read so hand-edited files still restore; the
/// restore path stamps missing values with the current time. Storage keeps
/// microseconds, so finer `created_at` values are truncated on restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub id: WorkoutId,
    pub workout_type: WorkoutType,
    pub date: NaiveDate,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

impl SnapshotRecord {
    pub fn into_workout(self, fallback_created_at: NaiveDateTime) -> Workout {
        Workout {
            id: self.id,
            workout_type: self.workout_type,
            date: self.date,
            duration_minutes: self.duration_minutes,
            notes: self.notes,
            created_at: self
                .created_at
                .map(|value| value.trunc_subsecs(6))
                .unwrap_or(fallback_created_at),
        }
    }
}

impl From<&Workout> for SnapshotRecord {
    fn from(workout: &Workout) -> Self {
        Self {
            id: workout.id,
            workout_type: workout.workout_type,
            date: workout.date,
            duration_minutes: workout.duration_minutes,
            notes: workout.notes.clone(),
            created_at: Some(workout.created_at),
        }
    }
}

/// Formats the snapshot label for a wall-clock instant (sub-seconds dropped).
pub fn snapshot_label(at: NaiveDateTime) -> String {
    at.format(LABEL_FORMAT).to_string()
}

/// Returns `<prefix>_<label>.json`.
pub fn snapshot_file_name(prefix: &str, label: &str) -> String {
    format!("{prefix}_{label}.{SNAPSHOT_EXTENSION}")
}

/// Regex source matching export file names for `prefix`.
pub fn snapshot_name_pattern(prefix: &str) -> String {
    format!(
        r"^{}_\d{{8}}_\d{{6}}\.{SNAPSHOT_EXTENSION}$",
        regex::escape(prefix)
    )
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<SnapshotRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<SnapshotRecord>>::deserialize(deserializer)?.unwrap_or_default())
}
