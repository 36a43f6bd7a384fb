//! Workout domain model.
//!
//! # Responsibility
//! - Define the canonical workout record and its closed type vocabulary.
//! - Model partial updates as an explicit patch value with per-field presence.
//!
//! # Invariants
//! - `id` is assigned by the storage sequence and never reused.
//! - `created_at` is stamped by storage at insert time, never by callers.
//! - `duration_minutes`, when set, is never negative.

use chrono::{NaiveDate, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable identifier drawn from the storage identity sequence.
pub type WorkoutId = i64;

/// Closed set of workout categories accepted by storage.
///
/// Serialized with the human-facing spelling (`"Kettlebell Training"`), which
/// is also the stored column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkoutType {
    Yoga,
    Running,
    Hiking,
    Powerlifting,
    #[serde(rename = "Kettlebell Training")]
    KettlebellTraining,
    Golf,
}

impl WorkoutType {
    pub const ALL: [WorkoutType; 6] = [
        WorkoutType::Yoga,
        WorkoutType::Running,
        WorkoutType::Hiking,
        WorkoutType::Powerlifting,
        WorkoutType::KettlebellTraining,
        WorkoutType::Golf,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yoga => "Yoga",
            Self::Running => "Running",
            Self::Hiking => "Hiking",
            Self::Powerlifting => "Powerlifting",
            Self::KettlebellTraining => "Kettlebell Training",
            Self::Golf => "Golf",
        }
    }

    /// Parses the canonical spelling. Matching is exact.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

impl Display for WorkoutType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation failures for workout write paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkoutValidationError {
    NegativeDuration(i32),
}

impl Display for WorkoutValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NegativeDuration(value) => {
                write!(f, "duration_minutes must be >= 0, got {value}")
            }
        }
    }
}

impl Error for WorkoutValidationError {}

/// Persisted workout record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workout {
    pub id: WorkoutId,
    pub workout_type: WorkoutType,
    pub date: NaiveDate,
    pub duration_minutes: Option<i32>,
    pub notes: Option<String>,
    /// UTC, microsecond precision.
    pub created_at: NaiveDateTime,
}

impl Workout {
    /// Checks write-path invariants.
    pub fn validate(&self) -> Result<(), WorkoutValidationError> {
        validate_duration(self.duration_minutes)
    }

    /// Merges a patch into this record.
    ///
    /// Every field is handled the same way regardless of which ones are
    /// present: absent fields keep their value, present ones overwrite it.
    /// `id` and `created_at` are not patchable.
    pub fn apply_patch(&mut self, patch: &WorkoutPatch) {
        if let Some(kind) = patch.workout_type {
            self.workout_type = kind;
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(duration) = patch.duration_minutes {
            self.duration_minutes = duration;
        }
        if let Some(notes) = &patch.notes {
            self.notes = normalize_notes(notes.clone());
        }
    }
}

/// Insert request; id and `created_at` are assigned by storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWorkout {
    pub workout_type: WorkoutType,
    pub date: NaiveDate,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewWorkout {
    pub fn new(workout_type: WorkoutType, date: NaiveDate) -> Self {
        Self {
            workout_type,
            date,
            duration_minutes: None,
            notes: None,
        }
    }

    pub fn with_duration(mut self, minutes: i32) -> Self {
        self.duration_minutes = Some(minutes);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Builds the stored record once storage has picked identity and timestamp.
    pub fn into_workout(self, id: WorkoutId, created_at: NaiveDateTime) -> Workout {
        Workout {
            id,
            workout_type: self.workout_type,
            date: self.date,
            duration_minutes: self.duration_minutes,
            notes: normalize_notes(self.notes),
            created_at,
        }
    }
}

/// Partial update with one presence flag per field.
///
/// Required fields use `Option<T>`; nullable fields use `Option<Option<T>>`
/// where `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkoutPatch {
    pub workout_type: Option<WorkoutType>,
    pub date: Option<NaiveDate>,
    pub duration_minutes: Option<Option<i32>>,
    pub notes: Option<Option<String>>,
}

impl WorkoutPatch {
    /// Returns whether the patch would leave every field untouched.
    pub fn is_empty(&self) -> bool {
        self.workout_type.is_none()
            && self.date.is_none()
            && self.duration_minutes.is_none()
            && self.notes.is_none()
    }
}

/// Current UTC time truncated to the precision storage round-trips.
pub fn now_timestamp() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(6)
}

fn validate_duration(duration: Option<i32>) -> Result<(), WorkoutValidationError> {
    match duration {
        Some(value) if value < 0 => Err(WorkoutValidationError::NegativeDuration(value)),
        _ => Ok(()),
    }
}

fn normalize_notes(notes: Option<String>) -> Option<String> {
    notes.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
