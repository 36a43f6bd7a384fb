//! Workout repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable CRUD APIs over canonical `workouts` storage.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - New ids always come from `StorageEngine::next_id()`.
//! - Write paths call `Workout::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Updates write every column (fixed-shape statement), never a
//!   field-dependent SQL string.

use crate::db::{is_key_collision, DbError, StorageEngine};
use crate::model::workout::{
    now_timestamp, NewWorkout, Workout, WorkoutId, WorkoutPatch, WorkoutType,
    WorkoutValidationError,
};
use chrono::{NaiveDate, NaiveDateTime};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const WORKOUT_SELECT_SQL: &str = "SELECT
    id,
    workout_type,
    date,
    duration_minutes,
    notes,
    created_at
FROM workouts";

const WORKOUTS_DEFAULT_LIMIT: u32 = 100;

/// Fixed-width storage format for `created_at`; sorts lexicographically.
const TIMESTAMP_STORAGE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
const TIMESTAMP_PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const DATE_FORMAT: &str = "%Y-%m-%d";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for workout persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(WorkoutValidationError),
    Db(DbError),
    NotFound(WorkoutId),
    InvalidData(String),
}

impl RepoError {
    /// Returns whether this error is an id collision raised by storage.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::Db(err) if err.is_duplicate_key())
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "workout not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted workout data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<WorkoutValidationError> for RepoError {
    fn from(value: WorkoutValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for listing workouts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkoutListQuery {
    /// Inclusive lower bound on `date`.
    pub start_date: Option<NaiveDate>,
    /// Inclusive upper bound on `date`.
    pub end_date: Option<NaiveDate>,
    /// Maximum rows to return. Defaults to 100.
    pub limit: Option<u32>,
    /// Number of rows to skip.
    pub offset: u32,
}

/// Repository interface for workout CRUD operations.
pub trait WorkoutRepository {
    /// Inserts a new workout with a sequence-assigned id.
    fn create(&self, new_workout: &NewWorkout) -> RepoResult<Workout>;
    /// Inserts a workout keeping its `id` and `created_at` as given.
    ///
    /// Fails with `DbError::DuplicateKey` when the id is taken.
    fn insert_verbatim(&self, workout: &Workout) -> RepoResult<()>;
    fn get(&self, id: WorkoutId) -> RepoResult<Option<Workout>>;
    /// Lists by `date DESC, created_at DESC` with optional date range.
    fn list(&self, query: &WorkoutListQuery) -> RepoResult<Vec<Workout>>;
    /// Every workout ordered by ascending id.
    fn list_all_by_id(&self) -> RepoResult<Vec<Workout>>;
    /// Merges `patch` into the stored row and returns the result.
    fn update(&self, id: WorkoutId, patch: &WorkoutPatch) -> RepoResult<Workout>;
    fn delete(&self, id: WorkoutId) -> RepoResult<()>;
    fn count(&self) -> RepoResult<u64>;
}

/// SQLite-backed workout repository.
pub struct SqliteWorkoutRepository<'e> {
    engine: &'e StorageEngine,
}

impl<'e> SqliteWorkoutRepository<'e> {
    pub fn new(engine: &'e StorageEngine) -> Self {
        Self { engine }
    }

    fn insert_row(&self, workout: &Workout) -> RepoResult<()> {
        workout.validate()?;

        let result = self.engine.execute(
            "INSERT INTO workouts (
                id,
                workout_type,
                date,
                duration_minutes,
                notes,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                workout.id,
                workout.workout_type.as_str(),
                workout.date,
                workout.duration_minutes,
                workout.notes.as_deref(),
                format_timestamp(&workout.created_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(DbError::Sqlite(err)) if is_key_collision(&err) => {
                Err(DbError::DuplicateKey { id: workout.id }.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn select(&self, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Workout>> {
        self.engine
            .query(sql, params_from_iter(bind_values), WorkoutRow::from_row)?
            .into_iter()
            .map(WorkoutRow::into_workout)
            .collect()
    }
}

impl WorkoutRepository for SqliteWorkoutRepository<'_> {
    fn create(&self, new_workout: &NewWorkout) -> RepoResult<Workout> {
        let id = self.engine.next_id()?;
        let workout = new_workout.clone().into_workout(id, now_timestamp());
        self.insert_row(&workout)?;
        debug!("event=workout_create module=repo status=ok id={id}");
        Ok(workout)
    }

    fn insert_verbatim(&self, workout: &Workout) -> RepoResult<()> {
        self.insert_row(workout)
    }

    fn get(&self, id: WorkoutId) -> RepoResult<Option<Workout>> {
        let mut rows = self.select(
            &format!("{WORKOUT_SELECT_SQL} WHERE id = ?1;"),
            vec![Value::Integer(id)],
        )?;
        Ok(rows.pop())
    }

    fn list(&self, query: &WorkoutListQuery) -> RepoResult<Vec<Workout>> {
        let mut sql = format!("{WORKOUT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(start) = query.start_date {
            sql.push_str(" AND date >= ?");
            bind_values.push(Value::Text(start.format(DATE_FORMAT).to_string()));
        }

        if let Some(end) = query.end_date {
            sql.push_str(" AND date <= ?");
            bind_values.push(Value::Text(end.format(DATE_FORMAT).to_string()));
        }

        sql.push_str(" ORDER BY date DESC, created_at DESC LIMIT ? OFFSET ?");
        bind_values.push(Value::Integer(i64::from(
            query.limit.unwrap_or(WORKOUTS_DEFAULT_LIMIT),
        )));
        bind_values.push(Value::Integer(i64::from(query.offset)));

        self.select(&sql, bind_values)
    }

    fn list_all_by_id(&self) -> RepoResult<Vec<Workout>> {
        self.select(&format!("{WORKOUT_SELECT_SQL} ORDER BY id ASC;"), Vec::new())
    }

    fn update(&self, id: WorkoutId, patch: &WorkoutPatch) -> RepoResult<Workout> {
        let mut workout = self.get(id)?.ok_or(RepoError::NotFound(id))?;
        if patch.is_empty() {
            return Ok(workout);
        }

        workout.apply_patch(patch);
        workout.validate()?;

        let changed = self.engine.execute(
            "UPDATE workouts
             SET
                workout_type = ?1,
                date = ?2,
                duration_minutes = ?3,
                notes = ?4
             WHERE id = ?5;",
            params![
                workout.workout_type.as_str(),
                workout.date,
                workout.duration_minutes,
                workout.notes.as_deref(),
                id,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        debug!("event=workout_update module=repo status=ok id={id}");
        Ok(workout)
    }

    fn delete(&self, id: WorkoutId) -> RepoResult<()> {
        let changed = self
            .engine
            .execute("DELETE FROM workouts WHERE id = ?1;", [id])?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        debug!("event=workout_delete module=repo status=ok id={id}");
        Ok(())
    }

    fn count(&self) -> RepoResult<u64> {
        let counts = self
            .engine
            .query("SELECT COUNT(*) FROM workouts;", [], |row| row.get::<_, i64>(0))?;
        Ok(counts.first().copied().unwrap_or(0).max(0) as u64)
    }
}

/// Raw column values before domain parsing.
struct WorkoutRow {
    id: i64,
    workout_type: String,
    date: String,
    duration_minutes: Option<i32>,
    notes: Option<String>,
    created_at: String,
}

impl WorkoutRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            workout_type: row.get("workout_type")?,
            date: row.get("date")?,
            duration_minutes: row.get("duration_minutes")?,
            notes: row.get("notes")?,
            created_at: row.get("created_at")?,
        })
    }

    fn into_workout(self) -> RepoResult<Workout> {
        let workout_type = WorkoutType::parse(&self.workout_type).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid workout type `{}` in workouts.workout_type",
                self.workout_type
            ))
        })?;

        let date = NaiveDate::parse_from_str(&self.date, DATE_FORMAT).map_err(|_| {
            RepoError::InvalidData(format!("invalid date `{}` in workouts.date", self.date))
        })?;

        let created_at = parse_timestamp(&self.created_at).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid timestamp `{}` in workouts.created_at",
                self.created_at
            ))
        })?;

        Ok(Workout {
            id: self.id,
            workout_type,
            date,
            duration_minutes: self.duration_minutes,
            notes: self.notes,
            created_at,
        })
    }
}

fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(TIMESTAMP_STORAGE_FORMAT).to_string()
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_PARSE_FORMAT).ok()
}
