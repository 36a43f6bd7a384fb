//! Workout use-case service.
//!
//! # Responsibility
//! - Provide stable CRUD entry points for the routing layer.
//! - Take a snapshot after every committed mutation.
//!
//! # Invariants
//! - Service APIs never bypass repository validation/persistence contracts.
//! - Reads never write snapshots.
//! - A snapshot failure is reported after the mutation has already committed.

use crate::model::workout::{NewWorkout, Workout, WorkoutId, WorkoutPatch};
use crate::repo::workout_repo::{RepoError, WorkoutListQuery, WorkoutRepository};
use crate::snapshot::{SnapshotError, SnapshotManager};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug)]
pub enum ServiceError {
    Repo(RepoError),
    /// The mutation committed but the follow-up snapshot failed.
    Snapshot(SnapshotError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Snapshot(err) => write!(f, "change saved but snapshot failed: {err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Snapshot(err) => Some(err),
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<SnapshotError> for ServiceError {
    fn from(value: SnapshotError) -> Self {
        Self::Snapshot(value)
    }
}

/// CRUD service that keeps the newest snapshot in step with storage.
pub struct WorkoutService<'e, R: WorkoutRepository> {
    repo: R,
    snapshots: SnapshotManager<'e>,
}

impl<'e, R: WorkoutRepository> WorkoutService<'e, R> {
    pub fn new(repo: R, snapshots: SnapshotManager<'e>) -> Self {
        Self { repo, snapshots }
    }

    pub fn snapshots(&self) -> &SnapshotManager<'e> {
        &self.snapshots
    }

    /// Creates a workout and snapshots the dataset.
    pub fn create(&self, new_workout: &NewWorkout) -> ServiceResult<Workout> {
        let workout = self.repo.create(new_workout)?;
        self.snapshots.backup()?;
        Ok(workout)
    }

    pub fn get(&self, id: WorkoutId) -> ServiceResult<Workout> {
        Ok(self.repo.get(id)?.ok_or(RepoError::NotFound(id))?)
    }

    pub fn list(&self, query: &WorkoutListQuery) -> ServiceResult<Vec<Workout>> {
        Ok(self.repo.list(query)?)
    }

    /// Applies a partial update. An empty patch returns the stored record
    /// and does not snapshot.
    pub fn update(&self, id: WorkoutId, patch: &WorkoutPatch) -> ServiceResult<Workout> {
        let workout = self.repo.update(id, patch)?;
        if !patch.is_empty() {
            self.snapshots.backup()?;
        }
        Ok(workout)
    }

    /// Deletes a workout and snapshots the dataset.
    pub fn delete(&self, id: WorkoutId) -> ServiceResult<()> {
        self.repo.delete(id)?;
        self.snapshots.backup()?;
        Ok(())
    }

    /// Snapshot taken once storage is connected at process start.
    pub fn startup_backup(&self) -> ServiceResult<PathBuf> {
        self.lifecycle_backup("startup_backup")
    }

    /// Snapshot taken before storage is closed at process exit.
    pub fn shutdown_backup(&self) -> ServiceResult<PathBuf> {
        self.lifecycle_backup("shutdown_backup")
    }

    fn lifecycle_backup(&self, event: &str) -> ServiceResult<PathBuf> {
        let path = self.snapshots.backup()?;
        info!(
            "event={} module=service status=ok path={}",
            event,
            path.display()
        );
        Ok(path)
    }
}
