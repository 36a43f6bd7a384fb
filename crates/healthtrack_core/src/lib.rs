//! Persistence and snapshot core for the health tracker backend.
//! This crate owns record identity, durability and disaster-recovery exports.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod snapshot;

pub use config::{ConfigError, StorageConfig};
pub use db::{ConnectionState, DbError, DbResult, StorageEngine};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::workout::{
    NewWorkout, Workout, WorkoutId, WorkoutPatch, WorkoutType, WorkoutValidationError,
};
pub use repo::workout_repo::{
    RepoError, RepoResult, SqliteWorkoutRepository, WorkoutListQuery, WorkoutRepository,
};
pub use service::workout_service::{ServiceError, ServiceResult, WorkoutService};
pub use snapshot::{
    SnapshotDocument, SnapshotError, SnapshotInfo, SnapshotManager, SnapshotRecord,
    SnapshotResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
