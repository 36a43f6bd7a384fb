//! Domain model for tracked workout entries.
//!
//! # Responsibility
//! - Define canonical data structures used by storage and snapshots.
//!
//! # Invariants
//! - Every record is identified by a sequence-assigned `WorkoutId`.
//! - Deletion is a hard delete; ids are still never reused.

pub mod workout;
