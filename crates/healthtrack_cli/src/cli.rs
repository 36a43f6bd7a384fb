use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use healthtrack_core::WorkoutType;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "healthtrack")]
#[command(about = "Workout storage and snapshot maintenance")]
#[command(version)]
pub struct Cli {
    /// SQLite data file (overrides DB_PATH)
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Snapshot directory (overrides BACKUP_PATH)
    #[arg(long, global = true)]
    pub backup_dir: Option<PathBuf>,

    /// Absolute directory for rolling log files; logging is off when omitted
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create, list and restore JSON snapshots
    #[command(subcommand)]
    Backup(BackupCommand),

    /// Record CRUD
    #[command(subcommand)]
    Workout(WorkoutCommand),
}

#[derive(Subcommand)]
pub enum BackupCommand {
    /// Export every workout to a new snapshot file
    Create,

    /// List snapshot files, newest first
    List,

    /// Insert the workouts of a snapshot file into storage
    Restore {
        /// Snapshot file name inside the backup directory
        filename: String,
    },
}

#[derive(Subcommand)]
pub enum WorkoutCommand {
    /// Record a workout
    Add(AddArgs),

    /// Show one workout
    Get { id: i64 },

    /// List workouts, newest date first
    List(ListArgs),

    /// Change selected fields of a workout
    Update(UpdateArgs),

    /// Delete a workout
    Delete { id: i64 },
}

#[derive(Args)]
pub struct AddArgs {
    #[arg(long = "type", value_parser = parse_workout_type)]
    pub workout_type: WorkoutType,

    /// YYYY-MM-DD
    #[arg(long)]
    pub date: NaiveDate,

    /// Minutes
    #[arg(long)]
    pub duration: Option<i32>,

    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Args)]
pub struct ListArgs {
    /// Inclusive lower date bound
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Inclusive upper date bound
    #[arg(long)]
    pub end: Option<NaiveDate>,

    #[arg(long, default_value_t = 100)]
    pub limit: u32,

    #[arg(long, default_value_t = 0)]
    pub offset: u32,
}

#[derive(Args)]
pub struct UpdateArgs {
    pub id: i64,

    #[arg(long = "type", value_parser = parse_workout_type)]
    pub workout_type: Option<WorkoutType>,

    #[arg(long)]
    pub date: Option<NaiveDate>,

    #[arg(long, conflicts_with = "clear_duration")]
    pub duration: Option<i32>,

    /// Remove the stored duration
    #[arg(long, default_value_t = false)]
    pub clear_duration: bool,

    #[arg(long, conflicts_with = "clear_notes")]
    pub notes: Option<String>,

    /// Remove the stored notes
    #[arg(long, default_value_t = false)]
    pub clear_notes: bool,
}

fn parse_workout_type(value: &str) -> Result<WorkoutType, String> {
    WorkoutType::parse(value.trim()).ok_or_else(|| {
        let allowed = WorkoutType::ALL
            .iter()
            .map(|kind| kind.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        format!("unknown workout type `{value}`; expected one of: {allowed}")
    })
}
