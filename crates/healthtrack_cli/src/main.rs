//! Command line front end for the health tracker storage core.
//!
//! # Responsibility
//! - Map subcommands onto storage and snapshot calls.
//! - Print results as JSON on stdout, errors on stderr.

mod cli;

use clap::Parser;
use cli::{BackupCommand, Cli, Command, UpdateArgs, WorkoutCommand};
use healthtrack_core::{
    default_log_level, init_logging, NewWorkout, SnapshotError, SnapshotManager,
    SqliteWorkoutRepository, StorageConfig, StorageEngine, WorkoutListQuery, WorkoutPatch,
    WorkoutService,
};
use log::info;
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::path::Path;
use std::process::ExitCode;

const DOTENV_FILE: &str = ".env";

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = resolve_config(&cli)?;

    if let Some(log_dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir)?;
    }

    let mut engine = StorageEngine::open(&config.db_path)?;
    let result = dispatch(&cli.command, &engine, &config);
    engine.close()?;
    result
}

fn resolve_config(cli: &Cli) -> Result<StorageConfig, Box<dyn Error>> {
    let file_values = read_dotenv(Path::new(DOTENV_FILE))?;
    let mut config =
        StorageConfig::from_lookup(layered_lookup(|key| std::env::var(key).ok(), &file_values))?;
    if let Some(db_path) = &cli.db_path {
        config.db_path = db_path.clone();
    }
    if let Some(backup_dir) = &cli.backup_dir {
        config.backup_dir = backup_dir.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Reads `KEY=value` pairs from `path`; a missing file yields no values.
fn read_dotenv(path: &Path) -> Result<HashMap<String, String>, dotenvy::Error> {
    match dotenvy::from_path_iter(path) {
        Ok(pairs) => pairs.collect(),
        Err(err) if err.not_found() => Ok(HashMap::new()),
        Err(err) => Err(err),
    }
}

/// Process environment first, `.env` values second.
fn layered_lookup<'a, F>(
    process: F,
    file_values: &'a HashMap<String, String>,
) -> impl Fn(&str) -> Option<String> + 'a
where
    F: Fn(&str) -> Option<String> + 'a,
{
    move |key: &str| process(key).or_else(|| file_values.get(key).cloned())
}

fn dispatch(
    command: &Command,
    engine: &StorageEngine,
    config: &StorageConfig,
) -> Result<(), Box<dyn Error>> {
    let snapshots = SnapshotManager::from_config(engine, config)?;

    match command {
        Command::Backup(backup) => run_backup(backup, &snapshots),
        Command::Workout(workout) => {
            let service = WorkoutService::new(SqliteWorkoutRepository::new(engine), snapshots);
            run_workout(workout, &service)
        }
    }
}

fn run_backup(
    command: &BackupCommand,
    snapshots: &SnapshotManager<'_>,
) -> Result<(), Box<dyn Error>> {
    match command {
        BackupCommand::Create => {
            let path = snapshots.backup()?;
            print_json(&json!({
                "message": "Backup created successfully",
                "backup_file": path,
            }))
        }
        BackupCommand::List => print_json(&snapshots.list()?),
        BackupCommand::Restore { filename } => match snapshots.restore_by_name(filename) {
            Ok(count) => {
                info!("event=cli_restore module=cli status=ok restored={count}");
                print_json(&json!({
                    "message": "Backup restored successfully",
                    "records_restored": count,
                }))
            }
            Err(err @ SnapshotError::Restore { .. }) => {
                eprintln!("records_restored={}", err.restored_count());
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        },
    }
}

fn run_workout(
    command: &WorkoutCommand,
    service: &WorkoutService<'_, SqliteWorkoutRepository<'_>>,
) -> Result<(), Box<dyn Error>> {
    match command {
        WorkoutCommand::Add(args) => {
            let new_workout = NewWorkout {
                workout_type: args.workout_type,
                date: args.date,
                duration_minutes: args.duration,
                notes: args.notes.clone(),
            };
            print_json(&service.create(&new_workout)?)
        }
        WorkoutCommand::Get { id } => print_json(&service.get(*id)?),
        WorkoutCommand::List(args) => {
            let query = WorkoutListQuery {
                start_date: args.start,
                end_date: args.end,
                limit: Some(args.limit),
                offset: args.offset,
            };
            print_json(&service.list(&query)?)
        }
        WorkoutCommand::Update(args) => {
            print_json(&service.update(args.id, &patch_from_args(args))?)
        }
        WorkoutCommand::Delete { id } => {
            service.delete(*id)?;
            print_json(&json!({ "deleted": id }))
        }
    }
}

fn patch_from_args(args: &UpdateArgs) -> WorkoutPatch {
    WorkoutPatch {
        workout_type: args.workout_type,
        date: args.date,
        duration_minutes: if args.clear_duration {
            Some(None)
        } else {
            args.duration.map(Some)
        },
        notes: if args.clear_notes {
            Some(None)
        } else {
            args.notes.clone().map(Some)
        },
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
