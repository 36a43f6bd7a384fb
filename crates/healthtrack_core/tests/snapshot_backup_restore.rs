use chrono::{NaiveDate, NaiveDateTime};
use healthtrack_core::{
    DbError, NewWorkout, RepoError, SnapshotError, SnapshotManager, SqliteWorkoutRepository,
    StorageEngine, Workout, WorkoutRepository, WorkoutType,
};
use serde_json::Value;
use std::path::Path;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn at(h: u32, m: u32, s: u32, milli: u32) -> NaiveDateTime {
    date(2024, 1, 2).and_hms_milli_opt(h, m, s, milli).unwrap()
}

fn seed_scenario(engine: &StorageEngine) -> Vec<Workout> {
    let repo = SqliteWorkoutRepository::new(engine);
    vec![
        repo.create(&NewWorkout::new(WorkoutType::Running, date(2024, 1, 1)).with_duration(30))
            .unwrap(),
        repo.create(&NewWorkout::new(WorkoutType::Yoga, date(2024, 1, 2)))
            .unwrap(),
    ]
}

fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

fn write_snapshot(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

#[test]
fn backup_writes_records_in_id_order_with_export_schema() {
    let dir = tempfile::tempdir().unwrap();
    let engine = StorageEngine::open_in_memory().unwrap();
    seed_scenario(&engine);
    let snapshots = SnapshotManager::new(&engine, dir.path()).unwrap();

    let path = snapshots.backup_at(at(9, 15, 30, 250)).unwrap();

    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "workouts_backup_20240102_091530.json"
    );
    let document = read_json(&path);
    assert_eq!(document["backup_timestamp"], "20240102_091530");

    let workouts = document["workouts"].as_array().unwrap();
    assert_eq!(workouts.len(), 2);
    assert_eq!(workouts[0]["id"], 1);
    assert_eq!(workouts[0]["workout_type"], "Running");
    assert_eq!(workouts[0]["date"], "2024-01-01");
    assert_eq!(workouts[0]["duration_minutes"], 30);
    assert!(workouts[0]["notes"].is_null());
    assert!(workouts[0]["created_at"].as_str().unwrap().contains('T'));
    assert_eq!(workouts[1]["id"], 2);
    assert_eq!(workouts[1]["workout_type"], "Yoga");
    assert!(workouts[1]["duration_minutes"].is_null());
}

#[test]
fn backup_orders_by_id_regardless_of_insert_order() {
    let dir = tempfile::tempdir().unwrap();
    let engine = StorageEngine::open_in_memory().unwrap();
    let repo = SqliteWorkoutRepository::new(&engine);
    let template = repo
        .create(&NewWorkout::new(WorkoutType::Golf, date(2024, 2, 1)))
        .unwrap();
    repo.delete(template.id).unwrap();
    for id in [5, 2, 9] {
        repo.insert_verbatim(&Workout { id, ..template.clone() })
            .unwrap();
    }

    let snapshots = SnapshotManager::new(&engine, dir.path()).unwrap();
    let path = snapshots.backup_at(at(10, 0, 0, 0)).unwrap();
    let document = SnapshotManager::read_snapshot(&path).unwrap();
    assert_eq!(document.ids(), vec![2, 5, 9]);
}

#[test]
fn restore_of_backup_into_empty_store_reproduces_records() {
    let dir = tempfile::tempdir().unwrap();
    let source = StorageEngine::open_in_memory().unwrap();
    let repo = SqliteWorkoutRepository::new(&source);
    seed_scenario(&source);
    repo.create(
        &NewWorkout::new(WorkoutType::KettlebellTraining, date(2024, 1, 5))
            .with_duration(25)
            .with_notes("ladders"),
    )
    .unwrap();
    let path = SnapshotManager::new(&source, dir.path())
        .unwrap()
        .backup()
        .unwrap();

    let target = StorageEngine::open_in_memory().unwrap();
    let restored = SnapshotManager::new(&target, dir.path())
        .unwrap()
        .restore(&path)
        .unwrap();
    assert_eq!(restored, 3);

    let expected = repo.list_all_by_id().unwrap();
    let actual = SqliteWorkoutRepository::new(&target).list_all_by_id().unwrap();
    assert_eq!(actual, expected);
}

#[test]
fn restore_moves_sequence_past_restored_ids() {
    let dir = tempfile::tempdir().unwrap();
    let source = StorageEngine::open_in_memory().unwrap();
    seed_scenario(&source);
    let path = SnapshotManager::new(&source, dir.path())
        .unwrap()
        .backup_at(at(11, 0, 0, 0))
        .unwrap();

    let target = StorageEngine::open_in_memory().unwrap();
    SnapshotManager::new(&target, dir.path())
        .unwrap()
        .restore(&path)
        .unwrap();

    let next = SqliteWorkoutRepository::new(&target)
        .create(&NewWorkout::new(WorkoutType::Hiking, date(2024, 1, 6)))
        .unwrap();
    assert_eq!(next.id, 3);
}

#[test]
fn restore_onto_existing_ids_raises_duplicate_key() {
    let dir = tempfile::tempdir().unwrap();
    let engine = StorageEngine::open_in_memory().unwrap();
    let seeded = seed_scenario(&engine);
    let snapshots = SnapshotManager::new(&engine, dir.path()).unwrap();
    let path = snapshots.backup_at(at(12, 0, 0, 0)).unwrap();

    let err = snapshots.restore(&path).unwrap_err();
    assert!(err.is_duplicate_key(), "unexpected error: {err}");
    assert_eq!(err.restored_count(), 0);

    let repo = SqliteWorkoutRepository::new(&engine);
    assert_eq!(repo.list_all_by_id().unwrap(), seeded);
}

#[test]
fn partial_restore_keeps_rows_committed_before_the_conflict() {
    let dir = tempfile::tempdir().unwrap();
    write_snapshot(
        dir.path(),
        "workouts_backup_20240102_130000.json",
        r#"{
            "backup_timestamp": "20240102_130000",
            "workouts": [
                {"id": 1, "workout_type": "Running", "date": "2024-01-01",
                 "duration_minutes": 30, "notes": null,
                 "created_at": "2024-01-01T08:00:00"},
                {"id": 2, "workout_type": "Yoga", "date": "2024-01-02",
                 "duration_minutes": null, "notes": "from file",
                 "created_at": "2024-01-02T08:00:00"},
                {"id": 3, "workout_type": "Golf", "date": "2024-01-03",
                 "duration_minutes": 240, "notes": null,
                 "created_at": "2024-01-03T08:00:00"}
            ]
        }"#,
    );

    let engine = StorageEngine::open_in_memory().unwrap();
    let repo = SqliteWorkoutRepository::new(&engine);
    engine.advance_sequence(1).unwrap();
    let existing = repo
        .create(&NewWorkout::new(WorkoutType::Hiking, date(2024, 2, 2)).with_notes("local"))
        .unwrap();
    assert_eq!(existing.id, 2);

    let snapshots = SnapshotManager::new(&engine, dir.path()).unwrap();
    let err = snapshots
        .restore_by_name("workouts_backup_20240102_130000.json")
        .unwrap_err();

    match &err {
        SnapshotError::Restore { restored, source } => {
            assert_eq!(*restored, 1);
            assert!(source.is_duplicate_key());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(repo.get(1).unwrap().unwrap().workout_type, WorkoutType::Running);
    assert_eq!(repo.get(2).unwrap().unwrap(), existing);
    assert!(repo.get(3).unwrap().is_none());
}

#[test]
fn restore_with_missing_null_or_empty_records_returns_zero() {
    let dir = tempfile::tempdir().unwrap();
    write_snapshot(
        dir.path(),
        "workouts_backup_20240101_000001.json",
        r#"{"backup_timestamp": "20240101_000001"}"#,
    );
    write_snapshot(
        dir.path(),
        "workouts_backup_20240101_000002.json",
        r#"{"backup_timestamp": "20240101_000002", "workouts": []}"#,
    );
    write_snapshot(
        dir.path(),
        "workouts_backup_20240101_000003.json",
        r#"{"workouts": null}"#,
    );

    let engine = StorageEngine::open_in_memory().unwrap();
    let snapshots = SnapshotManager::new(&engine, dir.path()).unwrap();
    for name in [
        "workouts_backup_20240101_000001.json",
        "workouts_backup_20240101_000002.json",
        "workouts_backup_20240101_000003.json",
    ] {
        assert_eq!(snapshots.restore_by_name(name).unwrap(), 0, "{name}");
    }
    assert_eq!(SqliteWorkoutRepository::new(&engine).count().unwrap(), 0);
}

#[test]
fn restore_of_invalid_content_reports_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let cases = [
        ("workouts_backup_20240101_000001.json", ""),
        ("workouts_backup_20240101_000002.json", "{not json"),
        ("workouts_backup_20240101_000003.json", r#"{"workouts": {"id": 1}}"#),
        (
            "workouts_backup_20240101_000004.json",
            r#"{"workouts": [{"id": 1, "workout_type": "Swimming", "date": "2024-01-01"}]}"#,
        ),
        (
            "workouts_backup_20240101_000005.json",
            r#"{"workouts": [{"id": 1, "workout_type": "Yoga", "date": "01/02/2024"}]}"#,
        ),
    ];
    for (name, content) in cases {
        write_snapshot(dir.path(), name, content);
    }

    let engine = StorageEngine::open_in_memory().unwrap();
    let snapshots = SnapshotManager::new(&engine, dir.path()).unwrap();
    for (name, _) in cases {
        let err = snapshots.restore_by_name(name).unwrap_err();
        assert!(
            matches!(err, SnapshotError::Corrupt { .. }),
            "{name}: unexpected error: {err}"
        );
    }
}

#[test]
fn restore_stamps_missing_created_at() {
    let dir = tempfile::tempdir().unwrap();
    write_snapshot(
        dir.path(),
        "workouts_backup_20240101_000001.json",
        r#"{"workouts": [{"id": 4, "workout_type": "Hiking", "date": "2024-01-01"}]}"#,
    );

    let engine = StorageEngine::open_in_memory().unwrap();
    let snapshots = SnapshotManager::new(&engine, dir.path()).unwrap();
    assert_eq!(
        snapshots
            .restore_by_name("workouts_backup_20240101_000001.json")
            .unwrap(),
        1
    );

    let restored = SqliteWorkoutRepository::new(&engine).get(4).unwrap().unwrap();
    assert_eq!(restored.workout_type, WorkoutType::Hiking);
    assert_eq!(restored.duration_minutes, None);
    assert!(restored.created_at > date(2024, 1, 1).and_hms_opt(0, 0, 0).unwrap());
}

#[test]
fn restore_by_name_rejects_unknown_names() {
    let dir = tempfile::tempdir().unwrap();
    let engine = StorageEngine::open_in_memory().unwrap();
    let snapshots = SnapshotManager::new(&engine, dir.path()).unwrap();
    write_snapshot(dir.path(), "notes.json", r#"{"workouts": []}"#);

    for name in [
        "workouts_backup_20991231_235959.json",
        "notes.json",
        "../workouts_backup_20240101_000000.json",
        "",
    ] {
        let err = snapshots.restore_by_name(name).unwrap_err();
        assert!(matches!(err, SnapshotError::NotFound(_)), "{name}: {err}");
    }
}

#[test]
fn restore_of_missing_path_reports_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let engine = StorageEngine::open_in_memory().unwrap();
    let snapshots = SnapshotManager::new(&engine, dir.path()).unwrap();

    let err = snapshots
        .restore(&dir.path().join("workouts_backup_20240101_000000.json"))
        .unwrap_err();
    assert!(matches!(err, SnapshotError::NotFound(_)));
}

#[test]
fn list_on_empty_directory_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let engine = StorageEngine::open_in_memory().unwrap();
    let snapshots = SnapshotManager::new(&engine, dir.path().join("fresh")).unwrap();

    assert!(dir.path().join("fresh").is_dir());
    assert!(snapshots.list().unwrap().is_empty());
}

#[test]
fn list_is_newest_first_and_skips_foreign_files() {
    let dir = tempfile::tempdir().unwrap();
    let engine = StorageEngine::open_in_memory().unwrap();
    seed_scenario(&engine);
    let snapshots = SnapshotManager::new(&engine, dir.path()).unwrap();

    snapshots.backup_at(at(8, 0, 1, 0)).unwrap();
    snapshots.backup_at(at(8, 0, 3, 0)).unwrap();
    snapshots.backup_at(at(8, 0, 2, 0)).unwrap();
    write_snapshot(dir.path(), "readme.txt", "hello");
    write_snapshot(dir.path(), "workouts_backup_latest.json", "{}");
    std::fs::create_dir(dir.path().join("workouts_backup_20991231_000000.json")).unwrap();

    let listed = snapshots.list().unwrap();
    let names = listed.iter().map(|info| info.filename.as_str()).collect::<Vec<_>>();
    assert_eq!(
        names,
        vec![
            "workouts_backup_20240102_080003.json",
            "workouts_backup_20240102_080002.json",
            "workouts_backup_20240102_080001.json",
        ]
    );

    let newest = &listed[0];
    assert_eq!(newest.path, dir.path().join(&newest.filename));
    assert_eq!(newest.size, std::fs::metadata(&newest.path).unwrap().len());
    assert!(newest.size > 0);
}

#[test]
fn backups_in_the_same_second_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let engine = StorageEngine::open_in_memory().unwrap();
    let repo = SqliteWorkoutRepository::new(&engine);
    let snapshots = SnapshotManager::new(&engine, dir.path()).unwrap();

    repo.create(&NewWorkout::new(WorkoutType::Running, date(2024, 1, 1)))
        .unwrap();
    let first = snapshots.backup_at(at(14, 30, 0, 100)).unwrap();

    repo.create(&NewWorkout::new(WorkoutType::Yoga, date(2024, 1, 2)))
        .unwrap();
    let second = snapshots.backup_at(at(14, 30, 0, 900)).unwrap();

    assert_eq!(first, second);
    let listed = snapshots.list().unwrap();
    assert_eq!(listed.len(), 1);
    let document = SnapshotManager::read_snapshot(&second).unwrap();
    assert_eq!(document.ids(), vec![1, 2]);

    let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(leftovers, 1);
}

#[test]
fn manager_reports_write_error_for_unusable_directory() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"file").unwrap();

    let engine = StorageEngine::open_in_memory().unwrap();
    let err = SnapshotManager::new(&engine, blocker.join("backups"))
        .err()
        .unwrap();
    assert!(matches!(err, SnapshotError::Write { .. }));
}

#[test]
fn backup_reports_write_error_when_directory_disappears() {
    let dir = tempfile::tempdir().unwrap();
    let backup_dir = dir.path().join("backups");
    let engine = StorageEngine::open_in_memory().unwrap();
    let snapshots = SnapshotManager::new(&engine, &backup_dir).unwrap();

    std::fs::remove_dir(&backup_dir).unwrap();
    std::fs::write(&backup_dir, b"now a file").unwrap();

    let err = snapshots.backup_at(at(15, 0, 0, 0)).unwrap_err();
    assert!(matches!(err, SnapshotError::Write { .. }), "unexpected error: {err}");
}

#[test]
fn custom_prefix_is_used_for_names_and_listing() {
    let dir = tempfile::tempdir().unwrap();
    let engine = StorageEngine::open_in_memory().unwrap();
    let snapshots = SnapshotManager::with_prefix(&engine, dir.path(), "nightly").unwrap();
    write_snapshot(
        dir.path(),
        "workouts_backup_20240101_000000.json",
        r#"{"workouts": []}"#,
    );

    let path = snapshots.backup_at(at(1, 2, 3, 0)).unwrap();
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "nightly_20240102_010203.json"
    );
    let names = snapshots
        .list()
        .unwrap()
        .into_iter()
        .map(|info| info.filename)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["nightly_20240102_010203.json".to_string()]);
}

#[test]
fn restore_rejects_invalid_record_before_inserting_any() {
    let dir = tempfile::tempdir().unwrap();
    write_snapshot(
        dir.path(),
        "workouts_backup_20240101_000001.json",
        r#"{"workouts": [
            {"id": 1, "workout_type": "Yoga", "date": "2024-01-01"},
            {"id": 2, "workout_type": "Yoga", "date": "2024-01-02", "duration_minutes": -5}
        ]}"#,
    );

    let engine = StorageEngine::open_in_memory().unwrap();
    let snapshots = SnapshotManager::new(&engine, dir.path()).unwrap();
    let err = snapshots
        .restore_by_name("workouts_backup_20240101_000001.json")
        .unwrap_err();

    assert!(matches!(err, SnapshotError::Corrupt { .. }), "unexpected error: {err}");
    assert_eq!(err.restored_count(), 0);
    assert_eq!(SqliteWorkoutRepository::new(&engine).count().unwrap(), 0);
    assert_eq!(engine.last_issued_id().unwrap(), 0);
}

#[test]
fn restoring_largest_id_exhausts_sequence_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    write_snapshot(
        dir.path(),
        "workouts_backup_20240101_000001.json",
        r#"{"workouts": [
            {"id": 9223372036854775807, "workout_type": "Golf", "date": "2024-01-01"}
        ]}"#,
    );

    let engine = StorageEngine::open_in_memory().unwrap();
    let snapshots = SnapshotManager::new(&engine, dir.path()).unwrap();
    assert_eq!(
        snapshots
            .restore_by_name("workouts_backup_20240101_000001.json")
            .unwrap(),
        1
    );
    assert_eq!(engine.last_issued_id().unwrap(), i64::MAX);

    let repo = SqliteWorkoutRepository::new(&engine);
    let err = repo
        .create(&NewWorkout::new(WorkoutType::Yoga, date(2024, 1, 2)))
        .unwrap_err();
    assert!(
        matches!(err, RepoError::Db(DbError::SequenceExhausted { .. })),
        "unexpected error: {err}"
    );
    assert_eq!(engine.last_issued_id().unwrap(), i64::MAX);
    assert_eq!(repo.count().unwrap(), 1);
}

#[test]
fn restore_truncates_created_at_to_microseconds() {
    let dir = tempfile::tempdir().unwrap();
    write_snapshot(
        dir.path(),
        "workouts_backup_20240101_000001.json",
        r#"{"workouts": [
            {"id": 3, "workout_type": "Running", "date": "2024-01-01",
             "created_at": "2024-01-01T08:00:00.123456789"}
        ]}"#,
    );

    let engine = StorageEngine::open_in_memory().unwrap();
    SnapshotManager::new(&engine, dir.path())
        .unwrap()
        .restore_by_name("workouts_backup_20240101_000001.json")
        .unwrap();

    let restored = SqliteWorkoutRepository::new(&engine).get(3).unwrap().unwrap();
    assert_eq!(
        restored.created_at,
        date(2024, 1, 1).and_hms_micro_opt(8, 0, 0, 123_456).unwrap()
    );
}

#[test]
fn manager_rejects_prefix_with_path_separator() {
    let dir = tempfile::tempdir().unwrap();
    let engine = StorageEngine::open_in_memory().unwrap();

    for prefix in ["../escape", "nested/name", "back\\slash", "", "  "] {
        let err = SnapshotManager::with_prefix(&engine, dir.path(), prefix)
            .err()
            .unwrap();
        assert!(matches!(err, SnapshotError::InvalidPrefix(_)), "{prefix:?}: {err}");
    }
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
