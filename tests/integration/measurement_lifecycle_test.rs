//! Integration tests for the measurement lifecycle.
//!
//! Runs the persistence layer against SQLite, in memory and on disk.

use geocapture::measurement::error::PersistenceError;
use geocapture::measurement::types::{
    EventType, GeoLocation, MeasurementStatus, Modality, Pressure,
};
use geocapture::storage::config::{load_config_from, save_config_to, AppConfig};
use geocapture::storage::sensor_files::{ACCELERATIONS_EXTENSION, ROTATIONS_EXTENSION};
use geocapture::storage::{Database, MeasurementStore, SensorFileStore};
use geocapture::PersistenceLayer;

fn in_memory() -> PersistenceLayer<Database> {
    PersistenceLayer::new(Database::open_in_memory().unwrap())
}

fn count(persistence: &PersistenceLayer<Database>, status: MeasurementStatus) -> usize {
    persistence
        .load_measurements_by_status(status)
        .unwrap()
        .len()
}

fn assert_single_active(persistence: &PersistenceLayer<Database>) {
    let open = count(persistence, MeasurementStatus::Open);
    let paused = count(persistence, MeasurementStatus::Paused);
    assert!(open <= 1, "{} open measurements", open);
    assert!(paused <= 1, "{} paused measurements", paused);
    assert!(!(open == 1 && paused == 1), "open and paused at once");
}

#[test]
fn test_single_active_measurement_after_any_sequence() {
    let persistence = in_memory();
    let statuses = [
        MeasurementStatus::Open,
        MeasurementStatus::Paused,
        MeasurementStatus::Finished,
        MeasurementStatus::Synced,
        MeasurementStatus::Skipped,
    ];

    let mut state: u64 = 17;
    for step in 0..300_i64 {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        let choice = (state >> 33) % 6;

        let measurements = persistence.load_measurements().unwrap();
        // Failures are expected here; only the resulting state is checked
        let _ = if choice == 0 || measurements.is_empty() {
            persistence.new_measurement_at(Modality::Bicycle, step).map(|_| ())
        } else {
            let target = &measurements[(state >> 40) as usize % measurements.len()];
            let status = statuses[(choice - 1) as usize];
            if matches!(status, MeasurementStatus::Synced | MeasurementStatus::Skipped) {
                persistence.mark_finished_as(status, target.id)
            } else {
                persistence.set_status(target.id, status, false)
            }
        };

        assert_single_active(&persistence);
    }
}

#[test]
fn test_scenario_d_measurement_without_locations() {
    let persistence = in_memory();
    let m = persistence.new_measurement_at(Modality::Car, 0).unwrap();
    persistence
        .log_event(m.id, EventType::LifecycleStop, 10, None)
        .unwrap();

    assert!(persistence.load_tracks(m.id).unwrap().is_empty());
    assert!(persistence
        .load_tracks_with_pressures(m.id)
        .unwrap()
        .is_empty());
    assert_eq!(persistence.load_ascend(m.id, false).unwrap(), None);
}

#[test]
fn test_scenario_e_finish_while_another_is_open() {
    let mut db = Database::open_in_memory().unwrap();
    // Corrupted state left behind by a concurrent session
    let first = db
        .create_measurement(MeasurementStatus::Open, Modality::Bicycle, 3, 0)
        .unwrap();
    let second = db
        .create_measurement(MeasurementStatus::Open, Modality::Bicycle, 3, 1)
        .unwrap();
    let persistence = PersistenceLayer::new(db);

    let result = persistence.set_status(first.id, MeasurementStatus::Finished, false);
    assert!(matches!(result, Err(PersistenceError::InvariantViolation(_))));
    assert_eq!(
        persistence.load_measurement(first.id).unwrap().status,
        MeasurementStatus::Open
    );

    // Self-healing is allowed to finish it anyway
    persistence
        .set_status(second.id, MeasurementStatus::Finished, true)
        .unwrap();
}

#[test]
fn test_open_and_paused_together_is_corrupted() {
    let mut db = Database::open_in_memory().unwrap();
    db.create_measurement(MeasurementStatus::Paused, Modality::Walking, 3, 0)
        .unwrap();
    let open = db
        .create_measurement(MeasurementStatus::Open, Modality::Walking, 3, 1)
        .unwrap();
    let persistence = PersistenceLayer::new(db);

    assert!(matches!(
        persistence.session_context(),
        Err(PersistenceError::InvariantViolation(_))
    ));
    assert!(matches!(
        persistence.set_status(open.id, MeasurementStatus::Open, false),
        Err(PersistenceError::InvariantViolation(_))
    ));
}

#[test]
fn test_scenario_a_from_storage() {
    let persistence = in_memory();
    let m = persistence.new_measurement_at(Modality::Bicycle, 1).unwrap();

    persistence
        .store_locations(&[
            GeoLocation::new(m.id, 1, 51.0, 13.0, 5.0),
            GeoLocation::new(m.id, 2, 51.0, 13.0, 5.0),
            GeoLocation::new(m.id, 4, 51.0, 13.0, 5.0),
            GeoLocation::new(m.id, 6, 51.0, 13.0, 5.0),
            GeoLocation::new(m.id, 8, 51.0, 13.0, 5.0),
            // Cached fix delivered late
            GeoLocation::new(m.id, 5, 51.0, 13.0, 5.0),
        ])
        .unwrap();
    for (event_type, timestamp) in [
        (EventType::LifecyclePause, 3),
        (EventType::LifecycleResume, 6),
        (EventType::LifecyclePause, 7),
        (EventType::LifecycleStop, 9),
    ] {
        persistence
            .log_event(m.id, event_type, timestamp, None)
            .unwrap();
    }

    let tracks = persistence.load_tracks(m.id).unwrap();
    let timestamps: Vec<Vec<i64>> = tracks
        .iter()
        .map(|t| t.locations.iter().map(|l| l.timestamp).collect())
        .collect();
    assert_eq!(timestamps, vec![vec![1, 2], vec![6, 8]]);
}

#[test]
fn test_resume_without_pause_in_stored_log() {
    let persistence = in_memory();
    let m = persistence.new_measurement_at(Modality::Bicycle, 0).unwrap();
    persistence
        .store_location(&GeoLocation::new(m.id, 1, 51.0, 13.0, 5.0))
        .unwrap();
    persistence
        .log_event(m.id, EventType::LifecycleResume, 2, None)
        .unwrap();

    assert!(matches!(
        persistence.load_tracks(m.id),
        Err(PersistenceError::InvariantViolation(_))
    ));
}

#[test]
fn test_duration_of_stored_measurement() {
    let persistence = in_memory();
    let m = persistence.new_measurement_at(Modality::Bus, 1_000).unwrap();
    persistence
        .log_event(m.id, EventType::LifecyclePause, 4_000, None)
        .unwrap();
    persistence
        .log_event(m.id, EventType::LifecycleResume, 9_000, None)
        .unwrap();

    // Still open: time since the resume counts
    assert_eq!(persistence.load_duration_at(m.id, 10_000).unwrap(), 4_000);

    persistence
        .log_event(m.id, EventType::LifecycleStop, 12_000, None)
        .unwrap();
    persistence
        .set_status(m.id, MeasurementStatus::Finished, false)
        .unwrap();
    assert_eq!(persistence.load_duration_at(m.id, 99_000).unwrap(), 6_000);
}

#[test]
fn test_sync_deletes_sensor_files_but_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let files = SensorFileStore::new(dir.path().join("sensor-data"));
    std::fs::create_dir_all(files.dir()).unwrap();

    let db = Database::open(&dir.path().join("measurements.sqlite"))
        .unwrap()
        .with_sensor_files(files.clone());
    let persistence = PersistenceLayer::new(db);

    let m = persistence.new_measurement_at(Modality::Bicycle, 0).unwrap();
    std::fs::write(files.file_path(m.id, ACCELERATIONS_EXTENSION), b"acc").unwrap();
    std::fs::write(files.file_path(m.id, ROTATIONS_EXTENSION), b"rot").unwrap();
    persistence
        .store_location(&GeoLocation::new(m.id, 1, 51.0, 13.0, 5.0))
        .unwrap();

    persistence
        .log_event(m.id, EventType::LifecycleStop, 2, None)
        .unwrap();
    persistence
        .set_status(m.id, MeasurementStatus::Finished, false)
        .unwrap();
    persistence
        .mark_finished_as(MeasurementStatus::Synced, m.id)
        .unwrap();

    assert!(!files.file_path(m.id, ACCELERATIONS_EXTENSION).exists());
    assert!(!files.file_path(m.id, ROTATIONS_EXTENSION).exists());
    assert_eq!(persistence.load_tracks(m.id).unwrap().len(), 1);
    assert_eq!(persistence.load_events(m.id).unwrap().len(), 2);
}

#[test]
fn test_delete_cascades_to_samples() {
    let persistence = in_memory();
    let m = persistence.new_measurement_at(Modality::Walking, 0).unwrap();
    persistence
        .store_location(&GeoLocation::new(m.id, 1, 51.0, 13.0, 1.0))
        .unwrap();
    persistence
        .store_pressure(&Pressure::new(m.id, 1, 1000.0))
        .unwrap();
    persistence
        .set_status(m.id, MeasurementStatus::Finished, false)
        .unwrap();

    persistence.delete_measurement(m.id).unwrap();

    assert!(matches!(
        persistence.load_events(m.id),
        Err(PersistenceError::NoSuchMeasurement(_))
    ));
    assert!(persistence.delete_measurement(m.id).unwrap_err().is_not_found());
}

#[test]
fn test_recovery_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("measurements.sqlite");

    let crashed_id = {
        let persistence = PersistenceLayer::new(Database::open(&path).unwrap());
        let m = persistence.new_measurement_at(Modality::Car, 1_000).unwrap();
        persistence
            .log_event(m.id, EventType::LifecyclePause, 2_000, None)
            .unwrap();
        persistence
            .set_status(m.id, MeasurementStatus::Paused, false)
            .unwrap();
        m.id
    };

    let persistence = PersistenceLayer::new(Database::open(&path).unwrap());
    assert!(persistence.session_context().unwrap().is_paused());

    let recovered = persistence.recover_dangling_measurements().unwrap();
    assert_eq!(recovered, vec![crashed_id]);
    assert!(persistence.session_context().unwrap().active().is_none());
    assert_eq!(persistence.load_duration(crashed_id).unwrap(), 1_000);

    // Nothing left to recover
    assert!(persistence
        .recover_dangling_measurements()
        .unwrap()
        .is_empty());
}

#[test]
fn test_config_thresholds_drive_cleaning() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    let mut config = AppConfig::default();
    config.cleaning.max_accuracy_m = 5.0;
    config.ascend.ascend_threshold_m = 10.0;
    save_config_to(&config_path, &config).unwrap();

    let loaded = load_config_from(&config_path).unwrap();
    assert_eq!(loaded.data_dir, dir.path());
    let persistence = PersistenceLayer::from_config(Database::open_in_memory().unwrap(), &loaded);

    let m = persistence.new_measurement_at(Modality::Bicycle, 0).unwrap();
    persistence
        .store_locations(&[
            GeoLocation::new(m.id, 1, 51.0, 13.0, 5.0)
                .with_accuracy(4.0)
                .with_altitude(100.0),
            GeoLocation::new(m.id, 2, 51.0, 13.0, 5.0)
                .with_accuracy(8.0)
                .with_altitude(105.0),
        ])
        .unwrap();

    let strategy = persistence.cleaning_strategy_for(m.id).unwrap();
    let tracks = persistence.load_cleaned_tracks(m.id, &strategy).unwrap();
    assert_eq!(tracks[0].locations.len(), 1);
    // 5 m gain is below the configured 10 m noise floor
    assert_eq!(persistence.load_ascend(m.id, false).unwrap(), Some(0.0));
}
