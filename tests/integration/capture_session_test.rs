//! Integration tests for a full capture session.
//!
//! Drives a measurement from start to export with a controlled clock.

use geocapture::export::ExportError;
use geocapture::measurement::session::{CaptureSession, SessionError};
use geocapture::measurement::types::{EventType, GeoLocation, MeasurementStatus, Modality, Pressure};
use geocapture::storage::Database;
use geocapture::PersistenceLayer;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

struct Harness {
    session: CaptureSession<Database>,
    persistence: Arc<PersistenceLayer<Database>>,
    time: Arc<AtomicI64>,
}

impl Harness {
    fn new() -> Self {
        let persistence = Arc::new(PersistenceLayer::new(Database::open_in_memory().unwrap()));
        let time = Arc::new(AtomicI64::new(1_700_000_000_000));
        let clock = Arc::clone(&time);
        let session = CaptureSession::new(Arc::clone(&persistence))
            .with_clock(move || clock.load(Ordering::SeqCst));
        Self {
            session,
            persistence,
            time,
        }
    }

    fn now(&self) -> i64 {
        self.time.load(Ordering::SeqCst)
    }

    fn advance(&self, millis: i64) -> i64 {
        self.time.fetch_add(millis, Ordering::SeqCst) + millis
    }

    /// A clean fix one second later, `step` thousandths of a degree north.
    fn record(&mut self, step: u32, altitude: f64) {
        let timestamp = self.advance(1_000);
        let location = GeoLocation::new(0, timestamp, 51.0 + f64::from(step) * 0.001, 13.0, 6.0)
            .with_accuracy(4.0)
            .with_altitude(altitude);
        self.session.record_location(location).unwrap();
    }
}

#[test]
fn test_full_capture_flow() {
    let mut harness = Harness::new();
    let start = harness.now();

    let m = harness.session.start(Modality::Bicycle).unwrap();
    assert_eq!(m.status, MeasurementStatus::Open);

    // First sub-track: 3 fixes, climbing 6 m
    harness.record(0, 100.0);
    harness.record(1, 103.0);
    harness.record(2, 106.0);

    harness.advance(1_000);
    harness.session.pause().unwrap();
    let paused_at = harness.now();

    // Fixes while paused are refused
    let late = GeoLocation::new(0, harness.advance(500), 51.5, 13.0, 6.0).with_accuracy(4.0);
    assert!(matches!(
        harness.session.record_location(late),
        Err(SessionError::NotCapturing)
    ));

    harness.advance(60_000);
    harness.session.resume().unwrap();
    let resumed_at = harness.now();

    // Second sub-track, far away: the gap must not count as distance
    harness.record(100, 50.0);
    harness.record(101, 55.0);

    harness.advance(1_000);
    let finished = harness.session.stop().unwrap();
    let stopped_at = harness.now();
    assert_eq!(finished.status, MeasurementStatus::Finished);

    let persistence = &harness.persistence;
    let tracks = persistence.load_tracks(m.id).unwrap();
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0].locations.len(), 3);
    assert_eq!(tracks[1].locations.len(), 2);

    // Three intra-track gaps of about 111 m each
    assert!(
        finished.distance > 330.0 && finished.distance < 340.0,
        "distance was {}",
        finished.distance
    );

    let duration = persistence.load_duration(m.id).unwrap();
    let expected = (paused_at - start) + (stopped_at - resumed_at);
    assert_eq!(duration, expected as u64);

    assert_eq!(persistence.load_ascend(m.id, false).unwrap(), Some(11.0));

    let summary = persistence.summarize(m.id).unwrap();
    assert_eq!(summary.track_count, 2);
    assert_eq!(summary.duration_ms, expected as u64);
    assert!(summary.average_speed_mps.is_some());

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["status"], "FINISHED");
    assert_eq!(json["modality"], "BICYCLE");
}

#[test]
fn test_modality_change_mid_capture() {
    let mut harness = Harness::new();
    let m = harness.session.start(Modality::Walking).unwrap();

    let changed_at = harness.advance(5_000);
    harness.session.change_modality(Modality::Bus).unwrap();
    harness.session.stop().unwrap();

    let persistence = &harness.persistence;
    let changes = persistence.load_modality_changes(m.id).unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].timestamp, changed_at);
    assert_eq!(changes[0].modality, Modality::Bus);
    assert_eq!(
        persistence.load_measurement(m.id).unwrap().modality,
        Modality::Bus
    );

    let lifecycle: Vec<EventType> = persistence
        .load_events(m.id)
        .unwrap()
        .iter()
        .map(|e| e.event_type)
        .filter(EventType::is_lifecycle)
        .collect();
    assert_eq!(
        lifecycle,
        vec![EventType::LifecycleStart, EventType::LifecycleStop]
    );
}

#[test]
fn test_sessions_share_storage_state() {
    let mut first = Harness::new();
    let mut second = CaptureSession::new(Arc::clone(&first.persistence));

    let m = first.session.start(Modality::Car).unwrap();
    assert!(matches!(
        second.start(Modality::Car),
        Err(SessionError::AlreadyCapturing(id)) if id == m.id
    ));

    // Either session may stop the measurement
    second.stop().unwrap();
    assert!(matches!(
        first.session.pause(),
        Err(SessionError::NotCapturing)
    ));
    first.session.start(Modality::Car).unwrap();
}

#[test]
fn test_pressures_recorded_for_open_measurement() {
    let mut harness = Harness::new();
    let m = harness.session.start(Modality::Bicycle).unwrap();

    for i in 0..25_i32 {
        let timestamp = harness.advance(100);
        harness
            .session
            .record_pressure(Pressure::new(0, timestamp, 1013.0 - f64::from(i) * 0.01))
            .unwrap();
    }
    harness.record(0, 100.0);
    harness.session.stop().unwrap();

    let tracks = harness.persistence.load_tracks_with_pressures(m.id).unwrap();
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].pressures.len(), 25);
    // Barometer takes precedence, a 0.25 hPa drift stays below the noise floor
    assert_eq!(harness.persistence.load_ascend(m.id, false).unwrap(), Some(0.0));
}

#[test]
fn test_export_after_capture() {
    let mut harness = Harness::new();
    let m = harness.session.start(Modality::Bicycle).unwrap();

    assert!(matches!(
        harness.persistence.export_measurement_csv(m.id),
        Err(ExportError::NoData(_))
    ));

    harness.record(0, 100.0);
    harness.record(1, 101.0);
    harness.session.stop().unwrap();

    let csv = harness.persistence.export_measurement_csv(m.id).unwrap();
    assert_eq!(csv.lines().count(), 3);
    assert!(csv.lines().skip(1).all(|line| line.contains(",BICYCLE,0,")));
}

#[test]
fn test_concurrent_pause_logs_single_event() {
    for _ in 0..50 {
        let persistence = Arc::new(PersistenceLayer::new(Database::open_in_memory().unwrap()));
        let m = CaptureSession::new(Arc::clone(&persistence))
            .start(Modality::Bicycle)
            .unwrap();
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let persistence = Arc::clone(&persistence);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let mut session = CaptureSession::new(persistence);
                    barrier.wait();
                    session.pause()
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(SessionError::NotCapturing))));
        assert_eq!(
            persistence
                .load_events_of_type(m.id, EventType::LifecyclePause)
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            persistence.load_measurement(m.id).unwrap().status,
            MeasurementStatus::Paused
        );
    }
}
