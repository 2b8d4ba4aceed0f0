//! Unit tests for track segmentation.
//!
//! Covers the pause/resume boundary rules, the empty-tail cases and the
//! completeness and ordering properties over generated event logs.

use geocapture::measurement::types::{Event, EventType, GeoLocation, Pressure, Track};
use geocapture::metrics::tracks::{count_paused_locations, segment_tracks};

fn event(id: i64, event_type: EventType, timestamp: i64) -> Event {
    Event {
        id,
        event_type,
        timestamp,
        value: None,
        measurement_id: 1,
    }
}

fn location(timestamp: i64) -> GeoLocation {
    GeoLocation::new(1, timestamp, 51.05, 13.73, 5.0).with_accuracy(5.0)
}

fn locations(timestamps: &[i64]) -> Vec<GeoLocation> {
    timestamps.iter().copied().map(location).collect()
}

fn timestamps(track: &Track) -> Vec<i64> {
    track.locations.iter().map(|l| l.timestamp).collect()
}

/// Deterministic pseudo-random numbers for generated logs.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 33) % bound
    }
}

/// START, alternating PAUSE/RESUME pairs, STOP, with locations sprinkled
/// over the whole interval including the event timestamps themselves.
fn generated_measurement(seed: u64) -> (Vec<GeoLocation>, Vec<Event>) {
    let mut rng = Lcg(seed);
    let mut events = Vec::new();
    let mut time = rng.next(5) as i64;
    let mut id = 1;

    events.push(event(id, EventType::LifecycleStart, time));
    for _ in 0..rng.next(5) {
        time += 1 + rng.next(10) as i64;
        id += 1;
        events.push(event(id, EventType::LifecyclePause, time));
        time += 1 + rng.next(10) as i64;
        id += 1;
        events.push(event(id, EventType::LifecycleResume, time));
    }
    time += 1 + rng.next(10) as i64;
    events.push(event(id + 1, EventType::LifecycleStop, time));

    let samples: Vec<GeoLocation> = (0..rng.next(40))
        .map(|_| location(rng.next(time as u64 + 1) as i64))
        .collect();

    // Storage returns events in timestamp order, not insertion order
    events.reverse();
    (samples, events)
}

#[test]
fn test_scenario_a_two_tracks_around_pause() {
    let events = vec![
        event(1, EventType::LifecycleStart, 1),
        event(2, EventType::LifecyclePause, 3),
        event(3, EventType::LifecycleResume, 6),
        event(4, EventType::LifecyclePause, 7),
        event(5, EventType::LifecycleStop, 9),
    ];
    // Location 10 lies after STOP and is outside the caller's query window
    let samples = locations(&[1, 2, 4, 5, 6, 8]);

    let tracks = segment_tracks(samples, vec![], &events).unwrap();

    assert_eq!(tracks.len(), 2);
    assert_eq!(timestamps(&tracks[0]), vec![1, 2]);
    assert_eq!(timestamps(&tracks[1]), vec![6, 8]);
}

#[test]
fn test_scenario_b_no_location_after_resume() {
    let events = vec![
        event(1, EventType::LifecycleStart, 1),
        event(2, EventType::LifecyclePause, 3),
        event(3, EventType::LifecycleResume, 4),
        event(4, EventType::LifecycleStop, 5),
    ];

    let tracks = segment_tracks(locations(&[2]), vec![], &events).unwrap();

    assert_eq!(tracks.len(), 1);
    assert_eq!(timestamps(&tracks[0]), vec![2]);
}

#[test]
fn test_scenario_d_no_locations_yields_no_tracks() {
    let events = vec![
        event(1, EventType::LifecycleStart, 1),
        event(2, EventType::LifecyclePause, 3),
        event(3, EventType::LifecycleResume, 4),
        event(4, EventType::LifecycleStop, 5),
    ];
    let tracks = segment_tracks(vec![], vec![], &events).unwrap();
    assert!(tracks.is_empty());

    let tracks = segment_tracks(vec![], vec![], &[]).unwrap();
    assert!(tracks.is_empty());
}

#[test]
fn test_pause_immediately_resumed_keeps_tail() {
    let events = vec![
        event(1, EventType::LifecycleStart, 0),
        event(2, EventType::LifecyclePause, 5),
        event(3, EventType::LifecycleResume, 6),
        event(4, EventType::LifecycleStop, 20),
    ];

    let tracks = segment_tracks(locations(&[1, 5, 6, 10]), vec![], &events).unwrap();

    assert_eq!(tracks.len(), 2);
    assert_eq!(timestamps(&tracks[0]), vec![1, 5]);
    assert_eq!(timestamps(&tracks[1]), vec![6, 10]);
}

#[test]
fn test_stream_exhausted_inside_pause() {
    let events = vec![
        event(1, EventType::LifecycleStart, 0),
        event(2, EventType::LifecyclePause, 5),
        event(3, EventType::LifecycleResume, 10),
        event(4, EventType::LifecyclePause, 12),
        event(5, EventType::LifecycleResume, 15),
        event(6, EventType::LifecycleStop, 20),
    ];

    // Every sample is consumed before the second pause/resume pair
    let tracks = segment_tracks(locations(&[1, 2, 7]), vec![], &events).unwrap();

    assert_eq!(tracks.len(), 1);
    assert_eq!(timestamps(&tracks[0]), vec![1, 2]);
}

#[test]
fn test_late_sample_sorted_into_place() {
    let events = vec![
        event(1, EventType::LifecycleStart, 0),
        event(2, EventType::LifecyclePause, 10),
        event(3, EventType::LifecycleResume, 20),
    ];
    // The sample at 9 arrived late and was stored last
    let tracks = segment_tracks(locations(&[1, 21, 9]), vec![], &events).unwrap();

    assert_eq!(timestamps(&tracks[0]), vec![1, 9]);
    assert_eq!(timestamps(&tracks[1]), vec![21]);
}

#[test]
fn test_pressures_split_with_locations() {
    let events = vec![
        event(1, EventType::LifecycleStart, 0),
        event(2, EventType::LifecyclePause, 10),
        event(3, EventType::LifecycleResume, 20),
    ];
    let pressures = vec![
        Pressure::new(1, 2, 1001.0),
        Pressure::new(1, 15, 1002.0),
        Pressure::new(1, 22, 1003.0),
    ];

    let tracks = segment_tracks(locations(&[1, 21]), pressures, &events).unwrap();

    assert_eq!(tracks[0].pressures.len(), 1);
    assert_eq!(tracks[0].pressures[0].pressure, 1001.0);
    assert_eq!(tracks[1].pressures.len(), 1);
    assert_eq!(tracks[1].pressures[0].pressure, 1003.0);
}

#[test]
fn test_segmentation_completeness() {
    for seed in 0..200 {
        let (samples, events) = generated_measurement(seed);
        let total = samples.len();
        let paused = count_paused_locations(&samples, &events);

        let tracks = segment_tracks(samples, vec![], &events).unwrap();
        let in_tracks: usize = tracks.iter().map(|t| t.locations.len()).sum();

        assert_eq!(in_tracks + paused, total, "seed {}", seed);
        assert!(tracks.iter().all(|t| !t.is_empty()), "seed {}", seed);
    }
}

#[test]
fn test_segmentation_ordering() {
    for seed in 0..200 {
        let (samples, events) = generated_measurement(seed);
        let tracks = segment_tracks(samples, vec![], &events).unwrap();

        for track in &tracks {
            assert!(
                track
                    .locations
                    .windows(2)
                    .all(|pair| pair[0].timestamp <= pair[1].timestamp),
                "seed {}",
                seed
            );
        }
        for pair in tracks.windows(2) {
            assert!(pair[0].end() <= pair[1].start(), "seed {}", seed);
        }
    }
}
