//! Track segmentation.
//!
//! Splits a measurement's location and pressure streams into the contiguous
//! sub-tracks between (START or RESUME) and the next (PAUSE or STOP), using
//! the measurement's event log. Samples captured while paused belong to no
//! track.

use crate::measurement::error::{PersistenceError, PersistenceResult};
use crate::measurement::types::{Event, EventType, GeoLocation, Pressure, Track};
use std::iter::Peekable;

/// Anything carrying an epoch-millisecond timestamp.
pub trait Timestamped {
    fn timestamp(&self) -> i64;
}

impl Timestamped for GeoLocation {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

impl Timestamped for Pressure {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

impl Timestamped for Event {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// Forward-only cursor over timestamp-ordered samples.
///
/// Every advance peeks first, so reaching the end inside a scan simply
/// stops the scan.
struct SampleCursor<T> {
    samples: Peekable<std::vec::IntoIter<T>>,
}

impl<T: Timestamped> SampleCursor<T> {
    fn new(mut samples: Vec<T>) -> Self {
        // Stable: equal timestamps keep their stored order
        samples.sort_by_key(|s| s.timestamp());
        Self {
            samples: samples.into_iter().peekable(),
        }
    }

    /// Move every sample with `timestamp <= bound` into `into`.
    fn take_through(&mut self, bound: i64, into: &mut Vec<T>) {
        while let Some(sample) = self.samples.next_if(|s| s.timestamp() <= bound) {
            into.push(sample);
        }
    }

    /// Drop every sample with `timestamp < bound`, returning how many were dropped.
    fn skip_before(&mut self, bound: i64) -> usize {
        let mut skipped = 0;
        while self.samples.next_if(|s| s.timestamp() < bound).is_some() {
            skipped += 1;
        }
        skipped
    }

    fn take_rest(&mut self, into: &mut Vec<T>) {
        into.extend(self.samples.by_ref());
    }
}

/// Partition `locations` and `pressures` into tracks.
///
/// Samples up to and including a PAUSE timestamp close the current track;
/// samples before the following RESUME timestamp are discarded; a sample at
/// exactly the RESUME timestamp opens the next track. Tracks without
/// locations are dropped. Everything after the last RESUME forms the final
/// track.
///
/// Fails with an invariant violation on a RESUME without a preceding PAUSE.
pub fn segment_tracks(
    locations: Vec<GeoLocation>,
    pressures: Vec<Pressure>,
    events: &[Event],
) -> PersistenceResult<Vec<Track>> {
    let mut ordered_events: Vec<&Event> = events.iter().collect();
    ordered_events.sort_by_key(|e| (e.timestamp, e.id));

    let mut locations = SampleCursor::new(locations);
    let mut pressures = SampleCursor::new(pressures);

    let mut tracks = Vec::new();
    let mut current = Track::default();
    let mut pause_time: Option<i64> = None;
    let mut discarded = 0;

    for event in ordered_events {
        match event.event_type {
            EventType::LifecyclePause => pause_time = Some(event.timestamp),
            EventType::LifecycleResume => {
                let paused_at = pause_time.take().ok_or_else(|| {
                    PersistenceError::invariant(format!(
                        "Resume without matching pause at {} in measurement {}",
                        event.timestamp, event.measurement_id
                    ))
                })?;

                locations.take_through(paused_at, &mut current.locations);
                pressures.take_through(paused_at, &mut current.pressures);

                let closed = std::mem::take(&mut current);
                if !closed.is_empty() {
                    tracks.push(closed);
                }

                discarded += locations.skip_before(event.timestamp);
                pressures.skip_before(event.timestamp);
            }
            _ => {}
        }
    }

    locations.take_rest(&mut current.locations);
    pressures.take_rest(&mut current.pressures);
    if !current.is_empty() {
        tracks.push(current);
    }

    tracing::debug!(
        "Segmented {} tracks, {} locations captured while paused",
        tracks.len(),
        discarded
    );
    Ok(tracks)
}

/// Number of locations that fall into a paused interval of `events`.
pub fn count_paused_locations(locations: &[GeoLocation], events: &[Event]) -> usize {
    let mut ordered_events: Vec<&Event> = events.iter().collect();
    ordered_events.sort_by_key(|e| (e.timestamp, e.id));

    let mut intervals = Vec::new();
    let mut pause_time = None;
    for event in ordered_events {
        match event.event_type {
            EventType::LifecyclePause => pause_time = Some(event.timestamp),
            EventType::LifecycleResume => {
                if let Some(paused_at) = pause_time.take() {
                    intervals.push((paused_at, event.timestamp));
                }
            }
            _ => {}
        }
    }

    locations
        .iter()
        .filter(|l| {
            intervals
                .iter()
                .any(|&(pause, resume)| l.timestamp > pause && l.timestamp < resume)
        })
        .count()
}
