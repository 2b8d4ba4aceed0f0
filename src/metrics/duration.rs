//! Active capture duration from the event log.

use crate::measurement::error::{PersistenceError, PersistenceResult};
use crate::measurement::events::lifecycle_events;
use crate::measurement::types::{Event, EventType, MeasurementStatus};

/// Total milliseconds spent capturing, excluding paused intervals.
///
/// Lifecycle events are paired in timestamp order: START or RESUME followed
/// by PAUSE or STOP contributes the time between them; any other adjacent
/// pair contributes nothing. While the measurement is OPEN and the last
/// lifecycle event is START or RESUME, the time until `now` is added.
///
/// A negative interval means the event log is corrupted and fails with an
/// invariant violation.
pub fn active_duration(
    events: &[Event],
    status: MeasurementStatus,
    now: i64,
) -> PersistenceResult<u64> {
    let mut lifecycle = lifecycle_events(events);
    lifecycle.sort_by_key(|e| (e.timestamp, e.id));

    let mut total: u64 = 0;
    for pair in lifecycle.windows(2) {
        let (first, second) = (pair[0], pair[1]);
        if is_capture_start(first.event_type) && is_capture_end(second.event_type) {
            total += checked_interval(first, second.timestamp)?;
        }
    }

    if status == MeasurementStatus::Open {
        if let Some(last) = lifecycle.last() {
            if is_capture_start(last.event_type) {
                total += checked_interval(last, now)?;
            }
        }
    }

    Ok(total)
}

fn is_capture_start(event_type: EventType) -> bool {
    matches!(
        event_type,
        EventType::LifecycleStart | EventType::LifecycleResume
    )
}

fn is_capture_end(event_type: EventType) -> bool {
    matches!(
        event_type,
        EventType::LifecyclePause | EventType::LifecycleStop
    )
}

fn checked_interval(from: &Event, until: i64) -> PersistenceResult<u64> {
    u64::try_from(until - from.timestamp).map_err(|_| {
        PersistenceError::invariant(format!(
            "Negative duration from {} at {} to {} in measurement {}",
            from.event_type, from.timestamp, until, from.measurement_id
        ))
    })
}
