//! Event log of a measurement.
//!
//! Appends are plain inserts without ordering checks, since late samples may
//! arrive out of wall-clock order. Readers always get events sorted by
//! timestamp, ties in insertion order.

use crate::measurement::error::{PersistenceError, PersistenceResult};
use crate::measurement::lifecycle::PersistenceLayer;
use crate::measurement::types::{Event, EventId, EventType, MeasurementId, Modality};
use crate::storage::store::MeasurementStore;
use serde::Serialize;

/// A parsed MODALITY_TYPE_CHANGE event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModalityChange {
    pub timestamp: i64,
    pub modality: Modality,
}

/// The START, PAUSE, RESUME and STOP events of `events`, keeping their order.
pub fn lifecycle_events(events: &[Event]) -> Vec<&Event> {
    events
        .iter()
        .filter(|event| event.event_type.is_lifecycle())
        .collect()
}

impl<S: MeasurementStore> PersistenceLayer<S> {
    /// Append an event to the log of a measurement.
    pub fn log_event(
        &self,
        measurement_id: MeasurementId,
        event_type: EventType,
        timestamp: i64,
        value: Option<&str>,
    ) -> PersistenceResult<EventId> {
        let store = self.lock()?;
        Self::require_measurement(&*store, measurement_id)?;

        let id = store.append_event(measurement_id, event_type, timestamp, value)?;
        tracing::debug!(
            "Logged {} at {} for measurement {}",
            event_type,
            timestamp,
            measurement_id
        );
        Ok(id)
    }

    pub fn load_event(&self, id: EventId) -> PersistenceResult<Event> {
        let store = self.lock()?;
        store
            .load_event(id)?
            .ok_or(PersistenceError::NoSuchEvent(id))
    }

    /// All events of a measurement ordered by timestamp.
    pub fn load_events(&self, measurement_id: MeasurementId) -> PersistenceResult<Vec<Event>> {
        let store = self.lock()?;
        Self::require_measurement(&*store, measurement_id)?;
        Ok(store.query_events_ordered_by_timestamp(measurement_id, None)?)
    }

    /// Events of one type ordered by timestamp.
    pub fn load_events_of_type(
        &self,
        measurement_id: MeasurementId,
        event_type: EventType,
    ) -> PersistenceResult<Vec<Event>> {
        let store = self.lock()?;
        Self::require_measurement(&*store, measurement_id)?;
        Ok(store.query_events_ordered_by_timestamp(measurement_id, Some(event_type))?)
    }

    /// Modality changes of a measurement in the order they happened.
    ///
    /// A change without a parsable modality is a corrupted log.
    pub fn load_modality_changes(
        &self,
        measurement_id: MeasurementId,
    ) -> PersistenceResult<Vec<ModalityChange>> {
        self.load_events_of_type(measurement_id, EventType::ModalityTypeChange)?
            .into_iter()
            .map(|event| -> PersistenceResult<ModalityChange> {
                let modality = event
                    .value
                    .as_deref()
                    .ok_or_else(|| format!("event {} has no value", event.id))
                    .and_then(|value| value.parse::<Modality>())
                    .map_err(|e| {
                        PersistenceError::invariant(format!(
                            "Invalid modality change in measurement {}: {}",
                            measurement_id, e
                        ))
                    })?;
                Ok(ModalityChange {
                    timestamp: event.timestamp,
                    modality,
                })
            })
            .collect()
    }
}
