//! Storage collaborator interface consumed by the measurement core.

use crate::measurement::types::{
    Event, EventId, EventType, GeoLocation, Measurement, MeasurementId, MeasurementStatus,
    Modality, Pressure,
};
use crate::storage::database::DatabaseError;

/// Bounds a location must satisfy to be returned by a clean-location query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationQualityFilter {
    /// Largest accepted horizontal accuracy radius in meters
    pub max_accuracy_m: f64,
    /// Smallest accepted speed in m/s
    pub min_speed_mps: f64,
    /// Largest accepted speed in m/s
    pub max_speed_mps: f64,
}

impl LocationQualityFilter {
    /// Whether a location lies within the bounds. Unknown accuracy never does.
    pub fn accepts(&self, location: &GeoLocation) -> bool {
        let accurate = location
            .accuracy
            .is_some_and(|accuracy| accuracy <= self.max_accuracy_m);
        accurate && (self.min_speed_mps..=self.max_speed_mps).contains(&location.speed)
    }
}

/// Persistent storage for measurements and their samples.
///
/// Every sequence is returned sorted by timestamp, ties in insertion order.
pub trait MeasurementStore {
    /// Insert a new measurement row.
    fn create_measurement(
        &mut self,
        status: MeasurementStatus,
        modality: Modality,
        file_format_version: u16,
        timestamp: i64,
    ) -> Result<Measurement, DatabaseError>;

    fn load_measurement(&self, id: MeasurementId) -> Result<Option<Measurement>, DatabaseError>;

    /// All measurements ordered by identifier.
    fn load_measurements(&self) -> Result<Vec<Measurement>, DatabaseError>;

    fn query_measurements_by_status(
        &self,
        status: MeasurementStatus,
    ) -> Result<Vec<Measurement>, DatabaseError>;

    /// Returns the number of rows updated.
    fn update_measurement_status(
        &self,
        id: MeasurementId,
        status: MeasurementStatus,
    ) -> Result<usize, DatabaseError>;

    /// Returns the number of rows updated.
    fn update_measurement_modality(
        &self,
        id: MeasurementId,
        modality: Modality,
    ) -> Result<usize, DatabaseError>;

    /// Returns the number of rows updated.
    fn update_measurement_distance(
        &self,
        id: MeasurementId,
        distance: f64,
    ) -> Result<usize, DatabaseError>;

    fn append_event(
        &self,
        measurement_id: MeasurementId,
        event_type: EventType,
        timestamp: i64,
        value: Option<&str>,
    ) -> Result<EventId, DatabaseError>;

    fn load_event(&self, id: EventId) -> Result<Option<Event>, DatabaseError>;

    fn query_events_ordered_by_timestamp(
        &self,
        measurement_id: MeasurementId,
        type_filter: Option<EventType>,
    ) -> Result<Vec<Event>, DatabaseError>;

    fn insert_location(&self, location: &GeoLocation) -> Result<(), DatabaseError>;

    /// Insert a batch atomically.
    fn insert_locations(&mut self, locations: &[GeoLocation]) -> Result<(), DatabaseError>;

    fn query_locations_ordered_by_timestamp(
        &self,
        measurement_id: MeasurementId,
    ) -> Result<Vec<GeoLocation>, DatabaseError>;

    /// Locations accepted by `filter`.
    fn query_clean_locations(
        &self,
        measurement_id: MeasurementId,
        filter: &LocationQualityFilter,
    ) -> Result<Vec<GeoLocation>, DatabaseError>;

    fn insert_pressure(&self, pressure: &Pressure) -> Result<(), DatabaseError>;

    /// Insert a batch atomically.
    fn insert_pressures(&mut self, pressures: &[Pressure]) -> Result<(), DatabaseError>;

    fn query_pressures_ordered_by_timestamp(
        &self,
        measurement_id: MeasurementId,
    ) -> Result<Vec<Pressure>, DatabaseError>;

    /// Remove the bulky raw sensor files of a measurement.
    fn delete_raw_sensor_files(&self, measurement_id: MeasurementId) -> Result<(), DatabaseError>;

    /// Remove a measurement with its events, locations, pressures and sensor files.
    fn delete_measurement_cascade(
        &mut self,
        measurement_id: MeasurementId,
    ) -> Result<(), DatabaseError>;

    /// Return the persisted device identifier, creating it on first use.
    fn restore_or_create_device_id(&mut self) -> Result<String, DatabaseError>;

    /// Run `f` as one unit of work: its writes are kept only if it
    /// returns `Ok`. Batch inserts and cascading deletes must not be
    /// called from inside `f`.
    fn atomically<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        Self: Sized,
        E: From<DatabaseError>,
        F: FnOnce(&mut Self) -> Result<T, E>;
}
