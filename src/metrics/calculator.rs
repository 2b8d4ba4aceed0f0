//! Metric queries over stored measurements.
//!
//! Loads a measurement's samples and events under the storage lock, then
//! runs the pure track, ascend, duration and distance computations.

use crate::measurement::error::PersistenceResult;
use crate::measurement::lifecycle::{now_millis, PersistenceLayer};
use crate::measurement::types::{MeasurementId, MeasurementStatus, Modality, Track};
use crate::metrics::cleaning::{DefaultLocationCleaningStrategy, LocationCleaningStrategy};
use crate::metrics::distance::{average_speed, total_distance};
use crate::metrics::duration::active_duration;
use crate::metrics::tracks::segment_tracks;
use crate::storage::store::MeasurementStore;
use serde::Serialize;

/// Derived metrics of one measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementSummary {
    pub id: MeasurementId,
    pub status: MeasurementStatus,
    pub modality: Modality,
    /// Distance accumulated while capturing, in meters
    pub distance_m: f64,
    /// Active capture time in milliseconds
    pub duration_ms: u64,
    /// Elevation gain in meters, `None` without altitude data
    pub ascend_m: Option<f64>,
    /// Average speed over cleaned tracks in m/s
    pub average_speed_mps: Option<f64>,
    pub track_count: usize,
}

impl<S: MeasurementStore> PersistenceLayer<S> {
    /// Tracks of a measurement built from all stored locations.
    pub fn load_tracks(&self, id: MeasurementId) -> PersistenceResult<Vec<Track>> {
        let store = self.lock()?;
        Self::require_measurement(&*store, id)?;

        let events = store.query_events_ordered_by_timestamp(id, None)?;
        let locations = store.query_locations_ordered_by_timestamp(id)?;
        segment_tracks(locations, Vec::new(), &events)
    }

    /// Tracks of a measurement including their pressure samples.
    pub fn load_tracks_with_pressures(&self, id: MeasurementId) -> PersistenceResult<Vec<Track>> {
        let store = self.lock()?;
        Self::require_measurement(&*store, id)?;

        let events = store.query_events_ordered_by_timestamp(id, None)?;
        let locations = store.query_locations_ordered_by_timestamp(id)?;
        let pressures = store.query_pressures_ordered_by_timestamp(id)?;
        segment_tracks(locations, pressures, &events)
    }

    /// Tracks of a measurement built from the locations `strategy` accepts.
    pub fn load_cleaned_tracks<C: LocationCleaningStrategy>(
        &self,
        id: MeasurementId,
        strategy: &C,
    ) -> PersistenceResult<Vec<Track>> {
        let store = self.lock()?;
        Self::require_measurement(&*store, id)?;

        let events = store.query_events_ordered_by_timestamp(id, None)?;
        let locations = strategy.load_cleaned_locations(&*store, id)?;
        segment_tracks(locations, Vec::new(), &events)
    }

    /// Cleaning strategy matching the current modality of a measurement.
    pub fn cleaning_strategy_for(
        &self,
        id: MeasurementId,
    ) -> PersistenceResult<DefaultLocationCleaningStrategy> {
        let measurement = self.load_measurement(id)?;
        Ok(DefaultLocationCleaningStrategy::for_modality(
            self.cleaning_settings(),
            measurement.modality,
        ))
    }

    /// Elevation gain of a measurement in meters.
    ///
    /// Uses the barometer when any track has pressure samples unless
    /// `force_gnss_ascend` is set. `None` when no altitude data exists.
    pub fn load_ascend(
        &self,
        id: MeasurementId,
        force_gnss_ascend: bool,
    ) -> PersistenceResult<Option<f64>> {
        let tracks = self.load_tracks_with_pressures(id)?;
        Ok(self.ascend_calculator().ascend(&tracks, force_gnss_ascend))
    }

    /// Active capture time of a measurement in milliseconds.
    pub fn load_duration(&self, id: MeasurementId) -> PersistenceResult<u64> {
        self.load_duration_at(id, now_millis())
    }

    /// Active capture time with `now` as the current time for an OPEN
    /// measurement.
    pub fn load_duration_at(&self, id: MeasurementId, now: i64) -> PersistenceResult<u64> {
        let store = self.lock()?;
        let measurement = Self::require_measurement(&*store, id)?;
        let events = store.query_events_ordered_by_timestamp(id, None)?;
        active_duration(&events, measurement.status, now)
    }

    /// Distance along the tracks of clean locations, in meters.
    pub fn load_track_distance<C: LocationCleaningStrategy>(
        &self,
        id: MeasurementId,
        strategy: &C,
    ) -> PersistenceResult<f64> {
        let tracks = self.load_cleaned_tracks(id, strategy)?;
        Ok(total_distance(&tracks))
    }

    /// Average speed in m/s over the tracks of clean locations.
    pub fn load_average_speed<C: LocationCleaningStrategy>(
        &self,
        id: MeasurementId,
        strategy: &C,
    ) -> PersistenceResult<Option<f64>> {
        let tracks = self.load_cleaned_tracks(id, strategy)?;
        Ok(average_speed(&tracks))
    }

    /// All derived metrics of a measurement.
    pub fn summarize(&self, id: MeasurementId) -> PersistenceResult<MeasurementSummary> {
        self.summarize_at(id, now_millis())
    }

    pub fn summarize_at(&self, id: MeasurementId, now: i64) -> PersistenceResult<MeasurementSummary> {
        let measurement = self.load_measurement(id)?;
        let strategy = DefaultLocationCleaningStrategy::for_modality(
            self.cleaning_settings(),
            measurement.modality,
        );

        let summary = MeasurementSummary {
            id,
            status: measurement.status,
            modality: measurement.modality,
            distance_m: measurement.distance,
            duration_ms: self.load_duration_at(id, now)?,
            ascend_m: self.load_ascend(id, false)?,
            average_speed_mps: self.load_average_speed(id, &strategy)?,
            track_count: self.load_tracks(id)?.len(),
        };
        tracing::debug!("Summary of measurement {}: {:?}", id, summary);
        Ok(summary)
    }
}
