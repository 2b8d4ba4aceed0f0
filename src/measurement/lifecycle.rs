//! Measurement lifecycle.
//!
//! [`PersistenceLayer`] owns the storage collaborator behind a single mutex.
//! Creating a measurement and changing its status happen inside that
//! critical section, which keeps the global "one OPEN or one PAUSED
//! measurement" invariant enforceable across callers.

use crate::measurement::error::{PersistenceError, PersistenceResult};
use crate::measurement::types::{
    EventType, GeoLocation, Measurement, MeasurementId, MeasurementStatus, Modality, Pressure,
    FILE_FORMAT_VERSION,
};
use crate::metrics::ascend::AscendCalculator;
use crate::storage::config::{AppConfig, CleaningSettings};
use crate::storage::store::MeasurementStore;
use std::sync::{Mutex, MutexGuard};

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Snapshot of the measurements attached to capturing.
///
/// Read fresh from storage on every request, never cached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    pub open: Option<Measurement>,
    pub paused: Option<Measurement>,
}

impl SessionContext {
    /// The OPEN or PAUSED measurement, if any.
    pub fn active(&self) -> Option<&Measurement> {
        self.open.as_ref().or(self.paused.as_ref())
    }

    pub fn is_capturing(&self) -> bool {
        self.open.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.is_some()
    }
}

/// Entry point for managing measurements and deriving their metrics.
pub struct PersistenceLayer<S: MeasurementStore> {
    store: Mutex<S>,
    cleaning: CleaningSettings,
    ascend: AscendCalculator,
}

impl<S: MeasurementStore> PersistenceLayer<S> {
    /// Create a layer with default cleaning and ascend settings.
    pub fn new(store: S) -> Self {
        Self {
            store: Mutex::new(store),
            cleaning: CleaningSettings::default(),
            ascend: AscendCalculator::default(),
        }
    }

    /// Create a layer using the settings of `config`.
    pub fn from_config(store: S, config: &AppConfig) -> Self {
        Self {
            store: Mutex::new(store),
            cleaning: config.cleaning.clone(),
            ascend: AscendCalculator::new(config.ascend.clone()),
        }
    }

    pub fn cleaning_settings(&self) -> &CleaningSettings {
        &self.cleaning
    }

    pub fn ascend_calculator(&self) -> &AscendCalculator {
        &self.ascend
    }

    /// Enter the storage critical section.
    pub(crate) fn lock(&self) -> PersistenceResult<MutexGuard<'_, S>> {
        self.store
            .lock()
            .map_err(|e| PersistenceError::LockPoisoned(e.to_string()))
    }

    /// Load a measurement or fail with `NoSuchMeasurement`.
    pub(crate) fn require_measurement(
        store: &S,
        id: MeasurementId,
    ) -> PersistenceResult<Measurement> {
        store
            .load_measurement(id)?
            .ok_or(PersistenceError::NoSuchMeasurement(id))
    }

    /// Create a new OPEN measurement together with its START event.
    pub fn new_measurement(&self, modality: Modality) -> PersistenceResult<Measurement> {
        self.new_measurement_at(modality, now_millis())
    }

    /// Create a new OPEN measurement whose START event is at `timestamp`.
    ///
    /// Fails with an invariant violation while another measurement is
    /// OPEN or PAUSED.
    pub fn new_measurement_at(
        &self,
        modality: Modality,
        timestamp: i64,
    ) -> PersistenceResult<Measurement> {
        let mut store = self.lock()?;

        let context = Self::read_context(&*store)?;
        if let Some(active) = context.active() {
            return Err(PersistenceError::invariant(format!(
                "Cannot create a measurement while measurement {} is {}",
                active.id, active.status
            )));
        }

        let measurement = store.atomically(|store| {
            let measurement = store.create_measurement(
                MeasurementStatus::Open,
                modality,
                FILE_FORMAT_VERSION,
                timestamp,
            )?;
            store.append_event(
                measurement.id,
                EventType::LifecycleStart,
                timestamp,
                None,
            )?;
            Ok::<_, PersistenceError>(measurement)
        })?;

        tracing::info!(
            "Created measurement {} ({}) at {}",
            measurement.id,
            modality,
            timestamp
        );
        Ok(measurement)
    }

    /// Move a measurement to `status`.
    ///
    /// Only the transitions of [`MeasurementStatus::can_transition_to`] are
    /// accepted. After the update the single-active-measurement invariant
    /// is re-verified; `allow_corrupted_state` skips that check for a
    /// transition to FINISHED and is reserved for startup self-healing.
    /// A failed check leaves the status unchanged.
    pub fn set_status(
        &self,
        id: MeasurementId,
        status: MeasurementStatus,
        allow_corrupted_state: bool,
    ) -> PersistenceResult<()> {
        let mut store = self.lock()?;
        store.atomically(|store| Self::set_status_locked(store, id, status, allow_corrupted_state))
    }

    /// Log the lifecycle event `event_type` at `timestamp` and move the
    /// measurement to `status` as one step.
    ///
    /// Returns `None` without writing anything when the measurement's
    /// current status does not lead to `status`, e.g. because another
    /// caller already paused or stopped it.
    pub fn transition(
        &self,
        id: MeasurementId,
        event_type: EventType,
        status: MeasurementStatus,
        timestamp: i64,
    ) -> PersistenceResult<Option<Measurement>> {
        let mut store = self.lock()?;
        store.atomically(|store| {
            Self::read_context(store)?;
            let current = Self::require_measurement(store, id)?;
            if !current.status.can_transition_to(status) {
                tracing::debug!(
                    "Measurement {} is {}, skipping {}",
                    id,
                    current.status,
                    event_type
                );
                return Ok(None);
            }

            store.append_event(id, event_type, timestamp, None)?;
            Self::set_status_locked(store, id, status, false)?;
            Self::require_measurement(store, id).map(Some)
        })
    }

    fn set_status_locked(
        store: &S,
        id: MeasurementId,
        status: MeasurementStatus,
        allow_corrupted_state: bool,
    ) -> PersistenceResult<()> {
        let current = Self::require_measurement(store, id)?;
        if !current.status.can_transition_to(status) {
            return Err(PersistenceError::invariant(format!(
                "Illegal transition of measurement {} from {} to {}",
                id, current.status, status
            )));
        }

        match store.update_measurement_status(id, status)? {
            0 => return Err(PersistenceError::NoSuchMeasurement(id)),
            1 => {}
            n => {
                return Err(PersistenceError::invariant(format!(
                    "Status update of measurement {} changed {} rows",
                    id, n
                )))
            }
        }

        match status {
            MeasurementStatus::Open => {
                Self::ensure_none_with_status(store, MeasurementStatus::Paused, status)?
            }
            MeasurementStatus::Paused => {
                Self::ensure_none_with_status(store, MeasurementStatus::Open, status)?
            }
            MeasurementStatus::Finished if !allow_corrupted_state => {
                Self::ensure_none_with_status(store, MeasurementStatus::Open, status)?;
                Self::ensure_none_with_status(store, MeasurementStatus::Paused, status)?;
            }
            _ => {}
        }

        tracing::info!(
            "Measurement {} changed from {} to {}",
            id,
            current.status,
            status
        );
        Ok(())
    }

    fn ensure_none_with_status(
        store: &S,
        status: MeasurementStatus,
        after: MeasurementStatus,
    ) -> PersistenceResult<()> {
        let remaining = store.query_measurements_by_status(status)?;
        if let Some(other) = remaining.first() {
            return Err(PersistenceError::invariant(format!(
                "Measurement {} is still {} after a transition to {}",
                other.id, status, after
            )));
        }
        Ok(())
    }

    /// Move a FINISHED measurement to SYNCED, SKIPPED or DEPRECATED and
    /// delete its raw sensor files.
    ///
    /// Locations, events and metadata are kept.
    pub fn mark_finished_as(
        &self,
        status: MeasurementStatus,
        id: MeasurementId,
    ) -> PersistenceResult<()> {
        let mut store = self.lock()?;

        let current = Self::require_measurement(&*store, id)?;
        if current.status != MeasurementStatus::Finished {
            return Err(PersistenceError::invariant(format!(
                "Measurement {} must be FINISHED to become {}, but is {}",
                id, status, current.status
            )));
        }
        if !matches!(
            status,
            MeasurementStatus::Synced | MeasurementStatus::Skipped | MeasurementStatus::Deprecated
        ) {
            return Err(PersistenceError::invariant(format!(
                "A finished measurement cannot be marked as {}",
                status
            )));
        }

        store.atomically(|store| Self::set_status_locked(store, id, status, false))?;
        store.delete_raw_sensor_files(id)?;
        Ok(())
    }

    /// The measurements currently attached to capturing.
    pub fn session_context(&self) -> PersistenceResult<SessionContext> {
        let store = self.lock()?;
        Self::read_context(&*store)
    }

    fn read_context(store: &S) -> PersistenceResult<SessionContext> {
        let mut open = store.query_measurements_by_status(MeasurementStatus::Open)?;
        let mut paused = store.query_measurements_by_status(MeasurementStatus::Paused)?;

        if open.len() > 1 || paused.len() > 1 || (!open.is_empty() && !paused.is_empty()) {
            return Err(PersistenceError::invariant(format!(
                "{} OPEN and {} PAUSED measurements exist",
                open.len(),
                paused.len()
            )));
        }

        Ok(SessionContext {
            open: open.pop(),
            paused: paused.pop(),
        })
    }

    pub fn load_measurement(&self, id: MeasurementId) -> PersistenceResult<Measurement> {
        let store = self.lock()?;
        Self::require_measurement(&*store, id)
    }

    pub fn load_measurements(&self) -> PersistenceResult<Vec<Measurement>> {
        let store = self.lock()?;
        Ok(store.load_measurements()?)
    }

    pub fn load_measurements_by_status(
        &self,
        status: MeasurementStatus,
    ) -> PersistenceResult<Vec<Measurement>> {
        let store = self.lock()?;
        Ok(store.query_measurements_by_status(status)?)
    }

    pub fn has_measurement(&self, id: MeasurementId) -> PersistenceResult<bool> {
        let store = self.lock()?;
        Ok(store.load_measurement(id)?.is_some())
    }

    /// Store the accumulated distance of a measurement.
    pub fn update_distance(&self, id: MeasurementId, distance: f64) -> PersistenceResult<()> {
        let store = self.lock()?;
        let updated = store.update_measurement_distance(id, distance)?;
        Self::expect_single_row(id, updated)
    }

    /// Store the current modality of a measurement.
    pub fn update_modality(&self, id: MeasurementId, modality: Modality) -> PersistenceResult<()> {
        let store = self.lock()?;
        let updated = store.update_measurement_modality(id, modality)?;
        Self::expect_single_row(id, updated)
    }

    fn expect_single_row(id: MeasurementId, updated: usize) -> PersistenceResult<()> {
        match updated {
            0 => Err(PersistenceError::NoSuchMeasurement(id)),
            1 => Ok(()),
            n => Err(PersistenceError::invariant(format!(
                "Update of measurement {} changed {} rows",
                id, n
            ))),
        }
    }

    pub fn store_location(&self, location: &GeoLocation) -> PersistenceResult<()> {
        let store = self.lock()?;
        store.insert_location(location)?;
        Ok(())
    }

    pub fn store_locations(&self, locations: &[GeoLocation]) -> PersistenceResult<()> {
        let mut store = self.lock()?;
        store.insert_locations(locations)?;
        Ok(())
    }

    pub fn store_pressure(&self, pressure: &Pressure) -> PersistenceResult<()> {
        let store = self.lock()?;
        store.insert_pressure(pressure)?;
        Ok(())
    }

    pub fn store_pressures(&self, pressures: &[Pressure]) -> PersistenceResult<()> {
        let mut store = self.lock()?;
        store.insert_pressures(pressures)?;
        Ok(())
    }

    /// Delete a measurement with all of its data.
    ///
    /// Refused with `MeasurementActive` while it is OPEN or PAUSED.
    pub fn delete_measurement(&self, id: MeasurementId) -> PersistenceResult<()> {
        let mut store = self.lock()?;

        let measurement = Self::require_measurement(&*store, id)?;
        if measurement.status.is_active() {
            return Err(PersistenceError::MeasurementActive(id));
        }

        store.delete_measurement_cascade(id)?;
        tracing::info!("Deleted measurement {}", id);
        Ok(())
    }

    /// Finish every measurement a crashed process left OPEN or PAUSED.
    ///
    /// Each gets a STOP event at its last known activity and is set to
    /// FINISHED without the single-active check. Returns the finished ids.
    pub fn recover_dangling_measurements(&self) -> PersistenceResult<Vec<MeasurementId>> {
        let mut store = self.lock()?;

        let mut dangling = store.query_measurements_by_status(MeasurementStatus::Open)?;
        dangling.extend(store.query_measurements_by_status(MeasurementStatus::Paused)?);
        dangling.sort_by_key(|m| m.id);

        let mut recovered = Vec::with_capacity(dangling.len());
        for measurement in dangling {
            let last_event = store
                .query_events_ordered_by_timestamp(measurement.id, None)?
                .last()
                .map(|e| e.timestamp);
            let last_location = store
                .query_locations_ordered_by_timestamp(measurement.id)?
                .last()
                .map(|l| l.timestamp);
            let stop_at = [Some(measurement.timestamp), last_event, last_location]
                .into_iter()
                .flatten()
                .max()
                .unwrap_or(measurement.timestamp);

            tracing::warn!(
                "Finishing dangling {} measurement {} at {}",
                measurement.status,
                measurement.id,
                stop_at
            );
            store.atomically(|store| {
                store.append_event(measurement.id, EventType::LifecycleStop, stop_at, None)?;
                Self::set_status_locked(store, measurement.id, MeasurementStatus::Finished, true)
            })?;
            recovered.push(measurement.id);
        }

        Ok(recovered)
    }

    /// Identifier of this device, created on first use.
    pub fn device_id(&self) -> PersistenceResult<String> {
        let mut store = self.lock()?;
        Ok(store.restore_or_create_device_id()?)
    }
}
