//! Capture session.
//!
//! Drives a measurement through its lifecycle while samples arrive: every
//! transition logs its lifecycle event and updates the status, and every
//! clean location extends the measurement's distance.

use crate::measurement::error::PersistenceError;
use crate::measurement::lifecycle::{now_millis, PersistenceLayer, SessionContext};
use crate::measurement::types::{
    EventType, GeoLocation, Measurement, MeasurementId, MeasurementStatus, Modality, Pressure,
};
use crate::metrics::cleaning::{DefaultLocationCleaningStrategy, LocationCleaningStrategy};
use crate::metrics::distance::distance_between;
use crate::storage::store::MeasurementStore;
use std::sync::Arc;
use thiserror::Error;

/// Errors of the capture session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A measurement is already OPEN or PAUSED
    #[error("Capturing already in progress for measurement {0}")]
    AlreadyCapturing(MeasurementId),

    /// No measurement is OPEN
    #[error("Not currently capturing")]
    NotCapturing,

    /// No measurement is PAUSED
    #[error("No paused measurement to resume")]
    NotPaused,

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

pub type SessionResult<T> = Result<T, SessionError>;

type Clock = Box<dyn Fn() -> i64 + Send + Sync>;

/// Captures measurements on top of a [`PersistenceLayer`].
///
/// Which measurement is being captured is looked up in storage on every
/// call. Lifecycle transitions are applied by the layer as one unit, so
/// sessions sharing a layer never log the same transition twice.
pub struct CaptureSession<S: MeasurementStore> {
    persistence: Arc<PersistenceLayer<S>>,
    clock: Clock,
    /// Last clean location of the current sub-track
    last_location: Option<GeoLocation>,
}

impl<S: MeasurementStore> CaptureSession<S> {
    pub fn new(persistence: Arc<PersistenceLayer<S>>) -> Self {
        Self {
            persistence,
            clock: Box::new(now_millis),
            last_location: None,
        }
    }

    /// Replace the wall clock used for lifecycle event timestamps.
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn persistence(&self) -> &Arc<PersistenceLayer<S>> {
        &self.persistence
    }

    pub fn context(&self) -> SessionResult<SessionContext> {
        Ok(self.persistence.session_context()?)
    }

    /// Start capturing a new measurement.
    pub fn start(&mut self, modality: Modality) -> SessionResult<Measurement> {
        if let Some(active) = self.context()?.active() {
            return Err(SessionError::AlreadyCapturing(active.id));
        }

        let measurement = self
            .persistence
            .new_measurement_at(modality, (self.clock)())?;
        self.last_location = None;

        tracing::info!("Started capturing measurement {}", measurement.id);
        Ok(measurement)
    }

    /// Pause the OPEN measurement.
    pub fn pause(&mut self) -> SessionResult<MeasurementId> {
        let open = self.context()?.open.ok_or(SessionError::NotCapturing)?;

        let paused = self
            .persistence
            .transition(
                open.id,
                EventType::LifecyclePause,
                MeasurementStatus::Paused,
                (self.clock)(),
            )?
            .ok_or(SessionError::NotCapturing)?;
        self.last_location = None;

        tracing::info!("Paused measurement {}", paused.id);
        Ok(paused.id)
    }

    /// Resume the PAUSED measurement.
    pub fn resume(&mut self) -> SessionResult<MeasurementId> {
        let paused = self.context()?.paused.ok_or(SessionError::NotPaused)?;

        let resumed = self
            .persistence
            .transition(
                paused.id,
                EventType::LifecycleResume,
                MeasurementStatus::Open,
                (self.clock)(),
            )?
            .ok_or(SessionError::NotPaused)?;
        self.last_location = None;

        tracing::info!("Resumed measurement {}", resumed.id);
        Ok(resumed.id)
    }

    /// Stop the OPEN or PAUSED measurement and return it as FINISHED.
    pub fn stop(&mut self) -> SessionResult<Measurement> {
        let active = self
            .context()?
            .active()
            .cloned()
            .ok_or(SessionError::NotCapturing)?;

        let finished = self
            .persistence
            .transition(
                active.id,
                EventType::LifecycleStop,
                MeasurementStatus::Finished,
                (self.clock)(),
            )?
            .ok_or(SessionError::NotCapturing)?;
        self.last_location = None;

        tracing::info!(
            "Stopped measurement {} after {:.0} m",
            finished.id,
            finished.distance
        );
        Ok(finished)
    }

    /// Switch the transportation mode of the OPEN or PAUSED measurement.
    pub fn change_modality(&mut self, modality: Modality) -> SessionResult<()> {
        let active = self
            .context()?
            .active()
            .cloned()
            .ok_or(SessionError::NotCapturing)?;

        self.persistence.log_event(
            active.id,
            EventType::ModalityTypeChange,
            (self.clock)(),
            Some(modality.as_str()),
        )?;
        self.persistence.update_modality(active.id, modality)?;

        tracing::info!(
            "Measurement {} changed modality from {} to {}",
            active.id,
            active.modality,
            modality
        );
        Ok(())
    }

    /// Store a location for the OPEN measurement.
    ///
    /// The location is attached to the OPEN measurement regardless of its
    /// `measurement_id`. Clean locations extend the measurement's distance;
    /// returns the distance after the update.
    pub fn record_location(&mut self, mut location: GeoLocation) -> SessionResult<f64> {
        let open = self.context()?.open.ok_or(SessionError::NotCapturing)?;
        location.measurement_id = open.id;
        self.persistence.store_location(&location)?;

        let strategy = DefaultLocationCleaningStrategy::for_modality(
            self.persistence.cleaning_settings(),
            open.modality,
        );
        if !strategy.is_clean(&location) {
            tracing::debug!(
                "Location at {} not clean, distance unchanged",
                location.timestamp
            );
            return Ok(open.distance);
        }

        let mut distance = open.distance;
        if let Some(previous) = self
            .last_location
            .as_ref()
            .filter(|previous| previous.measurement_id == open.id)
        {
            distance += distance_between(previous, &location);
            self.persistence.update_distance(open.id, distance)?;
        }
        self.last_location = Some(location);

        Ok(distance)
    }

    /// Store a pressure sample for the OPEN measurement.
    pub fn record_pressure(&mut self, mut pressure: Pressure) -> SessionResult<()> {
        let open = self.context()?.open.ok_or(SessionError::NotCapturing)?;
        pressure.measurement_id = open.id;
        self.persistence.store_pressure(&pressure)?;
        Ok(())
    }
}
