//! Measurement data model.
//!
//! Measurements, lifecycle events and the location/pressure samples captured
//! for them. Timestamps are milliseconds since the Unix epoch throughout.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Identifier of a measurement, assigned monotonically by storage.
pub type MeasurementId = i64;

/// Identifier of an event row.
pub type EventId = i64;

/// Version of the binary sensor file format written for new measurements.
pub const FILE_FORMAT_VERSION: u16 = 3;

/// Lifecycle status of a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeasurementStatus {
    /// Currently capturing
    Open,
    /// Capturing paused, may be resumed
    Paused,
    /// Capturing stopped, waiting for synchronization
    Finished,
    /// Uploaded
    Synced,
    /// Skipped by the user, never uploaded
    Skipped,
    /// Recorded with an outdated format, kept read-only
    Deprecated,
}

impl MeasurementStatus {
    /// Database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementStatus::Open => "OPEN",
            MeasurementStatus::Paused => "PAUSED",
            MeasurementStatus::Finished => "FINISHED",
            MeasurementStatus::Synced => "SYNCED",
            MeasurementStatus::Skipped => "SKIPPED",
            MeasurementStatus::Deprecated => "DEPRECATED",
        }
    }

    /// Whether capturing is still attached to this measurement.
    pub fn is_active(&self) -> bool {
        matches!(self, MeasurementStatus::Open | MeasurementStatus::Paused)
    }

    /// Whether `next` is a legal successor of this status.
    pub fn can_transition_to(&self, next: MeasurementStatus) -> bool {
        use MeasurementStatus::*;
        matches!(
            (self, next),
            (Open, Paused)
                | (Open, Finished)
                | (Paused, Open)
                | (Paused, Finished)
                | (Finished, Synced)
                | (Finished, Skipped)
                | (Finished, Deprecated)
        )
    }
}

impl std::fmt::Display for MeasurementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeasurementStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(MeasurementStatus::Open),
            "PAUSED" => Ok(MeasurementStatus::Paused),
            "FINISHED" => Ok(MeasurementStatus::Finished),
            "SYNCED" => Ok(MeasurementStatus::Synced),
            "SKIPPED" => Ok(MeasurementStatus::Skipped),
            "DEPRECATED" => Ok(MeasurementStatus::Deprecated),
            other => Err(format!("Unknown measurement status: {}", other)),
        }
    }
}

/// Transportation mode of a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Modality {
    Bicycle,
    Car,
    Walking,
    Bus,
    Train,
    #[default]
    Unknown,
}

impl Modality {
    /// Database and event payload representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Bicycle => "BICYCLE",
            Modality::Car => "CAR",
            Modality::Walking => "WALKING",
            Modality::Bus => "BUS",
            Modality::Train => "TRAIN",
            Modality::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BICYCLE" => Ok(Modality::Bicycle),
            "CAR" => Ok(Modality::Car),
            "WALKING" => Ok(Modality::Walking),
            "BUS" => Ok(Modality::Bus),
            "TRAIN" => Ok(Modality::Train),
            "UNKNOWN" => Ok(Modality::Unknown),
            other => Err(format!("Unknown modality: {}", other)),
        }
    }
}

/// A capture run and its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Unique identifier
    pub id: MeasurementId,
    /// Lifecycle status
    pub status: MeasurementStatus,
    /// Current transportation mode
    pub modality: Modality,
    /// Format of the raw sensor files, fixed at creation
    pub file_format_version: u16,
    /// Accumulated distance in meters
    pub distance: f64,
    /// Creation time
    pub timestamp: i64,
}

/// Kind of an event log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    LifecycleStart,
    LifecyclePause,
    LifecycleResume,
    LifecycleStop,
    ModalityTypeChange,
}

impl EventType {
    /// Database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::LifecycleStart => "LIFECYCLE_START",
            EventType::LifecyclePause => "LIFECYCLE_PAUSE",
            EventType::LifecycleResume => "LIFECYCLE_RESUME",
            EventType::LifecycleStop => "LIFECYCLE_STOP",
            EventType::ModalityTypeChange => "MODALITY_TYPE_CHANGE",
        }
    }

    pub fn is_lifecycle(&self) -> bool {
        !matches!(self, EventType::ModalityTypeChange)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LIFECYCLE_START" => Ok(EventType::LifecycleStart),
            "LIFECYCLE_PAUSE" => Ok(EventType::LifecyclePause),
            "LIFECYCLE_RESUME" => Ok(EventType::LifecycleResume),
            "LIFECYCLE_STOP" => Ok(EventType::LifecycleStop),
            "MODALITY_TYPE_CHANGE" => Ok(EventType::ModalityTypeChange),
            other => Err(format!("Unknown event type: {}", other)),
        }
    }
}

/// An entry of a measurement's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub event_type: EventType,
    pub timestamp: i64,
    /// Optional payload, e.g. the new modality of a modality change
    pub value: Option<String>,
    pub measurement_id: MeasurementId,
}

/// A GNSS fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub timestamp: i64,
    pub latitude: f64,
    pub longitude: f64,
    /// Altitude above the WGS84 ellipsoid in meters
    pub altitude: Option<f64>,
    /// Speed in meters per second
    pub speed: f64,
    /// Horizontal accuracy radius in meters
    pub accuracy: Option<f64>,
    /// Vertical accuracy in meters
    pub vertical_accuracy: Option<f64>,
    pub measurement_id: MeasurementId,
}

impl GeoLocation {
    /// Create a fix without altitude or accuracy information.
    pub fn new(
        measurement_id: MeasurementId,
        timestamp: i64,
        latitude: f64,
        longitude: f64,
        speed: f64,
    ) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
            altitude: None,
            speed,
            accuracy: None,
            vertical_accuracy: None,
            measurement_id,
        }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    pub fn with_vertical_accuracy(mut self, vertical_accuracy: f64) -> Self {
        self.vertical_accuracy = Some(vertical_accuracy);
        self
    }
}

/// A barometer reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pressure {
    pub timestamp: i64,
    /// Pressure in hPa
    pub pressure: f64,
    pub measurement_id: MeasurementId,
}

impl Pressure {
    pub fn new(measurement_id: MeasurementId, timestamp: i64, pressure: f64) -> Self {
        Self {
            timestamp,
            pressure,
            measurement_id,
        }
    }
}

/// One contiguous capture interval of a measurement.
///
/// Derived on demand, never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    pub locations: Vec<GeoLocation>,
    pub pressures: Vec<Pressure>,
}

impl Track {
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Timestamp of the first location.
    pub fn start(&self) -> Option<i64> {
        self.locations.first().map(|l| l.timestamp)
    }

    /// Timestamp of the last location.
    pub fn end(&self) -> Option<i64> {
        self.locations.last().map(|l| l.timestamp)
    }
}
