//! Measurement module for capture lifecycle and event log.

pub mod error;
pub mod events;
pub mod lifecycle;
pub mod session;
pub mod types;

pub use error::{PersistenceError, PersistenceResult};
pub use events::ModalityChange;
pub use lifecycle::{PersistenceLayer, SessionContext};
pub use session::{CaptureSession, SessionError};
pub use types::{
    Event, EventId, EventType, GeoLocation, Measurement, MeasurementId, MeasurementStatus,
    Modality, Pressure, Track, FILE_FORMAT_VERSION,
};
