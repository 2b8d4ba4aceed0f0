//! GeoCapture - Measurement Capture Core
//!
//! Lifecycle, event log and derived metrics of geo-located measurements:
//! track segmentation around pauses, location cleaning, barometric and GNSS
//! ascend, and active capture duration, on top of a SQLite store.

pub mod export;
pub mod measurement;
pub mod metrics;
pub mod storage;

// Re-export commonly used types
pub use measurement::lifecycle::PersistenceLayer;
pub use measurement::session::CaptureSession;
pub use metrics::calculator::MeasurementSummary;
pub use storage::config::AppConfig;
pub use storage::database::Database;
