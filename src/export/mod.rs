//! Export of measurements to external formats.

pub mod csv;

use crate::measurement::error::PersistenceError;
use crate::measurement::types::MeasurementId;
use thiserror::Error;

pub use csv::{export_csv, export_csv_to_file, generate_csv_filename};

/// Export errors.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Measurement has no locations inside any track
    #[error("Measurement {0} has no data to export")]
    NoData(MeasurementId),

    /// Failed to write export data
    #[error("Failed to write data: {0}")]
    WriteFailed(String),

    /// Loading the measurement failed
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
