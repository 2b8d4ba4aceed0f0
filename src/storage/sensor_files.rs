//! Raw sensor sample files.
//!
//! Accelerations, rotations and directions are written by the capture
//! service into one binary file per measurement and sensor. Only their
//! removal is managed here.

use crate::measurement::types::MeasurementId;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// File extension of accelerometer samples.
pub const ACCELERATIONS_EXTENSION: &str = "cyfa";
/// File extension of gyroscope samples.
pub const ROTATIONS_EXTENSION: &str = "cyfr";
/// File extension of magnetometer samples.
pub const DIRECTIONS_EXTENSION: &str = "cyfd";

const EXTENSIONS: [&str; 3] = [
    ACCELERATIONS_EXTENSION,
    ROTATIONS_EXTENSION,
    DIRECTIONS_EXTENSION,
];

/// Directory holding the raw sensor files.
#[derive(Debug, Clone)]
pub struct SensorFileStore {
    dir: PathBuf,
}

impl SensorFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file for one measurement and extension.
    pub fn file_path(&self, measurement_id: MeasurementId, extension: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", measurement_id, extension))
    }

    /// Delete every sensor file of a measurement.
    ///
    /// Returns the number of files removed; missing files are skipped.
    pub fn delete(&self, measurement_id: MeasurementId) -> std::io::Result<usize> {
        let mut removed = 0;
        for extension in EXTENSIONS {
            let path = self.file_path(measurement_id, extension);
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        tracing::debug!(
            "Deleted {} sensor files of measurement {}",
            removed,
            measurement_id
        );
        Ok(removed)
    }
}
