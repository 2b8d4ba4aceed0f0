//! CSV export of measurement tracks.

use crate::export::ExportError;
use crate::measurement::lifecycle::PersistenceLayer;
use crate::measurement::types::{Measurement, MeasurementId, Track};
use crate::storage::store::MeasurementStore;
use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::Path;

const HEADER: &str = "device_id,measurement_id,modality,track,timestamp,latitude,longitude,altitude,speed,accuracy";

fn format_time(timestamp_millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_millis)
        .map_or_else(|| timestamp_millis.to_string(), |time| time.to_rfc3339())
}

fn optional(value: Option<f64>, precision: usize) -> String {
    value.map_or(String::new(), |v| format!("{:.*}", precision, v))
}

/// Export the locations of `tracks`, one row per location.
pub fn export_csv(
    measurement: &Measurement,
    tracks: &[Track],
    device_id: &str,
) -> Result<String, ExportError> {
    if tracks.iter().all(Track::is_empty) {
        return Err(ExportError::NoData(measurement.id));
    }

    let mut output = Vec::new();
    writeln!(output, "{}", HEADER).map_err(|e| ExportError::WriteFailed(e.to_string()))?;

    for (index, track) in tracks.iter().enumerate() {
        for location in &track.locations {
            writeln!(
                output,
                "{},{},{},{},{},{:.7},{:.7},{},{:.2},{}",
                device_id,
                measurement.id,
                measurement.modality,
                index,
                format_time(location.timestamp),
                location.latitude,
                location.longitude,
                optional(location.altitude, 1),
                location.speed,
                optional(location.accuracy, 1),
            )
            .map_err(|e| ExportError::WriteFailed(e.to_string()))?;
        }
    }

    String::from_utf8(output).map_err(|e| ExportError::WriteFailed(e.to_string()))
}

/// Export to CSV and write to a file.
pub fn export_csv_to_file(
    measurement: &Measurement,
    tracks: &[Track],
    device_id: &str,
    path: &Path,
) -> Result<(), ExportError> {
    let content = export_csv(measurement, tracks, device_id)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Default file name for a measurement CSV export.
pub fn generate_csv_filename(measurement: &Measurement) -> String {
    let started = DateTime::<Utc>::from_timestamp_millis(measurement.timestamp)
        .map_or_else(|| measurement.timestamp.to_string(), |time| {
            time.format("%Y%m%d_%H%M%S").to_string()
        });
    format!("GeoCapture_{}_{}.csv", measurement.id, started)
}

impl<S: MeasurementStore> PersistenceLayer<S> {
    /// Export the cleaned tracks of a measurement, tagged with this device's id.
    pub fn export_measurement_csv(&self, id: MeasurementId) -> Result<String, ExportError> {
        let measurement = self.load_measurement(id)?;
        let strategy = self.cleaning_strategy_for(id)?;
        let tracks = self.load_cleaned_tracks(id, &strategy)?;
        let device_id = self.device_id()?;

        let csv = export_csv(&measurement, &tracks, &device_id)?;
        tracing::info!(
            "Exported measurement {} with {} tracks",
            id,
            tracks.len()
        );
        Ok(csv)
    }
}
