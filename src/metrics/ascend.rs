//! Ascend (cumulative positive elevation gain) calculation.
//!
//! Barometric pressure is preferred over GNSS altitude when any track has
//! pressure samples. Both paths apply the same noise floor: altitude changes
//! smaller than the threshold are ignored until the accumulated change from
//! the last accepted altitude exceeds it.

use crate::measurement::types::{GeoLocation, Pressure, Track};
use crate::metrics::smoothing::windowed_averages;
use crate::storage::config::AscendSettings;

/// Reference pressure for the barometric formula in hPa.
pub const STANDARD_SEA_LEVEL_PRESSURE_HPA: f64 = 1013.25;

/// Altitude in meters for a pressure reading, relative to standard sea-level pressure.
pub fn altitude_from_pressure(pressure_hpa: f64) -> f64 {
    44_330.0 * (1.0 - (pressure_hpa / STANDARD_SEA_LEVEL_PRESSURE_HPA).powf(1.0 / 5.255))
}

/// Sum of the positive altitude changes of at least `threshold` meters.
pub fn accumulate_ascend(altitudes: impl IntoIterator<Item = f64>, threshold: f64) -> f64 {
    let mut last: Option<f64> = None;
    let mut ascend = 0.0;

    for altitude in altitudes {
        let Some(previous) = last else {
            last = Some(altitude);
            continue;
        };

        let delta = altitude - previous;
        if delta.abs() < threshold {
            continue;
        }
        if delta > 0.0 {
            ascend += delta;
        }
        last = Some(altitude);
    }

    ascend
}

/// Computes the ascend of a measurement's tracks.
#[derive(Debug, Clone, Default)]
pub struct AscendCalculator {
    settings: AscendSettings,
}

impl AscendCalculator {
    pub fn new(settings: AscendSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &AscendSettings {
        &self.settings
    }

    /// Total ascend in meters, `None` if no track has usable altitude data.
    pub fn ascend(&self, tracks: &[Track], force_gnss_ascend: bool) -> Option<f64> {
        let barometric = !force_gnss_ascend && tracks.iter().any(|t| !t.pressures.is_empty());

        let per_track = tracks.iter().map(|track| {
            if barometric {
                self.ascend_from_pressures(&track.pressures)
            } else {
                self.ascend_from_locations(&track.locations)
            }
        });

        let total = per_track
            .flatten()
            .fold(None, |total: Option<f64>, ascend| {
                Some(total.unwrap_or(0.0) + ascend)
            });

        tracing::debug!(
            "Ascend over {} tracks ({}): {:?}",
            tracks.len(),
            if barometric { "barometric" } else { "gnss" },
            total
        );
        total
    }

    /// Ascend of one track from its pressure series.
    ///
    /// `None` without samples. A series no longer than the smoothing window
    /// contributes `Some(0.0)`.
    pub fn ascend_from_pressures(&self, pressures: &[Pressure]) -> Option<f64> {
        if pressures.is_empty() {
            return None;
        }

        let window_size = self.settings.pressure_window_size;
        if pressures.len() <= window_size {
            return Some(0.0);
        }

        let values: Vec<f64> = pressures.iter().map(|p| p.pressure).collect();
        let altitudes = windowed_averages(&values, window_size)
            .into_iter()
            .map(altitude_from_pressure);

        Some(accumulate_ascend(altitudes, self.settings.ascend_threshold_m))
    }

    /// Ascend of one track from GNSS altitudes.
    ///
    /// Locations with a vertical accuracy worse than the threshold are
    /// skipped, as are locations without altitude. `None` if no location
    /// remains.
    pub fn ascend_from_locations(&self, locations: &[GeoLocation]) -> Option<f64> {
        let max_vertical_accuracy = self.settings.vertical_accuracy_threshold_m;
        let altitudes: Vec<f64> = locations
            .iter()
            .filter(|l| {
                !l.vertical_accuracy
                    .is_some_and(|accuracy| accuracy > max_vertical_accuracy)
            })
            .filter_map(|l| l.altitude)
            .collect();

        if altitudes.is_empty() {
            return None;
        }

        Some(accumulate_ascend(altitudes, self.settings.ascend_threshold_m))
    }
}
