//! Application configuration.
//!
//! Thresholds for location cleaning and ascend calculation plus storage
//! locations, loaded from TOML.

use crate::measurement::types::Modality;
use crate::storage::store::LocationQualityFilter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application version
    pub version: String,
    /// Data directory path
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Location cleaning settings
    pub cleaning: CleaningSettings,
    /// Ascend calculation settings
    pub ascend: AscendSettings,
    /// Storage settings
    pub storage: StorageSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: PathBuf::new(),
            cleaning: CleaningSettings::default(),
            ascend: AscendSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl AppConfig {
    /// Path of the measurement database.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.storage.database_file)
    }

    /// Directory of the raw sensor files.
    pub fn sensor_data_dir(&self) -> PathBuf {
        self.data_dir.join(&self.storage.sensor_data_dir)
    }
}

/// Plausible speed range in m/s.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedWindow {
    pub min_mps: f64,
    pub max_mps: f64,
}

impl SpeedWindow {
    pub const fn new(min_mps: f64, max_mps: f64) -> Self {
        Self { min_mps, max_mps }
    }
}

/// Thresholds deciding which locations count as clean.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningSettings {
    /// Largest accepted horizontal accuracy radius in meters
    pub max_accuracy_m: f64,
    /// Speed window for walking
    pub pedestrian: SpeedWindow,
    /// Speed window for cycling and unknown modalities
    pub cycling: SpeedWindow,
    /// Speed window for car, bus and train
    pub motorized: SpeedWindow,
}

impl Default for CleaningSettings {
    fn default() -> Self {
        Self {
            max_accuracy_m: 20.0,
            pedestrian: SpeedWindow::new(0.3, 4.0),
            // 100 km/h
            cycling: SpeedWindow::new(1.0, 27.78),
            // 250 km/h
            motorized: SpeedWindow::new(1.0, 69.44),
        }
    }
}

impl CleaningSettings {
    /// Speed window of the modality class `modality` belongs to.
    pub fn speed_window(&self, modality: Modality) -> SpeedWindow {
        match modality {
            Modality::Walking => self.pedestrian,
            Modality::Car | Modality::Bus | Modality::Train => self.motorized,
            Modality::Bicycle | Modality::Unknown => self.cycling,
        }
    }

    /// Query filter for locations captured with `modality`.
    pub fn filter_for(&self, modality: Modality) -> LocationQualityFilter {
        let window = self.speed_window(modality);
        LocationQualityFilter {
            max_accuracy_m: self.max_accuracy_m,
            min_speed_mps: window.min_mps,
            max_speed_mps: window.max_mps,
        }
    }
}

/// Parameters of the ascend calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AscendSettings {
    /// Number of pressure samples averaged per point
    pub pressure_window_size: usize,
    /// Altitude changes below this many meters are noise
    pub ascend_threshold_m: f64,
    /// Locations with a worse vertical accuracy are skipped
    pub vertical_accuracy_threshold_m: f64,
}

impl Default for AscendSettings {
    fn default() -> Self {
        Self {
            pressure_window_size: 20,
            ascend_threshold_m: 2.0,
            vertical_accuracy_threshold_m: 12.0,
        }
    }
}

/// File locations below the data directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// SQLite database file name
    pub database_file: String,
    /// Directory name of the raw sensor files
    pub sensor_data_dir: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_file: "measurements.sqlite".to_string(),
            sensor_data_dir: "sensor-data".to_string(),
        }
    }
}

/// Get the application data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("org", "geocapture", "GeoCapture")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

/// Load application configuration from the default location.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let mut config = load_config_from(&get_config_path())?;
    config.data_dir = get_data_dir();
    Ok(config)
}

/// Load configuration from `path`, falling back to defaults if it is missing.
///
/// The data directory is set to the directory containing `path`.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let data_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    if !path.exists() {
        return Ok(AppConfig {
            data_dir,
            ..Default::default()
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

    let mut config: AppConfig =
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    config.data_dir = data_dir;

    Ok(config)
}

/// Save application configuration to the default location.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(&get_config_path(), config)
}

/// Save application configuration to `path`.
pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
