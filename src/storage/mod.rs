//! Storage module for the measurement database and configuration.

pub mod config;
pub mod database;
pub mod schema;
pub mod sensor_files;
pub mod store;

pub use config::{AppConfig, AscendSettings, CleaningSettings, SpeedWindow, StorageSettings};
pub use database::{Database, DatabaseError};
pub use sensor_files::SensorFileStore;
pub use store::{LocationQualityFilter, MeasurementStore};
