//! Metrics module for tracks, ascend, duration and distance.

pub mod ascend;
pub mod calculator;
pub mod cleaning;
pub mod distance;
pub mod duration;
pub mod smoothing;
pub mod tracks;

pub use ascend::AscendCalculator;
pub use calculator::MeasurementSummary;
pub use cleaning::{DefaultLocationCleaningStrategy, LocationCleaningStrategy, NoLocationCleaning};
pub use distance::{average_speed, haversine_distance, total_distance};
pub use duration::active_duration;
pub use smoothing::RollingAverage;
pub use tracks::segment_tracks;
