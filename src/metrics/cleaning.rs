//! Location cleaning strategies.
//!
//! Decide which stored locations are good enough for speed and track display.
//! Rejected locations stay in storage; they are only left out of the
//! cleaned views.

use crate::measurement::types::{GeoLocation, MeasurementId, Modality};
use crate::storage::config::CleaningSettings;
use crate::storage::database::DatabaseError;
use crate::storage::store::{LocationQualityFilter, MeasurementStore};

/// A stateless predicate over locations.
pub trait LocationCleaningStrategy {
    /// Whether a single location is clean.
    fn is_clean(&self, location: &GeoLocation) -> bool;

    /// Load the clean locations of a measurement, ordered by timestamp.
    fn load_cleaned_locations<S: MeasurementStore + ?Sized>(
        &self,
        store: &S,
        measurement_id: MeasurementId,
    ) -> Result<Vec<GeoLocation>, DatabaseError> {
        let mut locations = store.query_locations_ordered_by_timestamp(measurement_id)?;
        locations.retain(|location| self.is_clean(location));
        Ok(locations)
    }
}

/// Accuracy and plausible-speed filter.
///
/// A location is clean iff its accuracy is known and at most the threshold
/// and its speed lies within the speed window of the modality class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultLocationCleaningStrategy {
    filter: LocationQualityFilter,
}

impl DefaultLocationCleaningStrategy {
    pub fn new(max_accuracy_m: f64, min_speed_mps: f64, max_speed_mps: f64) -> Self {
        Self {
            filter: LocationQualityFilter {
                max_accuracy_m,
                min_speed_mps,
                max_speed_mps,
            },
        }
    }

    /// Strategy for locations captured with `modality`.
    pub fn for_modality(settings: &CleaningSettings, modality: Modality) -> Self {
        Self {
            filter: settings.filter_for(modality),
        }
    }

    pub fn filter(&self) -> &LocationQualityFilter {
        &self.filter
    }
}

impl Default for DefaultLocationCleaningStrategy {
    fn default() -> Self {
        Self::for_modality(&CleaningSettings::default(), Modality::Bicycle)
    }
}

impl LocationCleaningStrategy for DefaultLocationCleaningStrategy {
    fn is_clean(&self, location: &GeoLocation) -> bool {
        self.filter.accepts(location)
    }

    fn load_cleaned_locations<S: MeasurementStore + ?Sized>(
        &self,
        store: &S,
        measurement_id: MeasurementId,
    ) -> Result<Vec<GeoLocation>, DatabaseError> {
        store.query_clean_locations(measurement_id, &self.filter)
    }
}

/// Accepts every location.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocationCleaning;

impl LocationCleaningStrategy for NoLocationCleaning {
    fn is_clean(&self, _location: &GeoLocation) -> bool {
        true
    }
}
