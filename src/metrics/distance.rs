//! Distance and speed over tracks.

use crate::measurement::types::{GeoLocation, Track};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two coordinates in meters.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Distance between two fixes in meters.
pub fn distance_between(from: &GeoLocation, to: &GeoLocation) -> f64 {
    haversine_distance(from.latitude, from.longitude, to.latitude, to.longitude)
}

/// Length of a track along its locations.
pub fn track_distance(track: &Track) -> f64 {
    track
        .locations
        .windows(2)
        .map(|pair| distance_between(&pair[0], &pair[1]))
        .sum()
}

/// Summed length of all tracks. Gaps between tracks are not counted.
pub fn total_distance(tracks: &[Track]) -> f64 {
    tracks.iter().map(track_distance).sum()
}

/// Average speed in m/s over the time spent inside tracks.
///
/// `None` when the tracks cover no time.
pub fn average_speed(tracks: &[Track]) -> Option<f64> {
    let millis: i64 = tracks
        .iter()
        .filter_map(|t| Some(t.end()? - t.start()?))
        .sum();
    if millis <= 0 {
        return None;
    }

    Some(total_distance(tracks) / (millis as f64 / 1000.0))
}
