use serde::{Deserialize, Serialize};

use crate::error::AppError;

const EARTH_RADIUS_KM: f64 = 6_371.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Rejects latitudes outside [-90, 90] and longitudes outside [-180, 180].
    /// `label` prefixes the error message ("pickup", "hub", ...).
    pub fn validate(&self, label: &str) -> Result<(), AppError> {
        validate_coordinates(label, self.lat, self.lng)
    }
}

pub fn validate_coordinates(label: &str, lat: f64, lng: f64) -> Result<(), AppError> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(AppError::ValidationFailed(format!(
            "{label} latitude must be between -90 and 90, got {lat}"
        )));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(AppError::ValidationFailed(format!(
            "{label} longitude must be between -180 and 180, got {lng}"
        )));
    }
    Ok(())
}

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Total distance covered by an ordered track of points.
pub fn path_length_km(points: &[GeoPoint]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_km(&pair[0], &pair[1]))
        .sum()
}
