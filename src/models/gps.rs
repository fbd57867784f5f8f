use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::{validate_coordinates, GeoPoint};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpsLog {
    pub id: Uuid,
    pub job_id: Uuid,
    pub driver_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    pub speed: f64,
    pub heading: f64,
    pub altitude: f64,
    pub battery_level: f64,
    pub network_type: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl GpsLog {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_coordinates("gps", self.latitude, self.longitude)?;
        if !(0.0..=360.0).contains(&self.heading) {
            return Err(AppError::ValidationFailed(
                "heading must be between 0 and 360 degrees".to_string(),
            ));
        }
        if self.speed < 0.0 {
            return Err(AppError::ValidationFailed(
                "speed cannot be negative".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.battery_level) {
            return Err(AppError::ValidationFailed(
                "battery level must be between 0 and 100".to_string(),
            ));
        }
        Ok(())
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            lat: self.latitude,
            lng: self.longitude,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::GpsLog;
    use crate::error::AppError;

    fn log() -> GpsLog {
        GpsLog {
            id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            driver_id: Uuid::new_v4(),
            latitude: 52.52,
            longitude: 13.405,
            accuracy: 5.0,
            speed: 30.0,
            heading: 90.0,
            altitude: 34.0,
            battery_level: 80.0,
            network_type: Some("4G".to_string()),
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn gps_coordinates_are_checked() {
        let mut entry = log();
        entry.latitude = 100.0;
        assert!(matches!(entry.validate(), Err(AppError::ValidationFailed(_))));

        let mut entry = log();
        entry.longitude = -200.0;
        assert!(matches!(entry.validate(), Err(AppError::ValidationFailed(_))));
    }

    #[test]
    fn sensor_ranges_are_checked() {
        let mut entry = log();
        entry.heading = 361.0;
        assert!(entry.validate().is_err());

        let mut entry = log();
        entry.speed = -3.0;
        assert!(entry.validate().is_err());

        let mut entry = log();
        entry.battery_level = 101.0;
        assert!(entry.validate().is_err());

        assert!(log().validate().is_ok());
    }
}
