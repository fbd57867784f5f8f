use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::GeoPoint;

/// A distribution facility. Only registration data is kept; load tracking
/// is not modeled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hub {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub address: String,
    pub location: Option<GeoPoint>,
    pub opening_hour: f64,
    pub closing_hour: f64,
    pub max_capacity: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Hub {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() || self.code.trim().is_empty() {
            return Err(AppError::ValidationFailed(
                "hub name and code cannot be empty".to_string(),
            ));
        }
        if let Some(location) = &self.location {
            location.validate("hub")?;
        }
        if !(0.0..=24.0).contains(&self.opening_hour) {
            return Err(AppError::ValidationFailed(
                "opening time must be between 0 and 24".to_string(),
            ));
        }
        if !(0.0..=24.0).contains(&self.closing_hour) {
            return Err(AppError::ValidationFailed(
                "closing time must be between 0 and 24".to_string(),
            ));
        }
        if self.opening_hour >= self.closing_hour {
            return Err(AppError::ValidationFailed(
                "opening time must be before closing time".to_string(),
            ));
        }
        Ok(())
    }
}
