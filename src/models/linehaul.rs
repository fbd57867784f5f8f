use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LinehaulState {
    Draft,
    Confirmed,
    InTransit,
    Arrived,
    Cancelled,
}

impl fmt::Display for LinehaulState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LinehaulState::Draft => "draft",
            LinehaulState::Confirmed => "confirmed",
            LinehaulState::InTransit => "in_transit",
            LinehaulState::Arrived => "arrived",
            LinehaulState::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// A hub-to-hub transport run carrying a batch of parcels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Linehaul {
    pub id: Uuid,
    pub reference: String,
    pub departure_hub: Uuid,
    pub arrival_hub: Uuid,
    pub driver_id: Option<Uuid>,
    pub scheduled_departure: DateTime<Utc>,
    pub scheduled_arrival: DateTime<Utc>,
    pub actual_departure: Option<DateTime<Utc>>,
    pub actual_arrival: Option<DateTime<Utc>>,
    pub parcel_ids: Vec<Uuid>,
    pub state: LinehaulState,
    pub distance_km: f64,
    pub fuel_cost: f64,
    pub driver_cost: f64,
    pub other_costs: f64,
    pub currency: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Linehaul {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.departure_hub == self.arrival_hub {
            return Err(AppError::ValidationFailed(
                "departure and arrival hubs must be different".to_string(),
            ));
        }
        if self.scheduled_departure >= self.scheduled_arrival {
            return Err(AppError::ValidationFailed(
                "scheduled departure must be before scheduled arrival".to_string(),
            ));
        }
        let amounts = [
            ("distance", self.distance_km),
            ("fuel cost", self.fuel_cost),
            ("driver cost", self.driver_cost),
            ("other costs", self.other_costs),
        ];
        for (name, value) in amounts {
            if value < 0.0 {
                return Err(AppError::ValidationFailed(format!(
                    "{name} cannot be negative"
                )));
            }
        }
        Ok(())
    }

    pub fn total_cost(&self) -> f64 {
        self.fuel_cost + self.driver_cost + self.other_costs
    }

    pub fn duration_hours(&self) -> f64 {
        match (self.actual_departure, self.actual_arrival) {
            (Some(departed), Some(arrived)) => hours(arrived - departed),
            _ => 0.0,
        }
    }

    pub fn estimated_duration_hours(&self) -> f64 {
        hours(self.scheduled_arrival - self.scheduled_departure)
    }

    /// Sets the driver and adds parcels not already on board. Draft only.
    pub fn load(&mut self, driver_id: Option<Uuid>, parcel_ids: &[Uuid]) -> Result<(), AppError> {
        if self.state != LinehaulState::Draft {
            return Err(self.invalid("only draft linehauls can be loaded"));
        }
        if driver_id.is_some() {
            self.driver_id = driver_id;
        }
        for id in parcel_ids {
            if !self.parcel_ids.contains(id) {
                self.parcel_ids.push(*id);
            }
        }
        Ok(())
    }

    pub fn confirm(&mut self) -> Result<(), AppError> {
        if self.state != LinehaulState::Draft {
            return Err(self.invalid("only draft linehauls can be confirmed"));
        }
        if self.driver_id.is_none() {
            return Err(AppError::ValidationFailed(format!(
                "linehaul {}: assign a driver before confirming",
                self.reference
            )));
        }
        if self.parcel_ids.is_empty() {
            return Err(AppError::ValidationFailed(format!(
                "linehaul {}: add parcels before confirming",
                self.reference
            )));
        }
        self.state = LinehaulState::Confirmed;
        Ok(())
    }

    pub fn depart(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.state != LinehaulState::Confirmed {
            return Err(self.invalid("only confirmed linehauls can depart"));
        }
        self.state = LinehaulState::InTransit;
        self.actual_departure = Some(now);
        Ok(())
    }

    pub fn arrive(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.state != LinehaulState::InTransit {
            return Err(self.invalid("only in-transit linehauls can arrive"));
        }
        self.state = LinehaulState::Arrived;
        self.actual_arrival = Some(now);
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), AppError> {
        if self.state == LinehaulState::Arrived {
            return Err(self.invalid("cannot cancel an arrived linehaul"));
        }
        self.state = LinehaulState::Cancelled;
        Ok(())
    }

    fn invalid(&self, reason: &str) -> AppError {
        AppError::InvalidTransition(format!(
            "linehaul {}: {reason} (state: {})",
            self.reference, self.state
        ))
    }
}

fn hours(span: chrono::Duration) -> f64 {
    span.num_milliseconds() as f64 / 3_600_000.0
}
