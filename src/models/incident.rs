use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IncidentType {
    Delay,
    Damage,
    Loss,
    Accident,
    CustomerComplaint,
    Theft,
    VehicleBreakdown,
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IncidentState {
    New,
    Investigating,
    Resolved,
    Closed,
}

impl IncidentState {
    pub fn is_open(&self) -> bool {
        matches!(self, IncidentState::New | IncidentState::Investigating)
    }
}

impl fmt::Display for IncidentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IncidentState::New => "new",
            IncidentState::Investigating => "investigating",
            IncidentState::Resolved => "resolved",
            IncidentState::Closed => "closed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub reference: String,
    pub incident_type: IncidentType,
    pub request_id: Option<Uuid>,
    pub parcel_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub state: IncidentState,
    pub location: Option<GeoPoint>,
    pub resolution_notes: Option<String>,
    pub reported_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Incident {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::ValidationFailed(
                "incident title cannot be empty".to_string(),
            ));
        }
        if self.description.trim().is_empty() {
            return Err(AppError::ValidationFailed(
                "incident description cannot be empty".to_string(),
            ));
        }
        if let Some(location) = &self.location {
            location.validate("incident")?;
        }
        Ok(())
    }

    pub fn is_open_delay(&self) -> bool {
        self.incident_type == IncidentType::Delay && self.state.is_open()
    }

    pub fn investigate(&mut self) -> Result<(), AppError> {
        if self.state != IncidentState::New {
            return Err(self.invalid("only new incidents can be moved to investigating"));
        }
        self.state = IncidentState::Investigating;
        Ok(())
    }

    pub fn resolve(&mut self, notes: &str, now: DateTime<Utc>) -> Result<(), AppError> {
        if !self.state.is_open() {
            return Err(self.invalid("only new or investigating incidents can be resolved"));
        }
        if notes.trim().is_empty() {
            return Err(AppError::ValidationFailed(format!(
                "incident {}: resolution notes are required",
                self.reference
            )));
        }
        self.state = IncidentState::Resolved;
        self.resolution_notes = Some(notes.trim().to_string());
        self.resolved_at = Some(now);
        Ok(())
    }

    pub fn close(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.state != IncidentState::Resolved {
            return Err(self.invalid("only resolved incidents can be closed"));
        }
        self.state = IncidentState::Closed;
        self.closed_at = Some(now);
        Ok(())
    }

    pub fn reopen(&mut self) -> Result<(), AppError> {
        if !matches!(self.state, IncidentState::Resolved | IncidentState::Closed) {
            return Err(self.invalid("only resolved or closed incidents can be reopened"));
        }
        self.state = IncidentState::Investigating;
        self.resolved_at = None;
        self.closed_at = None;
        Ok(())
    }

    fn invalid(&self, reason: &str) -> AppError {
        AppError::InvalidTransition(format!(
            "incident {}: {reason} (state: {})",
            self.reference, self.state
        ))
    }
}
