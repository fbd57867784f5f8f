use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PartnerType {
    Carrier,
    Freelancer,
    Hub,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContractState {
    Draft,
    Active,
    Expired,
    Terminated,
}

impl fmt::Display for ContractState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ContractState::Draft => "draft",
            ContractState::Active => "active",
            ContractState::Expired => "expired",
            ContractState::Terminated => "terminated",
        };
        f.write_str(label)
    }
}

/// Terms agreed with a carrier, freelance driver or hub partner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerContract {
    pub id: Uuid,
    pub reference: String,
    pub partner: String,
    pub partner_type: PartnerType,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub rate_per_km: f64,
    pub rate_per_delivery: f64,
    pub minimum_guarantee: f64,
    pub currency: String,
    /// Target success rate, percent.
    pub sla_target: f64,
    pub state: ContractState,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PartnerContract {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.partner.trim().is_empty() {
            return Err(AppError::ValidationFailed(
                "partner cannot be empty".to_string(),
            ));
        }
        if self.end_date.is_some_and(|end| self.start_date > end) {
            return Err(AppError::ValidationFailed(
                "start date must be before end date".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.sla_target) {
            return Err(AppError::ValidationFailed(
                "SLA target must be between 0 and 100".to_string(),
            ));
        }
        if self.rate_per_km < 0.0 || self.rate_per_delivery < 0.0 || self.minimum_guarantee < 0.0
        {
            return Err(AppError::ValidationFailed(
                "contract rates cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Active state and `today` inside the contract period.
    pub fn is_in_force(&self, today: NaiveDate) -> bool {
        self.state == ContractState::Active
            && self.start_date <= today
            && self.end_date.is_none_or(|end| end >= today)
    }

    pub fn activate(&mut self) -> Result<(), AppError> {
        if self.state != ContractState::Draft {
            return Err(self.invalid("only draft contracts can be activated"));
        }
        self.state = ContractState::Active;
        Ok(())
    }

    pub fn terminate(&mut self) -> Result<(), AppError> {
        if !matches!(self.state, ContractState::Active | ContractState::Draft) {
            return Err(self.invalid("only draft or active contracts can be terminated"));
        }
        self.state = ContractState::Terminated;
        Ok(())
    }

    /// Returns true when an active contract ran past its end date and was
    /// moved to expired.
    pub fn expire_if_ended(&mut self, today: NaiveDate) -> bool {
        let ended = self.end_date.is_some_and(|end| end < today);
        if self.state == ContractState::Active && ended {
            self.state = ContractState::Expired;
            return true;
        }
        false
    }

    fn invalid(&self, reason: &str) -> AppError {
        AppError::InvalidTransition(format!(
            "contract {}: {reason} (state: {})",
            self.reference, self.state
        ))
    }
}
