use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::request::Endpoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Pickup,
    Delivery,
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobType::Pickup => f.write_str("pickup"),
            JobType::Delivery => f.write_str("delivery"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Assigned,
    Accepted,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Assigned => "assigned",
            JobState::Accepted => "accepted",
            JobState::InProgress => "in_progress",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub reference: String,
    pub request_id: Uuid,
    pub job_type: JobType,
    pub driver_id: Uuid,
    /// Copied from the request when the job is created; later edits to the
    /// request do not reach existing jobs.
    pub location: Endpoint,
    pub state: JobState,
    pub parcel_ids: Vec<Uuid>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub notes: Option<String>,
    pub reminder_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn duration_hours(&self) -> f64 {
        match (self.started_at, self.completed_at) {
            (Some(started), Some(completed)) => {
                (completed - started).num_milliseconds() as f64 / 3_600_000.0
            }
            _ => 0.0,
        }
    }

    pub fn accept(&mut self) -> Result<(), AppError> {
        if self.state != JobState::Assigned {
            return Err(self.invalid("only assigned jobs can be accepted"));
        }
        self.state = JobState::Accepted;
        Ok(())
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        if !matches!(self.state, JobState::Accepted | JobState::Assigned) {
            return Err(self.invalid("only accepted or assigned jobs can be started"));
        }
        self.state = JobState::InProgress;
        self.started_at = Some(now);
        Ok(())
    }

    /// Guard for completion; parcel side effects are applied by the caller
    /// before `finish` stamps the job.
    pub fn ensure_completable(&self) -> Result<(), AppError> {
        if self.state != JobState::InProgress {
            return Err(self.invalid("only in-progress jobs can be completed"));
        }
        Ok(())
    }

    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        self.ensure_completable()?;
        self.state = JobState::Completed;
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn fail(&mut self, reason: &str, now: DateTime<Utc>) -> Result<(), AppError> {
        if !matches!(self.state, JobState::InProgress | JobState::Accepted) {
            return Err(self.invalid("only accepted or in-progress jobs can be marked as failed"));
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::ValidationFailed(format!(
                "job {}: a failure reason is required",
                self.reference
            )));
        }
        self.state = JobState::Failed;
        self.failure_reason = Some(reason.to_string());
        self.completed_at = Some(now);
        Ok(())
    }

    /// Cascade from a cancelled request. Returns false for terminal jobs.
    pub fn force_cancel(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = JobState::Cancelled;
        true
    }

    pub fn authorize(&self, actor: Uuid) -> Result<(), AppError> {
        if self.driver_id != actor {
            return Err(AppError::Unauthorized(format!(
                "job {} is not assigned to {actor}",
                self.reference
            )));
        }
        Ok(())
    }

    fn invalid(&self, reason: &str) -> AppError {
        AppError::InvalidTransition(format!(
            "job {}: {reason} (state: {})",
            self.reference, self.state
        ))
    }
}
