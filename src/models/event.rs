use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::incident::IncidentType;
use crate::models::job::{JobState, JobType};
use crate::models::linehaul::LinehaulState;
use crate::models::parcel::ParcelState;
use crate::models::request::RequestState;

/// Lifecycle notifications fanned out to WebSocket subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DispatchEvent {
    RequestStateChanged {
        request_id: Uuid,
        reference: String,
        state: RequestState,
        at: DateTime<Utc>,
    },
    JobStateChanged {
        job_id: Uuid,
        request_id: Uuid,
        reference: String,
        state: JobState,
        at: DateTime<Utc>,
    },
    ParcelStateChanged {
        parcel_id: Uuid,
        request_id: Uuid,
        reference: String,
        state: ParcelState,
        at: DateTime<Utc>,
    },
    IncidentOpened {
        incident_id: Uuid,
        reference: String,
        incident_type: IncidentType,
        request_id: Option<Uuid>,
        at: DateTime<Utc>,
    },
    LinehaulStateChanged {
        linehaul_id: Uuid,
        reference: String,
        state: LinehaulState,
        at: DateTime<Utc>,
    },
    JobReminder {
        job_id: Uuid,
        driver_id: Uuid,
        job_type: JobType,
        scheduled_at: Option<DateTime<Utc>>,
        address: String,
    },
}
