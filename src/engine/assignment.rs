use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::engine::transact;
use crate::error::AppError;
use crate::models::job::{Job, JobState, JobType};
use crate::models::request::ServiceRequest;
use crate::state::AppState;
use crate::store::RequestRecord;

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignDriver {
    pub driver_id: Uuid,
    pub scheduled_pickup: DateTime<Utc>,
    pub scheduled_delivery: Option<DateTime<Utc>>,
    #[serde(default = "yes")]
    pub create_pickup_job: bool,
    #[serde(default = "yes")]
    pub create_delivery_job: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    pub request: ServiceRequest,
    pub jobs: Vec<Job>,
}

/// What a new job needs beyond what it copies from its request.
pub(crate) struct JobPlan {
    pub job_type: JobType,
    pub driver_id: Uuid,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub parcel_ids: Vec<Uuid>,
    pub notes: Option<String>,
}

/// Assigns a driver to a draft or confirmed request and spawns the requested
/// pickup/delivery jobs, each working on the request's full parcel set.
/// All of it commits together or not at all.
pub fn assign(
    state: &AppState,
    request_id: Uuid,
    input: AssignDriver,
) -> Result<Assignment, AppError> {
    let driver_active = state
        .drivers
        .get(&input.driver_id)
        .map(|driver| driver.active)
        .ok_or_else(|| AppError::NotFound(format!("driver {} not found", input.driver_id)))?;
    if !driver_active {
        return Err(AppError::ValidationFailed(format!(
            "driver {} is inactive",
            input.driver_id
        )));
    }

    let assignment = transact(state, "request", request_id, |record, now| {
        record
            .request
            .assign(input.driver_id, input.scheduled_pickup, input.scheduled_delivery)?;

        let parcel_ids: Vec<Uuid> = record.parcels.iter().map(|p| p.id).collect();
        let mut plans = Vec::new();
        if input.create_pickup_job {
            plans.push(JobPlan {
                job_type: JobType::Pickup,
                driver_id: input.driver_id,
                scheduled_at: record.request.scheduled_pickup,
                parcel_ids: parcel_ids.clone(),
                notes: input.notes.clone(),
            });
        }
        if input.create_delivery_job {
            plans.push(JobPlan {
                job_type: JobType::Delivery,
                driver_id: input.driver_id,
                scheduled_at: record.request.scheduled_delivery,
                parcel_ids,
                notes: input.notes.clone(),
            });
        }

        let mut jobs = Vec::with_capacity(plans.len());
        for plan in plans {
            let job = build_job(record, state.store.job_seq.next(), plan, now)?;
            jobs.push(job);
        }
        record.jobs.extend(jobs.iter().cloned());

        Ok(Assignment {
            request: record.request.clone(),
            jobs,
        })
    })?;

    info!(
        request_id = %request_id,
        driver_id = %input.driver_id,
        jobs = assignment.jobs.len(),
        "driver assigned"
    );

    Ok(assignment)
}

/// Builds a job whose location and contact are copied from the request side
/// matching its type.
pub(crate) fn build_job(
    record: &RequestRecord,
    reference: String,
    plan: JobPlan,
    now: DateTime<Utc>,
) -> Result<Job, AppError> {
    let location = record.request.endpoint_for(plan.job_type).clone();
    location.validate("job")?;

    Ok(Job {
        id: Uuid::new_v4(),
        reference,
        request_id: record.request.id,
        job_type: plan.job_type,
        driver_id: plan.driver_id,
        location,
        state: JobState::Assigned,
        parcel_ids: plan.parcel_ids,
        scheduled_at: plan.scheduled_at,
        started_at: None,
        completed_at: None,
        failure_reason: None,
        notes: plan.notes,
        reminder_sent_at: None,
        created_at: now,
    })
}
