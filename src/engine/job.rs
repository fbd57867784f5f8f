use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::assignment::{build_job, JobPlan};
use crate::engine::parcel::{deliver, stage_for_delivery};
use crate::engine::{transact, Transitioned};
use crate::error::AppError;
use crate::models::job::{Job, JobType};
use crate::models::parcel::ParcelState;
use crate::models::request::RequestState;
use crate::state::AppState;
use crate::store::RequestRecord;

#[derive(Debug, Clone, Deserialize)]
pub struct NewJob {
    pub job_type: JobType,
    pub driver_id: Uuid,
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Defaults to every parcel of the request.
    pub parcel_ids: Option<Vec<Uuid>>,
    pub notes: Option<String>,
}

pub fn accept(state: &AppState, job_id: Uuid, actor: Uuid) -> Result<Transitioned<Job>, AppError> {
    apply(state, job_id, actor, |record, _| record.job_mut(job_id)?.accept())
}

/// Starts the job and promotes an assigned request to in_progress. Delivery
/// jobs also dispatch their parcels.
pub fn start(state: &AppState, job_id: Uuid, actor: Uuid) -> Result<Transitioned<Job>, AppError> {
    apply(state, job_id, actor, |record, now| {
        let job = record.job_mut(job_id)?;
        job.start(now)?;
        let job_type = job.job_type;
        let parcel_ids = job.parcel_ids.clone();

        for parcel_id in parcel_ids {
            let parcel = record.parcel_mut(parcel_id)?;
            parcel.current_job = Some(job_id);
            if job_type == JobType::Delivery {
                stage_for_delivery(parcel)?;
            }
        }

        record.request.promote_in_progress();
        Ok(())
    })
}

pub fn complete(
    state: &AppState,
    job_id: Uuid,
    actor: Uuid,
) -> Result<Transitioned<Job>, AppError> {
    apply(state, job_id, actor, |record, now| {
        let job = record.job(job_id)?;
        job.ensure_completable()?;
        let job_type = job.job_type;
        let parcel_ids = job.parcel_ids.clone();

        match job_type {
            JobType::Pickup => {
                // Parcels a delivery job already dispatched keep their state
                // and only get the pickup time.
                for parcel_id in &parcel_ids {
                    let parcel = record.parcel_mut(*parcel_id)?;
                    if parcel.state == ParcelState::Pending {
                        parcel.mark_picked(now)?;
                    } else if !parcel.state.is_terminal() && parcel.picked_at.is_none() {
                        parcel.picked_at = Some(now);
                    }
                }
                record.request.actual_pickup = Some(now);
            }
            JobType::Delivery => {
                let missing: Vec<&str> = parcel_ids
                    .iter()
                    .filter_map(|id| record.parcel(*id).ok())
                    .filter(|parcel| !parcel.pod.has_evidence())
                    .map(|parcel| parcel.reference.as_str())
                    .collect();
                if !missing.is_empty() {
                    return Err(AppError::ValidationFailed(format!(
                        "proof of delivery missing for parcels: {}",
                        missing.join(", ")
                    )));
                }

                for parcel_id in &parcel_ids {
                    if record.parcel(*parcel_id)?.state != ParcelState::Delivered {
                        deliver(record, *parcel_id, now)?;
                    }
                }
            }
        }

        record.job_mut(job_id)?.finish(now)
    })
}

/// Fails the job. A failed delivery job takes all of its parcels down with
/// it, whatever state they were in.
pub fn fail(
    state: &AppState,
    job_id: Uuid,
    actor: Uuid,
    reason: &str,
) -> Result<Transitioned<Job>, AppError> {
    apply(state, job_id, actor, |record, now| {
        let job = record.job_mut(job_id)?;
        job.fail(reason, now)?;
        let job_type = job.job_type;
        let parcel_ids = job.parcel_ids.clone();

        if job_type == JobType::Delivery {
            for parcel_id in parcel_ids {
                let parcel = record.parcel_mut(parcel_id)?;
                if parcel.state != ParcelState::Failed {
                    warn!(
                        parcel_id = %parcel_id,
                        from = %parcel.state,
                        "forcing parcel to failed with its delivery job"
                    );
                }
                parcel.force_fail();
            }
        }
        Ok(())
    })
}

/// Adds a single job for the assigned driver to a request that is already
/// assigned or in progress.
pub fn create_job(state: &AppState, request_id: Uuid, new_job: NewJob) -> Result<Job, AppError> {
    let driver_active = state
        .drivers
        .get(&new_job.driver_id)
        .map(|driver| driver.active)
        .ok_or_else(|| AppError::NotFound(format!("driver {} not found", new_job.driver_id)))?;
    if !driver_active {
        return Err(AppError::ValidationFailed(format!(
            "driver {} is inactive",
            new_job.driver_id
        )));
    }

    let job = transact(state, "job", request_id, |record, now| {
        if !matches!(
            record.request.state,
            RequestState::Assigned | RequestState::InProgress
        ) {
            return Err(AppError::InvalidTransition(format!(
                "request {}: jobs need an assigned or in-progress request (state: {})",
                record.request.reference, record.request.state
            )));
        }
        // Parcel operations only accept the assigned driver.
        if record.request.assigned_driver != Some(new_job.driver_id) {
            return Err(AppError::ValidationFailed(format!(
                "request {}: job driver {} is not the assigned driver",
                record.request.reference, new_job.driver_id
            )));
        }

        let parcel_ids = match new_job.parcel_ids {
            Some(ids) => {
                for id in &ids {
                    record.parcel(*id)?;
                }
                ids
            }
            None => record.parcels.iter().map(|p| p.id).collect(),
        };

        let plan = JobPlan {
            job_type: new_job.job_type,
            driver_id: new_job.driver_id,
            scheduled_at: new_job.scheduled_at,
            parcel_ids,
            notes: new_job.notes,
        };
        let job = build_job(record, state.store.job_seq.next(), plan, now)?;
        record.jobs.push(job.clone());
        Ok(job)
    })?;

    info!(job_id = %job.id, request_id = %request_id, job_type = %job.job_type, "job created");
    Ok(job)
}

pub fn get(state: &AppState, job_id: Uuid) -> Result<(Job, RequestRecord), AppError> {
    let request_id = state.store.request_of_job(job_id)?;
    let record = state.store.get(request_id)?;
    let job = record.job(job_id)?.clone();
    Ok((job, record))
}

fn apply<F>(
    state: &AppState,
    job_id: Uuid,
    actor: Uuid,
    op: F,
) -> Result<Transitioned<Job>, AppError>
where
    F: FnOnce(&mut RequestRecord, DateTime<Utc>) -> Result<(), AppError>,
{
    let request_id = state.store.request_of_job(job_id)?;

    let outcome = transact(state, "job", request_id, |record, now| {
        record.job(job_id)?.authorize(actor)?;
        op(record, now)?;
        Ok(Transitioned {
            entity: record.job(job_id)?.clone(),
            request_state: record.request.state,
        })
    })?;

    info!(
        job_id = %job_id,
        state = %outcome.entity.state,
        request_state = %outcome.request_state,
        "job updated"
    );
    Ok(outcome)
}
