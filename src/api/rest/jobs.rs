use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::rest::actor;
use crate::engine::tracking::{self, GpsUpdate, JobTrack};
use crate::engine::{job, Transitioned};
use crate::error::AppError;
use crate::models::gps::GpsLog;
use crate::models::job::Job;
use crate::models::request::ServiceRequest;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs/:id", get(get_job))
        .route("/jobs/:id/accept", post(accept_job))
        .route("/jobs/:id/start", post(start_job))
        .route("/jobs/:id/complete", post(complete_job))
        .route("/jobs/:id/fail", post(fail_job))
        .route("/jobs/:id/track", get(job_track))
        .route("/gps", post(record_gps))
}

/// A job plus its derived duration and read-through request values.
#[derive(Serialize)]
pub struct JobView {
    #[serde(flatten)]
    pub job: Job,
    pub duration_hours: f64,
    pub parcel_count: usize,
    pub request_reference: String,
    pub customer: String,
}

impl JobView {
    pub fn new(job: Job, request: &ServiceRequest) -> Self {
        Self {
            duration_hours: job.duration_hours(),
            parcel_count: job.parcel_ids.len(),
            job,
            request_reference: request.reference.clone(),
            customer: request.customer.clone(),
        }
    }
}

#[derive(Deserialize)]
pub struct FailJobRequest {
    #[serde(default)]
    pub reason: String,
}

type JobResult = Result<Json<Transitioned<Job>>, AppError>;

async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobView>, AppError> {
    let (job, record) = job::get(&state, id)?;
    Ok(Json(JobView::new(job, &record.request)))
}

async fn accept_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> JobResult {
    Ok(Json(job::accept(&state, id, actor(&headers)?)?))
}

async fn start_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> JobResult {
    Ok(Json(job::start(&state, id, actor(&headers)?)?))
}

async fn complete_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> JobResult {
    Ok(Json(job::complete(&state, id, actor(&headers)?)?))
}

async fn fail_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<FailJobRequest>,
) -> JobResult {
    Ok(Json(job::fail(
        &state,
        id,
        actor(&headers)?,
        &payload.reason,
    )?))
}

async fn job_track(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobTrack>, AppError> {
    Ok(Json(tracking::job_track(&state, id)?))
}

async fn record_gps(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<GpsUpdate>,
) -> Result<Json<GpsLog>, AppError> {
    Ok(Json(tracking::record_position(
        &state,
        actor(&headers)?,
        payload,
    )?))
}
