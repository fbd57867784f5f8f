use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::rest::jobs::JobView;
use crate::api::rest::parcels::ParcelView;
use crate::engine::assignment::{self, AssignDriver, Assignment};
use crate::engine::job::{self, NewJob};
use crate::engine::request::{self, NewParcel, NewServiceRequest};
use crate::error::AppError;
use crate::models::job::Job;
use crate::models::parcel::Parcel;
use crate::models::request::{RequestState, ServiceRequest};
use crate::state::AppState;
use crate::store::RequestRecord;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/requests", post(create_request).get(list_requests))
        .route("/requests/:id", get(get_request))
        .route("/requests/:id/parcels", post(add_parcel))
        .route("/requests/:id/confirm", post(confirm_request))
        .route("/requests/:id/cancel", post(cancel_request))
        .route("/requests/:id/assign", post(assign_driver))
        .route("/requests/:id/jobs", post(create_job))
}

#[derive(Deserialize)]
pub struct RequestFilter {
    pub state: Option<RequestState>,
}

#[derive(Serialize)]
pub struct RequestDetail {
    #[serde(flatten)]
    pub request: ServiceRequest,
    pub parcel_count: usize,
    pub parcels: Vec<ParcelView>,
    pub jobs: Vec<JobView>,
}

impl From<RequestRecord> for RequestDetail {
    fn from(record: RequestRecord) -> Self {
        let parcels = record
            .parcels
            .iter()
            .map(|parcel| ParcelView::new(parcel.clone(), &record.request))
            .collect();
        let jobs = record
            .jobs
            .iter()
            .map(|job| JobView::new(job.clone(), &record.request))
            .collect();

        Self {
            parcel_count: record.parcels.len(),
            parcels,
            jobs,
            request: record.request,
        }
    }
}

async fn create_request(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewServiceRequest>,
) -> Result<Json<RequestDetail>, AppError> {
    let record = request::create(&state, payload)?;
    Ok(Json(record.into()))
}

async fn list_requests(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<RequestFilter>,
) -> Json<Vec<ServiceRequest>> {
    Json(request::list(&state, filter.state))
}

async fn get_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RequestDetail>, AppError> {
    let record = request::get(&state, id)?;
    Ok(Json(record.into()))
}

async fn add_parcel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewParcel>,
) -> Result<Json<Parcel>, AppError> {
    Ok(Json(request::add_parcel(&state, id, payload)?))
}

async fn confirm_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ServiceRequest>, AppError> {
    Ok(Json(request::confirm(&state, id)?))
}

async fn cancel_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ServiceRequest>, AppError> {
    Ok(Json(request::cancel(&state, id)?))
}

async fn assign_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignDriver>,
) -> Result<Json<Assignment>, AppError> {
    Ok(Json(assignment::assign(&state, id, payload)?))
}

async fn create_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewJob>,
) -> Result<Json<Job>, AppError> {
    Ok(Json(job::create_job(&state, id, payload)?))
}
