use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::post;
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::incident::{self, NewIncident};
use crate::engine::monitor::detect_delayed_requests;
use crate::error::AppError;
use crate::models::incident::Incident;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/incidents", post(report_incident).get(list_incidents))
        .route("/incidents/:id/investigate", post(investigate))
        .route("/incidents/:id/resolve", post(resolve))
        .route("/incidents/:id/close", post(close))
        .route("/incidents/:id/reopen", post(reopen))
        .route("/monitor/delays", post(run_delay_monitor))
}

#[derive(Deserialize)]
pub struct IncidentFilter {
    #[serde(default)]
    pub open: bool,
}

#[derive(Deserialize)]
pub struct ResolveRequest {
    #[serde(default)]
    pub resolution_notes: String,
}

#[derive(Serialize)]
pub struct DelayMonitorResponse {
    pub created: Vec<Uuid>,
}

async fn report_incident(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewIncident>,
) -> Result<Json<Incident>, AppError> {
    Ok(Json(incident::report(&state, payload)?))
}

async fn list_incidents(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<IncidentFilter>,
) -> Json<Vec<Incident>> {
    Json(incident::list(&state, filter.open))
}

async fn investigate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Incident>, AppError> {
    Ok(Json(incident::investigate(&state, id)?))
}

async fn resolve(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ResolveRequest>,
) -> Result<Json<Incident>, AppError> {
    Ok(Json(incident::resolve(
        &state,
        id,
        &payload.resolution_notes,
    )?))
}

async fn close(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Incident>, AppError> {
    Ok(Json(incident::close(&state, id)?))
}

async fn reopen(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Incident>, AppError> {
    Ok(Json(incident::reopen(&state, id)?))
}

async fn run_delay_monitor(State(state): State<Arc<AppState>>) -> Json<DelayMonitorResponse> {
    Json(DelayMonitorResponse {
        created: detect_delayed_requests(&state, Utc::now()),
    })
}
