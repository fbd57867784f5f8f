pub mod contracts;
pub mod drivers;
pub mod hubs;
pub mod incidents;
pub mod jobs;
pub mod linehauls;
pub mod parcels;
pub mod requests;
pub mod ws;

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::engine::monitor::{daily_summary, DailySummary};
use crate::error::AppError;
use crate::state::AppState;

/// Header carrying the acting driver's id on driver-side calls.
pub const ACTOR_HEADER: &str = "x-actor-id";

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(drivers::router())
        .merge(requests::router())
        .merge(parcels::router())
        .merge(jobs::router())
        .merge(incidents::router())
        .merge(hubs::router())
        .merge(linehauls::router())
        .merge(contracts::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/dashboard", get(dashboard))
        .route("/reports/daily", get(daily_report))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

pub(crate) fn actor(headers: &HeaderMap) -> Result<Uuid, AppError> {
    let raw = headers
        .get(ACTOR_HEADER)
        .ok_or_else(|| AppError::Unauthorized(format!("missing {ACTOR_HEADER} header")))?;
    raw.to_str()
        .ok()
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
        .ok_or_else(|| AppError::Unauthorized(format!("malformed {ACTOR_HEADER} header")))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    drivers: usize,
    requests: usize,
    incidents: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        drivers: state.drivers.len(),
        requests: state.store.len(),
        incidents: state.incidents.len(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}

#[derive(Serialize)]
struct DashboardResponse {
    requests_by_state: BTreeMap<String, usize>,
    jobs_by_state: BTreeMap<String, usize>,
    open_incidents: usize,
    parcels: usize,
}

async fn dashboard(State(state): State<Arc<AppState>>) -> Json<DashboardResponse> {
    let records = state.store.select(|_| true);

    let mut requests_by_state = BTreeMap::new();
    let mut jobs_by_state = BTreeMap::new();
    let mut parcels = 0;
    for record in &records {
        *requests_by_state
            .entry(record.request.state.to_string())
            .or_insert(0) += 1;
        for job in &record.jobs {
            *jobs_by_state.entry(job.state.to_string()).or_insert(0) += 1;
        }
        parcels += record.parcels.len();
    }

    let open_incidents = state
        .incidents
        .iter()
        .filter(|entry| entry.value().state.is_open())
        .count();

    Json(DashboardResponse {
        requests_by_state,
        jobs_by_state,
        open_incidents,
        parcels,
    })
}

async fn daily_report(State(state): State<Arc<AppState>>) -> Json<DailySummary> {
    Json(daily_summary(&state, Utc::now()))
}
