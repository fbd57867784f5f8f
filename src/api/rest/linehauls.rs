use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::linehaul::{self, LoadLinehaul, NewLinehaul};
use crate::error::AppError;
use crate::models::linehaul::{Linehaul, LinehaulState};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/linehauls", post(create_linehaul).get(list_linehauls))
        .route("/linehauls/:id", get(get_linehaul))
        .route("/linehauls/:id/load", post(load))
        .route("/linehauls/:id/confirm", post(confirm))
        .route("/linehauls/:id/depart", post(depart))
        .route("/linehauls/:id/arrive", post(arrive))
        .route("/linehauls/:id/cancel", post(cancel))
}

#[derive(Deserialize)]
pub struct LinehaulFilter {
    pub state: Option<LinehaulState>,
}

/// Linehaul with the figures derived from its parcels, costs and times.
#[derive(Serialize)]
pub struct LinehaulView {
    #[serde(flatten)]
    pub linehaul: Linehaul,
    pub parcel_count: usize,
    pub total_weight: f64,
    pub total_cost: f64,
    pub duration_hours: f64,
    pub estimated_duration_hours: f64,
}

impl LinehaulView {
    fn build(state: &AppState, linehaul: Linehaul) -> Self {
        Self {
            parcel_count: linehaul.parcel_ids.len(),
            total_weight: linehaul::total_weight(state, &linehaul),
            total_cost: linehaul.total_cost(),
            duration_hours: linehaul.duration_hours(),
            estimated_duration_hours: linehaul.estimated_duration_hours(),
            linehaul,
        }
    }
}

async fn create_linehaul(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewLinehaul>,
) -> Result<Json<LinehaulView>, AppError> {
    let created = linehaul::create(&state, payload)?;
    Ok(Json(LinehaulView::build(&state, created)))
}

async fn list_linehauls(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<LinehaulFilter>,
) -> Json<Vec<Linehaul>> {
    Json(linehaul::list(&state, filter.state))
}

async fn get_linehaul(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<LinehaulView>, AppError> {
    let found = linehaul::get(&state, id)?;
    Ok(Json(LinehaulView::build(&state, found)))
}

async fn load(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LoadLinehaul>,
) -> Result<Json<LinehaulView>, AppError> {
    let loaded = linehaul::load(&state, id, payload)?;
    Ok(Json(LinehaulView::build(&state, loaded)))
}

async fn confirm(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Linehaul>, AppError> {
    Ok(Json(linehaul::confirm(&state, id)?))
}

async fn depart(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Linehaul>, AppError> {
    Ok(Json(linehaul::depart(&state, id)?))
}

async fn arrive(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<LinehaulView>, AppError> {
    let arrived = linehaul::arrive(&state, id)?;
    Ok(Json(LinehaulView::build(&state, arrived)))
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Linehaul>, AppError> {
    Ok(Json(linehaul::cancel(&state, id)?))
}
