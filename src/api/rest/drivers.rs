use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::Driver;
use crate::models::job::{Job, JobState};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(create_driver).get(list_drivers))
        .route("/drivers/:id/jobs", get(list_driver_jobs))
}

#[derive(Deserialize)]
pub struct CreateDriverRequest {
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Deserialize)]
pub struct JobFilter {
    pub state: Option<JobState>,
}

async fn create_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDriverRequest>,
) -> Result<Json<Driver>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::ValidationFailed(
            "name cannot be empty".to_string(),
        ));
    }

    let driver = Driver {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        phone: payload.phone,
        active: true,
        created_at: Utc::now(),
    };

    state.drivers.insert(driver.id, driver.clone());
    Ok(Json(driver))
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Json<Vec<Driver>> {
    let drivers = state
        .drivers
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(drivers)
}

async fn list_driver_jobs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(filter): Query<JobFilter>,
) -> Result<Json<Vec<Job>>, AppError> {
    if !state.drivers.contains_key(&id) {
        return Err(AppError::NotFound(format!("driver {} not found", id)));
    }

    Ok(Json(state.store.jobs_for_driver(id, filter.state)))
}
