use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::hub::Hub;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/hubs", post(create_hub).get(list_hubs))
}

#[derive(Deserialize)]
pub struct CreateHubRequest {
    pub name: String,
    pub code: String,
    pub address: String,
    pub location: Option<GeoPoint>,
    pub opening_hour: f64,
    pub closing_hour: f64,
    #[serde(default)]
    pub max_capacity: u32,
}

async fn create_hub(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateHubRequest>,
) -> Result<Json<Hub>, AppError> {
    let hub = Hub {
        id: Uuid::new_v4(),
        name: payload.name,
        code: payload.code,
        address: payload.address,
        location: payload.location,
        opening_hour: payload.opening_hour,
        closing_hour: payload.closing_hour,
        max_capacity: payload.max_capacity,
        active: true,
        created_at: Utc::now(),
    };
    hub.validate()?;

    let duplicate = state
        .hubs
        .iter()
        .any(|entry| entry.value().code.eq_ignore_ascii_case(&hub.code));
    if duplicate {
        return Err(AppError::ValidationFailed(format!(
            "hub code {} is already in use",
            hub.code
        )));
    }

    state.hubs.insert(hub.id, hub.clone());
    Ok(Json(hub))
}

async fn list_hubs(State(state): State<Arc<AppState>>) -> Json<Vec<Hub>> {
    let hubs = state
        .hubs
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(hubs)
}
