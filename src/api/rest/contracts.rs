use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::Json;
use axum::Router;
use uuid::Uuid;

use crate::engine::contract::{self, NewContract};
use crate::error::AppError;
use crate::models::contract::PartnerContract;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/contracts", post(create_contract).get(list_contracts))
        .route("/contracts/:id/activate", post(activate))
        .route("/contracts/:id/terminate", post(terminate))
}

async fn create_contract(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewContract>,
) -> Result<Json<PartnerContract>, AppError> {
    Ok(Json(contract::create(&state, payload)?))
}

async fn list_contracts(State(state): State<Arc<AppState>>) -> Json<Vec<PartnerContract>> {
    Json(contract::list(&state))
}

async fn activate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PartnerContract>, AppError> {
    Ok(Json(contract::activate(&state, id)?))
}

async fn terminate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PartnerContract>, AppError> {
    Ok(Json(contract::terminate(&state, id)?))
}
