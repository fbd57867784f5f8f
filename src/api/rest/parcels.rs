use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::rest::actor;
use crate::engine::{parcel, Transitioned};
use crate::error::AppError;
use crate::models::parcel::{Parcel, ProofOfDelivery};
use crate::models::request::ServiceRequest;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/parcels/:id", get(get_parcel))
        .route("/parcels/:id/picked", post(mark_picked))
        .route("/parcels/:id/in-transit", post(mark_in_transit))
        .route("/parcels/:id/out-for-delivery", post(mark_out_for_delivery))
        .route("/parcels/:id/failed", post(mark_failed))
        .route("/parcels/:id/returned", post(mark_returned))
        .route("/parcels/:id/pod", post(attach_pod))
        .route("/parcels/:id/deliver", post(deliver))
}

/// A parcel plus the values it reads through from its request.
#[derive(Serialize)]
pub struct ParcelView {
    #[serde(flatten)]
    pub parcel: Parcel,
    pub volume: f64,
    pub customer: String,
    pub currency: String,
    pub assigned_driver: Option<Uuid>,
}

impl ParcelView {
    pub fn new(parcel: Parcel, request: &ServiceRequest) -> Self {
        Self {
            volume: parcel.volume(),
            parcel,
            customer: request.customer.clone(),
            currency: request.currency.clone(),
            assigned_driver: request.assigned_driver,
        }
    }
}

#[derive(Deserialize)]
pub struct PodRequest {
    pub recipient_name: Option<String>,
    pub signature: Option<String>,
    pub photo: Option<String>,
    pub notes: Option<String>,
}

impl From<PodRequest> for ProofOfDelivery {
    fn from(payload: PodRequest) -> Self {
        ProofOfDelivery {
            signature: payload.signature,
            photo: payload.photo,
            recipient_name: payload.recipient_name,
            notes: payload.notes,
        }
    }
}

type ParcelResult = Result<Json<Transitioned<Parcel>>, AppError>;

async fn get_parcel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ParcelView>, AppError> {
    let request_id = state.store.request_of_parcel(id)?;
    let record = state.store.get(request_id)?;
    let parcel = record.parcel(id)?.clone();
    Ok(Json(ParcelView::new(parcel, &record.request)))
}

async fn mark_picked(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> ParcelResult {
    Ok(Json(parcel::mark_picked(&state, id, actor(&headers)?)?))
}

async fn mark_in_transit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> ParcelResult {
    Ok(Json(parcel::mark_in_transit(&state, id, actor(&headers)?)?))
}

async fn mark_out_for_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> ParcelResult {
    Ok(Json(parcel::mark_out_for_delivery(
        &state,
        id,
        actor(&headers)?,
    )?))
}

async fn mark_failed(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> ParcelResult {
    Ok(Json(parcel::mark_failed(&state, id, actor(&headers)?)?))
}

async fn mark_returned(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> ParcelResult {
    Ok(Json(parcel::mark_returned(&state, id, actor(&headers)?)?))
}

async fn attach_pod(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<PodRequest>,
) -> ParcelResult {
    Ok(Json(parcel::attach_pod(
        &state,
        id,
        actor(&headers)?,
        payload.into(),
    )?))
}

async fn deliver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<PodRequest>,
) -> ParcelResult {
    Ok(Json(parcel::mark_delivered(
        &state,
        id,
        actor(&headers)?,
        payload.into(),
    )?))
}
