use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::transact;
use crate::error::AppError;
use crate::models::parcel::{Parcel, ParcelState, ProofOfDelivery};
use crate::models::request::{Endpoint, RequestState, ServiceRequest, ServiceType};
use crate::state::AppState;
use crate::store::RequestRecord;

#[derive(Debug, Clone, Deserialize)]
pub struct NewServiceRequest {
    pub customer: String,
    #[serde(default)]
    pub service_type: ServiceType,
    pub pickup: Endpoint,
    pub delivery: Endpoint,
    #[serde(default)]
    pub service_fee: f64,
    #[serde(default)]
    pub cod_amount: f64,
    pub currency: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub parcels: Vec<NewParcel>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewParcel {
    pub description: Option<String>,
    pub weight: Option<f64>,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    #[serde(default)]
    pub declared_value: f64,
}

pub fn create(state: &AppState, input: NewServiceRequest) -> Result<RequestRecord, AppError> {
    let now = Utc::now();
    let request_id = Uuid::new_v4();

    let request = ServiceRequest {
        id: request_id,
        reference: String::new(),
        customer: input.customer,
        service_type: input.service_type,
        pickup: input.pickup,
        delivery: input.delivery,
        service_fee: input.service_fee,
        cod_amount: input.cod_amount,
        currency: input
            .currency
            .unwrap_or_else(|| state.config.default_currency.clone()),
        notes: input.notes,
        assigned_driver: None,
        state: RequestState::Draft,
        scheduled_pickup: None,
        scheduled_delivery: None,
        actual_pickup: None,
        actual_delivery: None,
        created_at: now,
        version: 0,
    };
    request.validate()?;

    let parcels = input
        .parcels
        .into_iter()
        .map(|p| new_parcel(request_id, p))
        .collect::<Vec<_>>();
    for parcel in &parcels {
        parcel.validate()?;
    }

    // References are drawn only once the input is known to be valid.
    let mut record = RequestRecord {
        request,
        parcels,
        jobs: Vec::new(),
    };
    record.request.reference = state.store.request_seq.next();
    for parcel in &mut record.parcels {
        parcel.reference = state.store.parcel_seq.next();
    }

    state.store.insert(record.clone());
    state
        .metrics
        .transitions_total
        .with_label_values(&["request", "created"])
        .inc();

    info!(
        request_id = %request_id,
        reference = %record.request.reference,
        parcels = record.parcels.len(),
        "service request created"
    );
    Ok(record)
}

/// Parcels join a request only before it is handed to a driver, so every
/// job sees the complete set.
pub fn add_parcel(
    state: &AppState,
    request_id: Uuid,
    input: NewParcel,
) -> Result<Parcel, AppError> {
    transact(state, "parcel", request_id, |record, _| {
        if !matches!(
            record.request.state,
            RequestState::Draft | RequestState::Confirmed
        ) {
            return Err(AppError::InvalidTransition(format!(
                "request {}: parcels can only be added to draft or confirmed requests (state: {})",
                record.request.reference, record.request.state
            )));
        }

        let mut parcel = new_parcel(request_id, input);
        parcel.validate()?;
        parcel.reference = state.store.parcel_seq.next();
        record.parcels.push(parcel.clone());
        Ok(parcel)
    })
}

pub fn confirm(state: &AppState, request_id: Uuid) -> Result<ServiceRequest, AppError> {
    let request = transact(state, "request", request_id, |record, _| {
        let parcel_count = record.parcels.len();
        record.request.confirm(parcel_count)?;
        Ok(record.request.clone())
    })?;

    info!(request_id = %request_id, "service request confirmed");
    Ok(request)
}

/// Cancels the request and every job still open under it.
pub fn cancel(state: &AppState, request_id: Uuid) -> Result<ServiceRequest, AppError> {
    let (request, cancelled_jobs) = transact(state, "request", request_id, |record, _| {
        record.request.cancel()?;
        let cancelled_jobs = record
            .jobs
            .iter_mut()
            .map(|job| job.force_cancel())
            .filter(|cancelled| *cancelled)
            .count();
        Ok((record.request.clone(), cancelled_jobs))
    })?;

    info!(
        request_id = %request_id,
        cancelled_jobs,
        "service request cancelled"
    );
    Ok(request)
}

pub fn get(state: &AppState, request_id: Uuid) -> Result<RequestRecord, AppError> {
    state.store.get(request_id)
}

pub fn list(state: &AppState, filter: Option<RequestState>) -> Vec<ServiceRequest> {
    let mut requests: Vec<ServiceRequest> = state
        .store
        .select(|record| filter.is_none_or(|s| record.request.state == s))
        .into_iter()
        .map(|record| record.request)
        .collect();
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    requests
}

fn new_parcel(request_id: Uuid, input: NewParcel) -> Parcel {
    Parcel {
        id: Uuid::new_v4(),
        reference: String::new(),
        request_id,
        description: input.description,
        weight: input.weight,
        length: input.length,
        width: input.width,
        height: input.height,
        declared_value: input.declared_value,
        state: ParcelState::Pending,
        pod: ProofOfDelivery::default(),
        current_job: None,
        picked_at: None,
        delivered_at: None,
        created_at: Utc::now(),
    }
}
