pub mod assignment;
pub mod contract;
pub mod incident;
pub mod job;
pub mod linehaul;
pub mod monitor;
pub mod parcel;
pub mod request;
pub mod tracking;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::request::RequestState;
use crate::state::AppState;
use crate::store::RequestRecord;

/// Result of a lifecycle operation: the updated entity (with whatever
/// timestamps the transition stamped) and where its request ended up.
#[derive(Debug, Clone, Serialize)]
pub struct Transitioned<T> {
    #[serde(flatten)]
    pub entity: T,
    pub request_state: RequestState,
}

/// Runs one transaction against a request aggregate, counts its outcome and
/// publishes the resulting state changes once committed.
pub(crate) fn transact<T, F>(
    state: &AppState,
    entity: &'static str,
    request_id: Uuid,
    apply: F,
) -> Result<T, AppError>
where
    F: FnOnce(&mut RequestRecord, DateTime<Utc>) -> Result<T, AppError>,
{
    let now = Utc::now();
    let result = state.store.transact(request_id, |record| apply(record, now));

    let outcome = match &result {
        Ok(_) => "success",
        Err(err) => err.kind(),
    };
    state
        .metrics
        .transitions_total
        .with_label_values(&[entity, outcome])
        .inc();

    let (value, events) = result?;
    for event in events {
        state.publish(event);
    }
    Ok(value)
}
