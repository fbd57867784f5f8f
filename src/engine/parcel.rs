use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::engine::{transact, Transitioned};
use crate::error::AppError;
use crate::models::parcel::{Parcel, ParcelState, ProofOfDelivery};
use crate::models::request::RequestState;
use crate::state::AppState;
use crate::store::RequestRecord;

pub fn mark_picked(
    state: &AppState,
    parcel_id: Uuid,
    actor: Uuid,
) -> Result<Transitioned<Parcel>, AppError> {
    apply(state, parcel_id, actor, |record, now| {
        record.parcel_mut(parcel_id)?.mark_picked(now)
    })
}

pub fn mark_in_transit(
    state: &AppState,
    parcel_id: Uuid,
    actor: Uuid,
) -> Result<Transitioned<Parcel>, AppError> {
    apply(state, parcel_id, actor, |record, _| {
        record.parcel_mut(parcel_id)?.mark_in_transit()
    })
}

pub fn mark_out_for_delivery(
    state: &AppState,
    parcel_id: Uuid,
    actor: Uuid,
) -> Result<Transitioned<Parcel>, AppError> {
    apply(state, parcel_id, actor, |record, _| {
        record.parcel_mut(parcel_id)?.mark_out_for_delivery()
    })
}

/// Merges whatever evidence is given into the stored proof of delivery and
/// delivers in one step. Evidence attached earlier counts.
pub fn mark_delivered(
    state: &AppState,
    parcel_id: Uuid,
    actor: Uuid,
    pod: ProofOfDelivery,
) -> Result<Transitioned<Parcel>, AppError> {
    apply(state, parcel_id, actor, |record, now| {
        record.parcel_mut(parcel_id)?.merge_pod(pod)?;
        deliver(record, parcel_id, now)
    })
}

pub fn mark_failed(
    state: &AppState,
    parcel_id: Uuid,
    actor: Uuid,
) -> Result<Transitioned<Parcel>, AppError> {
    apply(state, parcel_id, actor, |record, _| {
        record.parcel_mut(parcel_id)?.mark_failed()
    })
}

pub fn mark_returned(
    state: &AppState,
    parcel_id: Uuid,
    actor: Uuid,
) -> Result<Transitioned<Parcel>, AppError> {
    apply(state, parcel_id, actor, |record, _| {
        record.parcel_mut(parcel_id)?.mark_returned()
    })
}

/// Records proof of delivery ahead of a delivery job's completion.
pub fn attach_pod(
    state: &AppState,
    parcel_id: Uuid,
    actor: Uuid,
    pod: ProofOfDelivery,
) -> Result<Transitioned<Parcel>, AppError> {
    apply(state, parcel_id, actor, |record, _| {
        record.parcel_mut(parcel_id)?.attach_pod(pod)
    })
}

/// Delivers one parcel and, when it was the last undelivered parcel of its
/// request, rolls the request up to delivered.
pub(crate) fn deliver(
    record: &mut RequestRecord,
    parcel_id: Uuid,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    record.parcel_mut(parcel_id)?.mark_delivered(now)?;

    let open = !record.request.is_closed();
    if open && record.all_parcels_delivered() {
        record.request.mark_delivered(now);
        info!(
            request_id = %record.request.id,
            reference = %record.request.reference,
            "all parcels delivered; request delivered"
        );
    }
    Ok(())
}

/// Moves a parcel as far as out_for_delivery through its own guards.
/// Terminal and already-dispatched parcels are left alone.
pub(crate) fn stage_for_delivery(parcel: &mut Parcel) -> Result<(), AppError> {
    match parcel.state {
        ParcelState::Pending => {
            parcel.mark_in_transit()?;
            parcel.mark_out_for_delivery()
        }
        ParcelState::Picked | ParcelState::InTransit => parcel.mark_out_for_delivery(),
        _ => Ok(()),
    }
}

fn apply<F>(
    state: &AppState,
    parcel_id: Uuid,
    actor: Uuid,
    op: F,
) -> Result<Transitioned<Parcel>, AppError>
where
    F: FnOnce(&mut RequestRecord, DateTime<Utc>) -> Result<(), AppError>,
{
    let request_id = state.store.request_of_parcel(parcel_id)?;

    let outcome = transact(state, "parcel", request_id, |record, now| {
        record.authorize_driver(actor)?;
        op(record, now)?;
        Ok(Transitioned {
            entity: record.parcel(parcel_id)?.clone(),
            request_state: record.request.state,
        })
    })?;

    info!(
        parcel_id = %parcel_id,
        state = %outcome.entity.state,
        request_state = %outcome.request_state,
        "parcel updated"
    );
    Ok(outcome)
}
