use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::transact;
use crate::error::AppError;
use crate::geo::haversine_km;
use crate::models::event::DispatchEvent;
use crate::models::linehaul::{Linehaul, LinehaulState};
use crate::models::parcel::ParcelState;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct NewLinehaul {
    pub departure_hub: Uuid,
    pub arrival_hub: Uuid,
    pub driver_id: Option<Uuid>,
    pub scheduled_departure: DateTime<Utc>,
    pub scheduled_arrival: DateTime<Utc>,
    #[serde(default)]
    pub parcel_ids: Vec<Uuid>,
    /// Defaults to the straight-line distance between the hubs.
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub fuel_cost: f64,
    #[serde(default)]
    pub driver_cost: f64,
    #[serde(default)]
    pub other_costs: f64,
    pub currency: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadLinehaul {
    pub driver_id: Option<Uuid>,
    #[serde(default)]
    pub parcel_ids: Vec<Uuid>,
}

pub fn create(state: &AppState, input: NewLinehaul) -> Result<Linehaul, AppError> {
    let hub_location = |hub_id: Uuid| {
        state
            .hubs
            .get(&hub_id)
            .map(|hub| hub.location)
            .ok_or_else(|| AppError::NotFound(format!("hub {hub_id} not found")))
    };
    let from = hub_location(input.departure_hub)?;
    let to = hub_location(input.arrival_hub)?;
    if let Some(driver_id) = input.driver_id {
        ensure_driver(state, driver_id)?;
    }
    ensure_parcels(state, &input.parcel_ids)?;

    let distance_km = match (input.distance_km, from, to) {
        (Some(distance), _, _) => distance,
        (None, Some(from), Some(to)) => haversine_km(&from, &to),
        _ => 0.0,
    };

    let mut linehaul = Linehaul {
        id: Uuid::new_v4(),
        reference: String::new(),
        departure_hub: input.departure_hub,
        arrival_hub: input.arrival_hub,
        driver_id: input.driver_id,
        scheduled_departure: input.scheduled_departure,
        scheduled_arrival: input.scheduled_arrival,
        actual_departure: None,
        actual_arrival: None,
        parcel_ids: Vec::new(),
        state: LinehaulState::Draft,
        distance_km,
        fuel_cost: input.fuel_cost,
        driver_cost: input.driver_cost,
        other_costs: input.other_costs,
        currency: input
            .currency
            .unwrap_or_else(|| state.config.default_currency.clone()),
        notes: input.notes,
        created_at: Utc::now(),
    };
    linehaul.load(None, &input.parcel_ids)?;
    linehaul.validate()?;
    linehaul.reference = state.linehaul_seq.next();

    state.linehauls.insert(linehaul.id, linehaul.clone());
    info!(
        linehaul_id = %linehaul.id,
        reference = %linehaul.reference,
        parcels = linehaul.parcel_ids.len(),
        "linehaul created"
    );
    Ok(linehaul)
}

pub fn load(
    state: &AppState,
    linehaul_id: Uuid,
    input: LoadLinehaul,
) -> Result<Linehaul, AppError> {
    if let Some(driver_id) = input.driver_id {
        ensure_driver(state, driver_id)?;
    }
    ensure_parcels(state, &input.parcel_ids)?;
    update(state, linehaul_id, |linehaul, _| {
        linehaul.load(input.driver_id, &input.parcel_ids)
    })
}

pub fn confirm(state: &AppState, linehaul_id: Uuid) -> Result<Linehaul, AppError> {
    update(state, linehaul_id, |linehaul, _| linehaul.confirm())
}

/// Departs the linehaul, then moves each pending or picked parcel on board
/// to in_transit. Parcels further along are left as they are.
pub fn depart(state: &AppState, linehaul_id: Uuid) -> Result<Linehaul, AppError> {
    let linehaul = update(state, linehaul_id, |linehaul, now| linehaul.depart(now))?;

    let mut by_request: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for parcel_id in &linehaul.parcel_ids {
        match state.store.request_of_parcel(*parcel_id) {
            Ok(request_id) => by_request.entry(request_id).or_default().push(*parcel_id),
            Err(err) => warn!(parcel_id = %parcel_id, error = %err, "linehaul parcel missing"),
        }
    }

    for (request_id, parcel_ids) in by_request {
        let moved = transact(state, "parcel", request_id, |record, _| {
            let mut moved = 0;
            for parcel_id in &parcel_ids {
                let parcel = record.parcel_mut(*parcel_id)?;
                if matches!(parcel.state, ParcelState::Pending | ParcelState::Picked) {
                    parcel.mark_in_transit()?;
                    moved += 1;
                }
            }
            Ok(moved)
        });
        if let Err(err) = moved {
            warn!(
                linehaul_id = %linehaul_id,
                request_id = %request_id,
                error = %err,
                "failed to move linehaul parcels in transit"
            );
        }
    }

    Ok(linehaul)
}

pub fn arrive(state: &AppState, linehaul_id: Uuid) -> Result<Linehaul, AppError> {
    update(state, linehaul_id, |linehaul, now| linehaul.arrive(now))
}

pub fn cancel(state: &AppState, linehaul_id: Uuid) -> Result<Linehaul, AppError> {
    update(state, linehaul_id, |linehaul, _| linehaul.cancel())
}

pub fn get(state: &AppState, linehaul_id: Uuid) -> Result<Linehaul, AppError> {
    state
        .linehauls
        .get(&linehaul_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("linehaul {linehaul_id} not found")))
}

pub fn list(state: &AppState, filter: Option<LinehaulState>) -> Vec<Linehaul> {
    let mut linehauls: Vec<Linehaul> = state
        .linehauls
        .iter()
        .filter(|entry| filter.is_none_or(|s| entry.value().state == s))
        .map(|entry| entry.value().clone())
        .collect();
    linehauls.sort_by(|a, b| b.scheduled_departure.cmp(&a.scheduled_departure));
    linehauls
}

/// Sum of the known weights of the parcels on board, in kg.
pub fn total_weight(state: &AppState, linehaul: &Linehaul) -> f64 {
    linehaul
        .parcel_ids
        .iter()
        .filter_map(|id| {
            let request_id = state.store.request_of_parcel(*id).ok()?;
            let record = state.store.get(request_id).ok()?;
            record.parcel(*id).ok()?.weight
        })
        .sum()
}

fn ensure_driver(state: &AppState, driver_id: Uuid) -> Result<(), AppError> {
    if !state.drivers.contains_key(&driver_id) {
        return Err(AppError::NotFound(format!("driver {driver_id} not found")));
    }
    Ok(())
}

fn ensure_parcels(state: &AppState, parcel_ids: &[Uuid]) -> Result<(), AppError> {
    for parcel_id in parcel_ids {
        state.store.request_of_parcel(*parcel_id)?;
    }
    Ok(())
}

/// Applies `op` to a copy under the entry lock, writes it back on success
/// and publishes the state change.
fn update<F>(state: &AppState, linehaul_id: Uuid, op: F) -> Result<Linehaul, AppError>
where
    F: FnOnce(&mut Linehaul, DateTime<Utc>) -> Result<(), AppError>,
{
    let mut entry = state
        .linehauls
        .get_mut(&linehaul_id)
        .ok_or_else(|| AppError::NotFound(format!("linehaul {linehaul_id} not found")))?;

    let mut draft = entry.value().clone();
    let result = op(&mut draft, Utc::now());
    let outcome = match &result {
        Ok(()) => "success",
        Err(err) => err.kind(),
    };
    state
        .metrics
        .transitions_total
        .with_label_values(&["linehaul", outcome])
        .inc();
    result?;

    let changed = entry.value().state != draft.state;
    *entry.value_mut() = draft.clone();
    drop(entry);

    if changed {
        state.publish(DispatchEvent::LinehaulStateChanged {
            linehaul_id,
            reference: draft.reference.clone(),
            state: draft.state,
            at: Utc::now(),
        });
        info!(linehaul_id = %linehaul_id, state = %draft.state, "linehaul updated");
    }
    Ok(draft)
}
