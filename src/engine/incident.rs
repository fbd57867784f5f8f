use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::event::DispatchEvent;
use crate::models::incident::{Incident, IncidentState, IncidentType, Severity};
use crate::models::request::ServiceRequest;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct NewIncident {
    pub incident_type: IncidentType,
    pub request_id: Option<Uuid>,
    pub parcel_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub severity: Severity,
    pub location: Option<GeoPoint>,
}

pub fn report(state: &AppState, input: NewIncident) -> Result<Incident, AppError> {
    if let Some(request_id) = input.request_id {
        state.store.get(request_id)?;
    }
    if let Some(parcel_id) = input.parcel_id {
        state.store.request_of_parcel(parcel_id)?;
    }
    if let Some(job_id) = input.job_id {
        state.store.request_of_job(job_id)?;
    }

    let mut incident = Incident {
        id: Uuid::new_v4(),
        reference: String::new(),
        incident_type: input.incident_type,
        request_id: input.request_id,
        parcel_id: input.parcel_id,
        job_id: input.job_id,
        driver_id: input.driver_id,
        title: input.title,
        description: input.description,
        severity: input.severity,
        state: IncidentState::New,
        location: input.location,
        resolution_notes: None,
        reported_at: Utc::now(),
        resolved_at: None,
        closed_at: None,
    };
    incident.validate()?;

    if let (IncidentType::Delay, Some(request_id)) = (incident.incident_type, incident.request_id) {
        match state.open_delays.entry(request_id) {
            Entry::Occupied(existing) => {
                return Err(AppError::ValidationFailed(format!(
                    "request {request_id} already has open delay incident {}",
                    existing.get()
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(incident.id);
            }
        }
    }

    incident.reference = state.incident_seq.next();
    Ok(register(state, incident))
}

/// Opens the delay incident for `request` unless one is already open.
/// The per-request slot in `open_delays` is claimed first, so concurrent
/// callers cannot both create one.
pub(crate) fn open_delay_incident(
    state: &AppState,
    request: &ServiceRequest,
    scheduled: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<Incident> {
    let id = Uuid::new_v4();
    match state.open_delays.entry(request.id) {
        Entry::Occupied(_) => return None,
        Entry::Vacant(slot) => {
            slot.insert(id);
        }
    }

    let incident = Incident {
        id,
        reference: state.incident_seq.next(),
        incident_type: IncidentType::Delay,
        request_id: Some(request.id),
        parcel_id: None,
        job_id: None,
        driver_id: request.assigned_driver,
        title: format!("Delayed Delivery - {}", request.reference),
        description: format!(
            "Service request {} is delayed. Scheduled delivery was {}",
            request.reference,
            scheduled.to_rfc3339()
        ),
        severity: Severity::High,
        state: IncidentState::New,
        location: None,
        resolution_notes: None,
        reported_at: now,
        resolved_at: None,
        closed_at: None,
    };

    state.metrics.delay_incidents_total.inc();
    Some(register(state, incident))
}

pub fn investigate(state: &AppState, incident_id: Uuid) -> Result<Incident, AppError> {
    update(state, incident_id, |incident| incident.investigate())
}

pub fn resolve(state: &AppState, incident_id: Uuid, notes: &str) -> Result<Incident, AppError> {
    let incident = update(state, incident_id, |incident| {
        incident.resolve(notes, Utc::now())
    })?;
    release_delay_slot(state, &incident);
    state.metrics.incidents_open.dec();
    Ok(incident)
}

pub fn close(state: &AppState, incident_id: Uuid) -> Result<Incident, AppError> {
    update(state, incident_id, |incident| incident.close(Utc::now()))
}

/// Reopening a delay incident is refused while another delay incident is
/// open for the same request.
pub fn reopen(state: &AppState, incident_id: Uuid) -> Result<Incident, AppError> {
    let current = get(state, incident_id)?;

    let claimed = match (current.incident_type, current.request_id) {
        (IncidentType::Delay, Some(request_id)) => match state.open_delays.entry(request_id) {
            Entry::Occupied(existing) if *existing.get() != incident_id => {
                return Err(AppError::InvalidTransition(format!(
                    "incident {}: request already has open delay incident {}",
                    current.reference,
                    existing.get()
                )));
            }
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(incident_id);
                Some(request_id)
            }
        },
        _ => None,
    };

    match update(state, incident_id, |incident| incident.reopen()) {
        Ok(incident) => {
            state.metrics.incidents_open.inc();
            Ok(incident)
        }
        Err(err) => {
            if let Some(request_id) = claimed {
                state.open_delays.remove_if(&request_id, |_, id| *id == incident_id);
            }
            Err(err)
        }
    }
}

pub fn get(state: &AppState, incident_id: Uuid) -> Result<Incident, AppError> {
    state
        .incidents
        .get(&incident_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("incident {incident_id} not found")))
}

pub fn list(state: &AppState, open_only: bool) -> Vec<Incident> {
    let mut incidents: Vec<Incident> = state
        .incidents
        .iter()
        .filter(|entry| !open_only || entry.value().state.is_open())
        .map(|entry| entry.value().clone())
        .collect();
    incidents.sort_by(|a, b| b.reported_at.cmp(&a.reported_at));
    incidents
}

fn register(state: &AppState, incident: Incident) -> Incident {
    state.incidents.insert(incident.id, incident.clone());
    state.metrics.incidents_open.inc();
    state.publish(DispatchEvent::IncidentOpened {
        incident_id: incident.id,
        reference: incident.reference.clone(),
        incident_type: incident.incident_type,
        request_id: incident.request_id,
        at: incident.reported_at,
    });

    info!(
        incident_id = %incident.id,
        reference = %incident.reference,
        incident_type = ?incident.incident_type,
        "incident opened"
    );
    incident
}

/// Applies `op` to a copy of the incident under its entry lock and writes the
/// copy back only on success.
pub(crate) fn update<F>(state: &AppState, incident_id: Uuid, op: F) -> Result<Incident, AppError>
where
    F: FnOnce(&mut Incident) -> Result<(), AppError>,
{
    let mut entry = state
        .incidents
        .get_mut(&incident_id)
        .ok_or_else(|| AppError::NotFound(format!("incident {incident_id} not found")))?;

    let mut draft = entry.value().clone();
    let result = op(&mut draft);
    let outcome = match &result {
        Ok(()) => "success",
        Err(err) => err.kind(),
    };
    state
        .metrics
        .transitions_total
        .with_label_values(&["incident", outcome])
        .inc();
    result?;

    *entry.value_mut() = draft.clone();
    Ok(draft)
}

fn release_delay_slot(state: &AppState, incident: &Incident) {
    if let (IncidentType::Delay, Some(request_id)) = (incident.incident_type, incident.request_id) {
        state
            .open_delays
            .remove_if(&request_id, |_, id| *id == incident.id);
    }
}
