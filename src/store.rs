use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::event::DispatchEvent;
use crate::models::job::{Job, JobState};
use crate::models::parcel::{Parcel, ParcelState};
use crate::models::request::ServiceRequest;

/// Human-readable sequential references such as `SR/00042`.
pub struct Sequence {
    prefix: &'static str,
    next: AtomicU64,
}

impl Sequence {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            next: AtomicU64::new(1),
        }
    }

    pub fn next(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}/{:05}", self.prefix, n)
    }
}

/// A service request together with everything it owns. The whole aggregate
/// is the unit of locking and of atomic writes.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub request: ServiceRequest,
    pub parcels: Vec<Parcel>,
    pub jobs: Vec<Job>,
}

impl RequestRecord {
    pub fn parcel(&self, parcel_id: Uuid) -> Result<&Parcel, AppError> {
        self.parcels
            .iter()
            .find(|p| p.id == parcel_id)
            .ok_or_else(|| AppError::NotFound(format!("parcel {parcel_id} not found")))
    }

    pub fn parcel_mut(&mut self, parcel_id: Uuid) -> Result<&mut Parcel, AppError> {
        self.parcels
            .iter_mut()
            .find(|p| p.id == parcel_id)
            .ok_or_else(|| AppError::NotFound(format!("parcel {parcel_id} not found")))
    }

    pub fn job(&self, job_id: Uuid) -> Result<&Job, AppError> {
        self.jobs
            .iter()
            .find(|j| j.id == job_id)
            .ok_or_else(|| AppError::NotFound(format!("job {job_id} not found")))
    }

    pub fn job_mut(&mut self, job_id: Uuid) -> Result<&mut Job, AppError> {
        self.jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or_else(|| AppError::NotFound(format!("job {job_id} not found")))
    }

    pub fn all_parcels_delivered(&self) -> bool {
        !self.parcels.is_empty()
            && self
                .parcels
                .iter()
                .all(|p| p.state == ParcelState::Delivered)
    }

    /// Parcel operations are reserved for the request's assigned driver.
    pub fn authorize_driver(&self, actor: Uuid) -> Result<(), AppError> {
        match self.request.assigned_driver {
            Some(driver) if driver == actor => Ok(()),
            _ => Err(AppError::Unauthorized(format!(
                "request {} is not assigned to {actor}",
                self.request.reference
            ))),
        }
    }
}

pub struct Store {
    records: DashMap<Uuid, RequestRecord>,
    parcel_index: DashMap<Uuid, Uuid>,
    job_index: DashMap<Uuid, Uuid>,
    pub request_seq: Sequence,
    pub parcel_seq: Sequence,
    pub job_seq: Sequence,
}

impl Store {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            parcel_index: DashMap::new(),
            job_index: DashMap::new(),
            request_seq: Sequence::new("SR"),
            parcel_seq: Sequence::new("PCL"),
            job_seq: Sequence::new("JOB"),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn insert(&self, record: RequestRecord) {
        let request_id = record.request.id;
        self.reindex(&record);
        self.records.insert(request_id, record);
    }

    pub fn get(&self, request_id: Uuid) -> Result<RequestRecord, AppError> {
        self.records
            .get(&request_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("service request {request_id} not found")))
    }

    pub fn request_of_parcel(&self, parcel_id: Uuid) -> Result<Uuid, AppError> {
        self.parcel_index
            .get(&parcel_id)
            .map(|entry| *entry.value())
            .ok_or_else(|| AppError::NotFound(format!("parcel {parcel_id} not found")))
    }

    pub fn request_of_job(&self, job_id: Uuid) -> Result<Uuid, AppError> {
        self.job_index
            .get(&job_id)
            .map(|entry| *entry.value())
            .ok_or_else(|| AppError::NotFound(format!("job {job_id} not found")))
    }

    /// Cloned snapshot of every record matching `predicate`.
    pub fn select<F>(&self, predicate: F) -> Vec<RequestRecord>
    where
        F: Fn(&RequestRecord) -> bool,
    {
        self.records
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn jobs_for_driver(&self, driver_id: Uuid, state: Option<JobState>) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .records
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .jobs
                    .iter()
                    .filter(|job| job.driver_id == driver_id)
                    .filter(|job| state.is_none_or(|s| job.state == s))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        jobs.sort_by_key(|job| job.scheduled_at);
        jobs
    }

    /// Runs `apply` against a private copy of the record while holding the
    /// record's exclusive lock. The copy replaces the stored record only when
    /// `apply` succeeds, so a failed guard leaves no trace. Returns the
    /// closure's value and one event per entity whose state changed.
    ///
    /// `apply` must not touch this store's record map.
    pub fn transact<T, F>(
        &self,
        request_id: Uuid,
        apply: F,
    ) -> Result<(T, Vec<DispatchEvent>), AppError>
    where
        F: FnOnce(&mut RequestRecord) -> Result<T, AppError>,
    {
        let mut entry = self
            .records
            .get_mut(&request_id)
            .ok_or_else(|| AppError::NotFound(format!("service request {request_id} not found")))?;

        let mut draft = entry.value().clone();
        let value = apply(&mut draft)?;
        draft.request.version += 1;

        let events = state_changes(entry.value(), &draft);
        self.reindex(&draft);
        *entry.value_mut() = draft;

        Ok((value, events))
    }

    fn reindex(&self, record: &RequestRecord) {
        let request_id = record.request.id;
        for parcel in &record.parcels {
            self.parcel_index.insert(parcel.id, request_id);
        }
        for job in &record.jobs {
            self.job_index.insert(job.id, request_id);
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

fn state_changes(before: &RequestRecord, after: &RequestRecord) -> Vec<DispatchEvent> {
    let at = Utc::now();
    let request_id = after.request.id;
    let mut events = Vec::new();

    if before.request.state != after.request.state {
        events.push(DispatchEvent::RequestStateChanged {
            request_id,
            reference: after.request.reference.clone(),
            state: after.request.state,
            at,
        });
    }

    for job in &after.jobs {
        let previous = before.jobs.iter().find(|j| j.id == job.id).map(|j| j.state);
        if previous != Some(job.state) {
            events.push(DispatchEvent::JobStateChanged {
                job_id: job.id,
                request_id,
                reference: job.reference.clone(),
                state: job.state,
                at,
            });
        }
    }

    for parcel in &after.parcels {
        let previous = before
            .parcels
            .iter()
            .find(|p| p.id == parcel.id)
            .map(|p| p.state);
        if previous != Some(parcel.state) {
            events.push(DispatchEvent::ParcelStateChanged {
                parcel_id: parcel.id,
                request_id,
                reference: parcel.reference.clone(),
                state: parcel.state,
                at,
            });
        }
    }

    events
}
