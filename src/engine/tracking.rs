use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::path_length_km;
use crate::models::gps::GpsLog;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct GpsUpdate {
    pub job_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy: f64,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub heading: f64,
    #[serde(default)]
    pub altitude: f64,
    #[serde(default)]
    pub battery_level: f64,
    pub network_type: Option<String>,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobTrack {
    pub job_id: Uuid,
    pub points: Vec<GpsLog>,
    pub distance_km: f64,
}

/// Stores a position reported by the driver working `update.job_id`.
pub fn record_position(
    state: &AppState,
    actor: Uuid,
    update: GpsUpdate,
) -> Result<GpsLog, AppError> {
    let request_id = state.store.request_of_job(update.job_id)?;
    let record = state.store.get(request_id)?;
    record.job(update.job_id)?.authorize(actor)?;

    let log = GpsLog {
        id: Uuid::new_v4(),
        job_id: update.job_id,
        driver_id: actor,
        latitude: update.latitude,
        longitude: update.longitude,
        accuracy: update.accuracy,
        speed: update.speed,
        heading: update.heading,
        altitude: update.altitude,
        battery_level: update.battery_level,
        network_type: update.network_type,
        recorded_at: update.recorded_at.unwrap_or_else(Utc::now),
    };
    log.validate()?;

    state.gps_logs.insert(log.id, log.clone());
    debug!(job_id = %log.job_id, lat = log.latitude, lng = log.longitude, "gps position recorded");
    Ok(log)
}

pub fn job_track(state: &AppState, job_id: Uuid) -> Result<JobTrack, AppError> {
    state.store.request_of_job(job_id)?;

    let mut points: Vec<GpsLog> = state
        .gps_logs
        .iter()
        .filter(|entry| entry.value().job_id == job_id)
        .map(|entry| entry.value().clone())
        .collect();
    points.sort_by_key(|log| log.recorded_at);

    let path: Vec<_> = points.iter().map(GpsLog::point).collect();
    Ok(JobTrack {
        job_id,
        distance_km: path_length_km(&path),
        points,
    })
}
