use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::contract::expire_contracts;
use crate::engine::incident::{open_delay_incident, update};
use crate::models::event::DispatchEvent;
use crate::models::incident::IncidentState;
use crate::models::job::{Job, JobState};
use crate::models::request::RequestState;
use crate::state::AppState;

/// Runs every periodic monitor on a fixed interval until the task is
/// dropped. A failing item is logged and skipped; it never stops the pass.
pub async fn run_monitors(state: Arc<AppState>) {
    let mut ticker = interval(StdDuration::from_secs(state.config.monitor_interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        interval_secs = state.config.monitor_interval_secs,
        "monitors started"
    );

    let mut summarized: Option<NaiveDate> = None;
    loop {
        ticker.tick().await;
        let now = Utc::now();

        timed(&state, "delay", || detect_delayed_requests(&state, now).len());
        timed(&state, "reminder", || send_driver_reminders(&state, now));
        timed(&state, "gps_retention", || purge_gps_logs(&state, now));
        timed(&state, "incident_auto_close", || {
            auto_close_incidents(&state, now)
        });
        timed(&state, "contract_expiry", || {
            expire_contracts(&state, now.date_naive())
        });

        // One summary per calendar day, on the first pass of the day.
        if summarized != Some(now.date_naive()) {
            summarized = Some(now.date_naive());
            let summary = daily_summary(&state, now);
            info!(
                date = %summary.date,
                created = summary.created,
                delivered = summary.delivered,
                pending = summary.pending,
                "daily summary"
            );
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    /// Requests created since midnight UTC.
    pub created: usize,
    /// Requests delivered since midnight UTC.
    pub delivered: usize,
    /// Requests still confirmed, assigned or in progress.
    pub pending: usize,
}

pub fn daily_summary(state: &AppState, now: DateTime<Utc>) -> DailySummary {
    let date = now.date_naive();
    let midnight = date.and_time(NaiveTime::MIN).and_utc();

    let mut summary = DailySummary {
        date,
        created: 0,
        delivered: 0,
        pending: 0,
    };
    for record in state.store.select(|_| true) {
        let request = &record.request;
        if request.created_at >= midnight {
            summary.created += 1;
        }
        if request.state == RequestState::Delivered
            && request.actual_delivery.is_some_and(|at| at >= midnight)
        {
            summary.delivered += 1;
        }
        if request.state.is_pending_delivery() {
            summary.pending += 1;
        }
    }
    summary
}

fn timed<F>(state: &AppState, monitor: &str, pass: F)
where
    F: FnOnce() -> usize,
{
    let start = Instant::now();
    let affected = pass();
    state
        .metrics
        .monitor_duration_seconds
        .with_label_values(&[monitor])
        .observe(start.elapsed().as_secs_f64());

    if affected > 0 {
        info!(monitor, affected, "monitor pass finished");
    }
}

/// Opens a high-severity delay incident for every request whose scheduled
/// delivery has passed while it is still confirmed, assigned or in progress.
/// Requests that already have an open delay incident are skipped.
pub fn detect_delayed_requests(state: &AppState, now: DateTime<Utc>) -> Vec<Uuid> {
    let delayed = state.store.select(|record| {
        record.request.state.is_pending_delivery()
            && record
                .request
                .scheduled_delivery
                .is_some_and(|scheduled| scheduled < now)
    });

    let mut created = Vec::new();
    for record in &delayed {
        let Some(scheduled) = record.request.scheduled_delivery else {
            continue;
        };
        if let Some(incident) = open_delay_incident(state, &record.request, scheduled, now) {
            created.push(incident.id);
        }
    }

    info!(
        delayed = delayed.len(),
        created = created.len(),
        "checked delayed requests"
    );
    created
}

/// Publishes one reminder per assigned job scheduled inside the reminder
/// window. Jobs are marked so the next pass does not repeat the reminder.
pub fn send_driver_reminders(state: &AppState, now: DateTime<Utc>) -> usize {
    let horizon = now + Duration::minutes(state.config.reminder_window_minutes);
    let due = |job: &Job| {
        job.state == JobState::Assigned
            && job.reminder_sent_at.is_none()
            && job
                .scheduled_at
                .is_some_and(|at| at >= now && at <= horizon)
    };

    let candidates = state
        .store
        .select(|record| record.jobs.iter().any(|job| due(job)));

    let mut sent = 0;
    for candidate in candidates {
        let request_id = candidate.request.id;
        let result = state.store.transact(request_id, |record| {
            let mut reminders = Vec::new();
            for job in record.jobs.iter_mut() {
                if !due(&*job) {
                    continue;
                }
                job.reminder_sent_at = Some(now);
                reminders.push(DispatchEvent::JobReminder {
                    job_id: job.id,
                    driver_id: job.driver_id,
                    job_type: job.job_type,
                    scheduled_at: job.scheduled_at,
                    address: job.location.address.clone(),
                });
            }
            Ok(reminders)
        });

        match result {
            Ok((reminders, _)) => {
                sent += reminders.len();
                for reminder in reminders {
                    state.publish(reminder);
                }
            }
            Err(err) => warn!(request_id = %request_id, error = %err, "failed to send reminders"),
        }
    }

    sent
}

/// Drops GPS logs older than the retention period. Returns how many went.
pub fn purge_gps_logs(state: &AppState, now: DateTime<Utc>) -> usize {
    let cutoff = now - Duration::days(state.config.gps_retention_days);
    let before = state.gps_logs.len();
    state.gps_logs.retain(|_, log| log.recorded_at >= cutoff);
    let removed = before.saturating_sub(state.gps_logs.len());

    if removed > 0 {
        info!(
            removed,
            retention_days = state.config.gps_retention_days,
            "purged old gps logs"
        );
    }
    removed
}

/// Closes incidents that have stayed resolved past the auto-close threshold.
pub fn auto_close_incidents(state: &AppState, now: DateTime<Utc>) -> usize {
    let cutoff = now - Duration::days(state.config.incident_auto_close_days);
    let stale: Vec<Uuid> = state
        .incidents
        .iter()
        .filter(|entry| {
            let incident = entry.value();
            incident.state == IncidentState::Resolved
                && incident.resolved_at.is_some_and(|at| at < cutoff)
        })
        .map(|entry| *entry.key())
        .collect();

    let mut closed = 0;
    for incident_id in stale {
        match update(state, incident_id, |incident| incident.close(now)) {
            Ok(_) => closed += 1,
            Err(err) => warn!(
                incident_id = %incident_id,
                error = %err,
                "failed to auto-close incident"
            ),
        }
    }
    closed
}
