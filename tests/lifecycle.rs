use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{Duration, NaiveDate, Utc};
use routy_dispatch::config::Config;
use routy_dispatch::engine::assignment::{self, AssignDriver};
use routy_dispatch::engine::contract::{self, NewContract};
use routy_dispatch::engine::incident::{self, NewIncident};
use routy_dispatch::engine::job::NewJob;
use routy_dispatch::engine::linehaul::{self, LoadLinehaul, NewLinehaul};
use routy_dispatch::engine::monitor::{
    auto_close_incidents, daily_summary, detect_delayed_requests, purge_gps_logs,
    send_driver_reminders,
};
use routy_dispatch::engine::request::{self, NewParcel, NewServiceRequest};
use routy_dispatch::engine::{job, parcel};
use routy_dispatch::geo::GeoPoint;
use routy_dispatch::error::AppError;
use routy_dispatch::models::driver::Driver;
use routy_dispatch::models::event::DispatchEvent;
use routy_dispatch::models::contract::{ContractState, PartnerType};
use routy_dispatch::models::gps::GpsLog;
use routy_dispatch::models::hub::Hub;
use routy_dispatch::models::incident::{IncidentState, IncidentType, Severity};
use routy_dispatch::models::job::{JobState, JobType};
use routy_dispatch::models::linehaul::LinehaulState;
use routy_dispatch::models::parcel::{ParcelState, ProofOfDelivery};
use routy_dispatch::models::request::{Endpoint, RequestState};
use routy_dispatch::state::AppState;
use uuid::Uuid;

fn endpoint(address: &str) -> Endpoint {
    Endpoint {
        address: address.to_string(),
        location: None,
        contact_name: None,
        phone: "+1 555 0100".to_string(),
    }
}

fn new_request(parcels: usize) -> NewServiceRequest {
    NewServiceRequest {
        customer: "Acme Ltd".to_string(),
        service_type: Default::default(),
        pickup: endpoint("1 Warehouse Rd"),
        delivery: endpoint("9 Market St"),
        service_fee: 10.0,
        cod_amount: 0.0,
        currency: None,
        notes: None,
        parcels: (0..parcels).map(|_| NewParcel::default()).collect(),
    }
}

fn add_driver(state: &AppState) -> Uuid {
    let driver = Driver {
        id: Uuid::new_v4(),
        name: "Dana".to_string(),
        phone: None,
        active: true,
        created_at: Utc::now(),
    };
    let id = driver.id;
    state.drivers.insert(id, driver);
    id
}

fn assign_input(driver_id: Uuid, pickup: bool, delivery: bool) -> AssignDriver {
    AssignDriver {
        driver_id,
        scheduled_pickup: Utc::now() + Duration::hours(6),
        scheduled_delivery: None,
        create_pickup_job: pickup,
        create_delivery_job: delivery,
        notes: None,
    }
}

fn add_hub(state: &AppState, code: &str, location: GeoPoint) -> Uuid {
    let hub = Hub {
        id: Uuid::new_v4(),
        name: format!("{code} hub"),
        code: code.to_string(),
        address: "Depot Lane".to_string(),
        location: Some(location),
        opening_hour: 6.0,
        closing_hour: 22.0,
        max_capacity: 500,
        active: true,
        created_at: Utc::now(),
    };
    let id = hub.id;
    state.hubs.insert(id, hub);
    id
}

fn pod() -> ProofOfDelivery {
    ProofOfDelivery {
        signature: Some("c2lnbmF0dXJl".to_string()),
        ..ProofOfDelivery::default()
    }
}

#[test]
fn assignment_creates_the_requested_jobs() {
    let state = AppState::new(Config::default());
    let driver = add_driver(&state);

    let plans = [(true, true, 2), (true, false, 1), (false, false, 0)];
    for (pickup, delivery, expected) in plans {
        let record = request::create(&state, new_request(2)).unwrap();
        let input = assign_input(driver, pickup, delivery);
        let assignment = assignment::assign(&state, record.request.id, input).unwrap();

        assert_eq!(assignment.request.state, RequestState::Assigned);
        assert_eq!(assignment.request.assigned_driver, Some(driver));
        assert_eq!(
            assignment.request.scheduled_delivery,
            assignment.request.scheduled_pickup
        );
        assert_eq!(assignment.jobs.len(), expected);
        for job in &assignment.jobs {
            assert_eq!(job.state, JobState::Assigned);
            assert_eq!(job.parcel_ids.len(), 2);
            let address = match job.job_type {
                JobType::Pickup => "1 Warehouse Rd",
                JobType::Delivery => "9 Market St",
            };
            assert_eq!(job.location.address, address);
        }
    }
}

#[test]
fn assignment_rejects_unknown_and_inactive_drivers() {
    let state = AppState::new(Config::default());
    let record = request::create(&state, new_request(1)).unwrap();

    let stranger = assign_input(Uuid::new_v4(), true, true);
    let result = assignment::assign(&state, record.request.id, stranger);
    assert!(matches!(result, Err(AppError::NotFound(_))));

    let driver = add_driver(&state);
    if let Some(mut entry) = state.drivers.get_mut(&driver) {
        entry.active = false;
    }
    let result = assignment::assign(&state, record.request.id, assign_input(driver, true, true));
    assert!(matches!(result, Err(AppError::ValidationFailed(_))));

    let stored = request::get(&state, record.request.id).unwrap();
    assert_eq!(stored.request.state, RequestState::Draft);
    assert!(stored.jobs.is_empty());
}

#[test]
fn failed_guard_leaves_the_record_untouched() {
    let state = AppState::new(Config::default());
    let driver = add_driver(&state);
    let record = request::create(&state, new_request(1)).unwrap();
    let assignment =
        assignment::assign(&state, record.request.id, assign_input(driver, false, true)).unwrap();
    let delivery = assignment.jobs[0].id;
    let before = request::get(&state, record.request.id).unwrap();

    let result = job::complete(&state, delivery, driver);
    assert!(matches!(result, Err(AppError::InvalidTransition(_))));

    let after = request::get(&state, record.request.id).unwrap();
    assert_eq!(after.request.version, before.request.version);
    assert_eq!(after.jobs[0].state, JobState::Assigned);
}

#[test]
fn only_the_last_delivered_parcel_rolls_the_request_up() {
    let state = AppState::new(Config::default());
    let driver = add_driver(&state);
    let record = request::create(&state, new_request(2)).unwrap();
    let request_id = record.request.id;
    let assignment = assignment::assign(&state, request_id, assign_input(driver, false, true))
        .unwrap();
    job::start(&state, assignment.jobs[0].id, driver).unwrap();

    let first = parcel::mark_delivered(&state, record.parcels[0].id, driver, pod()).unwrap();
    assert_eq!(first.entity.state, ParcelState::Delivered);
    assert_eq!(first.request_state, RequestState::InProgress);

    let second = parcel::mark_delivered(&state, record.parcels[1].id, driver, pod()).unwrap();
    assert_eq!(second.request_state, RequestState::Delivered);

    let stored = request::get(&state, request_id).unwrap();
    assert!(stored.request.actual_delivery.is_some());
}

#[test]
fn failing_a_pickup_job_leaves_parcels_alone() {
    let state = AppState::new(Config::default());
    let driver = add_driver(&state);
    let record = request::create(&state, new_request(2)).unwrap();
    let request_id = record.request.id;
    let assignment = assignment::assign(&state, request_id, assign_input(driver, true, true))
        .unwrap();
    let (pickup, delivery) = (assignment.jobs[0].id, assignment.jobs[1].id);

    let result = job::fail(&state, delivery, driver, "no access");
    assert!(matches!(result, Err(AppError::InvalidTransition(_))));

    job::accept(&state, pickup, driver).unwrap();
    let failed = job::fail(&state, pickup, driver, "road closed").unwrap();
    assert_eq!(failed.entity.state, JobState::Failed);
    let stored = request::get(&state, request_id).unwrap();
    assert!(stored.parcels.iter().all(|p| p.state == ParcelState::Pending));
}

#[test]
fn failing_a_delivery_job_forces_every_parcel_to_failed() {
    let state = AppState::new(Config::default());
    let driver = add_driver(&state);
    let record = request::create(&state, new_request(3)).unwrap();
    let request_id = record.request.id;
    let assignment = assignment::assign(&state, request_id, assign_input(driver, false, true))
        .unwrap();
    let delivery = assignment.jobs[0].id;
    let (pending, returned, dispatched) =
        (record.parcels[0].id, record.parcels[1].id, record.parcels[2].id);

    parcel::mark_in_transit(&state, returned, driver).unwrap();
    parcel::mark_returned(&state, returned, driver).unwrap();
    parcel::mark_in_transit(&state, dispatched, driver).unwrap();
    parcel::mark_out_for_delivery(&state, dispatched, driver).unwrap();

    // Accepted, not started, so nothing gets staged on the way.
    job::accept(&state, delivery, driver).unwrap();
    let result = job::fail(&state, delivery, driver, "  ");
    assert!(matches!(result, Err(AppError::ValidationFailed(_))));

    let failed = job::fail(&state, delivery, driver, "customer refused").unwrap();
    assert_eq!(failed.entity.failure_reason.as_deref(), Some("customer refused"));

    let stored = request::get(&state, request_id).unwrap();
    for id in [pending, returned, dispatched] {
        assert_eq!(stored.parcel(id).unwrap().state, ParcelState::Failed);
    }
}

#[test]
fn transitions_are_published_as_events() {
    let state = AppState::new(Config::default());
    let mut events = state.events_tx.subscribe();
    let driver = add_driver(&state);
    let record = request::create(&state, new_request(1)).unwrap();
    request::confirm(&state, record.request.id).unwrap();

    match events.try_recv().unwrap() {
        DispatchEvent::RequestStateChanged { request_id, state, .. } => {
            assert_eq!(request_id, record.request.id);
            assert_eq!(state, RequestState::Confirmed);
        }
        other => panic!("unexpected event {other:?}"),
    }

    assignment::assign(&state, record.request.id, assign_input(driver, true, false)).unwrap();
    let published: Vec<DispatchEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert!(published.iter().any(|event| matches!(
        event,
        DispatchEvent::RequestStateChanged { state: RequestState::Assigned, .. }
    )));
    assert!(published.iter().any(|event| matches!(
        event,
        DispatchEvent::JobStateChanged { state: JobState::Assigned, .. }
    )));
}

#[test]
fn delay_monitor_is_idempotent_per_request() {
    let state = AppState::new(Config::default());
    let driver = add_driver(&state);
    let record = request::create(&state, new_request(1)).unwrap();
    let mut input = assign_input(driver, true, true);
    input.scheduled_pickup = Utc::now() - Duration::hours(2);
    assignment::assign(&state, record.request.id, input).unwrap();

    let now = Utc::now();
    let created = detect_delayed_requests(&state, now);
    assert_eq!(created.len(), 1);
    assert!(detect_delayed_requests(&state, now).is_empty());

    let delay = incident::get(&state, created[0]).unwrap();
    assert_eq!(delay.incident_type, IncidentType::Delay);
    assert_eq!(delay.severity, Severity::High);
    assert_eq!(delay.state, IncidentState::New);
    assert_eq!(delay.driver_id, Some(driver));
    assert!(delay.title.contains(&record.request.reference));
    assert_eq!(state.metrics.delay_incidents_total.get(), 1);

    let manual = NewIncident {
        incident_type: IncidentType::Delay,
        request_id: Some(record.request.id),
        parcel_id: None,
        job_id: None,
        driver_id: None,
        title: "Late".to_string(),
        description: "Customer called".to_string(),
        severity: Severity::Low,
        location: None,
    };
    assert!(matches!(
        incident::report(&state, manual),
        Err(AppError::ValidationFailed(_))
    ));

    incident::resolve(&state, delay.id, "driver rerouted").unwrap();
    let reopened = detect_delayed_requests(&state, now);
    assert_eq!(reopened.len(), 1);

    let result = incident::reopen(&state, delay.id);
    assert!(matches!(result, Err(AppError::InvalidTransition(_))));
}

#[test]
fn delivered_and_cancelled_requests_are_never_delayed() {
    let state = AppState::new(Config::default());
    let driver = add_driver(&state);
    let record = request::create(&state, new_request(1)).unwrap();
    let mut input = assign_input(driver, true, true);
    input.scheduled_pickup = Utc::now() - Duration::hours(2);
    assignment::assign(&state, record.request.id, input).unwrap();
    request::cancel(&state, record.request.id).unwrap();

    assert!(detect_delayed_requests(&state, Utc::now()).is_empty());
}

#[test]
fn reminders_are_sent_once_per_job() {
    let state = AppState::new(Config::default());
    let driver = add_driver(&state);
    let record = request::create(&state, new_request(1)).unwrap();
    let mut input = assign_input(driver, true, true);
    input.scheduled_pickup = Utc::now() + Duration::minutes(30);
    input.scheduled_delivery = Some(Utc::now() + Duration::hours(8));
    assignment::assign(&state, record.request.id, input).unwrap();

    let mut events = state.events_tx.subscribe();
    let now = Utc::now();
    assert_eq!(send_driver_reminders(&state, now), 1);
    assert_eq!(send_driver_reminders(&state, now), 0);

    let reminders: Vec<DispatchEvent> = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|event| matches!(event, DispatchEvent::JobReminder { .. }))
        .collect();
    assert_eq!(reminders.len(), 1);

    let stored = request::get(&state, record.request.id).unwrap();
    let pickup = stored
        .jobs
        .iter()
        .find(|job| job.job_type == JobType::Pickup)
        .unwrap();
    assert!(pickup.reminder_sent_at.is_some());
}

#[test]
fn old_gps_logs_are_purged() {
    let state = AppState::new(Config::default());
    let now = Utc::now();
    for age_days in [1, 89, 91, 200] {
        let log = GpsLog {
            id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            driver_id: Uuid::new_v4(),
            latitude: 10.0,
            longitude: 10.0,
            accuracy: 5.0,
            speed: 0.0,
            heading: 0.0,
            altitude: 0.0,
            battery_level: 50.0,
            network_type: None,
            recorded_at: now - Duration::days(age_days),
        };
        state.gps_logs.insert(log.id, log);
    }

    assert_eq!(purge_gps_logs(&state, now), 2);
    assert_eq!(state.gps_logs.len(), 2);
}

#[test]
fn resolved_incidents_close_after_the_threshold() {
    let state = AppState::new(Config::default());
    let reported = incident::report(
        &state,
        NewIncident {
            incident_type: IncidentType::Damage,
            request_id: None,
            parcel_id: None,
            job_id: None,
            driver_id: None,
            title: "Crushed box".to_string(),
            description: "Corner dented".to_string(),
            severity: Severity::Medium,
            location: None,
        },
    )
    .unwrap();
    incident::resolve(&state, reported.id, "refunded").unwrap();

    assert_eq!(auto_close_incidents(&state, Utc::now()), 0);
    assert_eq!(auto_close_incidents(&state, Utc::now() + Duration::days(31)), 1);

    let closed = incident::get(&state, reported.id).unwrap();
    assert_eq!(closed.state, IncidentState::Closed);
    assert!(closed.closed_at.is_some());
}

#[test]
fn delivery_counts_evidence_attached_earlier() {
    let state = AppState::new(Config::default());
    let driver = add_driver(&state);
    let record = request::create(&state, new_request(2)).unwrap();
    let request_id = record.request.id;
    let assignment = assignment::assign(&state, request_id, assign_input(driver, false, true))
        .unwrap();
    job::start(&state, assignment.jobs[0].id, driver).unwrap();
    let (first, second) = (record.parcels[0].id, record.parcels[1].id);

    parcel::attach_pod(&state, first, driver, pod()).unwrap();
    let recipient_only = ProofOfDelivery {
        recipient_name: Some("Neighbour".to_string()),
        ..ProofOfDelivery::default()
    };
    let delivered = parcel::mark_delivered(&state, first, driver, recipient_only).unwrap();
    assert_eq!(delivered.entity.state, ParcelState::Delivered);
    assert_eq!(delivered.entity.pod.recipient_name.as_deref(), Some("Neighbour"));
    assert_eq!(delivered.entity.pod.signature, pod().signature);

    parcel::attach_pod(&state, second, driver, pod()).unwrap();
    let photo_only = ProofOfDelivery {
        photo: Some("cGhvdG8=".to_string()),
        ..ProofOfDelivery::default()
    };
    let delivered = parcel::mark_delivered(&state, second, driver, photo_only).unwrap();
    assert_eq!(delivered.entity.pod.signature, pod().signature);
    assert!(delivered.entity.pod.photo.is_some());
    assert_eq!(delivered.request_state, RequestState::Delivered);
}

#[test]
fn delivery_without_any_stored_evidence_is_still_rejected() {
    let state = AppState::new(Config::default());
    let driver = add_driver(&state);
    let record = request::create(&state, new_request(1)).unwrap();
    let assignment =
        assignment::assign(&state, record.request.id, assign_input(driver, false, true)).unwrap();
    job::start(&state, assignment.jobs[0].id, driver).unwrap();

    let recipient_only = ProofOfDelivery {
        recipient_name: Some("Neighbour".to_string()),
        ..ProofOfDelivery::default()
    };
    let result = parcel::mark_delivered(&state, record.parcels[0].id, driver, recipient_only);
    assert!(matches!(result, Err(AppError::ValidationFailed(_))));

    let stored = request::get(&state, record.request.id).unwrap();
    assert_eq!(stored.parcels[0].state, ParcelState::OutForDelivery);
    assert!(stored.parcels[0].pod.recipient_name.is_none());
}

#[test]
fn extra_jobs_belong_to_the_assigned_driver_of_an_assigned_request() {
    let state = AppState::new(Config::default());
    let driver = add_driver(&state);
    let other = add_driver(&state);
    let record = request::create(&state, new_request(1)).unwrap();
    let request_id = record.request.id;
    let new_job = |driver_id| NewJob {
        job_type: JobType::Delivery,
        driver_id,
        scheduled_at: None,
        parcel_ids: None,
        notes: None,
    };

    let result = job::create_job(&state, request_id, new_job(driver));
    assert!(matches!(result, Err(AppError::InvalidTransition(_))));

    assignment::assign(&state, request_id, assign_input(driver, true, false)).unwrap();
    let result = job::create_job(&state, request_id, new_job(other));
    assert!(matches!(result, Err(AppError::ValidationFailed(_))));

    let created = job::create_job(&state, request_id, new_job(driver)).unwrap();
    assert_eq!(created.state, JobState::Assigned);
    assert_eq!(created.parcel_ids, vec![record.parcels[0].id]);
    let stored = request::get(&state, request_id).unwrap();
    assert_eq!(stored.jobs.len(), 2);
}

#[test]
fn pickup_completes_after_the_delivery_job_started_first() {
    let state = AppState::new(Config::default());
    let driver = add_driver(&state);
    let record = request::create(&state, new_request(2)).unwrap();
    let request_id = record.request.id;
    let assignment = assignment::assign(&state, request_id, assign_input(driver, true, true))
        .unwrap();
    let (pickup, delivery) = (assignment.jobs[0].id, assignment.jobs[1].id);

    job::start(&state, pickup, driver).unwrap();
    job::start(&state, delivery, driver).unwrap();
    let completed = job::complete(&state, pickup, driver).unwrap();
    assert_eq!(completed.entity.state, JobState::Completed);

    let stored = request::get(&state, request_id).unwrap();
    assert!(stored.request.actual_pickup.is_some());
    for parcel in &stored.parcels {
        assert_eq!(parcel.state, ParcelState::OutForDelivery);
        assert!(parcel.picked_at.is_some());
    }

    for parcel in &record.parcels {
        parcel::attach_pod(&state, parcel.id, driver, pod()).unwrap();
    }
    let completed = job::complete(&state, delivery, driver).unwrap();
    assert_eq!(completed.request_state, RequestState::Delivered);
}

#[test]
fn racing_complete_and_fail_settle_on_one_outcome() {
    for _ in 0..20 {
        let state = Arc::new(AppState::new(Config::default()));
        let driver = add_driver(&state);
        let record = request::create(&state, new_request(1)).unwrap();
        let assignment =
            assignment::assign(&state, record.request.id, assign_input(driver, true, false))
                .unwrap();
        let pickup = assignment.jobs[0].id;
        job::start(&state, pickup, driver).unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let completer = {
            let (state, barrier) = (Arc::clone(&state), Arc::clone(&barrier));
            thread::spawn(move || {
                barrier.wait();
                job::complete(&state, pickup, driver).map(|t| t.entity.state)
            })
        };
        let failer = {
            let (state, barrier) = (Arc::clone(&state), Arc::clone(&barrier));
            thread::spawn(move || {
                barrier.wait();
                job::fail(&state, pickup, driver, "van broke down").map(|t| t.entity.state)
            })
        };
        let outcomes = [completer.join().unwrap(), failer.join().unwrap()];

        let winners: Vec<JobState> = outcomes
            .iter()
            .filter_map(|o| o.as_ref().ok().copied())
            .collect();
        assert_eq!(winners.len(), 1, "outcomes: {outcomes:?}");
        assert!(outcomes
            .iter()
            .any(|o| matches!(o, Err(AppError::InvalidTransition(_)))));

        let (stored, _) = job::get(&state, pickup).unwrap();
        assert_eq!(stored.state, winners[0]);
    }
}

#[test]
fn linehaul_departure_moves_waiting_parcels_in_transit() {
    let state = AppState::new(Config::default());
    let driver = add_driver(&state);
    let north = add_hub(&state, "NTH", GeoPoint { lat: 52.52, lng: 13.405 });
    let south = add_hub(&state, "STH", GeoPoint { lat: 48.137, lng: 11.575 });

    let mut input = new_request(2);
    input.parcels = vec![
        NewParcel { weight: Some(2.5), ..NewParcel::default() },
        NewParcel { weight: Some(4.0), ..NewParcel::default() },
    ];
    let record = request::create(&state, input).unwrap();
    let (waiting, returned) = (record.parcels[0].id, record.parcels[1].id);
    assignment::assign(&state, record.request.id, assign_input(driver, true, true)).unwrap();
    parcel::mark_in_transit(&state, returned, driver).unwrap();
    parcel::mark_returned(&state, returned, driver).unwrap();

    let departure = Utc::now() + Duration::hours(1);
    let created = linehaul::create(
        &state,
        NewLinehaul {
            departure_hub: north,
            arrival_hub: south,
            driver_id: None,
            scheduled_departure: departure,
            scheduled_arrival: departure + Duration::hours(6),
            parcel_ids: vec![waiting],
            distance_km: None,
            fuel_cost: 90.0,
            driver_cost: 150.0,
            other_costs: 0.0,
            currency: None,
            notes: None,
        },
    )
    .unwrap();
    assert!(created.reference.starts_with("LH/"));
    assert!((created.distance_km - 504.0).abs() < 5.0);
    assert_eq!(created.currency, state.config.default_currency);

    let result = linehaul::confirm(&state, created.id);
    assert!(matches!(result, Err(AppError::ValidationFailed(_))));

    let load = LoadLinehaul { driver_id: Some(driver), parcel_ids: vec![returned, waiting] };
    let loaded = linehaul::load(&state, created.id, load).unwrap();
    assert_eq!(loaded.parcel_ids, vec![waiting, returned]);
    assert_eq!(linehaul::total_weight(&state, &loaded), 6.5);

    let mut events = state.events_tx.subscribe();
    linehaul::confirm(&state, created.id).unwrap();
    let departed = linehaul::depart(&state, created.id).unwrap();
    assert_eq!(departed.state, LinehaulState::InTransit);
    assert!(departed.actual_departure.is_some());

    let stored = request::get(&state, record.request.id).unwrap();
    assert_eq!(stored.parcel(waiting).unwrap().state, ParcelState::InTransit);
    assert_eq!(stored.parcel(returned).unwrap().state, ParcelState::Returned);

    let published: Vec<DispatchEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert!(published.iter().any(|event| matches!(
        event,
        DispatchEvent::LinehaulStateChanged { state: LinehaulState::InTransit, .. }
    )));

    linehaul::arrive(&state, created.id).unwrap();
    let result = linehaul::cancel(&state, created.id);
    assert!(matches!(result, Err(AppError::InvalidTransition(_))));
    assert_eq!(linehaul::list(&state, Some(LinehaulState::Arrived)).len(), 1);
}

#[test]
fn linehaul_rejects_unknown_hubs_and_parcels() {
    let state = AppState::new(Config::default());
    let hub = add_hub(&state, "ONE", GeoPoint { lat: 10.0, lng: 10.0 });
    let departure = Utc::now();
    let input = |arrival_hub, parcel_ids| NewLinehaul {
        departure_hub: hub,
        arrival_hub,
        driver_id: None,
        scheduled_departure: departure,
        scheduled_arrival: departure + Duration::hours(2),
        parcel_ids,
        distance_km: Some(100.0),
        fuel_cost: 0.0,
        driver_cost: 0.0,
        other_costs: 0.0,
        currency: None,
        notes: None,
    };

    let result = linehaul::create(&state, input(Uuid::new_v4(), Vec::new()));
    assert!(matches!(result, Err(AppError::NotFound(_))));
    let result = linehaul::create(&state, input(hub, Vec::new()));
    assert!(matches!(result, Err(AppError::ValidationFailed(_))));

    let other = add_hub(&state, "TWO", GeoPoint { lat: 11.0, lng: 10.0 });
    let result = linehaul::create(&state, input(other, vec![Uuid::new_v4()]));
    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert!(state.linehauls.is_empty());
}

#[test]
fn contracts_activate_and_expire_after_their_end_date() {
    let state = AppState::new(Config::default());
    let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
    let input = |sla_target| NewContract {
        partner: " FastFreight ".to_string(),
        partner_type: PartnerType::Carrier,
        start_date: date(2026, 1, 1),
        end_date: Some(date(2026, 6, 30)),
        rate_per_km: 1.1,
        rate_per_delivery: 2.0,
        minimum_guarantee: 0.0,
        currency: None,
        sla_target,
        notes: None,
    };

    let result = contract::create(&state, input(120.0));
    assert!(matches!(result, Err(AppError::ValidationFailed(_))));

    let created = contract::create(&state, input(95.0)).unwrap();
    assert_eq!(created.partner, "FastFreight");
    assert!(created.reference.starts_with("CTR/"));
    assert_eq!(contract::expire_contracts(&state, date(2026, 7, 1)), 0);

    contract::activate(&state, created.id).unwrap();
    assert_eq!(contract::expire_contracts(&state, date(2026, 6, 30)), 0);
    assert_eq!(contract::expire_contracts(&state, date(2026, 7, 1)), 1);
    assert_eq!(contract::list(&state)[0].state, ContractState::Expired);

    let result = contract::terminate(&state, created.id);
    assert!(matches!(result, Err(AppError::InvalidTransition(_))));
}

#[test]
fn daily_summary_counts_todays_requests() {
    let state = AppState::new(Config::default());
    let driver = add_driver(&state);

    let delivered = request::create(&state, new_request(1)).unwrap();
    let assignment =
        assignment::assign(&state, delivered.request.id, assign_input(driver, false, true))
            .unwrap();
    job::start(&state, assignment.jobs[0].id, driver).unwrap();
    parcel::mark_delivered(&state, delivered.parcels[0].id, driver, pod()).unwrap();

    let pending = request::create(&state, new_request(1)).unwrap();
    request::confirm(&state, pending.request.id).unwrap();
    request::create(&state, new_request(1)).unwrap();

    let summary = daily_summary(&state, Utc::now());
    assert_eq!(summary.date, Utc::now().date_naive());
    assert_eq!(summary.created, 3);
    assert_eq!(summary.delivered, 1);
    assert_eq!(summary.pending, 1);

    let tomorrow = daily_summary(&state, Utc::now() + Duration::days(1));
    assert_eq!((tomorrow.created, tomorrow.delivered, tomorrow.pending), (0, 0, 1));
}
