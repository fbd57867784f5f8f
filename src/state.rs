use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::config::Config;
use crate::models::contract::PartnerContract;
use crate::models::driver::Driver;
use crate::models::event::DispatchEvent;
use crate::models::gps::GpsLog;
use crate::models::hub::Hub;
use crate::models::incident::Incident;
use crate::models::linehaul::Linehaul;
use crate::observability::metrics::Metrics;
use crate::store::{Sequence, Store};

pub struct AppState {
    pub config: Config,
    pub store: Store,
    pub drivers: DashMap<Uuid, Driver>,
    pub incidents: DashMap<Uuid, Incident>,
    /// Request id -> its single open delay incident. Never held while
    /// `incidents` is being locked.
    pub open_delays: DashMap<Uuid, Uuid>,
    pub hubs: DashMap<Uuid, Hub>,
    pub gps_logs: DashMap<Uuid, GpsLog>,
    pub linehauls: DashMap<Uuid, Linehaul>,
    pub contracts: DashMap<Uuid, PartnerContract>,
    pub incident_seq: Sequence,
    pub linehaul_seq: Sequence,
    pub contract_seq: Sequence,
    pub events_tx: broadcast::Sender<DispatchEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        Self {
            config,
            store: Store::new(),
            drivers: DashMap::new(),
            incidents: DashMap::new(),
            open_delays: DashMap::new(),
            hubs: DashMap::new(),
            gps_logs: DashMap::new(),
            linehauls: DashMap::new(),
            contracts: DashMap::new(),
            incident_seq: Sequence::new("INC"),
            linehaul_seq: Sequence::new("LH"),
            contract_seq: Sequence::new("CTR"),
            events_tx,
            metrics: Metrics::new(),
        }
    }

    pub fn publish(&self, event: DispatchEvent) {
        if self.events_tx.send(event).is_err() {
            debug!("no event subscribers");
        }
    }
}
