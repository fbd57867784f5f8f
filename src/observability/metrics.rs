use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub transitions_total: IntCounterVec,
    pub incidents_open: IntGauge,
    pub delay_incidents_total: IntCounter,
    pub monitor_duration_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let transitions_total = IntCounterVec::new(
            Opts::new(
                "transitions_total",
                "Lifecycle transitions by entity and outcome",
            ),
            &["entity", "outcome"],
        )
        .expect("valid transitions_total metric");

        let incidents_open = IntGauge::new("incidents_open", "Incidents not yet resolved")
            .expect("valid incidents_open metric");

        let delay_incidents_total = IntCounter::new(
            "delay_incidents_total",
            "Delay incidents opened by the delay monitor",
        )
        .expect("valid delay_incidents_total metric");

        let monitor_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "monitor_duration_seconds",
                "Duration of a periodic monitor pass in seconds",
            ),
            &["monitor"],
        )
        .expect("valid monitor_duration_seconds metric");

        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register transitions_total");
        registry
            .register(Box::new(incidents_open.clone()))
            .expect("register incidents_open");
        registry
            .register(Box::new(delay_incidents_total.clone()))
            .expect("register delay_incidents_total");
        registry
            .register(Box::new(monitor_duration_seconds.clone()))
            .expect("register monitor_duration_seconds");

        Self {
            registry,
            transitions_total,
            incidents_open,
            delay_incidents_total,
            monitor_duration_seconds,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
