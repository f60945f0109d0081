//! Prometheus metrics for relay sessions.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

pub struct RelayMetrics {
    registry: Registry,
    sessions: IntCounterVec,
    parts: IntCounter,
    active: IntGauge,
}

impl RelayMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let sessions = IntCounterVec::new(
            Opts::new("relay_sessions_total", "Relay sessions by workflow and outcome"),
            &["workflow", "outcome"],
        )?;
        let parts = IntCounter::new("relay_parts_total", "Parts written to transports")?;
        let active = IntGauge::new("relay_active_sessions", "Sessions currently running")?;

        registry.register(Box::new(sessions.clone()))?;
        registry.register(Box::new(parts.clone()))?;
        registry.register(Box::new(active.clone()))?;

        Ok(Self {
            registry,
            sessions,
            parts,
            active,
        })
    }

    pub fn session_started(&self) {
        self.active.inc();
    }

    pub fn session_finished(&self, workflow: &str, outcome: &str) {
        self.active.dec();
        self.sessions.with_label_values(&[workflow, outcome]).inc();
    }

    pub fn part_sent(&self) {
        self.parts.inc();
    }

    pub fn active_sessions(&self) -> i64 {
        self.active.get()
    }

    /// Render all metrics in the text exposition format.
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buf) {
            tracing::warn!("Metrics encoding failed: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}
