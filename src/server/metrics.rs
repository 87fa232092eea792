//! Prometheus metrics for the drain sidecar

use crate::controller::Phase;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics shared between the coordinator and the probe server
pub type SharedMetrics = Arc<SidecarMetrics>;

pub struct SidecarMetrics {
    registry: Registry,
    health_polls: IntCounterVec,
    phase: IntGauge,
    deregistration_wait: IntGauge,
}

impl SidecarMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let health_polls = IntCounterVec::new(
            Opts::new(
                "drain_sidecar_health_polls_total",
                "Target health polls by observed state",
            ),
            &["state"],
        )?;
        let phase = IntGauge::new(
            "drain_sidecar_phase",
            "Coordinator phase (0=initializing, 1=monitoring, 2=draining, 3=terminating)",
        )?;
        let deregistration_wait = IntGauge::new(
            "drain_sidecar_deregistration_wait_seconds",
            "Configured wait after draining begins",
        )?;

        registry.register(Box::new(health_polls.clone()))?;
        registry.register(Box::new(phase.clone()))?;
        registry.register(Box::new(deregistration_wait.clone()))?;

        Ok(Self {
            registry,
            health_polls,
            phase,
            deregistration_wait,
        })
    }

    /// Count one poll; `state` is the observed state, `unobserved` or `error`
    pub fn record_poll(&self, state: &str) {
        self.health_polls.with_label_values(&[state]).inc();
    }

    pub fn set_phase(&self, phase: Phase) {
        self.phase.set(phase.ordinal());
    }

    pub fn set_deregistration_wait(&self, seconds: u64) {
        self.deregistration_wait
            .set(i64::try_from(seconds).unwrap_or(i64::MAX));
    }

    pub fn poll_count(&self, state: &str) -> u64 {
        self.health_polls.with_label_values(&[state]).get()
    }

    /// Render all metrics in Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Create the shared metrics registry
pub fn create_metrics() -> Result<SharedMetrics, prometheus::Error> {
    Ok(Arc::new(SidecarMetrics::new()?))
}
