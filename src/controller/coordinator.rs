//! Drain coordination state machine
//!
//! Initializing -> Monitoring -> Draining -> Terminating
//!
//! 1. Baseline: check every binding once; any failure is fatal
//! 2. Monitor: every poll interval, check bindings in order until one drains
//! 3. Drain: sleep the deregistration window, no further polling
//! 4. Terminate: report a clean outcome

use crate::controller::context::{RoutingBinding, TaskContext};
use crate::controller::target_health::{HealthCheckError, TargetHealthClient};
use crate::error::SidecarError;
use crate::server::{PhaseTracker, SharedMetrics, ShutdownOutcome};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Time between monitoring cycles
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Monitoring,
    Draining,
    Terminating,
}

impl Phase {
    pub fn ordinal(self) -> i64 {
        match self {
            Phase::Initializing => 0,
            Phase::Monitoring => 1,
            Phase::Draining => 2,
            Phase::Terminating => 3,
        }
    }

    /// Inverse of `ordinal`; out-of-range values map to `Terminating`
    pub fn from_ordinal(value: i64) -> Self {
        match value {
            0 => Phase::Initializing,
            1 => Phase::Monitoring,
            2 => Phase::Draining,
            _ => Phase::Terminating,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Initializing => "initializing",
            Phase::Monitoring => "monitoring",
            Phase::Draining => "draining",
            Phase::Terminating => "terminating",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub poll_interval: Duration,
    pub deregistration_wait: Duration,
}

impl CoordinatorSettings {
    pub fn new(deregistration_wait: Duration) -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            deregistration_wait,
        }
    }
}

/// Owns the task context and drives it to a shutdown outcome
pub struct DrainCoordinator {
    context: TaskContext,
    client: TargetHealthClient,
    settings: CoordinatorSettings,
    phase: Phase,
    tracker: Option<PhaseTracker>,
    metrics: Option<SharedMetrics>,
}

impl DrainCoordinator {
    pub fn new(context: TaskContext, client: TargetHealthClient, settings: CoordinatorSettings) -> Self {
        Self {
            context,
            client,
            settings,
            phase: Phase::Initializing,
            tracker: None,
            metrics: None,
        }
    }

    /// Publish phase changes to the probe server
    pub fn with_tracker(mut self, tracker: PhaseTracker) -> Self {
        tracker.set(self.phase);
        self.tracker = Some(tracker);
        self
    }

    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        metrics.set_phase(self.phase);
        metrics.set_deregistration_wait(self.settings.deregistration_wait.as_secs());
        self.metrics = Some(metrics);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run to completion
    ///
    /// Never returns while no binding reports draining. Fatal errors are
    /// logged here and yield `Unclean`.
    pub async fn run(mut self) -> ShutdownOutcome {
        if let Err(e) = self.establish_baseline().await {
            e.report(true);
            self.set_phase(Phase::Terminating);
            return ShutdownOutcome::Unclean;
        }

        self.set_phase(Phase::Monitoring);
        info!("Initialization complete, monitoring target health");

        let binding = match self.monitor().await {
            Ok(binding) => binding,
            Err(e) => {
                e.report(true);
                self.set_phase(Phase::Terminating);
                return ShutdownOutcome::Unclean;
            }
        };

        info!(
            target_group = %binding.target_group_arn,
            port = binding.port,
            address = %self.context.local_address,
            wait_secs = self.settings.deregistration_wait.as_secs(),
            "Target is draining, exiting after deregistration wait"
        );

        self.drain().await;
        self.set_phase(Phase::Terminating);
        debug!(task_arn = %self.context.identity.task_arn, "Closing out task");
        ShutdownOutcome::Clean
    }

    /// One check per binding; every error is fatal here
    async fn establish_baseline(&self) -> Result<(), SidecarError> {
        if self.context.bindings.is_empty() {
            return Err(SidecarError::Context("No NLB/ALBs attached".to_string()));
        }

        for binding in &self.context.bindings {
            info!(
                target_group = %binding.target_group_arn,
                port = binding.port,
                "Found target group to check"
            );
            let state = self
                .client
                .check_health(binding, self.context.local_address)
                .await
                .inspect_err(|_| self.record_poll("error"))?;
            self.record_poll(state.as_str());
            info!(
                address = %self.context.local_address,
                target_group = %binding.target_group_arn,
                state = %state,
                "Target had initial status"
            );
        }

        info!(
            count = self.context.bindings.len(),
            "Load balancer target groups attached"
        );
        Ok(())
    }

    /// Poll on the configured cadence until a binding drains
    async fn monitor(&self) -> Result<RoutingBinding, SidecarError> {
        loop {
            tokio::time::sleep(self.settings.poll_interval).await;
            if let Some(binding) = self.poll_cycle().await? {
                return Ok(binding.clone());
            }
        }
    }

    /// Check bindings in order, stopping at the first draining one
    ///
    /// A binding that could not be observed is skipped for this cycle.
    async fn poll_cycle(&self) -> Result<Option<&RoutingBinding>, SidecarError> {
        info!("Checking target health");

        for binding in &self.context.bindings {
            match self
                .client
                .check_health(binding, self.context.local_address)
                .await
            {
                Ok(state) => {
                    self.record_poll(state.as_str());
                    if state.is_draining() {
                        return Ok(Some(binding));
                    }
                }
                Err(HealthCheckError::Unobserved { binding }) => {
                    self.record_poll("unobserved");
                    warn!(
                        target_group = %binding.target_group_arn,
                        port = binding.port,
                        "Could not observe target health, will retry next cycle"
                    );
                }
                Err(e) => {
                    self.record_poll("error");
                    return Err(e.into());
                }
            }
        }

        Ok(None)
    }

    /// Hold the task open for the deregistration window
    async fn drain(&mut self) {
        self.set_phase(Phase::Draining);
        tokio::time::sleep(self.settings.deregistration_wait).await;
        info!("Deregistration wait elapsed");
    }

    fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        if let Some(ref tracker) = self.tracker {
            tracker.set(phase);
        }
        if let Some(ref metrics) = self.metrics {
            metrics.set_phase(phase);
        }
    }

    fn record_poll(&self, label: &str) {
        if let Some(ref metrics) = self.metrics {
            metrics.record_poll(label);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[path = "coordinator_test.rs"]
mod tests;
