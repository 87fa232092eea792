//! Process-facing surfaces
//!
//! - Optional HTTP server for probes and Prometheus metrics
//! - Signal handling and the process exit trigger

mod health;
pub mod metrics;
pub mod shutdown;

pub use health::{run_health_server, PhaseTracker};
pub use metrics::{create_metrics, SharedMetrics, SidecarMetrics};
pub use shutdown::{run_until_stopped, terminate, ShutdownOutcome, ShutdownSignals};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[path = "health_test.rs"]
mod health_tests;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[path = "shutdown_test.rs"]
mod shutdown_tests;
