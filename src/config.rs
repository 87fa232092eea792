//! Environment configuration
//!
//! Read once at startup. Only `DEREGISTRATION_WAIT` shapes coordinator
//! behaviour; the rest locate collaborators.

use std::time::Duration;
use tracing::{info, warn};

/// Deregistration wait used when `DEREGISTRATION_WAIT` is missing or invalid
pub const DEFAULT_DEREGISTRATION_WAIT: Duration = Duration::from_secs(120);

pub const DEREGISTRATION_WAIT_VAR: &str = "DEREGISTRATION_WAIT";
pub const METADATA_URI_VAR: &str = "ECS_CONTAINER_METADATA_URI_V4";
pub const HEALTH_PORT_VAR: &str = "HEALTH_PORT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// How long to hold the task open once a target is draining
    pub deregistration_wait: Duration,
    /// Base URI of the ECS task metadata endpoint (v4)
    pub metadata_uri: Option<String>,
    /// Port for the optional probe/metrics server
    pub health_port: Option<u16>,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let deregistration_wait = parse_deregistration_wait(lookup(DEREGISTRATION_WAIT_VAR).as_deref());
        info!(
            seconds = deregistration_wait.as_secs(),
            "Deregistration wait configured"
        );

        let metadata_uri = lookup(METADATA_URI_VAR).filter(|uri| !uri.is_empty());
        let health_port = parse_health_port(lookup(HEALTH_PORT_VAR).as_deref());

        Config {
            deregistration_wait,
            metadata_uri,
            health_port,
        }
    }
}

/// Parse the deregistration wait in whole seconds
///
/// Only plain ASCII digits are accepted. A missing value or anything else
/// falls back to the default with a warning; this never fails.
pub fn parse_deregistration_wait(raw: Option<&str>) -> Duration {
    let Some(raw) = raw else {
        warn!(
            default_secs = DEFAULT_DEREGISTRATION_WAIT.as_secs(),
            "{} not set, using default", DEREGISTRATION_WAIT_VAR
        );
        return DEFAULT_DEREGISTRATION_WAIT;
    };

    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        warn!(value = %raw, "{} was not a numeric value", DEREGISTRATION_WAIT_VAR);
        return DEFAULT_DEREGISTRATION_WAIT;
    }

    match raw.parse::<u64>() {
        Ok(secs) => Duration::from_secs(secs),
        Err(e) => {
            warn!(value = %raw, error = %e, "{} out of range", DEREGISTRATION_WAIT_VAR);
            DEFAULT_DEREGISTRATION_WAIT
        }
    }
}

fn parse_health_port(raw: Option<&str>) -> Option<u16> {
    let raw = raw?;
    match raw.parse::<u16>() {
        Ok(0) | Err(_) => {
            warn!(value = %raw, "{} is not a valid port, probe server disabled", HEALTH_PORT_VAR);
            None
        }
        Ok(port) => Some(port),
    }
}
