//! Target health lookups against the load balancer
//!
//! `TargetHealthApi` is the raw remote call. `TargetHealthClient` wraps it
//! with the retry policy and is what the coordinator talks to.

use crate::controller::context::RoutingBinding;
use crate::controller::retry::{RetryError, RetryPolicy, Retryable};
use crate::error::SidecarError;
use async_trait::async_trait;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Load balancer's view of one target, fetched fresh on every poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Initial,
    Healthy,
    Unhealthy,
    Unused,
    Draining,
    UnhealthyDraining,
    Unavailable,
    Unknown,
}

impl HealthState {
    /// Map a wire value (`TargetHealth.State`) to a state
    pub fn parse(value: &str) -> Self {
        match value {
            "initial" => HealthState::Initial,
            "healthy" => HealthState::Healthy,
            "unhealthy" => HealthState::Unhealthy,
            "unused" => HealthState::Unused,
            "draining" => HealthState::Draining,
            "unhealthy.draining" => HealthState::UnhealthyDraining,
            "unavailable" => HealthState::Unavailable,
            _ => HealthState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Initial => "initial",
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
            HealthState::Unused => "unused",
            HealthState::Draining => "draining",
            HealthState::UnhealthyDraining => "unhealthy.draining",
            HealthState::Unavailable => "unavailable",
            HealthState::Unknown => "unknown",
        }
    }

    /// True once the load balancer has stopped routing new traffic here
    pub fn is_draining(&self) -> bool {
        matches!(self, HealthState::Draining | HealthState::UnhealthyDraining)
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single remote call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Network error, throttling, or 5xx fault
    #[error("transient failure: {0}")]
    Transient(String),

    /// Malformed request, unknown target group, and similar
    #[error("{0}")]
    Permanent(String),
}

impl Retryable for ApiError {
    fn is_transient(&self) -> bool {
        matches!(self, ApiError::Transient(_))
    }
}

/// Remote call returning the health of one target
///
/// Production code uses `ElbTargetHealthApi`.
/// Tests use `MockTargetHealthApi` which replays scripted responses.
#[async_trait]
pub trait TargetHealthApi: Send + Sync {
    /// `Ok(None)` means the call succeeded but described no target
    async fn describe_health(
        &self,
        target_group_arn: &str,
        address: Ipv4Addr,
        port: u16,
    ) -> Result<Option<HealthState>, ApiError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HealthCheckError {
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: ApiError },

    #[error("{0}")]
    Rejected(ApiError),

    #[error("no health description returned for {binding}")]
    Unobserved { binding: RoutingBinding },
}

impl From<HealthCheckError> for SidecarError {
    fn from(err: HealthCheckError) -> Self {
        SidecarError::RemoteAccess(err.to_string())
    }
}

/// Health lookups with bounded retry
#[derive(Clone)]
pub struct TargetHealthClient {
    api: Arc<dyn TargetHealthApi>,
    policy: RetryPolicy,
}

impl TargetHealthClient {
    pub fn new(api: impl TargetHealthApi + 'static, policy: RetryPolicy) -> Self {
        Self {
            api: Arc::new(api),
            policy,
        }
    }

    /// Query the current state of `address` within `binding`
    ///
    /// Transient failures are retried per the policy; anything else is
    /// returned on the first occurrence.
    pub async fn check_health(
        &self,
        binding: &RoutingBinding,
        address: Ipv4Addr,
    ) -> Result<HealthState, HealthCheckError> {
        let result = self
            .policy
            .run(|attempt| {
                debug!(
                    target_group = %binding.target_group_arn,
                    address = %address,
                    port = binding.port,
                    attempt,
                    "DescribeTargetHealth"
                );
                self.api
                    .describe_health(&binding.target_group_arn, address, binding.port)
            })
            .await;

        match result {
            Ok(Some(state)) => Ok(state),
            Ok(None) => Err(HealthCheckError::Unobserved {
                binding: binding.clone(),
            }),
            Err(RetryError::Exhausted { attempts, last }) => {
                Err(HealthCheckError::Exhausted { attempts, last })
            }
            Err(RetryError::Permanent { error, .. }) => Err(HealthCheckError::Rejected(error)),
        }
    }
}

/// Scripted health API for tests
///
/// Responses are consumed in call order; once the script is empty every
/// call returns the fallback. Clones share the script and call log.
#[cfg(test)]
#[derive(Clone)]
pub struct MockTargetHealthApi {
    script: Arc<std::sync::Mutex<std::collections::VecDeque<Result<Option<HealthState>, ApiError>>>>,
    fallback: Result<Option<HealthState>, ApiError>,
    calls: Arc<std::sync::Mutex<Vec<(String, Ipv4Addr, u16)>>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
impl MockTargetHealthApi {
    pub fn new(fallback: Result<Option<HealthState>, ApiError>) -> Self {
        Self {
            script: Arc::default(),
            fallback,
            calls: Arc::default(),
        }
    }

    /// Always reports `state`
    pub fn steady(state: HealthState) -> Self {
        Self::new(Ok(Some(state)))
    }

    pub fn push(&self, response: Result<Option<HealthState>, ApiError>) -> &Self {
        self.script.lock().unwrap().push_back(response);
        self
    }

    pub fn push_state(&self, state: HealthState) -> &Self {
        self.push(Ok(Some(state)))
    }

    pub fn calls(&self) -> Vec<(String, Ipv4Addr, u16)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl TargetHealthApi for MockTargetHealthApi {
    #[allow(clippy::unwrap_used)]
    async fn describe_health(
        &self,
        target_group_arn: &str,
        address: Ipv4Addr,
        port: u16,
    ) -> Result<Option<HealthState>, ApiError> {
        self.calls
            .lock()
            .unwrap()
            .push((target_group_arn.to_string(), address, port));
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::deterministic(10, Duration::from_secs(2), 1.5)
    }

    fn addr() -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 1, 20)
    }

    #[test]
    fn test_parse_known_states() {
        assert_eq!(HealthState::parse("initial"), HealthState::Initial);
        assert_eq!(HealthState::parse("healthy"), HealthState::Healthy);
        assert_eq!(HealthState::parse("unhealthy"), HealthState::Unhealthy);
        assert_eq!(HealthState::parse("unused"), HealthState::Unused);
        assert_eq!(HealthState::parse("draining"), HealthState::Draining);
        assert_eq!(
            HealthState::parse("unhealthy.draining"),
            HealthState::UnhealthyDraining
        );
        assert_eq!(HealthState::parse("unavailable"), HealthState::Unavailable);
    }

    #[test]
    fn test_parse_unrecognized_is_unknown() {
        assert_eq!(HealthState::parse("DRAINING"), HealthState::Unknown);
        assert_eq!(HealthState::parse(""), HealthState::Unknown);
    }

    #[test]
    fn test_only_draining_states_are_draining() {
        assert!(HealthState::Draining.is_draining());
        assert!(HealthState::UnhealthyDraining.is_draining());
        assert!(!HealthState::Healthy.is_draining());
        assert!(!HealthState::Unhealthy.is_draining());
        assert!(!HealthState::Unused.is_draining());
        assert!(!HealthState::Unknown.is_draining());
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_health_passes_binding_through() {
        let api = MockTargetHealthApi::steady(HealthState::Healthy);
        let client = TargetHealthClient::new(api.clone(), fast_policy());

        let state = client
            .check_health(&RoutingBinding::new("tg-a", 8080), addr())
            .await;

        assert_eq!(state, Ok(HealthState::Healthy));
        assert_eq!(api.calls(), vec![("tg-a".to_string(), addr(), 8080)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_health_retries_transient() {
        let api = MockTargetHealthApi::steady(HealthState::Draining);
        api.push(Err(ApiError::Transient("Throttling".into())))
            .push(Err(ApiError::Transient("connection reset".into())));
        let client = TargetHealthClient::new(api.clone(), fast_policy());

        let state = client
            .check_health(&RoutingBinding::new("tg-a", 80), addr())
            .await;

        assert_eq!(state, Ok(HealthState::Draining));
        assert_eq!(api.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_health_exhausts_budget() {
        let api = MockTargetHealthApi::new(Err(ApiError::Transient("503".into())));
        let client = TargetHealthClient::new(api.clone(), fast_policy());

        let result = client
            .check_health(&RoutingBinding::new("tg-a", 80), addr())
            .await;

        assert_eq!(
            result,
            Err(HealthCheckError::Exhausted {
                attempts: 10,
                last: ApiError::Transient("503".into())
            })
        );
        assert_eq!(api.call_count(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_health_does_not_retry_permanent() {
        let api = MockTargetHealthApi::new(Err(ApiError::Permanent(
            "TargetGroupNotFound".into(),
        )));
        let client = TargetHealthClient::new(api.clone(), fast_policy());

        let result = client
            .check_health(&RoutingBinding::new("tg-a", 80), addr())
            .await;

        assert_eq!(
            result,
            Err(HealthCheckError::Rejected(ApiError::Permanent(
                "TargetGroupNotFound".into()
            )))
        );
        assert_eq!(api.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_description_is_unobserved() {
        let api = MockTargetHealthApi::new(Ok(None));
        let client = TargetHealthClient::new(api.clone(), fast_policy());

        let result = client
            .check_health(&RoutingBinding::new("tg-a", 80), addr())
            .await;

        assert!(matches!(result, Err(HealthCheckError::Unobserved { .. })));
        assert_eq!(api.call_count(), 1);
    }

    #[test]
    fn test_check_errors_map_to_remote_access() {
        let err: SidecarError = HealthCheckError::Rejected(ApiError::Permanent("bad".into())).into();
        assert_eq!(err.kind(), crate::error::ErrorKind::RemoteAccess);
        assert_eq!(err.to_string(), "Unable to access AWS API: bad");
    }
}
