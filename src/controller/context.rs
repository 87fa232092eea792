//! Immutable description of what this task should watch

use crate::error::SidecarError;
use std::fmt;
use std::net::Ipv4Addr;

/// One (target group, port) pair registered for this task
///
/// Duplicates are allowed and each is polled on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingBinding {
    pub target_group_arn: String,
    pub port: u16,
}

impl RoutingBinding {
    pub fn new(target_group_arn: impl Into<String>, port: u16) -> Self {
        Self {
            target_group_arn: target_group_arn.into(),
            port,
        }
    }
}

impl fmt::Display for RoutingBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.target_group_arn, self.port)
    }
}

/// Identity details carried for logging only
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskIdentity {
    pub task_arn: String,
    pub cluster: String,
    pub service_arn: String,
    pub mac_address: String,
}

/// Everything the coordinator needs, resolved once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskContext {
    pub local_address: Ipv4Addr,
    /// Bindings in the order they were resolved
    pub bindings: Vec<RoutingBinding>,
    pub identity: TaskIdentity,
}

impl TaskContext {
    /// Build a context, rejecting one with no bindings
    pub fn new(
        local_address: Ipv4Addr,
        bindings: Vec<RoutingBinding>,
        identity: TaskIdentity,
    ) -> Result<Self, SidecarError> {
        if bindings.is_empty() {
            return Err(SidecarError::Context("No NLB/ALBs attached".to_string()));
        }
        Ok(Self {
            local_address,
            bindings,
            identity,
        })
    }
}
