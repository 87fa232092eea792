//! One-shot discovery of what this task should watch
//!
//! 1. Task metadata endpoint: task ARN, cluster, address (`discover_local_task`)
//! 2. ECS: task group -> service -> load balancer target groups
//!    (`resolve_task_context`)
//!
//! Every failure here is fatal; the caller exits uncleanly.

pub mod ecs;
pub mod metadata;

pub use ecs::{EcsServiceDirectory, LoadBalancerEntry, ServiceDescription, ServiceDirectory};
pub use metadata::{fetch_task_metadata, NetworkIdentity, TaskMetadata};

use crate::config::METADATA_URI_VAR;
use crate::controller::{RoutingBinding, TaskContext, TaskIdentity};
use crate::error::SidecarError;
use tracing::{debug, info};

/// Extract the service name from a task group such as `service:web`
pub fn service_name_from_group(group: &str) -> Result<&str, SidecarError> {
    match group.split_once(':') {
        Some(("service", name)) if !name.is_empty() => Ok(name),
        _ => Err(SidecarError::Context(format!(
            "Task is not in a service, task group: {}",
            group
        ))),
    }
}

/// Turn a service's load balancer entries into routing bindings
///
/// Entries without a target group (classic ELBs) are skipped. The order of
/// the service definition is preserved.
pub fn bindings_from_load_balancers(
    entries: &[LoadBalancerEntry],
) -> Result<Vec<RoutingBinding>, SidecarError> {
    let mut bindings = Vec::new();

    for entry in entries {
        let Some(ref target_group_arn) = entry.target_group_arn else {
            continue;
        };

        let port = entry
            .container_port
            .and_then(|p| u16::try_from(p).ok())
            .filter(|p| *p != 0)
            .ok_or_else(|| {
                SidecarError::Context(format!(
                    "Target group {} has no valid container port: {:?}",
                    target_group_arn, entry.container_port
                ))
            })?;

        debug!(target_group = %target_group_arn, port, "Resolved target group");
        bindings.push(RoutingBinding::new(target_group_arn.clone(), port));
    }

    if bindings.is_empty() {
        return Err(SidecarError::Context("No NLB/ALBs attached".to_string()));
    }
    Ok(bindings)
}

/// What the task metadata endpoint says about this task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTask {
    pub task_arn: String,
    pub cluster: String,
    pub network: NetworkIdentity,
}

/// Read and validate the task metadata
///
/// Needs no AWS credentials or region, so it runs before any AWS client is
/// built.
pub async fn discover_local_task(
    http: &reqwest::Client,
    metadata_uri: Option<&str>,
) -> Result<LocalTask, SidecarError> {
    let metadata_uri = metadata_uri.ok_or_else(|| {
        SidecarError::Metadata(format!("Environment variable {} not set", METADATA_URI_VAR))
    })?;

    let metadata = fetch_task_metadata(http, metadata_uri).await?;
    let network = metadata.network_identity()?;
    info!(address = %network.address, "Determined IP address");
    info!(task_arn = %metadata.task_arn, "Determined task ARN");

    Ok(LocalTask {
        task_arn: metadata.task_arn,
        cluster: metadata.cluster,
        network,
    })
}

/// Resolve the full task context by asking ECS which target groups route here
pub async fn resolve_task_context(
    task: LocalTask,
    directory: &dyn ServiceDirectory,
) -> Result<TaskContext, SidecarError> {
    debug!("Describing task to find its service");
    let group = directory.task_group(&task.cluster, &task.task_arn).await?;
    let service_name = service_name_from_group(&group)?;

    debug!(service = %service_name, "Describing service to find target groups");
    let service = directory
        .describe_service(&task.cluster, service_name)
        .await?;
    info!(service = %service.service_arn, "Determined service");

    let bindings = bindings_from_load_balancers(&service.load_balancers)?;

    TaskContext::new(
        task.network.address,
        bindings,
        TaskIdentity {
            task_arn: task.task_arn,
            cluster: task.cluster,
            service_arn: service.service_arn,
            mac_address: task.network.mac_address,
        },
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[path = "bootstrap_test.rs"]
mod tests;
