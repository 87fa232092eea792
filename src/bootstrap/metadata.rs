//! ECS task metadata endpoint (v4)

use crate::error::SidecarError;
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::debug;

const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Subset of the `/task` document the sidecar relies on
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskMetadata {
    #[serde(rename = "TaskARN")]
    pub task_arn: String,
    pub cluster: String,
    #[serde(default)]
    pub containers: Vec<ContainerMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerMetadata {
    #[serde(default)]
    pub networks: Vec<NetworkMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkMetadata {
    pub network_mode: String,
    #[serde(rename = "IPv4Addresses", default)]
    pub ipv4_addresses: Vec<String>,
    #[serde(rename = "MACAddress", default)]
    pub mac_address: String,
}

/// Address this task is registered under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkIdentity {
    pub address: Ipv4Addr,
    pub mac_address: String,
}

impl TaskMetadata {
    /// Validate the network assumptions and extract the task address
    ///
    /// Requires awsvpc mode with exactly one IPv4 address on the first
    /// network of the first container.
    pub fn network_identity(&self) -> Result<NetworkIdentity, SidecarError> {
        let network = self
            .containers
            .first()
            .and_then(|c| c.networks.first())
            .ok_or_else(|| {
                SidecarError::Metadata("task metadata lists no container networks".to_string())
            })?;

        if network.network_mode != "awsvpc" {
            return Err(SidecarError::Context(
                "Task is not running in 'awsvpc' mode".to_string(),
            ));
        }

        let [raw] = network.ipv4_addresses.as_slice() else {
            return Err(SidecarError::Context(format!(
                "Task must have exactly one IPv4 address, found {}",
                network.ipv4_addresses.len()
            )));
        };

        let address = raw.parse::<Ipv4Addr>().map_err(|e| {
            SidecarError::Context(format!("Task address {:?} is not IPv4: {}", raw, e))
        })?;

        Ok(NetworkIdentity {
            address,
            mac_address: network.mac_address.clone(),
        })
    }
}

/// Fetch `<base_uri>/task`
pub async fn fetch_task_metadata(
    http: &reqwest::Client,
    base_uri: &str,
) -> Result<TaskMetadata, SidecarError> {
    let url = format!("{}/task", base_uri.trim_end_matches('/'));
    debug!(url = %url, "Fetching task metadata");

    let response = http
        .get(&url)
        .timeout(METADATA_TIMEOUT)
        .send()
        .await
        .map_err(|e| SidecarError::Metadata(format!("GET {} failed: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SidecarError::Metadata(format!(
            "GET {} returned HTTP {}",
            url, status
        )));
    }

    response
        .json::<TaskMetadata>()
        .await
        .map_err(|e| SidecarError::Metadata(format!("Invalid task metadata: {}", e)))
}
