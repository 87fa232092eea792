//! ECS lookups: which service a task belongs to and its load balancers

use crate::error::SidecarError;
use async_trait::async_trait;
use aws_sdk_ecs::error::DisplayErrorContext;
use aws_sdk_ecs::Client;

/// One `loadBalancers` entry of an ECS service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadBalancerEntry {
    /// Absent for classic load balancers
    pub target_group_arn: Option<String>,
    pub container_name: Option<String>,
    pub container_port: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescription {
    pub service_arn: String,
    pub load_balancers: Vec<LoadBalancerEntry>,
}

/// Control-plane queries needed to resolve a task's target groups
///
/// Production code uses `EcsServiceDirectory`.
/// Tests use `MockServiceDirectory` with canned answers.
#[async_trait]
pub trait ServiceDirectory: Send + Sync {
    /// The task's group, e.g. `service:web`
    async fn task_group(&self, cluster: &str, task_arn: &str) -> Result<String, SidecarError>;

    async fn describe_service(
        &self,
        cluster: &str,
        service_name: &str,
    ) -> Result<ServiceDescription, SidecarError>;
}

pub struct EcsServiceDirectory {
    client: Client,
}

impl EcsServiceDirectory {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ServiceDirectory for EcsServiceDirectory {
    async fn task_group(&self, cluster: &str, task_arn: &str) -> Result<String, SidecarError> {
        let output = self
            .client
            .describe_tasks()
            .cluster(cluster)
            .tasks(task_arn)
            .send()
            .await
            .map_err(|e| SidecarError::RemoteAccess(DisplayErrorContext(&e).to_string()))?;

        let Some(task) = output.tasks().first() else {
            let reason = output
                .failures()
                .first()
                .and_then(|f| f.reason())
                .unwrap_or("no task returned");
            return Err(SidecarError::RemoteAccess(format!(
                "DescribeTasks({}): {}",
                task_arn, reason
            )));
        };

        task.group().map(str::to_string).ok_or_else(|| {
            SidecarError::RemoteAccess(format!("task {} has no group", task_arn))
        })
    }

    async fn describe_service(
        &self,
        cluster: &str,
        service_name: &str,
    ) -> Result<ServiceDescription, SidecarError> {
        let output = self
            .client
            .describe_services()
            .cluster(cluster)
            .services(service_name)
            .send()
            .await
            .map_err(|e| SidecarError::RemoteAccess(DisplayErrorContext(&e).to_string()))?;

        let Some(service) = output.services().first() else {
            let reason = output
                .failures()
                .first()
                .and_then(|f| f.reason())
                .unwrap_or("no service returned");
            return Err(SidecarError::RemoteAccess(format!(
                "DescribeServices({}): {}",
                service_name, reason
            )));
        };

        let load_balancers = service
            .load_balancers()
            .iter()
            .map(|lb| LoadBalancerEntry {
                target_group_arn: lb.target_group_arn().map(str::to_string),
                container_name: lb.container_name().map(str::to_string),
                container_port: lb.container_port(),
            })
            .collect();

        Ok(ServiceDescription {
            service_arn: service.service_arn().unwrap_or(service_name).to_string(),
            load_balancers,
        })
    }
}

/// Canned directory for tests
#[cfg(test)]
pub struct MockServiceDirectory {
    pub task_group: Result<String, String>,
    pub service: Result<ServiceDescription, String>,
    pub requested_services: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockServiceDirectory {
    pub fn new(task_group: &str, service: ServiceDescription) -> Self {
        Self {
            task_group: Ok(task_group.to_string()),
            service: Ok(service),
            requested_services: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl ServiceDirectory for MockServiceDirectory {
    async fn task_group(&self, _cluster: &str, _task_arn: &str) -> Result<String, SidecarError> {
        self.task_group.clone().map_err(SidecarError::RemoteAccess)
    }

    #[allow(clippy::unwrap_used)]
    async fn describe_service(
        &self,
        _cluster: &str,
        service_name: &str,
    ) -> Result<ServiceDescription, SidecarError> {
        self.requested_services
            .lock()
            .unwrap()
            .push(service_name.to_string());
        self.service.clone().map_err(SidecarError::RemoteAccess)
    }
}
