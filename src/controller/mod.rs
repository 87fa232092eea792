pub mod context;
pub mod coordinator;
pub mod elb;
pub mod retry;
pub mod target_health;

pub use context::{RoutingBinding, TaskContext, TaskIdentity};
pub use coordinator::{CoordinatorSettings, DrainCoordinator, Phase, DEFAULT_POLL_INTERVAL};
pub use elb::ElbTargetHealthApi;
pub use retry::RetryPolicy;
pub use target_health::{HealthState, TargetHealthApi, TargetHealthClient};
