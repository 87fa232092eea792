use aws_config::retry::RetryConfig;
use aws_config::BehaviorVersion;
use nlb_drain_sidecar::bootstrap::{
    discover_local_task, resolve_task_context, EcsServiceDirectory,
};
use nlb_drain_sidecar::config::Config;
use nlb_drain_sidecar::controller::{
    CoordinatorSettings, DrainCoordinator, ElbTargetHealthApi, RetryPolicy, TargetHealthClient,
};
use nlb_drain_sidecar::error::SidecarError;
use nlb_drain_sidecar::server::{
    create_metrics, run_health_server, run_until_stopped, terminate, PhaseTracker,
    ShutdownOutcome, ShutdownSignals,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting NLB drain sidecar");

    // Register before bootstrap so a stop at any point exits cleanly
    let mut signals = match ShutdownSignals::register() {
        Ok(s) => s,
        Err(e) => {
            SidecarError::Unknown(format!("Cannot register signal handlers: {}", e)).report(true);
            terminate(ShutdownOutcome::Unclean);
        }
    };

    let config = Config::from_env();

    let outcome = run_until_stopped(run(config), signals.recv()).await;
    terminate(outcome);
}

/// Bootstrap, then hand the task context to the coordinator
async fn run(config: Config) -> ShutdownOutcome {
    let phase = PhaseTracker::new();
    let metrics = match create_metrics() {
        Ok(m) => Some(m),
        Err(e) => {
            warn!(error = %e, "Failed to create metrics registry, metrics disabled");
            None
        }
    };

    if let (Some(port), Some(metrics)) = (config.health_port, metrics.clone()) {
        let server_phase = phase.clone();
        tokio::spawn(async move {
            if let Err(e) = run_health_server(port, server_phase, metrics).await {
                warn!(error = %e, "Probe server failed");
            }
        });
    }

    // Metadata first: a task without it never needs AWS clients
    let http = reqwest::Client::new();
    let task = match discover_local_task(&http, config.metadata_uri.as_deref()).await {
        Ok(task) => task,
        Err(e) => {
            e.report(true);
            return ShutdownOutcome::Unclean;
        }
    };

    // The retry policy on the health client is the only retry layer
    let aws = aws_config::defaults(BehaviorVersion::latest())
        .retry_config(RetryConfig::disabled())
        .load()
        .await;

    let directory = EcsServiceDirectory::new(aws_sdk_ecs::Client::new(&aws));
    let context = match resolve_task_context(task, &directory).await {
        Ok(ctx) => ctx,
        Err(e) => {
            e.report(true);
            return ShutdownOutcome::Unclean;
        }
    };

    let client = TargetHealthClient::new(
        ElbTargetHealthApi::new(aws_sdk_elasticloadbalancingv2::Client::new(&aws)),
        RetryPolicy::default(),
    );

    let mut coordinator = DrainCoordinator::new(
        context,
        client,
        CoordinatorSettings::new(config.deregistration_wait),
    )
    .with_tracker(phase);
    if let Some(metrics) = metrics {
        coordinator = coordinator.with_metrics(metrics);
    }

    coordinator.run().await
}
