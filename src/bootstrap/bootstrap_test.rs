//! Tests for task context resolution

use super::ecs::MockServiceDirectory;
use super::*;
use crate::error::{ErrorKind, SidecarError};
use axum::{http::StatusCode, routing::get, Router};
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::TcpListener;

const TASK_JSON: &str = r#"{
    "Cluster": "default",
    "TaskARN": "arn:aws:ecs:eu-west-1:111122223333:task/default/abc123",
    "Containers": [
        {
            "Name": "web",
            "Networks": [
                {
                    "NetworkMode": "awsvpc",
                    "IPv4Addresses": ["10.0.2.106"],
                    "MACAddress": "0a:de:f6:10:51:e5"
                }
            ]
        }
    ]
}"#;

/// Serve a fake metadata endpoint and return its base URI
async fn metadata_server(status: StatusCode, body: &'static str) -> String {
    let app = Router::new().route("/v4/abc/task", get(move || async move { (status, body) }));
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}/v4/abc", addr)
}

/// Both bootstrap phases against a fake metadata endpoint and directory
async fn resolve(
    uri: Option<&str>,
    directory: &MockServiceDirectory,
) -> Result<TaskContext, SidecarError> {
    let task = discover_local_task(&reqwest::Client::new(), uri).await?;
    resolve_task_context(task, directory).await
}

fn entry(tg: Option<&str>, port: Option<i32>) -> LoadBalancerEntry {
    LoadBalancerEntry {
        target_group_arn: tg.map(str::to_string),
        container_name: Some("web".to_string()),
        container_port: port,
    }
}

fn web_service() -> ServiceDescription {
    ServiceDescription {
        service_arn: "arn:aws:ecs:eu-west-1:111122223333:service/default/web".to_string(),
        load_balancers: vec![entry(Some("tg-a"), Some(80)), entry(Some("tg-b"), Some(443))],
    }
}

#[test]
fn test_service_name_from_group() {
    assert_eq!(service_name_from_group("service:web").unwrap(), "web");
    assert_eq!(
        service_name_from_group("service:web:blue").unwrap(),
        "web:blue"
    );
}

#[test]
fn test_non_service_group_is_context_error() {
    let err = service_name_from_group("family:web").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Context);
    assert!(err.to_string().contains("family:web"));

    assert!(service_name_from_group("service:").is_err());
    assert!(service_name_from_group("web").is_err());
}

#[test]
fn test_bindings_skip_classic_load_balancers() {
    let bindings = bindings_from_load_balancers(&[
        entry(None, Some(80)),
        entry(Some("tg-a"), Some(8080)),
        entry(Some("tg-a"), Some(8080)),
    ])
    .unwrap();

    assert_eq!(
        bindings,
        vec![
            RoutingBinding::new("tg-a", 8080),
            RoutingBinding::new("tg-a", 8080)
        ]
    );
}

#[test]
fn test_no_target_groups_is_context_error() {
    let err = bindings_from_load_balancers(&[entry(None, Some(80))]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Context);
    assert_eq!(err.to_string(), "Task context incorrect: No NLB/ALBs attached");

    assert!(bindings_from_load_balancers(&[]).is_err());
}

#[test]
fn test_invalid_port_is_context_error() {
    for port in [None, Some(0), Some(-1), Some(70000)] {
        let err = bindings_from_load_balancers(&[entry(Some("tg-a"), port)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Context, "port {:?}", port);
    }
}

#[tokio::test]
async fn test_resolve_task_context() {
    let uri = metadata_server(StatusCode::OK, TASK_JSON).await;
    let directory = MockServiceDirectory::new("service:web", web_service());

    let ctx = resolve(Some(&uri), &directory)
        .await
        .unwrap();

    assert_eq!(ctx.local_address, Ipv4Addr::new(10, 0, 2, 106));
    assert_eq!(
        ctx.bindings,
        vec![
            RoutingBinding::new("tg-a", 80),
            RoutingBinding::new("tg-b", 443)
        ]
    );
    assert_eq!(ctx.identity.cluster, "default");
    assert_eq!(ctx.identity.mac_address, "0a:de:f6:10:51:e5");
    assert_eq!(
        ctx.identity.service_arn,
        "arn:aws:ecs:eu-west-1:111122223333:service/default/web"
    );
    assert_eq!(
        *directory.requested_services.lock().unwrap(),
        vec!["web".to_string()]
    );
}

#[tokio::test]
async fn test_missing_metadata_uri_is_metadata_error() {
    let err = discover_local_task(&reqwest::Client::new(), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Metadata);
    assert_eq!(
        err.to_string(),
        "Error importing task metadata: Environment variable ECS_CONTAINER_METADATA_URI_V4 not set"
    );
}

#[tokio::test]
async fn test_discover_local_task_reads_metadata_only() {
    let uri = metadata_server(StatusCode::OK, TASK_JSON).await;

    let task = discover_local_task(&reqwest::Client::new(), Some(&uri))
        .await
        .unwrap();

    assert_eq!(task.cluster, "default");
    assert_eq!(
        task.task_arn,
        "arn:aws:ecs:eu-west-1:111122223333:task/default/abc123"
    );
    assert_eq!(task.network.address, Ipv4Addr::new(10, 0, 2, 106));
}

#[tokio::test]
async fn test_metadata_http_error_is_metadata_error() {
    let uri = metadata_server(StatusCode::INTERNAL_SERVER_ERROR, "oops").await;
    let directory = MockServiceDirectory::new("service:web", web_service());

    let err = resolve(Some(&uri), &directory)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Metadata);
}

#[tokio::test]
async fn test_malformed_metadata_is_metadata_error() {
    let uri = metadata_server(StatusCode::OK, "{not json").await;
    let directory = MockServiceDirectory::new("service:web", web_service());

    let err = resolve(Some(&uri), &directory)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Metadata);
}

#[tokio::test]
async fn test_task_outside_service_is_context_error() {
    let uri = metadata_server(StatusCode::OK, TASK_JSON).await;
    let directory = MockServiceDirectory::new("family:web", web_service());

    let err = resolve(Some(&uri), &directory)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Context);
    assert!(directory.requested_services.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_ecs_failure_is_remote_access_error() {
    let uri = metadata_server(StatusCode::OK, TASK_JSON).await;
    let mut directory = MockServiceDirectory::new("service:web", web_service());
    directory.service = Err("AccessDeniedException".to_string());

    let err = resolve(Some(&uri), &directory)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RemoteAccess);
}

#[tokio::test]
async fn test_service_without_target_groups_is_context_error() {
    let uri = metadata_server(StatusCode::OK, TASK_JSON).await;
    let directory = MockServiceDirectory::new(
        "service:web",
        ServiceDescription {
            service_arn: "web".to_string(),
            load_balancers: Vec::new(),
        },
    );

    let err = resolve(Some(&uri), &directory)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Context);
}
