//! Readiness watches against a mock API server

mod common;

use chaosk8s::deployment::{deployment_fully_available, deployment_not_fully_available};
use chaosk8s::statefulset::statefulset_fully_available;
use chaosk8s::error::AppError;
use chaosk8s::k8s::workload::ReadinessParams;
use common::{mock_client, Reply};
use http::Method;
use serde_json::{json, Value};

const DEPLOYMENTS: &str = "/apis/apps/v1/namespaces/default/deployments";

fn deployment(replicas: i32, ready: i32) -> Value {
    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {"name": "web", "namespace": "default", "resourceVersion": "5"},
        "spec": {
            "replicas": replicas,
            "selector": {"matchLabels": {"app": "web"}},
            "template": {"metadata": {"labels": {"app": "web"}}}
        },
        "status": {"readyReplicas": ready}
    })
}

fn params(timeout: u64, raise_on_timeout: bool) -> ReadinessParams {
    ReadinessParams {
        name: "web".to_string(),
        timeout,
        raise_on_timeout,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_ready_deployment_ends_the_watch() {
    let (client, server) = mock_client(|_| {
        Reply::events(&[
            json!({"type": "ADDED", "object": deployment(3, 1)}),
            json!({"type": "MODIFIED", "object": deployment(3, 3)}),
        ])
    });

    assert!(deployment_fully_available(&client, &params(5, true)).await.unwrap());

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].is(Method::GET, DEPLOYMENTS));
    assert!(requests[0].query.contains("watch=true"));
    assert!(requests[0].query.contains("fieldSelector=metadata.name%3Dweb"));
}

#[tokio::test]
async fn test_timeout_raises_by_default() {
    let (client, _server) = mock_client(|_| Reply::events(&[]));

    let err = deployment_fully_available(&client, &params(1, true))
        .await
        .unwrap_err();
    match err {
        AppError::ReadinessTimeout(message) => {
            assert_eq!(message, "deployment 'web' failed to recover within 1s")
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_timeout_can_report_false() {
    let (client, _server) = mock_client(|_| Reply::events(&[deployment_event(2, 1)]));

    assert!(!deployment_fully_available(&client, &params(1, false)).await.unwrap());
}

fn deployment_event(replicas: i32, ready: i32) -> Value {
    json!({"type": "ADDED", "object": deployment(replicas, ready)})
}

#[tokio::test]
async fn test_label_selector_template_names_the_deployment() {
    let (client, server) = mock_client(|_| Reply::events(&[deployment_event(3, 2)]));

    let params = ReadinessParams {
        label_selector: Some("app={name}".to_string()),
        ..params(5, true)
    };
    assert!(deployment_not_fully_available(&client, &params).await.unwrap());

    let requests = server.requests();
    assert!(requests[0].query.contains("labelSelector=app%3Dweb"));
    assert!(!requests[0].query.contains("%7Bname%7D"));
}

#[tokio::test]
async fn test_statefulset_label_only_watch() {
    let (client, server) = mock_client(|_| {
        Reply::events(&[json!({
            "type": "ADDED",
            "object": {
                "apiVersion": "apps/v1",
                "kind": "StatefulSet",
                "metadata": {"name": "db", "namespace": "default", "resourceVersion": "3"},
                "spec": {
                    "replicas": 2,
                    "serviceName": "db",
                    "selector": {"matchLabels": {"app": "db"}},
                    "template": {"metadata": {"labels": {"app": "db"}}}
                },
                "status": {"replicas": 2, "readyReplicas": 2}
            }
        })])
    });

    let params = ReadinessParams {
        label_selector: Some("app=db".to_string()),
        timeout: 5,
        ..Default::default()
    };
    assert!(statefulset_fully_available(&client, &params).await.unwrap());

    let requests = server.requests();
    assert!(requests[0].is(Method::GET, "/apis/apps/v1/namespaces/default/statefulsets"));
    assert!(requests[0].query.contains("labelSelector=app%3Ddb"));
    assert!(!requests[0].query.contains("fieldSelector"));
}
