//! Service and secret existence probes against a mock API server

mod common;

use chaosk8s::error::AppError;
use chaosk8s::secret::{secret_exists, SecretExistsParams};
use chaosk8s::service::{service_is_initialized, ServiceInitializedParams};
use common::{list, mock_client, Reply};
use http::Method;
use serde_json::json;

const SERVICES: &str = "/api/v1/namespaces/default/services";
const SECRETS: &str = "/api/v1/namespaces/default/secrets";

/// Answers an empty list whenever a field selector narrows the request
fn server_with(kind: &'static str, item: serde_json::Value) -> (kube::Client, common::MockApiServer) {
    mock_client(move |req| {
        if req.query.contains("fieldSelector") {
            Reply::ok(list(kind, vec![]))
        } else {
            Reply::ok(list(kind, vec![item.clone()]))
        }
    })
}

fn web_service() -> serde_json::Value {
    json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {"name": "web", "namespace": "default", "labels": {"app": "web"}},
        "spec": {"ports": [{"port": 80}]}
    })
}

fn web_secret() -> serde_json::Value {
    json!({
        "apiVersion": "v1",
        "kind": "Secret",
        "metadata": {"name": "web-tls", "namespace": "default", "labels": {"app": "web"}},
        "type": "Opaque"
    })
}

#[tokio::test]
async fn test_service_found_by_labels_alone() {
    let (client, server) = server_with("Service", web_service());

    let params = ServiceInitializedParams {
        label_selector: Some("app=web".to_string()),
        ..Default::default()
    };
    assert!(service_is_initialized(&client, &params).await.unwrap());

    let requests = server.requests();
    assert!(requests[0].is(Method::GET, SERVICES));
    assert!(requests[0].query.contains("labelSelector=app%3Dweb"));
    assert!(!requests[0].query.contains("fieldSelector"));
}

#[tokio::test]
async fn test_service_by_name_uses_field_selector() {
    let (client, server) = mock_client(|_| Reply::ok(list("Service", vec![])));

    let params = ServiceInitializedParams {
        name: "web".to_string(),
        ..Default::default()
    };
    let err = service_is_initialized(&client, &params).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(server.requests()[0]
        .query
        .contains("fieldSelector=metadata.name%3Dweb"));
}

#[tokio::test]
async fn test_secret_found_by_labels_alone() {
    let (client, server) = server_with("Secret", web_secret());

    let params = SecretExistsParams {
        label_selector: Some("app=web".to_string()),
        ..Default::default()
    };
    assert!(secret_exists(&client, &params).await.unwrap());

    let requests = server.requests();
    assert!(requests[0].is(Method::GET, SECRETS));
    assert!(!requests[0].query.contains("fieldSelector"));
}

#[tokio::test]
async fn test_missing_secret_can_report_false() {
    let (client, _server) = mock_client(|_| Reply::ok(list("Secret", vec![])));

    let params = SecretExistsParams {
        name: "absent".to_string(),
        raise_if_non_existing: false,
        ..Default::default()
    };
    assert!(!secret_exists(&client, &params).await.unwrap());
}
