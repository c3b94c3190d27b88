//! Pod termination against a mock API server

mod common;

use chaosk8s::error::AppError;
use chaosk8s::k8s::StdRandom;
use chaosk8s::pod::{terminate_pods, PodSelection, TerminatePodsParams};
use common::{list, mock_client, owned_by, pod, Reply};
use http::Method;
use serde_json::Value;

const PODS: &str = "/api/v1/namespaces/default/pods";

fn three_pods() -> Vec<Value> {
    ["web-c", "web-a", "web-b"]
        .iter()
        .map(|name| pod(name, &format!("{}-uid", name), owned_by("ReplicaSet"), Value::Null))
        .collect()
}

#[tokio::test]
async fn test_quantity_above_match_count_terminates_everything() {
    let (client, server) = mock_client(|req| {
        if req.is(Method::GET, PODS) {
            Reply::ok(list("Pod", three_pods()))
        } else {
            let name = req.path.rsplit('/').next().unwrap_or_default().to_string();
            Reply::ok(pod(&name, "gone", owned_by("ReplicaSet"), Value::Null))
        }
    });

    let params = TerminatePodsParams {
        selection: PodSelection {
            label_selector: Some("app=web".to_string()),
            qty: 10,
            ..Default::default()
        },
        ..Default::default()
    };
    let terminated = terminate_pods(&client, &params, &mut StdRandom::seeded(3))
        .await
        .unwrap();
    assert_eq!(terminated, vec!["web-a", "web-b", "web-c"]);

    let requests = server.requests();
    assert!(requests[0].query.contains("labelSelector=app%3Dweb"));
    let deletes = requests.iter().filter(|r| r.method == Method::DELETE).count();
    assert_eq!(deletes, 3);
    // the pod's own grace period applies by default
    assert!(requests
        .iter()
        .filter(|r| r.method == Method::DELETE)
        .all(|r| r.body.get("gracePeriodSeconds").is_none()));
}

#[tokio::test]
async fn test_explicit_grace_period_is_sent() {
    let (client, server) = mock_client(|req| {
        if req.is(Method::GET, PODS) {
            Reply::ok(list("Pod", three_pods()))
        } else {
            Reply::ok(pod("web-a", "gone", owned_by("ReplicaSet"), Value::Null))
        }
    });

    let params = TerminatePodsParams {
        grace_period: 0,
        ..Default::default()
    };
    let terminated = terminate_pods(&client, &params, &mut StdRandom::seeded(3))
        .await
        .unwrap();
    assert_eq!(terminated, vec!["web-a"]);

    let delete = server
        .requests()
        .into_iter()
        .find(|r| r.method == Method::DELETE)
        .unwrap();
    assert_eq!(delete.path, "/api/v1/namespaces/default/pods/web-a");
    assert_eq!(delete.body["gracePeriodSeconds"], 0);
}

#[tokio::test]
async fn test_negative_quantity_sends_nothing() {
    let (client, server) = mock_client(|_| Reply::ok(list("Pod", vec![])));

    let params = TerminatePodsParams {
        selection: PodSelection {
            qty: -1,
            ..Default::default()
        },
        ..Default::default()
    };
    let err = terminate_pods(&client, &params, &mut StdRandom::seeded(3))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Configuration(_)));
    assert!(server.requests().is_empty());
}
