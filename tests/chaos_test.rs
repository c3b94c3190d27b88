//! Chaos Mesh faults, from activity arguments to the posted object

mod common;

use chaosk8s::chaos::network::{AddLatencyParams, FaultNameParams, SetBandwidthParams};
use chaosk8s::chaos::stress::StressMemoryParams;
use chaosk8s::chaos::*;
use chaosk8s::error::AppError;
use common::{mock_client, Reply};
use http::Method;
use serde_json::json;

const NETWORK_CHAOS: &str = "/apis/chaos-mesh.org/v1alpha1/namespaces/shop/networkchaos";
const STRESS_CHAOS: &str = "/apis/chaos-mesh.org/v1alpha1/namespaces/default/stresschaos";

/// Echo back whatever was posted, as the API server does on create
fn echo_server() -> (kube::Client, common::MockApiServer) {
    mock_client(|req| {
        if req.method == Method::POST {
            Reply::status(201, req.body.clone())
        } else if req.method == Method::DELETE {
            Reply::ok(json!({
                "kind": "Status",
                "apiVersion": "v1",
                "metadata": {},
                "status": "Success",
                "code": 200
            }))
        } else {
            Reply::not_found(&req.path)
        }
    })
}

#[test]
fn test_selector_mode_names() {
    assert_eq!(SelectorMode::FixedPercent.to_string(), "fixed-percent");
    assert_eq!(
        "random-max-percent".parse::<SelectorMode>().unwrap(),
        SelectorMode::RandomMaxPercent
    );
    assert!(!SelectorMode::All.needs_value());
    assert!(SelectorMode::Fixed.needs_value());
}

#[test]
fn test_target_direction_needs_target_pods() {
    let target = TargetArgs {
        direction: Direction::Both,
        ..Default::default()
    };
    let err = NetworkChaosSpec::build(
        NetworkFault::Loss {
            loss: LossSpec::default(),
        },
        SelectorArgs::default(),
        target,
        None,
    )
    .unwrap_err();
    assert!(matches!(err, AppError::Configuration(_)));
    assert_eq!(err.to_string(), "direction 'both' requires a target selector");
}

#[test]
fn test_target_selector_is_emitted_with_its_mode() {
    let target = TargetArgs {
        direction: Direction::From,
        target_mode: SelectorMode::FixedPercent,
        target_mode_value: Some("50".to_string()),
        target_label_selectors: Some(KeyValuesArg::Text("app=db".to_string())),
        ..Default::default()
    };
    let spec = NetworkChaosSpec::build(
        NetworkFault::Duplicate {
            duplicate: DuplicateSpec {
                duplicate: Some("40".to_string()),
                correlation: None,
            },
        },
        SelectorArgs::default(),
        target,
        Some("5m".to_string()),
    )
    .unwrap();

    let value = serde_json::to_value(&spec).unwrap();
    assert_eq!(value["action"], "duplicate");
    assert_eq!(value["direction"], "from");
    assert_eq!(value["mode"], "one");
    assert_eq!(
        value["target"],
        json!({"mode": "fixed-percent", "value": "50", "selector": {"labelSelectors": {"app": "db"}}})
    );
}

#[test]
fn test_stress_without_stressors_is_rejected() {
    let err = StressChaosSpec::build(
        Stressors::default(),
        SelectorArgs::default(),
        None,
        None,
        "30s".to_string(),
    )
    .unwrap_err();
    assert!(matches!(err, AppError::Configuration(_)));
}

#[tokio::test]
async fn test_add_latency_posts_network_chaos() {
    let (client, server) = echo_server();

    let params: AddLatencyParams = serde_json::from_value(json!({
        "name": "slow-web",
        "ns": "shop",
        "namespaces_selectors": "shop",
        "label_selectors": "app=web",
        "mode": "all",
        "latency": "100ms",
        "correlation": "25"
    }))
    .unwrap();
    let created = add_latency(&client, params).await.unwrap();
    assert_eq!(created["metadata"]["name"], "slow-web");

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].is(Method::POST, NETWORK_CHAOS));

    let body = &requests[0].body;
    assert_eq!(body["apiVersion"], "chaos-mesh.org/v1alpha1");
    assert_eq!(body["kind"], "NetworkChaos");
    assert_eq!(body["metadata"]["namespace"], "shop");
    assert_eq!(
        body["spec"],
        json!({
            "action": "delay",
            "delay": {"latency": "100ms", "correlation": "25"},
            "mode": "all",
            "selector": {"namespaces": ["shop"], "labelSelectors": {"app": "web"}},
            "direction": "to"
        })
    );
}

#[tokio::test]
async fn test_bandwidth_with_missing_mode_value_sends_nothing() {
    let (client, server) = echo_server();

    let params: SetBandwidthParams = serde_json::from_value(json!({
        "name": "narrow",
        "ns": "shop",
        "mode": "fixed",
        "rate": "1mbps",
        "limit": 100,
        "buffer": 10
    }))
    .unwrap();
    let err = set_bandwidth(&client, params).await.unwrap_err();
    assert_eq!(err.to_string(), "mode 'fixed' requires a value");
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_stress_memory_posts_stress_chaos() {
    let (client, server) = echo_server();

    let params: StressMemoryParams = serde_json::from_value(json!({
        "name": "hog",
        "label_selectors": {"app": "cache"},
        "workers": 1,
        "size": "256MB",
        "oom_score": -1000,
        "time_to_get_to_size": "10s"
    }))
    .unwrap();
    stress_memory(&client, params).await.unwrap();

    let requests = server.requests();
    assert!(requests[0].is(Method::POST, STRESS_CHAOS));
    assert_eq!(
        requests[0].body["spec"]["stressors"],
        json!({"memory": {"workers": 1, "size": "256MB", "time": "10s", "oomScoreAdj": -1000}})
    );
    assert_eq!(requests[0].body["spec"]["duration"], "30s");
    assert!(requests[0].body["spec"].get("direction").is_none());
}

#[tokio::test]
async fn test_delete_network_fault_targets_the_named_object() {
    let (client, server) = echo_server();

    let params = FaultNameParams {
        name: "slow-web".to_string(),
        ns: "shop".to_string(),
    };
    let status = delete_network_fault(&client, &params).await.unwrap();
    assert_eq!(status["status"], "Success");
    assert_eq!(server.count(Method::DELETE, &format!("{}/slow-web", NETWORK_CHAOS)), 1);
}
