//! Activity registry
//!
//! Every action and probe is listed here with a one-line description, and
//! [`run`] dispatches a name plus JSON arguments onto the typed function.
//! Arguments are validated before a client is built, so a malformed call
//! never reaches the cluster.

use std::time::Instant;

use metrics::{histogram, increment_counter};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use strum::Display;
use tracing::{info, warn, Instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::{Config, ConnectionSettings, Secrets};
use crate::error::{AppError, AppResult};
use crate::k8s::{K8sClient, StdRandom};
use crate::{
    chaos, crd, daemonset, deployment, event, namespace, networking, node, pod, replicaset, secret,
    service, statefulset,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ActivityKind {
    Action,
    Probe,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActivityDescriptor {
    /// `<module>.<function>`, the name activities are invoked by
    pub name: String,
    pub kind: ActivityKind,
    pub module: String,
    pub doc: String,
}

use ActivityKind::{Action, Probe};

const REGISTRY: &[(&str, &str, ActivityKind, &str)] = &[
    ("node", "create_node", Action, "Create a node from metadata and spec"),
    ("node", "delete_nodes", Action, "Delete one, some or all nodes matching a label selector"),
    ("node", "cordon_node", Action, "Mark matching nodes unschedulable"),
    ("node", "uncordon_node", Action, "Mark matching nodes schedulable"),
    ("node", "drain_nodes", Action, "Cordon nodes and evict the pods they run"),
    ("node", "get_nodes", Probe, "List nodes matching a label selector"),
    ("pod", "terminate_pods", Action, "Delete a selection of pods"),
    ("pod", "exec_in_pods", Action, "Run a command in a selection of pods"),
    ("pod", "read_pod_logs", Probe, "Read the logs of matching pods"),
    ("pod", "pods_in_phase", Probe, "All matching pods are in the given phase"),
    ("pod", "pods_not_in_phase", Probe, "No matching pod is in the given phase"),
    ("pod", "pods_in_conditions", Probe, "All matching pods report the given conditions"),
    ("pod", "count_pods", Probe, "Count matching pods, optionally by phase"),
    ("pod", "pod_is_not_available", Probe, "No pod of the named service is running"),
    ("pod", "all_pods_healthy", Probe, "Every pod of a namespace is running or completed"),
    ("deployment", "create_deployment", Action, "Create a deployment from a spec file"),
    ("deployment", "delete_deployment", Action, "Delete deployments by name or label selector"),
    ("deployment", "scale_deployment", Action, "Set the replica count of a deployment"),
    ("deployment", "deployment_available_and_healthy", Probe, "Matching deployments have all replicas available"),
    ("deployment", "deployment_fully_available", Probe, "Wait for a deployment to be fully ready"),
    ("deployment", "deployment_not_fully_available", Probe, "Wait for a deployment to lose a ready replica"),
    ("statefulset", "scale_statefulset", Action, "Set the replica count of a statefulset"),
    ("statefulset", "statefulset_fully_available", Probe, "Wait for a statefulset to be fully ready"),
    ("statefulset", "statefulset_not_fully_available", Probe, "Wait for a statefulset to lose a ready replica"),
    ("daemonset", "create_daemon_set", Action, "Create a daemonset from a spec file"),
    ("daemonset", "delete_daemon_set", Action, "Delete daemonsets by name or label selector"),
    ("daemonset", "update_daemon_set", Action, "Merge-patch a daemonset"),
    ("daemonset", "daemonset_ready", Probe, "Matching daemonsets run everywhere they should"),
    ("replicaset", "delete_replica_set", Action, "Delete replicasets by name or label selector"),
    ("namespace", "create_namespace", Action, "Create a namespace by name or from a spec file"),
    ("namespace", "delete_namespace", Action, "Delete a namespace"),
    ("namespace", "namespace_exists", Probe, "Whether a namespace exists"),
    ("service", "create_service_endpoint", Action, "Create a service from a spec file"),
    ("service", "delete_service", Action, "Delete a service"),
    ("service", "service_is_initialized", Probe, "A matching service exists"),
    ("secret", "create_secret", Action, "Create a secret from a spec file"),
    ("secret", "delete_secret", Action, "Delete a secret"),
    ("secret", "secret_exists", Probe, "A matching secret exists"),
    ("networking", "create_network_policy", Action, "Create a network policy"),
    ("networking", "remove_network_policy", Action, "Delete a network policy"),
    ("networking", "deny_all_ingress", Action, "Block every inbound connection to selected pods"),
    ("networking", "remove_deny_all_ingress", Action, "Lift the inbound block"),
    ("networking", "deny_all_egress", Action, "Block every outbound connection from selected pods"),
    ("networking", "remove_deny_all_egress", Action, "Lift the outbound block"),
    ("networking", "allow_dns_access", Action, "Let selected pods reach DNS"),
    ("networking", "remove_allow_dns_access", Action, "Remove the DNS allowance"),
    ("networking", "ingress_exists", Probe, "Whether an ingress exists"),
    ("event", "get_events", Probe, "List cluster events"),
    ("crd", "create_custom_object", Action, "Create a namespaced custom object"),
    ("crd", "create_cluster_custom_object", Action, "Create a cluster-wide custom object"),
    ("crd", "delete_custom_object", Action, "Delete a namespaced custom object"),
    ("crd", "delete_cluster_custom_object", Action, "Delete a cluster-wide custom object"),
    ("crd", "patch_custom_object", Action, "Patch a namespaced custom object"),
    ("crd", "patch_cluster_custom_object", Action, "Patch a cluster-wide custom object"),
    ("crd", "replace_custom_object", Action, "Replace a namespaced custom object"),
    ("crd", "replace_cluster_custom_object", Action, "Replace a cluster-wide custom object"),
    ("crd", "get_custom_object", Probe, "Read a namespaced custom object"),
    ("crd", "list_custom_objects", Probe, "List namespaced custom objects"),
    ("crd", "get_cluster_custom_object", Probe, "Read a cluster-wide custom object"),
    ("crd", "list_cluster_custom_objects", Probe, "List cluster-wide custom objects"),
    ("chaosmesh.network", "add_latency", Action, "Delay packets of selected pods"),
    ("chaosmesh.network", "set_loss", Action, "Drop packets of selected pods"),
    ("chaosmesh.network", "duplicate_packets", Action, "Duplicate packets of selected pods"),
    ("chaosmesh.network", "corrupt_packets", Action, "Corrupt packets of selected pods"),
    ("chaosmesh.network", "reorder_packets", Action, "Reorder packets of selected pods"),
    ("chaosmesh.network", "set_bandwidth", Action, "Cap the bandwidth of selected pods"),
    ("chaosmesh.network", "delete_network_fault", Action, "Remove a network fault"),
    ("chaosmesh.network", "get_network_faults", Probe, "List network faults"),
    ("chaosmesh.network", "get_network_fault", Probe, "Read a network fault"),
    ("chaosmesh.stress", "stress_cpu", Action, "Burn CPU in selected pods"),
    ("chaosmesh.stress", "stress_memory", Action, "Eat memory in selected pods"),
    ("chaosmesh.stress", "delete_stressor", Action, "Remove a stressor"),
    ("chaosmesh.stress", "get_stressors", Probe, "List stressors"),
    ("chaosmesh.stress", "get_stressor", Probe, "Read a stressor"),
];

/// Everything that can be invoked
pub fn discover() -> Vec<ActivityDescriptor> {
    REGISTRY
        .iter()
        .map(|(module, function, kind, doc)| ActivityDescriptor {
            name: format!("{}.{}", module, function),
            kind: *kind,
            module: module.to_string(),
            doc: doc.to_string(),
        })
        .collect()
}

pub fn find(name: &str) -> Option<ActivityDescriptor> {
    discover().into_iter().find(|a| a.name == name)
}

fn parse<T: DeserializeOwned>(arguments: Value) -> AppResult<T> {
    let arguments = if arguments.is_null() {
        Value::Object(Default::default())
    } else {
        arguments
    };
    serde_json::from_value(arguments)
        .map_err(|e| AppError::Configuration(format!("invalid arguments: {}", e)))
}

fn to_json<T: Serialize>(value: T) -> AppResult<Value> {
    Ok(serde_json::to_value(value)?)
}

async fn connect(settings: &ConnectionSettings) -> AppResult<kube::Client> {
    Ok(K8sClient::connect(settings).await?.inner().clone())
}

/// Parse, connect, call: `by_ref` passes `&params`, `owned` moves them,
/// `with_rng` adds a fresh random source.
macro_rules! invoke {
    (by_ref $f:path, $args:expr, $settings:expr) => {{
        let params = parse($args)?;
        let client = connect($settings).await?;
        to_json($f(&client, &params).await?)
    }};
    (owned $f:path, $args:expr, $settings:expr) => {{
        let params = parse($args)?;
        let client = connect($settings).await?;
        to_json($f(&client, params).await?)
    }};
    (with_rng $f:path, $args:expr, $settings:expr) => {{
        let params = parse($args)?;
        let client = connect($settings).await?;
        let mut rng = StdRandom::from_entropy();
        to_json($f(&client, &params, &mut rng).await?)
    }};
}

async fn dispatch(name: &str, args: Value, settings: &ConnectionSettings) -> AppResult<Value> {
    match name {
        "node.create_node" => invoke!(by_ref node::create_node, args, settings),
        "node.delete_nodes" => invoke!(with_rng node::delete_nodes, args, settings),
        "node.cordon_node" => invoke!(by_ref node::cordon_node, args, settings),
        "node.uncordon_node" => invoke!(by_ref node::uncordon_node, args, settings),
        "node.drain_nodes" => invoke!(with_rng node::drain_nodes, args, settings),
        "node.get_nodes" => invoke!(by_ref node::get_nodes, args, settings),

        "pod.terminate_pods" => invoke!(with_rng pod::terminate_pods, args, settings),
        "pod.exec_in_pods" => invoke!(with_rng pod::exec_in_pods, args, settings),
        "pod.read_pod_logs" => invoke!(by_ref pod::read_pod_logs, args, settings),
        "pod.pods_in_phase" => invoke!(by_ref pod::pods_in_phase, args, settings),
        "pod.pods_not_in_phase" => invoke!(by_ref pod::pods_not_in_phase, args, settings),
        "pod.pods_in_conditions" => invoke!(by_ref pod::pods_in_conditions, args, settings),
        "pod.count_pods" => invoke!(by_ref pod::count_pods, args, settings),
        "pod.pod_is_not_available" => invoke!(by_ref pod::pod_is_not_available, args, settings),
        "pod.all_pods_healthy" => invoke!(by_ref pod::all_pods_healthy, args, settings),

        "deployment.create_deployment" => invoke!(by_ref deployment::create_deployment, args, settings),
        "deployment.delete_deployment" => invoke!(by_ref deployment::delete_deployment, args, settings),
        "deployment.scale_deployment" => invoke!(by_ref deployment::scale_deployment, args, settings),
        "deployment.deployment_available_and_healthy" => {
            invoke!(by_ref deployment::deployment_available_and_healthy, args, settings)
        }
        "deployment.deployment_fully_available" => {
            invoke!(by_ref deployment::deployment_fully_available, args, settings)
        }
        "deployment.deployment_not_fully_available" => {
            invoke!(by_ref deployment::deployment_not_fully_available, args, settings)
        }

        "statefulset.scale_statefulset" => invoke!(by_ref statefulset::scale_statefulset, args, settings),
        "statefulset.statefulset_fully_available" => {
            invoke!(by_ref statefulset::statefulset_fully_available, args, settings)
        }
        "statefulset.statefulset_not_fully_available" => {
            invoke!(by_ref statefulset::statefulset_not_fully_available, args, settings)
        }

        "daemonset.create_daemon_set" => invoke!(by_ref daemonset::create_daemon_set, args, settings),
        "daemonset.delete_daemon_set" => invoke!(by_ref daemonset::delete_daemon_set, args, settings),
        "daemonset.update_daemon_set" => invoke!(by_ref daemonset::update_daemon_set, args, settings),
        "daemonset.daemonset_ready" => invoke!(by_ref daemonset::daemonset_ready, args, settings),

        "replicaset.delete_replica_set" => invoke!(by_ref replicaset::delete_replica_set, args, settings),

        "namespace.create_namespace" => invoke!(by_ref namespace::create_namespace, args, settings),
        "namespace.delete_namespace" => invoke!(by_ref namespace::delete_namespace, args, settings),
        "namespace.namespace_exists" => invoke!(by_ref namespace::namespace_exists, args, settings),

        "service.create_service_endpoint" => invoke!(by_ref service::create_service_endpoint, args, settings),
        "service.delete_service" => invoke!(by_ref service::delete_service, args, settings),
        "service.service_is_initialized" => invoke!(by_ref service::service_is_initialized, args, settings),

        "secret.create_secret" => invoke!(by_ref secret::create_secret, args, settings),
        "secret.delete_secret" => invoke!(by_ref secret::delete_secret, args, settings),
        "secret.secret_exists" => invoke!(by_ref secret::secret_exists, args, settings),

        "networking.create_network_policy" => invoke!(by_ref networking::create_network_policy, args, settings),
        "networking.remove_network_policy" => invoke!(by_ref networking::remove_network_policy, args, settings),
        "networking.deny_all_ingress" => invoke!(by_ref networking::deny_all_ingress, args, settings),
        "networking.remove_deny_all_ingress" => invoke!(by_ref networking::remove_deny_all_ingress, args, settings),
        "networking.deny_all_egress" => invoke!(by_ref networking::deny_all_egress, args, settings),
        "networking.remove_deny_all_egress" => invoke!(by_ref networking::remove_deny_all_egress, args, settings),
        "networking.allow_dns_access" => invoke!(by_ref networking::allow_dns_access, args, settings),
        "networking.remove_allow_dns_access" => invoke!(by_ref networking::remove_allow_dns_access, args, settings),
        "networking.ingress_exists" => invoke!(by_ref networking::ingress_exists, args, settings),

        "event.get_events" => invoke!(by_ref event::get_events, args, settings),

        "crd.create_custom_object" => invoke!(by_ref crd::create_custom_object, args, settings),
        "crd.create_cluster_custom_object" => invoke!(by_ref crd::create_cluster_custom_object, args, settings),
        "crd.delete_custom_object" => invoke!(by_ref crd::delete_custom_object, args, settings),
        "crd.delete_cluster_custom_object" => invoke!(by_ref crd::delete_cluster_custom_object, args, settings),
        "crd.patch_custom_object" => invoke!(by_ref crd::patch_custom_object, args, settings),
        "crd.patch_cluster_custom_object" => invoke!(by_ref crd::patch_cluster_custom_object, args, settings),
        "crd.replace_custom_object" => invoke!(by_ref crd::replace_custom_object, args, settings),
        "crd.replace_cluster_custom_object" => invoke!(by_ref crd::replace_cluster_custom_object, args, settings),
        "crd.get_custom_object" => invoke!(by_ref crd::get_custom_object, args, settings),
        "crd.list_custom_objects" => invoke!(by_ref crd::list_custom_objects, args, settings),
        "crd.get_cluster_custom_object" => invoke!(by_ref crd::get_cluster_custom_object, args, settings),
        "crd.list_cluster_custom_objects" => invoke!(by_ref crd::list_cluster_custom_objects, args, settings),

        "chaosmesh.network.add_latency" => invoke!(owned chaos::add_latency, args, settings),
        "chaosmesh.network.set_loss" => invoke!(owned chaos::set_loss, args, settings),
        "chaosmesh.network.duplicate_packets" => invoke!(owned chaos::duplicate_packets, args, settings),
        "chaosmesh.network.corrupt_packets" => invoke!(owned chaos::corrupt_packets, args, settings),
        "chaosmesh.network.reorder_packets" => invoke!(owned chaos::reorder_packets, args, settings),
        "chaosmesh.network.set_bandwidth" => invoke!(owned chaos::set_bandwidth, args, settings),
        "chaosmesh.network.delete_network_fault" => invoke!(by_ref chaos::delete_network_fault, args, settings),
        "chaosmesh.network.get_network_faults" => invoke!(by_ref chaos::get_network_faults, args, settings),
        "chaosmesh.network.get_network_fault" => invoke!(by_ref chaos::get_network_fault, args, settings),

        "chaosmesh.stress.stress_cpu" => invoke!(owned chaos::stress_cpu, args, settings),
        "chaosmesh.stress.stress_memory" => invoke!(owned chaos::stress_memory, args, settings),
        "chaosmesh.stress.delete_stressor" => invoke!(by_ref chaos::delete_stressor, args, settings),
        "chaosmesh.stress.get_stressors" => invoke!(by_ref chaos::get_stressors, args, settings),
        "chaosmesh.stress.get_stressor" => invoke!(by_ref chaos::get_stressor, args, settings),

        other => Err(AppError::NotFound(format!("unknown activity '{}'", other))),
    }
}

/// Run one activity. A fresh client is built for every run from the
/// process configuration overlaid with the caller's secrets.
pub async fn run(config: &Config, name: &str, arguments: Value, secrets: &Secrets) -> AppResult<Value> {
    if find(name).is_none() {
        return Err(AppError::NotFound(format!("unknown activity '{}'", name)));
    }

    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("activity", activity = name, run_id = %run_id);
    let settings = ConnectionSettings::resolve(config, secrets);

    let started = Instant::now();
    let result = dispatch(name, arguments, &settings).instrument(span).await;
    let elapsed = started.elapsed().as_secs_f64();

    let outcome = if result.is_ok() { "succeeded" } else { "failed" };
    increment_counter!(
        "chaosk8s_activity_runs_total",
        "activity" => name.to_string(),
        "outcome" => outcome
    );
    histogram!("chaosk8s_activity_duration_seconds", elapsed, "activity" => name.to_string());

    match &result {
        Ok(_) => info!(activity = name, %run_id, elapsed, "Activity completed"),
        Err(e) => warn!(activity = name, %run_id, error = %e, "Activity failed"),
    }
    result
}
