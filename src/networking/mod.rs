//! Network policy actions and the ingress probe
//!
//! Builds the canned deny/allow policies as typed objects

use std::collections::BTreeMap;

use k8s_openapi::api::networking::v1::{
    Ingress, NetworkPolicy, NetworkPolicyEgressRule, NetworkPolicyPeer, NetworkPolicyPort,
    NetworkPolicySpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::{Api, DeleteParams, PostParams};
use kube::{Client, ResourceExt};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

use crate::error::{is_not_found, AppError, AppResult};
use crate::k8s::default_namespace;
use crate::k8s::manifest::load_typed;

pub const DENY_ALL_INGRESS: &str = "chaostoolkit-deny-all-ingress";
pub const DENY_ALL_EGRESS: &str = "chaostoolkit-deny-all-egress";
pub const ALLOW_DNS: &str = "chaostoolkit-allow-dns";

fn pod_selector(labels: &BTreeMap<String, String>) -> LabelSelector {
    LabelSelector {
        match_labels: if labels.is_empty() {
            None
        } else {
            Some(labels.clone())
        },
        ..Default::default()
    }
}

fn policy(name: &str, ns: &str, spec: NetworkPolicySpec) -> NetworkPolicy {
    NetworkPolicy {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(ns.to_string()),
            ..Default::default()
        },
        spec: Some(spec),
        ..Default::default()
    }
}

/// Reject every inbound connection to the selected pods
pub fn deny_all_ingress_policy(labels: &BTreeMap<String, String>, ns: &str) -> NetworkPolicy {
    policy(
        DENY_ALL_INGRESS,
        ns,
        NetworkPolicySpec {
            pod_selector: pod_selector(labels),
            policy_types: Some(vec!["Ingress".to_string()]),
            ingress: Some(vec![]),
            ..Default::default()
        },
    )
}

/// Reject every outbound connection from the selected pods
pub fn deny_all_egress_policy(labels: &BTreeMap<String, String>, ns: &str) -> NetworkPolicy {
    policy(
        DENY_ALL_EGRESS,
        ns,
        NetworkPolicySpec {
            pod_selector: pod_selector(labels),
            policy_types: Some(vec!["Egress".to_string()]),
            egress: Some(vec![]),
            ..Default::default()
        },
    )
}

/// Let the selected pods reach DNS (port 53, UDP and TCP) in any namespace
pub fn allow_dns_policy(labels: &BTreeMap<String, String>, ns: &str) -> NetworkPolicy {
    let dns_port = |protocol: &str| NetworkPolicyPort {
        port: Some(IntOrString::Int(53)),
        protocol: Some(protocol.to_string()),
        ..Default::default()
    };

    policy(
        ALLOW_DNS,
        ns,
        NetworkPolicySpec {
            pod_selector: pod_selector(labels),
            policy_types: Some(vec!["Egress".to_string()]),
            egress: Some(vec![NetworkPolicyEgressRule {
                to: Some(vec![NetworkPolicyPeer {
                    namespace_selector: Some(LabelSelector::default()),
                    ..Default::default()
                }]),
                ports: Some(vec![dns_port("UDP"), dns_port("TCP")]),
            }]),
            ..Default::default()
        },
    )
}

async fn create_policy(client: &Client, policy: &NetworkPolicy, ns: &str) -> AppResult<NetworkPolicy> {
    let api: Api<NetworkPolicy> = Api::namespaced(client.clone(), ns);
    let created = api
        .create(&PostParams::default(), policy)
        .await
        .map_err(|e| AppError::request("Failed to create network policy", e))?;
    info!(policy = %created.name_any(), namespace = ns, "Created network policy");
    Ok(created)
}

async fn delete_policy(client: &Client, name: &str, ns: &str) -> AppResult<()> {
    let api: Api<NetworkPolicy> = Api::namespaced(client.clone(), ns);
    api.delete(name, &DeleteParams::default())
        .await
        .map_err(|e| AppError::request(&format!("Failed to remove network policy '{}'", name), e))?;
    info!(policy = name, namespace = ns, "Removed network policy");
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CreatePolicyParams {
    pub spec: Option<Value>,
    pub spec_path: Option<String>,
    pub ns: String,
}

impl Default for CreatePolicyParams {
    fn default() -> Self {
        Self {
            spec: None,
            spec_path: None,
            ns: default_namespace(),
        }
    }
}

/// Create a network policy from an inline body or a manifest file
#[instrument(skip(client))]
pub async fn create_network_policy(client: &Client, params: &CreatePolicyParams) -> AppResult<NetworkPolicy> {
    let policy: NetworkPolicy = match (&params.spec, &params.spec_path) {
        (Some(spec), _) => serde_json::from_value(spec.clone())?,
        (None, Some(path)) => load_typed(path)?,
        (None, None) => {
            return Err(AppError::configuration(
                "You need to either specify spec or spec_path",
            ))
        }
    };
    create_policy(client, &policy, &params.ns).await
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyNameParams {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub ns: String,
}

#[instrument(skip(client))]
pub async fn remove_network_policy(client: &Client, params: &PolicyNameParams) -> AppResult<()> {
    delete_policy(client, &params.name, &params.ns).await
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CannedPolicyParams {
    pub label_selectors: BTreeMap<String, String>,
    pub ns: String,
}

impl Default for CannedPolicyParams {
    fn default() -> Self {
        Self {
            label_selectors: BTreeMap::new(),
            ns: default_namespace(),
        }
    }
}

#[instrument(skip(client))]
pub async fn deny_all_ingress(client: &Client, params: &CannedPolicyParams) -> AppResult<NetworkPolicy> {
    create_policy(client, &deny_all_ingress_policy(&params.label_selectors, &params.ns), &params.ns).await
}

#[instrument(skip(client))]
pub async fn remove_deny_all_ingress(client: &Client, params: &CannedPolicyParams) -> AppResult<()> {
    delete_policy(client, DENY_ALL_INGRESS, &params.ns).await
}

#[instrument(skip(client))]
pub async fn deny_all_egress(client: &Client, params: &CannedPolicyParams) -> AppResult<NetworkPolicy> {
    create_policy(client, &deny_all_egress_policy(&params.label_selectors, &params.ns), &params.ns).await
}

#[instrument(skip(client))]
pub async fn remove_deny_all_egress(client: &Client, params: &CannedPolicyParams) -> AppResult<()> {
    delete_policy(client, DENY_ALL_EGRESS, &params.ns).await
}

#[instrument(skip(client))]
pub async fn allow_dns_access(client: &Client, params: &CannedPolicyParams) -> AppResult<NetworkPolicy> {
    create_policy(client, &allow_dns_policy(&params.label_selectors, &params.ns), &params.ns).await
}

#[instrument(skip(client))]
pub async fn remove_allow_dns_access(client: &Client, params: &CannedPolicyParams) -> AppResult<()> {
    delete_policy(client, ALLOW_DNS, &params.ns).await
}

/// Whether the named ingress exists
#[instrument(skip(client))]
pub async fn ingress_exists(client: &Client, params: &PolicyNameParams) -> AppResult<bool> {
    let api: Api<Ingress> = Api::namespaced(client.clone(), &params.ns);
    match api.get(&params.name).await {
        Ok(_) => Ok(true),
        Err(e) if is_not_found(&e) => Ok(false),
        Err(e) => Err(AppError::request("Failed to read ingress", e)),
    }
}
