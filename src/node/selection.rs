//! Resolving caller criteria into a concrete list of nodes

use std::collections::BTreeSet;

use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{Api, ListParams};
use kube::{Client, ResourceExt};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{AppError, AppResult};
use crate::k8s::sampling::{pick, Pick, RandomSource};
use crate::k8s::selectors::list_params;

/// Which nodes an operation targets
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeTarget {
    pub name: Option<String>,
    pub label_selector: Option<String>,
    /// Keep only nodes hosting a pod matching this selector...
    pub pod_label_selector: Option<String>,
    /// ...in this namespace
    pub pod_namespace: Option<String>,
    pub first: bool,
    pub count: Option<usize>,
}

impl NodeTarget {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub fn labelled(label_selector: &str) -> Self {
        Self {
            label_selector: Some(label_selector.to_string()),
            ..Default::default()
        }
    }

    fn pick(&self) -> Pick {
        if self.first {
            Pick::First
        } else if let Some(count) = self.count {
            Pick::Random(count)
        } else {
            Pick::All
        }
    }
}

/// List nodes matching `target`, narrowed by pod colocation and then by
/// `first`/`count`. Fails when nothing matches.
#[instrument(skip(client, rng))]
pub async fn select_nodes(
    client: &Client,
    target: &NodeTarget,
    rng: &mut dyn RandomSource,
) -> AppResult<Vec<Node>> {
    let nodes = list_matching(client, target.name.as_deref(), target.label_selector.as_deref()).await?;
    let nodes = filter_colocated(client, nodes, target).await?;

    if nodes.is_empty() {
        return Err(AppError::Selection(format!(
            "failed to find a node with name '{}' or labels '{}'",
            target.name.as_deref().unwrap_or_default(),
            target.label_selector.as_deref().unwrap_or_default()
        )));
    }

    let selected = pick(nodes, target.pick(), rng);
    debug!(
        nodes = ?selected.iter().map(|n| n.name_any()).collect::<Vec<_>>(),
        "Selected nodes"
    );
    Ok(selected)
}

pub(crate) async fn list_matching(
    client: &Client,
    name: Option<&str>,
    label_selector: Option<&str>,
) -> AppResult<Vec<Node>> {
    let api: Api<Node> = Api::all(client.clone());
    let list = api
        .list(&list_params(name, label_selector))
        .await
        .map_err(|e| AppError::request("Failed to list nodes", e))?;
    Ok(list.items)
}

async fn filter_colocated(
    client: &Client,
    nodes: Vec<Node>,
    target: &NodeTarget,
) -> AppResult<Vec<Node>> {
    let (Some(pod_labels), Some(pod_namespace)) =
        (target.pod_label_selector.as_deref(), target.pod_namespace.as_deref())
    else {
        return Ok(nodes);
    };

    let pods: Api<Pod> = Api::namespaced(client.clone(), pod_namespace);
    let list = pods
        .list(&ListParams::default().labels(pod_labels))
        .await
        .map_err(|e| AppError::request("Failed to list pods", e))?;
    let hosts = hosting_nodes(&list.items);

    Ok(nodes
        .into_iter()
        .filter(|n| hosts.contains(&n.name_any()))
        .collect())
}

/// Names of the nodes the given pods are scheduled on
pub fn hosting_nodes(pods: &[Pod]) -> BTreeSet<String> {
    pods.iter()
        .filter_map(|p| p.spec.as_ref().and_then(|s| s.node_name.clone()))
        .collect()
}
