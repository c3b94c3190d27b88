use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use super::selection::{list_matching, select_nodes, NodeTarget};
use crate::error::{AppError, AppResult};
use crate::k8s::sampling::{pick, Pick, RandomSource};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeleteNodesParams {
    pub label_selector: Option<String>,
    pub all: bool,
    pub rand: bool,
    pub count: Option<usize>,
    pub grace_period_seconds: Option<u32>,
    pub pod_label_selector: Option<String>,
    pub pod_namespace: Option<String>,
}

impl DeleteNodesParams {
    fn pick(&self) -> Pick {
        if self.rand {
            Pick::Random(1)
        } else if let Some(count) = self.count {
            Pick::Random(count)
        } else if self.all {
            Pick::All
        } else {
            Pick::First
        }
    }
}

/// Delete nodes matching the label selector. Returns the deleted node names.
#[instrument(skip(client, rng))]
pub async fn delete_nodes(
    client: &Client,
    params: &DeleteNodesParams,
    rng: &mut dyn RandomSource,
) -> AppResult<Vec<String>> {
    let target = NodeTarget {
        label_selector: params.label_selector.clone(),
        pod_label_selector: params.pod_label_selector.clone(),
        pod_namespace: params.pod_namespace.clone(),
        ..Default::default()
    };
    let nodes = select_nodes(client, &target, rng).await?;
    let nodes = pick(nodes, params.pick(), rng);

    let api: Api<Node> = Api::all(client.clone());
    let delete_params = DeleteParams {
        grace_period_seconds: params.grace_period_seconds,
        ..Default::default()
    };

    let mut deleted = Vec::with_capacity(nodes.len());
    for node in nodes {
        let name = node.name_any();
        let outcome = api
            .delete(&name, &delete_params)
            .await
            .map_err(|e| AppError::request(&format!("Failed to delete node '{}'", name), e))?;
        if let Some(status) = outcome.right() {
            debug!(node = %name, ?status, "Node deletion status");
        }
        info!(node = %name, "Deleted node");
        deleted.push(name);
    }
    Ok(deleted)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateNodeParams {
    pub meta: Value,
    pub spec: Value,
}

/// Register a new node object
#[instrument(skip(client, params))]
pub async fn create_node(client: &Client, params: &CreateNodeParams) -> AppResult<Node> {
    let node: Node = serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Node",
        "metadata": params.meta,
        "spec": params.spec,
    }))?;

    let api: Api<Node> = Api::all(client.clone());
    let created = api
        .create(&PostParams::default(), &node)
        .await
        .map_err(|e| AppError::request("Creating new node failed", e))?;
    info!(node = %created.name_any(), "Created node");
    Ok(created)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CordonParams {
    pub name: Option<String>,
    pub label_selector: Option<String>,
}

/// Mark matching nodes unschedulable
#[instrument(skip(client))]
pub async fn cordon_node(client: &Client, params: &CordonParams) -> AppResult<Vec<String>> {
    set_schedulable_matching(client, params, false).await
}

/// Mark matching nodes schedulable again
#[instrument(skip(client))]
pub async fn uncordon_node(client: &Client, params: &CordonParams) -> AppResult<Vec<String>> {
    set_schedulable_matching(client, params, true).await
}

async fn set_schedulable_matching(
    client: &Client,
    params: &CordonParams,
    schedulable: bool,
) -> AppResult<Vec<String>> {
    let nodes = list_matching(client, params.name.as_deref(), params.label_selector.as_deref()).await?;
    if nodes.is_empty() {
        return Err(AppError::Selection(format!(
            "failed to find a node with name '{}' or labels '{}'",
            params.name.as_deref().unwrap_or_default(),
            params.label_selector.as_deref().unwrap_or_default()
        )));
    }

    let mut names = Vec::with_capacity(nodes.len());
    for node in nodes {
        let name = node.name_any();
        set_unschedulable(client, &name, !schedulable).await?;
        names.push(name);
    }
    Ok(names)
}

/// Flip a single node's `spec.unschedulable` flag with a merge patch
pub async fn set_unschedulable(client: &Client, name: &str, unschedulable: bool) -> AppResult<()> {
    let api: Api<Node> = Api::all(client.clone());
    let patch = json!({ "spec": { "unschedulable": unschedulable } });

    api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .map_err(|e| {
            let verb = if unschedulable { "unschedule" } else { "reschedule" };
            AppError::Patch(format!("Failed to {} node '{}': {}", verb, name, e))
        })?;

    info!(node = %name, unschedulable, "Updated node schedulability");
    Ok(())
}
