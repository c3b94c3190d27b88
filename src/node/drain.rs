//! Node drain orchestration
//!
//! Cordon every selected node first, then one node at a time: classify the
//! resident pods, evict the evictable ones and wait until each evicted pod is
//! gone or has been replaced. Nothing is rolled back on failure; nodes stay
//! cordoned until the caller runs `uncordon_node`.

use std::time::Duration;

use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{Api, EvictParams, ListParams};
use kube::{Client, ResourceExt};
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::actions::set_unschedulable;
use super::selection::{select_nodes, NodeTarget};
use crate::error::{is_not_found, AppError, AppResult};
use crate::k8s::sampling::RandomSource;
use crate::k8s::selectors::node_field_selector;

pub const MIRROR_ANNOTATION: &str = "kubernetes.io/config.mirror";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DrainParams {
    #[serde(flatten)]
    pub target: NodeTarget,
    pub delete_pods_with_local_storage: bool,
    /// Seconds to wait for evicted pods, per node
    pub timeout: u64,
    #[serde(skip)]
    pub poll_interval: Duration,
}

impl Default for DrainParams {
    fn default() -> Self {
        Self {
            target: NodeTarget::default(),
            delete_pods_with_local_storage: false,
            timeout: 120,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// What a drain does with one resident pod
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodDisposition {
    SkipMirror,
    SkipDaemonSet,
    SkipLocalStorage,
    EvictLocalStorage,
    EvictTerminal,
    EvictManaged,
    Unmanaged,
}

impl PodDisposition {
    pub fn evicts(self) -> bool {
        matches!(
            self,
            PodDisposition::EvictLocalStorage
                | PodDisposition::EvictTerminal
                | PodDisposition::EvictManaged
        )
    }
}

/// Classify a pod, checking in order: mirror, daemonset, local storage,
/// terminal phase, controller owner.
pub fn classify_pod(pod: &Pod, delete_local_storage: bool) -> PodDisposition {
    if pod.annotations().contains_key(MIRROR_ANNOTATION) {
        return PodDisposition::SkipMirror;
    }

    let owners = pod.owner_references();
    if owners.iter().any(|o| o.kind == "DaemonSet") {
        return PodDisposition::SkipDaemonSet;
    }

    let has_local_storage = pod
        .spec
        .as_ref()
        .and_then(|s| s.volumes.as_ref())
        .map(|volumes| volumes.iter().any(|v| v.empty_dir.is_some()))
        .unwrap_or(false);
    if has_local_storage {
        return if delete_local_storage {
            PodDisposition::EvictLocalStorage
        } else {
            PodDisposition::SkipLocalStorage
        };
    }

    let phase = pod.status.as_ref().and_then(|s| s.phase.as_deref());
    if matches!(phase, Some("Succeeded") | Some("Failed")) {
        return PodDisposition::EvictTerminal;
    }

    if owners.iter().any(|o| o.controller == Some(true)) {
        return PodDisposition::EvictManaged;
    }

    PodDisposition::Unmanaged
}

/// Drain the selected nodes. Returns the names of the drained nodes.
#[instrument(skip(client, rng), fields(target = ?params.target))]
pub async fn drain_nodes(
    client: &Client,
    params: &DrainParams,
    rng: &mut dyn RandomSource,
) -> AppResult<Vec<String>> {
    let nodes: Vec<Node> = select_nodes(client, &params.target, rng).await?;
    let names: Vec<String> = nodes.iter().map(|n| n.name_any()).collect();

    for name in &names {
        set_unschedulable(client, name, true).await?;
    }

    for name in &names {
        drain_node(client, name, params).await?;
    }

    Ok(names)
}

async fn drain_node(client: &Client, node: &str, params: &DrainParams) -> AppResult<()> {
    let all_pods: Api<Pod> = Api::all(client.clone());
    let resident = all_pods
        .list(&ListParams::default().fields(&node_field_selector(node)))
        .await
        .map_err(|e| AppError::request(&format!("Failed to list pods on node '{}'", node), e))?;

    let mut candidates = Vec::new();
    for pod in resident.items {
        let disposition = classify_pod(&pod, params.delete_pods_with_local_storage);
        debug!(pod = %pod.name_any(), ?disposition, "Classified pod");
        match disposition {
            PodDisposition::Unmanaged => {
                return Err(AppError::UnmanagedPod {
                    pod: pod.name_any(),
                    node: node.to_string(),
                })
            }
            d if d.evicts() => candidates.push(pod),
            _ => {}
        }
    }

    if candidates.is_empty() {
        info!(node, "No pods to evict");
        return Ok(());
    }

    for pod in &candidates {
        let name = pod.name_any();
        let namespace = pod.namespace().unwrap_or_else(|| "default".to_string());
        let api: Api<Pod> = Api::namespaced(client.clone(), &namespace);
        api.evict(&name, &EvictParams::default())
            .await
            .map_err(|e| AppError::Eviction {
                pod: name.clone(),
                message: e.to_string(),
            })?;
        info!(node, pod = %name, namespace = %namespace, "Evicted pod");
    }

    wait_for_evictions(client, node, candidates, params).await
}

/// Poll until every evicted pod is gone (404) or replaced (new UID)
async fn wait_for_evictions(
    client: &Client,
    node: &str,
    mut pending: Vec<Pod>,
    params: &DrainParams,
) -> AppResult<()> {
    let started = Instant::now();
    let timeout = Duration::from_secs(params.timeout);

    while !pending.is_empty() {
        if started.elapsed() > timeout {
            warn!(node, remaining = pending.len(), "Drain timed out");
            return Err(AppError::DrainTimeout {
                timeout: params.timeout,
                remaining: pending.iter().map(|p| p.name_any()).collect(),
            });
        }

        let mut still_running = Vec::with_capacity(pending.len());
        for pod in pending {
            let name = pod.name_any();
            let namespace = pod.namespace().unwrap_or_else(|| "default".to_string());
            let api: Api<Pod> = Api::namespaced(client.clone(), &namespace);
            match api.get(&name).await {
                Ok(current) if current.uid() == pod.uid() => still_running.push(pod),
                Ok(_) => debug!(pod = %name, "Pod was rescheduled"),
                Err(e) if is_not_found(&e) => debug!(pod = %name, "Pod is gone"),
                Err(e) => {
                    return Err(AppError::request(
                        &format!("Failed to read pod '{}'", name),
                        e,
                    ))
                }
            }
        }
        pending = still_running;

        if !pending.is_empty() {
            tokio::time::sleep(params.poll_interval).await;
        }
    }

    info!(node, "Node drained");
    Ok(())
}
