//! DaemonSet actions and probes

use k8s_openapi::api::apps::v1::DaemonSet;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, ResourceExt};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

use crate::error::{AppError, AppResult};
use crate::k8s::default_namespace;
use crate::k8s::selectors::{expand_name_template, list_params};
use crate::k8s::workload::{create_from_manifest, delete_matching, CreateFromFileParams, DeleteWorkloadParams};

#[instrument(skip(client))]
pub async fn create_daemon_set(client: &Client, params: &CreateFromFileParams) -> AppResult<DaemonSet> {
    let api: Api<DaemonSet> = Api::namespaced(client.clone(), &params.ns);
    create_from_manifest(&api, &params.spec_path).await
}

#[instrument(skip(client))]
pub async fn delete_daemon_set(client: &Client, params: &DeleteWorkloadParams) -> AppResult<Vec<String>> {
    let api: Api<DaemonSet> = Api::namespaced(client.clone(), &params.ns);
    delete_matching(&api, params.name.as_deref(), params.label_selector.as_deref()).await
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateDaemonSetParams {
    pub name: String,
    /// Merge patch applied to the daemonset
    pub spec: Value,
    #[serde(default = "default_namespace")]
    pub ns: String,
}

#[instrument(skip(client))]
pub async fn update_daemon_set(client: &Client, params: &UpdateDaemonSetParams) -> AppResult<DaemonSet> {
    let api: Api<DaemonSet> = Api::namespaced(client.clone(), &params.ns);
    let updated = api
        .patch(&params.name, &PatchParams::default(), &Patch::Merge(&params.spec))
        .await
        .map_err(|e| AppError::Patch(format!("failed to update daemonset '{}': {}", params.name, e)))?;
    info!(name = %params.name, "Updated daemonset");
    Ok(updated)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonSetReadyParams {
    pub name: String,
    pub ns: String,
    pub label_selector: String,
}

impl Default for DaemonSetReadyParams {
    fn default() -> Self {
        Self {
            name: String::new(),
            ns: default_namespace(),
            label_selector: "name in ({name})".to_string(),
        }
    }
}

/// Every matching daemonset runs on all the nodes it should and nowhere else
#[instrument(skip(client))]
pub async fn daemonset_ready(client: &Client, params: &DaemonSetReadyParams) -> AppResult<bool> {
    let selector = expand_name_template(&params.label_selector, &params.name);
    let api: Api<DaemonSet> = Api::namespaced(client.clone(), &params.ns);
    let list = api
        .list(&list_params(None, Some(&selector)))
        .await
        .map_err(|e| AppError::request("Failed to list daemonsets", e))?;

    if list.items.is_empty() {
        return Err(AppError::NotFound(format!(
            "DaemonSet '{}' was not found",
            params.name
        )));
    }

    for ds in &list.items {
        check_daemonset(ds)?;
    }
    Ok(true)
}

fn check_daemonset(ds: &DaemonSet) -> AppResult<()> {
    let Some(status) = ds.status.as_ref() else {
        return Err(AppError::Probe(format!(
            "DaemonSet '{}' has no status yet",
            ds.name_any()
        )));
    };

    if let Some(unavailable) = status.number_unavailable.filter(|n| *n != 0) {
        return Err(AppError::Probe(format!(
            "DaemonSet '{}' has '{}' unavailable replicas",
            ds.name_any(),
            unavailable
        )));
    }
    if status.number_misscheduled != 0 {
        return Err(AppError::Probe(format!(
            "DaemonSet '{}' has '{}' misscheduled replicas",
            ds.name_any(),
            status.number_misscheduled
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn daemonset(status: Value) -> DaemonSet {
        serde_json::from_value(json!({
            "metadata": {"name": "agent"},
            "spec": {"selector": {}, "template": {}},
            "status": status
        }))
        .unwrap()
    }

    #[test]
    fn test_ready_daemonset() {
        let ds = daemonset(json!({
            "currentNumberScheduled": 3,
            "desiredNumberScheduled": 3,
            "numberMisscheduled": 0,
            "numberReady": 3
        }));
        assert!(check_daemonset(&ds).is_ok());
    }

    #[test]
    fn test_unavailable_or_misscheduled() {
        let unavailable = daemonset(json!({
            "currentNumberScheduled": 3,
            "desiredNumberScheduled": 3,
            "numberMisscheduled": 0,
            "numberReady": 2,
            "numberUnavailable": 1
        }));
        assert!(matches!(check_daemonset(&unavailable), Err(AppError::Probe(_))));

        let misscheduled = daemonset(json!({
            "currentNumberScheduled": 3,
            "desiredNumberScheduled": 3,
            "numberMisscheduled": 1,
            "numberReady": 3
        }));
        assert!(matches!(check_daemonset(&misscheduled), Err(AppError::Probe(_))));
    }
}
