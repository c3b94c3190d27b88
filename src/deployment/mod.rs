//! Deployment actions and probes

use k8s_openapi::api::apps::v1::Deployment;
use kube::api::Api;
use kube::{Client, ResourceExt};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::error::{AppError, AppResult};
use crate::k8s::default_namespace;
use crate::k8s::readiness::{wait_for, Expect};
use crate::k8s::selectors::list_params;
use crate::k8s::workload::{
    create_from_manifest, delete_matching, readiness_outcome, scale, CreateFromFileParams,
    DeleteWorkloadParams, ReadinessParams, ScaleParams,
};

#[instrument(skip(client))]
pub async fn create_deployment(client: &Client, params: &CreateFromFileParams) -> AppResult<Deployment> {
    let api: Api<Deployment> = Api::namespaced(client.clone(), &params.ns);
    create_from_manifest(&api, &params.spec_path).await
}

#[instrument(skip(client))]
pub async fn delete_deployment(client: &Client, params: &DeleteWorkloadParams) -> AppResult<Vec<String>> {
    let api: Api<Deployment> = Api::namespaced(client.clone(), &params.ns);
    delete_matching(&api, params.name.as_deref(), params.label_selector.as_deref()).await
}

#[instrument(skip(client))]
pub async fn scale_deployment(client: &Client, params: &ScaleParams) -> AppResult<Deployment> {
    let api: Api<Deployment> = Api::namespaced(client.clone(), &params.ns);
    scale(&api, &params.name, params.replicas).await
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HealthParams {
    pub name: String,
    pub ns: String,
    pub label_selector: Option<String>,
    pub raise_on_unavailable: bool,
}

impl Default for HealthParams {
    fn default() -> Self {
        Self {
            name: String::new(),
            ns: default_namespace(),
            label_selector: None,
            raise_on_unavailable: true,
        }
    }
}

/// Every matching deployment has as many available replicas as it wants
#[instrument(skip(client))]
pub async fn deployment_available_and_healthy(client: &Client, params: &HealthParams) -> AppResult<bool> {
    let api: Api<Deployment> = Api::namespaced(client.clone(), &params.ns);
    let list = api
        .list(&list_params(Some(&params.name), params.label_selector.as_deref()))
        .await
        .map_err(|e| AppError::request("Failed to list deployments", e))?;

    let failure = if list.items.is_empty() {
        Some(AppError::NotFound(format!("Deployment '{}' was not found", params.name)))
    } else {
        list.items.iter().find(|d| !available(d)).map(|d| {
            AppError::Probe(format!("Deployment '{}' is not healthy", d.name_any()))
        })
    };

    match failure {
        Some(err) if params.raise_on_unavailable => Err(err),
        Some(err) => {
            info!("{}", err);
            Ok(false)
        }
        None => Ok(true),
    }
}

fn available(deployment: &Deployment) -> bool {
    let wanted = deployment.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
    let have = deployment
        .status
        .as_ref()
        .and_then(|s| s.available_replicas)
        .unwrap_or(0);
    have == wanted
}

/// Wait until the deployment has all its replicas ready
#[instrument(skip(client))]
pub async fn deployment_fully_available(client: &Client, params: &ReadinessParams) -> AppResult<bool> {
    let api: Api<Deployment> = Api::namespaced(client.clone(), &params.ns);
    let labels = params.expanded_label_selector();
    let reached = wait_for(
        &api,
        Some(&params.name),
        labels.as_deref(),
        Expect::FullyReady,
        params.timeout,
    )
    .await?;
    readiness_outcome(
        reached,
        params,
        format!("deployment '{}' failed to recover within {}s", params.name, params.timeout),
    )
}

/// Wait until the deployment is missing at least one ready replica
#[instrument(skip(client))]
pub async fn deployment_not_fully_available(client: &Client, params: &ReadinessParams) -> AppResult<bool> {
    let api: Api<Deployment> = Api::namespaced(client.clone(), &params.ns);
    let labels = params.expanded_label_selector();
    let reached = wait_for(
        &api,
        Some(&params.name),
        labels.as_deref(),
        Expect::Degraded,
        params.timeout,
    )
    .await?;
    readiness_outcome(
        reached,
        params,
        format!("deployment '{}' failed to stop running within {}s", params.name, params.timeout),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_available_compares_available_replicas() {
        let healthy: Deployment = serde_json::from_value(json!({
            "metadata": {"name": "web"},
            "spec": {"replicas": 2, "selector": {}, "template": {}},
            "status": {"availableReplicas": 2}
        }))
        .unwrap();
        assert!(available(&healthy));

        let degraded: Deployment = serde_json::from_value(json!({
            "metadata": {"name": "web"},
            "spec": {"replicas": 2, "selector": {}, "template": {}},
            "status": {"availableReplicas": 1}
        }))
        .unwrap();
        assert!(!available(&degraded));
    }

    #[test]
    fn test_readiness_outcome_flag() {
        let strict = ReadinessParams::default();
        assert!(matches!(
            readiness_outcome(false, &strict, "late".to_string()),
            Err(AppError::ReadinessTimeout(_))
        ));

        let lenient = ReadinessParams {
            raise_on_timeout: false,
            ..Default::default()
        };
        assert!(!readiness_outcome(false, &lenient, "late".to_string()).unwrap());
        assert!(readiness_outcome(true, &strict, "late".to_string()).unwrap());
    }

    #[test]
    fn test_scale_params_require_name_and_replicas() {
        assert!(serde_json::from_value::<ScaleParams>(json!({"name": "web"})).is_err());
        let params: ScaleParams =
            serde_json::from_value(json!({"name": "web", "replicas": 0})).unwrap();
        assert_eq!(params.ns, "default");
    }
}
