//! Generic create/delete/scale calls shared by the workload modules

use std::fmt::Debug;

use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::default_namespace;
use super::manifest::load_typed;
use super::selectors::{expand_name_template, list_params};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CreateFromFileParams {
    pub spec_path: String,
    pub ns: String,
}

impl Default for CreateFromFileParams {
    fn default() -> Self {
        Self {
            spec_path: String::new(),
            ns: default_namespace(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeleteWorkloadParams {
    pub name: Option<String>,
    pub ns: String,
    pub label_selector: Option<String>,
}

impl Default for DeleteWorkloadParams {
    fn default() -> Self {
        Self {
            name: None,
            ns: default_namespace(),
            label_selector: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScaleParams {
    pub name: String,
    pub replicas: i32,
    #[serde(default = "default_namespace")]
    pub ns: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReadinessParams {
    pub name: String,
    pub ns: String,
    pub label_selector: Option<String>,
    /// Seconds to watch before giving up
    pub timeout: u64,
    pub raise_on_timeout: bool,
}

impl Default for ReadinessParams {
    fn default() -> Self {
        Self {
            name: String::new(),
            ns: default_namespace(),
            label_selector: None,
            timeout: 30,
            raise_on_timeout: true,
        }
    }
}

impl ReadinessParams {
    /// Label selector with `{name}` replaced by the watched object's name
    pub fn expanded_label_selector(&self) -> Option<String> {
        self.label_selector
            .as_deref()
            .map(|selector| expand_name_template(selector, &self.name))
    }
}

/// Map a watch outcome onto the probe result, raising when asked to
pub fn readiness_outcome(reached: bool, params: &ReadinessParams, message: String) -> AppResult<bool> {
    if reached {
        Ok(true)
    } else if params.raise_on_timeout {
        Err(AppError::ReadinessTimeout(message))
    } else {
        info!("{}", message);
        Ok(false)
    }
}

/// Create an object read from a `.json`/`.yaml` manifest
pub async fn create_from_manifest<K>(api: &Api<K>, spec_path: &str) -> AppResult<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Serialize + Debug,
{
    let object: K = load_typed(spec_path)?;
    let created = api.create(&PostParams::default(), &object).await.map_err(|e| {
        AppError::request(&format!("Failed to create {} from {}", K::kind(&()), spec_path), e)
    })?;
    info!(kind = %K::kind(&()), name = %created.name_any(), "Created object");
    Ok(created)
}

/// Delete every object matching the name and/or label selector. With neither
/// set, everything in scope goes. Returns the deleted names.
pub async fn delete_matching<K>(
    api: &Api<K>,
    name: Option<&str>,
    label_selector: Option<&str>,
) -> AppResult<Vec<String>>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Serialize + Debug,
{
    let kind = K::kind(&());
    let list = api
        .list(&list_params(name, label_selector))
        .await
        .map_err(|e| AppError::request(&format!("Failed to list {}", kind), e))?;

    let mut deleted = Vec::with_capacity(list.items.len());
    for object in list.items {
        let object_name = object.name_any();
        api.delete(&object_name, &DeleteParams::foreground())
            .await
            .map_err(|e| AppError::request(&format!("Failed to delete {} '{}'", kind, object_name), e))?;
        info!(kind = %kind, name = %object_name, "Deleted object");
        deleted.push(object_name);
    }
    Ok(deleted)
}

/// Set `spec.replicas` with a merge patch
pub async fn scale<K>(api: &Api<K>, name: &str, replicas: i32) -> AppResult<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Serialize + Debug,
{
    let patch = json!({ "spec": { "replicas": replicas } });
    let scaled = api
        .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .map_err(|e| {
            AppError::Patch(format!(
                "failed to scale '{}' to {} replicas: {}",
                name, replicas, e
            ))
        })?;
    info!(kind = %K::kind(&()), name, replicas, "Scaled");
    Ok(scaled)
}
