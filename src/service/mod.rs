//! Service actions and probes

use k8s_openapi::api::core::v1::Service;
use kube::api::{Api, DeleteParams};
use kube::Client;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::error::{AppError, AppResult};
use crate::k8s::default_namespace;
use crate::k8s::selectors::list_params;
use crate::k8s::workload::{create_from_manifest, CreateFromFileParams};

#[instrument(skip(client))]
pub async fn create_service_endpoint(client: &Client, params: &CreateFromFileParams) -> AppResult<Service> {
    let api: Api<Service> = Api::namespaced(client.clone(), &params.ns);
    create_from_manifest(&api, &params.spec_path).await
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceNameParams {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub ns: String,
}

#[instrument(skip(client))]
pub async fn delete_service(client: &Client, params: &ServiceNameParams) -> AppResult<()> {
    let api: Api<Service> = Api::namespaced(client.clone(), &params.ns);
    api.delete(&params.name, &DeleteParams::foreground())
        .await
        .map_err(|e| AppError::request(&format!("Failed to delete service '{}'", params.name), e))?;
    info!(service = %params.name, "Deleted service");
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceInitializedParams {
    pub name: String,
    pub ns: String,
    pub label_selector: Option<String>,
    pub raise_if_service_not_initialized: bool,
}

impl Default for ServiceInitializedParams {
    fn default() -> Self {
        Self {
            name: String::new(),
            ns: default_namespace(),
            label_selector: None,
            raise_if_service_not_initialized: true,
        }
    }
}

/// The service object has been created
#[instrument(skip(client))]
pub async fn service_is_initialized(client: &Client, params: &ServiceInitializedParams) -> AppResult<bool> {
    let api: Api<Service> = Api::namespaced(client.clone(), &params.ns);
    let list = api
        .list(&list_params(Some(&params.name), params.label_selector.as_deref()))
        .await
        .map_err(|e| AppError::request("Failed to list services", e))?;

    if list.items.is_empty() {
        if params.raise_if_service_not_initialized {
            return Err(AppError::NotFound(format!(
                "service '{}' is not initialized",
                params.name
            )));
        }
        return Ok(false);
    }
    Ok(true)
}
