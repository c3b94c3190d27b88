//! Secret actions and probes

use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DeleteParams};
use kube::Client;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::error::{AppError, AppResult};
use crate::k8s::default_namespace;
use crate::k8s::selectors::list_params;
use crate::k8s::workload::{create_from_manifest, CreateFromFileParams};

#[instrument(skip(client))]
pub async fn create_secret(client: &Client, params: &CreateFromFileParams) -> AppResult<Secret> {
    let api: Api<Secret> = Api::namespaced(client.clone(), &params.ns);
    create_from_manifest(&api, &params.spec_path).await
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecretNameParams {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub ns: String,
}

#[instrument(skip(client))]
pub async fn delete_secret(client: &Client, params: &SecretNameParams) -> AppResult<()> {
    let api: Api<Secret> = Api::namespaced(client.clone(), &params.ns);
    api.delete(&params.name, &DeleteParams::default())
        .await
        .map_err(|e| AppError::request(&format!("Failed to delete secret '{}'", params.name), e))?;
    info!(secret = %params.name, "Deleted secret");
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecretExistsParams {
    pub name: String,
    pub ns: String,
    pub label_selector: Option<String>,
    pub raise_if_non_existing: bool,
}

impl Default for SecretExistsParams {
    fn default() -> Self {
        Self {
            name: String::new(),
            ns: default_namespace(),
            label_selector: None,
            raise_if_non_existing: true,
        }
    }
}

#[instrument(skip(client))]
pub async fn secret_exists(client: &Client, params: &SecretExistsParams) -> AppResult<bool> {
    let api: Api<Secret> = Api::namespaced(client.clone(), &params.ns);
    let list = api
        .list(&list_params(Some(&params.name), params.label_selector.as_deref()))
        .await
        .map_err(|e| AppError::request("Failed to list secrets", e))?;

    if list.items.is_empty() {
        if params.raise_if_non_existing {
            return Err(AppError::NotFound(format!(
                "Secret '{}' does not exist in namespace '{}'",
                params.name, params.ns
            )));
        }
        return Ok(false);
    }
    Ok(true)
}
