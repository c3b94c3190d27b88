//! Namespace actions and probes

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, PostParams};
use kube::{Client, ResourceExt};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::error::{is_not_found, AppError, AppResult};
use crate::k8s::manifest::load_typed;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateNamespaceParams {
    pub name: Option<String>,
    pub spec_path: Option<String>,
}

/// Create a namespace from a bare name or a manifest
#[instrument(skip(client))]
pub async fn create_namespace(client: &Client, params: &CreateNamespaceParams) -> AppResult<Namespace> {
    let namespace = match (&params.spec_path, &params.name) {
        (Some(path), _) => load_typed::<Namespace>(path)?,
        (None, Some(name)) => Namespace {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                ..Default::default()
            },
            ..Default::default()
        },
        (None, None) => {
            return Err(AppError::configuration(
                "You need to either specify name or spec_path",
            ))
        }
    };

    let api: Api<Namespace> = Api::all(client.clone());
    let created = api
        .create(&PostParams::default(), &namespace)
        .await
        .map_err(|e| AppError::request("Failed to create namespace", e))?;
    info!(namespace = %created.name_any(), "Created namespace");
    Ok(created)
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamespaceNameParams {
    pub name: String,
}

#[instrument(skip(client))]
pub async fn delete_namespace(client: &Client, params: &NamespaceNameParams) -> AppResult<()> {
    let api: Api<Namespace> = Api::all(client.clone());
    api.delete(&params.name, &DeleteParams::default())
        .await
        .map_err(|e| AppError::request(&format!("Failed to delete namespace '{}'", params.name), e))?;
    info!(namespace = %params.name, "Deleted namespace");
    Ok(())
}

/// Whether the namespace exists; absence is not an error
#[instrument(skip(client))]
pub async fn namespace_exists(client: &Client, params: &NamespaceNameParams) -> AppResult<bool> {
    let api: Api<Namespace> = Api::all(client.clone());
    match api.get(&params.name).await {
        Ok(_) => Ok(true),
        Err(e) if is_not_found(&e) => Ok(false),
        Err(e) => Err(AppError::request("Failed to read namespace", e)),
    }
}
