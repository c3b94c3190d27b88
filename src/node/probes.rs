use k8s_openapi::api::core::v1::Node;
use kube::api::Api;
use kube::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

use crate::error::{AppError, AppResult};
use crate::k8s::selectors::list_params;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GetNodesParams {
    pub label_selector: Option<String>,
}

/// List nodes, returned as the raw list document
#[instrument(skip(client))]
pub async fn get_nodes(client: &Client, params: &GetNodesParams) -> AppResult<Value> {
    let api: Api<Node> = Api::all(client.clone());
    let list = api
        .list(&list_params(None, params.label_selector.as_deref()))
        .await
        .map_err(|e| AppError::request("Failed to list nodes", e))?;

    Ok(json!({
        "apiVersion": "v1",
        "kind": "NodeList",
        "metadata": list.metadata,
        "items": list.items,
    }))
}
