//! Cluster event probe

use k8s_openapi::api::events::v1::Event;
use kube::api::{Api, ListParams};
use kube::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GetEventsParams {
    pub label_selector: Option<String>,
    pub field_selector: Option<String>,
    pub limit: u32,
}

impl Default for GetEventsParams {
    fn default() -> Self {
        Self {
            label_selector: None,
            field_selector: None,
            limit: 100,
        }
    }
}

impl GetEventsParams {
    fn list_params(&self) -> ListParams {
        let mut params = ListParams::default().limit(self.limit);
        if let Some(labels) = self.label_selector.as_deref().filter(|l| !l.is_empty()) {
            params = params.labels(labels);
        }
        if let Some(fields) = self.field_selector.as_deref().filter(|f| !f.is_empty()) {
            params = params.fields(fields);
        }
        params
    }
}

/// Events across all namespaces, returned as the raw list document
#[instrument(skip(client))]
pub async fn get_events(client: &Client, params: &GetEventsParams) -> AppResult<Value> {
    let api: Api<Event> = Api::all(client.clone());
    let list = api
        .list(&params.list_params())
        .await
        .map_err(|e| AppError::request("Failed to list events", e))?;

    Ok(json!({
        "apiVersion": "events.k8s.io/v1",
        "kind": "EventList",
        "metadata": list.metadata,
        "items": list.items,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_params() {
        let params = GetEventsParams {
            field_selector: Some("reason=Killing".to_string()),
            ..Default::default()
        }
        .list_params();
        assert_eq!(params.limit, Some(100));
        assert_eq!(params.field_selector.as_deref(), Some("reason=Killing"));
        assert!(params.label_selector.is_none());
    }
}
