//! Activity discovery and invocation endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use utoipa::ToSchema;

use crate::activities::{self, ActivityDescriptor};
use crate::api::response::{ApiResponse, IntoApiResponse};
use crate::api::AppState;
use crate::config::Secrets;

/// Body of an activity invocation
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct InvokeRequest {
    /// Keyword arguments of the activity
    #[serde(default)]
    #[schema(value_type = Object)]
    pub arguments: Value,
    /// Per-call connection overrides (`KUBERNETES_HOST`, `KUBERNETES_API_KEY`, ...)
    #[serde(default)]
    #[schema(value_type = Object)]
    pub secrets: Secrets,
}

/// List every action and probe
#[utoipa::path(
    get,
    path = "/api/activities",
    tag = "activities",
    responses((status = 200, description = "Available activities", body = [ActivityDescriptor]))
)]
pub async fn list() -> Json<Vec<ActivityDescriptor>> {
    Json(activities::discover())
}

/// Run an action or probe
#[utoipa::path(
    post,
    path = "/api/activities/{name}",
    tag = "activities",
    params(("name" = String, Path, description = "Activity name, e.g. `pod.terminate_pods`")),
    request_body = InvokeRequest,
    responses(
        (status = 200, description = "Activity result"),
        (status = 400, description = "Invalid arguments"),
        (status = 404, description = "Unknown activity or missing resource"),
        (status = 500, description = "Activity failed")
    )
)]
pub async fn invoke(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<InvokeRequest>,
) -> ApiResponse<Value> {
    info!(activity = %name, "Invoking activity");
    activities::run(&state.config, &name, req.arguments, &req.secrets)
        .await
        .into_api_response()
}
