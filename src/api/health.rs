use axum::{extract::State, Json};
use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use crate::api::AppState;
use crate::config::{ConnectionSettings, Secrets};
use crate::k8s::K8sClient;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize, ToSchema)]
pub struct ClusterStatusResponse {
    pub connected: bool,
    pub message: String,
}

/// Liveness of the service itself
#[utoipa::path(
    get,
    path = "/health",
    tag = "cluster",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Whether a client can be built from the process configuration and the
/// API server answers
#[utoipa::path(
    get,
    path = "/api/cluster/status",
    tag = "cluster",
    responses((status = 200, description = "Cluster status", body = ClusterStatusResponse))
)]
pub async fn cluster_status(State(state): State<AppState>) -> Json<ClusterStatusResponse> {
    let settings = ConnectionSettings::resolve(&state.config, &Secrets::new());
    let probe = match K8sClient::connect(&settings).await {
        Ok(client) => client.health_check().await,
        Err(e) => Err(e),
    };

    let (connected, message) = match probe {
        Ok(version) => (true, format!("Kubernetes cluster connected ({})", version)),
        Err(e) => {
            debug!("Cluster status check failed: {}", e);
            (false, format!("Kubernetes cluster not available: {}", e))
        }
    };
    Json(ClusterStatusResponse { connected, message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let response = health_check().await;
        assert_eq!(response.status, "ok");
        assert_eq!(response.version, env!("CARGO_PKG_VERSION"));
    }
}
