//! OpenAPI documentation for the chaosk8s API

use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "chaosk8s API",
        version = "1.0.0",
        description = "Chaos engineering actions and probes against Kubernetes and Chaos Mesh.\n\n## Features\n- Discover available actions and probes\n- Run one with JSON arguments and per-call connection secrets\n- Prometheus metrics per activity run",
        license(name = "Apache-2.0")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    tags(
        (name = "activities", description = "Discover and run actions and probes"),
        (name = "cluster", description = "Service and cluster status"),
        (name = "metrics", description = "Prometheus metrics")
    ),
    paths(
        crate::api::health::health_check,
        crate::api::health::cluster_status,
        crate::api::activities::list,
        crate::api::activities::invoke,
        crate::api::metrics::metrics_handler,
    ),
    components(
        schemas(
            crate::api::health::HealthResponse,
            crate::api::health::ClusterStatusResponse,
            crate::api::activities::InvokeRequest,
            crate::activities::ActivityDescriptor,
            crate::activities::ActivityKind,
            ErrorResponse,
            ErrorBody,
        )
    )
)]
pub struct ApiDoc;

/// Envelope returned when an activity fails
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Always false
    pub success: bool,
    pub error: ErrorBody,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// e.g. `BAD_REQUEST`, `DRAIN_TIMEOUT`
    pub code: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_activity_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/activities"));
        assert!(doc.paths.paths.contains_key("/api/activities/{name}"));
    }
}
