//! Standardized API response types
//!
//! Every activity invocation answers with the same envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AppError;

/// Standard API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    /// Present on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Present on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

/// Error details in API response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
                details: None,
            }),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = if self.success {
            StatusCode::OK
        } else {
            match self.error.as_ref().map(|e| e.code.as_str()) {
                Some("NOT_FOUND") => StatusCode::NOT_FOUND,
                Some("BAD_REQUEST") => StatusCode::BAD_REQUEST,
                Some("UNAUTHORIZED") => StatusCode::UNAUTHORIZED,
                Some("FORBIDDEN") => StatusCode::FORBIDDEN,
                Some("CONFLICT") => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            }
        };
        (status, Json(self)).into_response()
    }
}

/// Error code reported for a failed activity
pub fn error_code(err: &AppError) -> &'static str {
    match err {
        AppError::Configuration(_) => "BAD_REQUEST",
        AppError::NotFound(_) => "NOT_FOUND",
        AppError::Request { code, .. } => match code {
            401 => "UNAUTHORIZED",
            403 => "FORBIDDEN",
            404 => "NOT_FOUND",
            409 => "CONFLICT",
            _ => "KUBERNETES_ERROR",
        },
        AppError::Patch(_) => "PATCH_FAILED",
        AppError::Selection(_) => "SELECTION_FAILED",
        AppError::UnmanagedPod { .. } => "UNMANAGED_POD",
        AppError::Eviction { .. } => "EVICTION_FAILED",
        AppError::DrainTimeout { .. } => "DRAIN_TIMEOUT",
        AppError::ReadinessTimeout(_) => "READINESS_TIMEOUT",
        AppError::Probe(_) => "PROBE_FAILED",
        AppError::Kubernetes(_) => "KUBERNETES_ERROR",
        AppError::Kubeconfig(_) | AppError::InCluster(_) => "CLIENT_CONFIG_ERROR",
        AppError::Io(_) => "IO_ERROR",
        AppError::Serialization(_) => "JSON_ERROR",
        AppError::Yaml(_) => "YAML_ERROR",
    }
}

fn error_details(err: &AppError) -> Option<serde_json::Value> {
    match err {
        AppError::Request { reason, code, .. } => Some(json!({ "reason": reason, "status": code })),
        AppError::DrainTimeout { remaining, .. } => Some(json!({ "remaining_pods": remaining })),
        AppError::UnmanagedPod { pod, node } => Some(json!({ "pod": pod, "node": node })),
        _ => None,
    }
}

/// Helper trait for converting results to API responses
pub trait IntoApiResponse<T> {
    fn into_api_response(self) -> ApiResponse<T>;
}

impl<T: Serialize> IntoApiResponse<T> for Result<T, AppError> {
    fn into_api_response(self) -> ApiResponse<T> {
        match self {
            Ok(data) => ApiResponse::success(data),
            Err(e) => ApiResponse {
                success: false,
                data: None,
                error: Some(ApiError {
                    code: error_code(&e).to_string(),
                    message: e.to_string(),
                    details: error_details(&e),
                }),
            },
        }
    }
}
