//! Error taxonomy shared by every action and probe

use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed caller input, detected before any request is sent
    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    NotFound(String),

    /// The API server answered with a non-success status
    #[error("{context}: '{reason}' {message}")]
    Request {
        context: String,
        reason: String,
        message: String,
        code: u16,
    },

    #[error("{0}")]
    Patch(String),

    #[error("{0}")]
    Selection(String),

    #[error("Pod '{pod}' on node '{node}' is unmanaged, cannot drain this node. Delete it manually first?")]
    UnmanagedPod { pod: String, node: String },

    #[error("Failed to evict pod {pod}: {message}")]
    Eviction { pod: String, message: String },

    #[error("Draining nodes did not complete within {timeout}s. Remaining pods are:\n{}", .remaining.join("\n"))]
    DrainTimeout { timeout: u64, remaining: Vec<String> },

    #[error("{0}")]
    ReadinessTimeout(String),

    /// A probe observed a state it was asked to assert against
    #[error("{0}")]
    Probe(String),

    #[error("Kubernetes error: {0}")]
    Kubernetes(#[from] kube::Error),

    #[error("Kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("In-cluster config error: {0}")]
    InCluster(#[from] kube::config::InClusterError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl AppError {
    pub fn configuration(msg: &str) -> Self {
        AppError::Configuration(msg.to_string())
    }

    pub fn not_found(msg: &str) -> Self {
        AppError::NotFound(msg.to_string())
    }

    pub fn probe(msg: &str) -> Self {
        AppError::Probe(msg.to_string())
    }

    /// Wrap a client error with the operation it interrupted, keeping the
    /// server-reported reason and message when there is one.
    pub fn request(context: &str, err: kube::Error) -> Self {
        match err {
            kube::Error::Api(resp) => AppError::Request {
                context: context.to_string(),
                reason: resp.reason,
                message: resp.message,
                code: resp.code,
            },
            other => AppError::Request {
                context: context.to_string(),
                reason: "RequestFailed".to_string(),
                message: other.to_string(),
                code: 0,
            },
        }
    }

    /// HTTP status reported by the API server, when the error came from one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AppError::Request { code, .. } if *code != 0 => Some(*code),
            AppError::Kubernetes(kube::Error::Api(resp)) => Some(resp.code),
            _ => None,
        }
    }
}

/// True when a client error is the API server saying 404
pub(crate) fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 404)
}

/// True when a client error is the API server saying 409
pub(crate) fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 409)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::error::ErrorResponse;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("{} happened", reason),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn test_request_error_keeps_reason_and_message() {
        let err = AppError::request(
            "Failed to create custom resource object",
            api_error(404, "NotFound"),
        );
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(
            err.to_string(),
            "Failed to create custom resource object: 'NotFound' NotFound happened"
        );
    }

    #[test]
    fn test_drain_timeout_lists_remaining_pods() {
        let err = AppError::DrainTimeout {
            timeout: 120,
            remaining: vec!["a".to_string(), "b".to_string()],
        };
        assert!(err.to_string().ends_with("Remaining pods are:\na\nb"));
    }

    #[test]
    fn test_status_helpers() {
        assert!(is_not_found(&api_error(404, "NotFound")));
        assert!(is_conflict(&api_error(409, "AlreadyExists")));
        assert!(!is_conflict(&api_error(500, "InternalError")));
    }
}
