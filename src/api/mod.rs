pub mod activities;
pub mod health;
pub mod metrics;
pub mod openapi;
pub mod response;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Present once a Prometheus recorder has been installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
