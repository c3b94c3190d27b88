//! Cluster plumbing shared by every action and probe
//!
//! - Building a client from layered connection settings
//! - Selector and manifest helpers
//! - Random target sampling
//! - Watch-based readiness and generic workload calls

pub mod client;
pub mod manifest;
pub mod readiness;
pub mod sampling;
pub mod selectors;
pub mod workload;

pub use client::K8sClient;
pub use sampling::{Pick, RandomSource, StdRandom};

/// Namespace used when the caller does not name one
pub fn default_namespace() -> String {
    "default".to_string()
}
