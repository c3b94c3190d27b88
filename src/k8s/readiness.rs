//! Watch-based readiness checks for replicated workloads

use std::fmt::Debug;
use std::time::Duration;

use futures::{StreamExt, TryStreamExt};
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use kube::api::{Api, WatchEvent, WatchParams};
use kube::Resource;
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use super::selectors::name_field_selector;
use crate::error::{AppError, AppResult};

/// Longest server-side watch timeout the API server accepts from us
const MAX_WATCH_SECONDS: u64 = 290;

/// Ready versus desired replica counts of a workload
pub trait ReplicaCounts {
    fn replica_counts(&self) -> (i32, i32);

    fn fully_ready(&self) -> bool {
        let (ready, desired) = self.replica_counts();
        ready == desired
    }
}

impl ReplicaCounts for Deployment {
    fn replica_counts(&self) -> (i32, i32) {
        let ready = self
            .status
            .as_ref()
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0);
        let desired = self.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
        (ready, desired)
    }
}

impl ReplicaCounts for StatefulSet {
    fn replica_counts(&self) -> (i32, i32) {
        let ready = self
            .status
            .as_ref()
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0);
        let desired = self.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
        (ready, desired)
    }
}

/// Which readiness state to wait for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Ready count equals desired count
    FullyReady,
    /// Ready count differs from desired count
    Degraded,
}

/// Watch `api` until an object matching the name/label filter reaches the
/// expected state. Returns `false` when `timeout` seconds pass first.
#[instrument(skip(api), fields(kind = %K::kind(&())))]
pub async fn wait_for<K>(
    api: &Api<K>,
    name: Option<&str>,
    label_selector: Option<&str>,
    expect: Expect,
    timeout: u64,
) -> AppResult<bool>
where
    K: Resource<DynamicType = ()> + ReplicaCounts + Clone + DeserializeOwned + Debug + Send + 'static,
{
    let deadline = Instant::now() + Duration::from_secs(timeout);

    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return Ok(false);
        }
        let remaining = left.as_secs_f64().ceil() as u64;
        let server_timeout = remaining.min(MAX_WATCH_SECONDS);

        let mut params = WatchParams::default().timeout(server_timeout as u32);
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            params = params.fields(&name_field_selector(name));
        }
        if let Some(labels) = label_selector.filter(|l| !l.is_empty()) {
            params = params.labels(labels);
        }

        let mut stream = api.watch(&params, "0").await?.boxed();
        let watched = tokio::time::timeout_at(deadline, async {
            while let Some(event) = stream.try_next().await? {
                match event {
                    WatchEvent::Added(obj) | WatchEvent::Modified(obj) => {
                        let (ready, desired) = obj.replica_counts();
                        debug!(ready, desired, "Observed replica counts");
                        if obj.fully_ready() == (expect == Expect::FullyReady) {
                            return Ok(true);
                        }
                    }
                    WatchEvent::Deleted(_) | WatchEvent::Bookmark(_) => {}
                    WatchEvent::Error(e) => return Err(AppError::Kubernetes(kube::Error::Api(e))),
                }
            }
            Ok::<bool, AppError>(false)
        })
        .await;

        match watched {
            Ok(Ok(true)) => {
                info!(?expect, "Readiness condition reached");
                return Ok(true);
            }
            Ok(Ok(false)) if remaining > MAX_WATCH_SECONDS => continue,
            Ok(Ok(false)) | Err(_) => return Ok(false),
            Ok(Err(e)) => return Err(e),
        }
    }
}
