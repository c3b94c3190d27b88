//! StatefulSet actions and probes

use k8s_openapi::api::apps::v1::StatefulSet;
use kube::api::Api;
use kube::Client;
use tracing::instrument;

use crate::error::AppResult;
use crate::k8s::readiness::{wait_for, Expect};
use crate::k8s::workload::{readiness_outcome, scale, ReadinessParams, ScaleParams};

#[instrument(skip(client))]
pub async fn scale_statefulset(client: &Client, params: &ScaleParams) -> AppResult<StatefulSet> {
    let api: Api<StatefulSet> = Api::namespaced(client.clone(), &params.ns);
    scale(&api, &params.name, params.replicas).await
}

/// Wait until the statefulset has all its replicas ready
#[instrument(skip(client))]
pub async fn statefulset_fully_available(client: &Client, params: &ReadinessParams) -> AppResult<bool> {
    let api: Api<StatefulSet> = Api::namespaced(client.clone(), &params.ns);
    let labels = params.expanded_label_selector();
    let reached = wait_for(
        &api,
        Some(&params.name),
        labels.as_deref(),
        Expect::FullyReady,
        params.timeout,
    )
    .await?;
    readiness_outcome(
        reached,
        params,
        format!("statefulset '{}' failed to recover within {}s", params.name, params.timeout),
    )
}

/// Wait until the statefulset is missing at least one ready replica
#[instrument(skip(client))]
pub async fn statefulset_not_fully_available(client: &Client, params: &ReadinessParams) -> AppResult<bool> {
    let api: Api<StatefulSet> = Api::namespaced(client.clone(), &params.ns);
    let labels = params.expanded_label_selector();
    let reached = wait_for(
        &api,
        Some(&params.name),
        labels.as_deref(),
        Expect::Degraded,
        params.timeout,
    )
    .await?;
    readiness_outcome(
        reached,
        params,
        format!("statefulset '{}' failed to stop running within {}s", params.name, params.timeout),
    )
}
