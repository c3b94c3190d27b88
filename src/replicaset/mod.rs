//! ReplicaSet actions

use k8s_openapi::api::apps::v1::ReplicaSet;
use kube::api::Api;
use kube::Client;
use tracing::instrument;

use crate::error::AppResult;
use crate::k8s::workload::{delete_matching, DeleteWorkloadParams};

#[instrument(skip(client))]
pub async fn delete_replica_set(client: &Client, params: &DeleteWorkloadParams) -> AppResult<Vec<String>> {
    let api: Api<ReplicaSet> = Api::namespaced(client.clone(), &params.ns);
    delete_matching(&api, params.name.as_deref(), params.label_selector.as_deref()).await
}
