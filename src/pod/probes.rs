use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams, LogParams};
use kube::{Client, ResourceExt};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{AppError, AppResult};
use crate::k8s::default_namespace;
use crate::k8s::selectors::expand_name_template;

fn default_name_selector() -> String {
    "name in ({name})".to_string()
}

fn default_phase() -> String {
    "Running".to_string()
}

async fn list_pods(client: &Client, ns: &str, label_selector: Option<&str>) -> AppResult<Vec<Pod>> {
    let api: Api<Pod> = Api::namespaced(client.clone(), ns);
    let mut params = ListParams::default();
    if let Some(labels) = label_selector.filter(|l| !l.is_empty()) {
        params = params.labels(labels);
    }
    let list = api
        .list(&params)
        .await
        .map_err(|e| AppError::request("Failed to list pods", e))?;
    Ok(list.items)
}

fn phase_of(pod: &Pod) -> &str {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .unwrap_or("Unknown")
}

/// Parse a relative duration such as `30s`, `5 minutes` or `2h` into seconds
pub fn parse_since(last: &str) -> AppResult<i64> {
    let trimmed = last.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (amount, unit) = trimmed.split_at(split);
    let amount: i64 = amount
        .parse()
        .map_err(|_| AppError::Configuration(format!("cannot read duration '{}'", last)))?;

    let duration = match unit.trim().to_lowercase().as_str() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => chrono::Duration::seconds(amount),
        "m" | "min" | "mins" | "minute" | "minutes" => chrono::Duration::minutes(amount),
        "h" | "hour" | "hours" => chrono::Duration::hours(amount),
        "d" | "day" | "days" => chrono::Duration::days(amount),
        other => {
            return Err(AppError::Configuration(format!(
                "unknown duration unit '{}' in '{}'",
                other, last
            )))
        }
    };
    Ok(duration.num_seconds())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReadPodLogsParams {
    pub name: Option<String>,
    /// Only logs newer than this relative duration, e.g. `10 minutes`
    pub last: Option<String>,
    pub ns: String,
    pub from_previous: bool,
    pub label_selector: String,
    pub container_name: Option<String>,
}

impl Default for ReadPodLogsParams {
    fn default() -> Self {
        Self {
            name: None,
            last: None,
            ns: default_namespace(),
            from_previous: false,
            label_selector: default_name_selector(),
            container_name: None,
        }
    }
}

/// Fetch logs of every matching pod, keyed by pod name
#[instrument(skip(client))]
pub async fn read_pod_logs(
    client: &Client,
    params: &ReadPodLogsParams,
) -> AppResult<BTreeMap<String, String>> {
    let since_seconds = params.last.as_deref().map(parse_since).transpose()?;
    let selector = match &params.name {
        Some(name) => expand_name_template(&params.label_selector, name),
        None => params.label_selector.clone(),
    };

    let pods = list_pods(client, &params.ns, Some(&selector)).await?;
    debug!(count = pods.len(), "Found pods");

    let api: Api<Pod> = Api::namespaced(client.clone(), &params.ns);
    let log_params = LogParams {
        container: params.container_name.clone(),
        previous: params.from_previous,
        since_seconds,
        timestamps: true,
        ..Default::default()
    };

    let mut logs = BTreeMap::new();
    for pod in pods {
        let name = pod.name_any();
        let text = api
            .logs(&name, &log_params)
            .await
            .map_err(|e| AppError::request(&format!("Failed to read logs of pod '{}'", name), e))?;
        logs.insert(name, text);
    }
    Ok(logs)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PodPhaseParams {
    pub label_selector: String,
    pub phase: String,
    pub ns: String,
}

impl Default for PodPhaseParams {
    fn default() -> Self {
        Self {
            label_selector: String::new(),
            phase: default_phase(),
            ns: default_namespace(),
        }
    }
}

/// All matching pods are in `phase`; fails when none match
#[instrument(skip(client))]
pub async fn pods_in_phase(client: &Client, params: &PodPhaseParams) -> AppResult<bool> {
    let pods = list_pods(client, &params.ns, Some(&params.label_selector)).await?;
    if pods.is_empty() {
        return Err(AppError::NotFound(format!(
            "no pods '{}' were found",
            params.label_selector
        )));
    }

    for pod in &pods {
        let phase = phase_of(pod);
        if phase != params.phase {
            return Err(AppError::Probe(format!(
                "pod '{}' is in phase '{}' but should be '{}'",
                params.label_selector, phase, params.phase
            )));
        }
    }
    Ok(true)
}

/// No matching pod is in `phase`; fails when none match
#[instrument(skip(client))]
pub async fn pods_not_in_phase(client: &Client, params: &PodPhaseParams) -> AppResult<bool> {
    let pods = list_pods(client, &params.ns, Some(&params.label_selector)).await?;
    if pods.is_empty() {
        return Err(AppError::NotFound(format!(
            "no pods '{}' were found",
            params.label_selector
        )));
    }

    for pod in &pods {
        if phase_of(pod) == params.phase {
            return Err(AppError::Probe(format!(
                "pod '{}' should not be in phase '{}'",
                params.label_selector, params.phase
            )));
        }
    }
    Ok(true)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PodCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PodConditionsParams {
    pub label_selector: String,
    pub conditions: Vec<PodCondition>,
    pub ns: String,
}

impl Default for PodConditionsParams {
    fn default() -> Self {
        Self {
            label_selector: String::new(),
            conditions: Vec::new(),
            ns: default_namespace(),
        }
    }
}

/// Every matching pod reports each of the given conditions
#[instrument(skip(client))]
pub async fn pods_in_conditions(client: &Client, params: &PodConditionsParams) -> AppResult<bool> {
    let pods = list_pods(client, &params.ns, Some(&params.label_selector)).await?;
    if pods.is_empty() {
        return Err(AppError::NotFound(format!(
            "no pods '{}' were found",
            params.label_selector
        )));
    }

    for pod in &pods {
        let observed: Vec<PodCondition> = pod
            .status
            .as_ref()
            .and_then(|s| s.conditions.as_ref())
            .map(|conds| {
                conds
                    .iter()
                    .map(|c| PodCondition {
                        type_: c.type_.clone(),
                        status: c.status.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        if let Some(missing) = params.conditions.iter().find(|c| !observed.contains(c)) {
            return Err(AppError::Probe(format!(
                "pod {} does not match the following given condition: {:?}",
                pod.name_any(),
                missing
            )));
        }
    }
    Ok(true)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CountPodsParams {
    pub label_selector: String,
    pub phase: Option<String>,
    pub ns: String,
}

impl Default for CountPodsParams {
    fn default() -> Self {
        Self {
            label_selector: String::new(),
            phase: None,
            ns: default_namespace(),
        }
    }
}

/// Number of matching pods, optionally only those in `phase`
#[instrument(skip(client))]
pub async fn count_pods(client: &Client, params: &CountPodsParams) -> AppResult<usize> {
    let pods = list_pods(client, &params.ns, Some(&params.label_selector)).await?;
    Ok(pods
        .iter()
        .filter(|p| params.phase.as_deref().map_or(true, |phase| phase_of(p) == phase))
        .count())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PodAvailabilityParams {
    pub name: String,
    pub ns: String,
    pub label_selector: String,
}

impl Default for PodAvailabilityParams {
    fn default() -> Self {
        Self {
            name: String::new(),
            ns: default_namespace(),
            label_selector: default_name_selector(),
        }
    }
}

/// No pod of the named service is running
#[instrument(skip(client))]
pub async fn pod_is_not_available(client: &Client, params: &PodAvailabilityParams) -> AppResult<bool> {
    let selector = expand_name_template(&params.label_selector, &params.name);
    let pods = list_pods(client, &params.ns, Some(&selector)).await?;

    if pods.iter().any(|p| phase_of(p) == "Running") {
        return Err(AppError::Probe(format!(
            "pod '{}' is actually running",
            params.name
        )));
    }
    Ok(true)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NamespaceParams {
    pub ns: String,
}

impl Default for NamespaceParams {
    fn default() -> Self {
        Self {
            ns: default_namespace(),
        }
    }
}

/// Every pod in the namespace is running or has completed
#[instrument(skip(client))]
pub async fn all_pods_healthy(client: &Client, params: &NamespaceParams) -> AppResult<bool> {
    let pods = list_pods(client, &params.ns, None).await?;
    let unhealthy = unhealthy_pods(&pods);
    if !unhealthy.is_empty() {
        debug!(pods = ?unhealthy, "Unhealthy pods");
        return Err(AppError::probe("the system is unhealthy"));
    }
    Ok(true)
}

/// Pods that failed or are neither running nor completed
pub fn unhealthy_pods(pods: &[Pod]) -> Vec<String> {
    pods.iter()
        .filter(|p| !matches!(phase_of(p), "Running" | "Succeeded"))
        .map(|p| p.name_any())
        .collect()
}
