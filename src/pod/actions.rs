use std::time::Duration;

use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::{Api, AttachParams, DeleteParams};
use kube::{Client, ResourceExt};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{info, instrument, warn};

use super::selection::{select_pods, PodSelection};
use crate::error::{AppError, AppResult};
use crate::k8s::sampling::RandomSource;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TerminatePodsParams {
    #[serde(flatten)]
    pub selection: PodSelection,
    /// Negative means "use the pod's own grace period"
    pub grace_period: i64,
}

impl Default for TerminatePodsParams {
    fn default() -> Self {
        Self {
            selection: PodSelection::default(),
            grace_period: -1,
        }
    }
}

/// Delete the selected pods. Returns their names.
#[instrument(skip(client, rng))]
pub async fn terminate_pods(
    client: &Client,
    params: &TerminatePodsParams,
    rng: &mut dyn RandomSource,
) -> AppResult<Vec<String>> {
    let pods = select_pods(client, &params.selection, rng).await?;

    let delete_params = DeleteParams {
        grace_period_seconds: u32::try_from(params.grace_period).ok(),
        ..Default::default()
    };

    let api: Api<Pod> = Api::namespaced(client.clone(), &params.selection.ns);
    let mut terminated = Vec::with_capacity(pods.len());
    for pod in pods {
        let name = pod.name_any();
        api.delete(&name, &delete_params)
            .await
            .map_err(|e| AppError::request(&format!("Failed to delete pod '{}'", name), e))?;
        info!(pod = %name, namespace = %params.selection.ns, "Terminated pod");
        terminated.push(name);
    }
    Ok(terminated)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecInPodsParams {
    pub cmd: String,
    #[serde(flatten)]
    pub selection: PodSelection,
    /// Run only in pods carrying this container; the default container otherwise
    pub container_name: Option<String>,
    pub request_timeout: u64,
}

impl Default for ExecInPodsParams {
    fn default() -> Self {
        Self {
            cmd: String::new(),
            selection: PodSelection::default(),
            container_name: None,
            request_timeout: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecResult {
    pub pod_name: String,
    pub exit_code: i32,
    pub cmd: String,
    pub stdout: String,
    pub stderr: String,
}

/// Run a command in every selected pod
#[instrument(skip(client, rng))]
pub async fn exec_in_pods(
    client: &Client,
    params: &ExecInPodsParams,
    rng: &mut dyn RandomSource,
) -> AppResult<Vec<ExecResult>> {
    let command: Vec<String> = params.cmd.split_whitespace().map(String::from).collect();
    if command.is_empty() {
        return Err(AppError::configuration("A command must be set to run a container"));
    }

    let pods = select_pods(client, &params.selection, rng).await?;
    let api: Api<Pod> = Api::namespaced(client.clone(), &params.selection.ns);

    let mut results = Vec::new();
    for pod in pods.iter().filter(|p| has_container(p, params.container_name.as_deref())) {
        let name = pod.name_any();
        let run = exec_one(&api, &name, params.container_name.as_deref(), &command);
        let result = tokio::time::timeout(Duration::from_secs(params.request_timeout), run)
            .await
            .map_err(|_| {
                AppError::Request {
                    context: format!("Failed to exec in pod '{}'", name),
                    reason: "Timeout".to_string(),
                    message: format!("no answer within {}s", params.request_timeout),
                    code: 0,
                }
            })??;
        info!(pod = %name, exit_code = result.exit_code, "Executed command");
        results.push(result);
    }
    Ok(results)
}

fn has_container(pod: &Pod, container: Option<&str>) -> bool {
    match container {
        None => true,
        Some(wanted) => pod
            .spec
            .as_ref()
            .map(|s| s.containers.iter().any(|c| c.name == wanted))
            .unwrap_or(false),
    }
}

async fn exec_one(
    api: &Api<Pod>,
    pod: &str,
    container: Option<&str>,
    command: &[String],
) -> AppResult<ExecResult> {
    let mut attach = AttachParams::default().stdin(false).stdout(true).stderr(true);
    if let Some(container) = container {
        attach = attach.container(container);
    }

    let mut process = api
        .exec(pod, command.to_vec(), &attach)
        .await
        .map_err(|e| AppError::request(&format!("Failed to exec in pod '{}'", pod), e))?;

    let stdout = process.stdout();
    let stderr = process.stderr();
    let status = process.take_status();
    let (stdout, stderr) = tokio::join!(read_stream(stdout), read_stream(stderr));
    let status = match status {
        Some(status) => status.await,
        None => None,
    };

    let (exit_code, message) = exit_status(status.as_ref());
    Ok(ExecResult {
        pod_name: pod.to_string(),
        exit_code,
        cmd: command.join(" "),
        stdout,
        stderr: if stderr.is_empty() { message } else { stderr },
    })
}

async fn read_stream<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let mut out = String::new();
    if let Some(mut reader) = reader {
        if let Err(e) = reader.read_to_string(&mut out).await {
            warn!("Failed to read exec output: {}", e);
        }
    }
    out
}

/// Exit code and message carried by the final exec status
pub fn exit_status(status: Option<&Status>) -> (i32, String) {
    let Some(status) = status else {
        return (0, String::new());
    };
    if status.status.as_deref() == Some("Success") {
        return (0, String::new());
    }

    let code = status
        .details
        .as_ref()
        .and_then(|d| d.causes.as_ref())
        .and_then(|causes| {
            causes
                .iter()
                .find(|c| c.reason.as_deref() == Some("ExitCode"))
                .or_else(|| causes.first())
        })
        .and_then(|c| c.message.as_deref())
        .and_then(|m| m.parse::<i32>().ok())
        .unwrap_or(1);
    (code, status.message.clone().unwrap_or_default())
}
