//! CPU and memory stressors (`StressChaos`)

use kube::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

use super::network::{FaultNameParams, FaultNamespaceParams};
use super::types::*;
use crate::crd::{self, CreateCustomObjectParams, CustomObjectNameParams, ListCustomObjectsParams};
use crate::error::AppResult;
use crate::k8s::default_namespace;

fn default_duration() -> String {
    "30s".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StressArgs {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub ns: String,
    #[serde(flatten)]
    pub selection: SelectorArgs,
    #[serde(default = "default_duration")]
    pub duration: String,
    #[serde(default)]
    pub container_names: Option<ListArg>,
    /// Raw stress-ng options, passed through untouched
    #[serde(default)]
    pub stressng_stressors: Option<String>,
}

impl StressArgs {
    pub fn into_body(self, stressors: Stressors) -> AppResult<(String, Value)> {
        let spec = StressChaosSpec::build(
            stressors,
            self.selection,
            self.container_names,
            self.stressng_stressors,
            self.duration,
        )?;
        let body = ChaosResource::new("StressChaos", &self.name, &self.ns, spec)?.to_body()?;
        Ok((self.ns, body))
    }
}

async fn inject(client: &Client, args: StressArgs, stressors: Stressors) -> AppResult<Value> {
    let name = args.name.clone();
    let (ns, body) = args.into_body(stressors)?;
    let created = crd::create_custom_object(
        client,
        &CreateCustomObjectParams {
            crd: stress_chaos_crd(),
            ns,
            resource: Some(body),
            resource_as_yaml_file: None,
        },
    )
    .await?;
    info!(stressor = %name, "Started stressor");
    Ok(created)
}

#[derive(Debug, Clone, Deserialize)]
pub struct StressCpuParams {
    #[serde(flatten)]
    pub common: StressArgs,
    pub workers: u32,
    /// Percent of each worker's CPU
    pub load: u32,
}

#[instrument(skip(client, params), fields(name = %params.common.name))]
pub async fn stress_cpu(client: &Client, params: StressCpuParams) -> AppResult<Value> {
    let stressors = Stressors {
        cpu: Some(CpuStressor {
            workers: params.workers,
            load: params.load,
        }),
        memory: None,
    };
    inject(client, params.common, stressors).await
}

#[derive(Debug, Clone, Deserialize)]
pub struct StressMemoryParams {
    #[serde(flatten)]
    pub common: StressArgs,
    #[serde(default)]
    pub workers: Option<u32>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub oom_score: Option<i32>,
    #[serde(default)]
    pub time_to_get_to_size: Option<String>,
}

#[instrument(skip(client, params), fields(name = %params.common.name))]
pub async fn stress_memory(client: &Client, params: StressMemoryParams) -> AppResult<Value> {
    let stressors = Stressors {
        cpu: None,
        memory: Some(MemoryStressor {
            workers: params.workers,
            size: params.size,
            time: params.time_to_get_to_size,
            oom_score_adj: params.oom_score,
        }),
    };
    inject(client, params.common, stressors).await
}

#[instrument(skip(client))]
pub async fn delete_stressor(client: &Client, params: &FaultNameParams) -> AppResult<Value> {
    crd::delete_custom_object(
        client,
        &CustomObjectNameParams {
            crd: stress_chaos_crd(),
            name: params.name.clone(),
            ns: params.ns.clone(),
        },
    )
    .await
}

#[instrument(skip(client))]
pub async fn get_stressors(client: &Client, params: &FaultNamespaceParams) -> AppResult<Value> {
    crd::list_custom_objects(
        client,
        &ListCustomObjectsParams {
            crd: stress_chaos_crd(),
            ns: params.ns.clone(),
        },
    )
    .await
}

#[instrument(skip(client))]
pub async fn get_stressor(client: &Client, params: &FaultNameParams) -> AppResult<Value> {
    crd::get_custom_object(
        client,
        &CustomObjectNameParams {
            crd: stress_chaos_crd(),
            name: params.name.clone(),
            ns: params.ns.clone(),
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cpu_stressor_body() {
        let params: StressCpuParams = serde_json::from_value(json!({
            "name": "burn",
            "workers": 2,
            "load": 80,
            "mode": "all",
            "container_names": "app,sidecar"
        }))
        .unwrap();
        let stressors = Stressors {
            cpu: Some(CpuStressor {
                workers: params.workers,
                load: params.load,
            }),
            memory: None,
        };
        let (ns, body) = params.common.into_body(stressors).unwrap();
        assert_eq!(ns, "default");
        assert_eq!(body["kind"], "StressChaos");
        assert_eq!(body["spec"]["duration"], "30s");
        assert_eq!(body["spec"]["mode"], "all");
        assert_eq!(body["spec"]["stressors"], json!({"cpu": {"workers": 2, "load": 80}}));
        assert_eq!(body["spec"]["containerNames"], json!(["app", "sidecar"]));
    }

    #[test]
    fn test_cpu_stressor_requires_workers_and_load() {
        assert!(serde_json::from_value::<StressCpuParams>(json!({"name": "burn"})).is_err());
    }
}
