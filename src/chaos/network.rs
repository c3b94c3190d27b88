//! Network faults (`NetworkChaos`)

use kube::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

use super::types::*;
use crate::crd::{self, CreateCustomObjectParams, CustomObjectNameParams, ListCustomObjectsParams};
use crate::error::AppResult;
use crate::k8s::default_namespace;

/// Options every network fault shares
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkFaultArgs {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub ns: String,
    #[serde(flatten)]
    pub selection: SelectorArgs,
    #[serde(flatten)]
    pub target: TargetArgs,
    #[serde(default)]
    pub duration: Option<String>,
}

impl NetworkFaultArgs {
    /// Build the complete `NetworkChaos` body for `fault`
    pub fn into_body(self, fault: NetworkFault) -> AppResult<(String, Value)> {
        let spec = NetworkChaosSpec::build(fault, self.selection, self.target, self.duration)?;
        let body = ChaosResource::new("NetworkChaos", &self.name, &self.ns, spec)?.to_body()?;
        Ok((self.ns, body))
    }
}

async fn inject(client: &Client, args: NetworkFaultArgs, fault: NetworkFault) -> AppResult<Value> {
    let name = args.name.clone();
    let (ns, body) = args.into_body(fault)?;
    let created = crd::create_custom_object(
        client,
        &CreateCustomObjectParams {
            crd: network_chaos_crd(),
            ns,
            resource: Some(body),
            resource_as_yaml_file: None,
        },
    )
    .await?;
    info!(fault = %name, "Injected network fault");
    Ok(created)
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddLatencyParams {
    #[serde(flatten)]
    pub common: NetworkFaultArgs,
    #[serde(default)]
    pub latency: Option<String>,
    #[serde(default)]
    pub jitter: Option<String>,
    #[serde(default)]
    pub correlation: Option<String>,
}

#[instrument(skip(client, params), fields(name = %params.common.name))]
pub async fn add_latency(client: &Client, params: AddLatencyParams) -> AppResult<Value> {
    let fault = NetworkFault::Delay {
        delay: DelaySpec {
            latency: params.latency,
            jitter: params.jitter,
            correlation: params.correlation,
        },
    };
    inject(client, params.common, fault).await
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetLossParams {
    #[serde(flatten)]
    pub common: NetworkFaultArgs,
    #[serde(default)]
    pub loss: Option<String>,
    #[serde(default)]
    pub correlation: Option<String>,
}

#[instrument(skip(client, params), fields(name = %params.common.name))]
pub async fn set_loss(client: &Client, params: SetLossParams) -> AppResult<Value> {
    let fault = NetworkFault::Loss {
        loss: LossSpec {
            loss: params.loss,
            correlation: params.correlation,
        },
    };
    inject(client, params.common, fault).await
}

#[derive(Debug, Clone, Deserialize)]
pub struct DuplicatePacketsParams {
    #[serde(flatten)]
    pub common: NetworkFaultArgs,
    #[serde(default)]
    pub duplicate: Option<String>,
    #[serde(default)]
    pub correlation: Option<String>,
}

#[instrument(skip(client, params), fields(name = %params.common.name))]
pub async fn duplicate_packets(client: &Client, params: DuplicatePacketsParams) -> AppResult<Value> {
    let fault = NetworkFault::Duplicate {
        duplicate: DuplicateSpec {
            duplicate: params.duplicate,
            correlation: params.correlation,
        },
    };
    inject(client, params.common, fault).await
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorruptPacketsParams {
    #[serde(flatten)]
    pub common: NetworkFaultArgs,
    #[serde(default)]
    pub corrupt: Option<String>,
    #[serde(default)]
    pub correlation: Option<String>,
}

#[instrument(skip(client, params), fields(name = %params.common.name))]
pub async fn corrupt_packets(client: &Client, params: CorruptPacketsParams) -> AppResult<Value> {
    let fault = NetworkFault::Corrupt {
        corrupt: CorruptSpec {
            corrupt: params.corrupt,
            correlation: params.correlation,
        },
    };
    inject(client, params.common, fault).await
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReorderPacketsParams {
    #[serde(flatten)]
    pub common: NetworkFaultArgs,
    #[serde(default)]
    pub reorder: Option<String>,
    #[serde(default)]
    pub gap: Option<String>,
    #[serde(default)]
    pub correlation: Option<String>,
}

#[instrument(skip(client, params), fields(name = %params.common.name))]
pub async fn reorder_packets(client: &Client, params: ReorderPacketsParams) -> AppResult<Value> {
    let fault = NetworkFault::Reorder {
        reorder: ReorderSpec {
            reorder: params.reorder,
            gap: params.gap,
            correlation: params.correlation,
        },
    };
    inject(client, params.common, fault).await
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetBandwidthParams {
    #[serde(flatten)]
    pub common: NetworkFaultArgs,
    /// e.g. `1mbps`
    pub rate: String,
    /// Bytes that may wait in queue
    pub limit: u64,
    /// Max bytes sent instantaneously
    pub buffer: u64,
    #[serde(default)]
    pub peakrate: Option<u64>,
    #[serde(default)]
    pub minburst: Option<u64>,
}

#[instrument(skip(client, params), fields(name = %params.common.name))]
pub async fn set_bandwidth(client: &Client, params: SetBandwidthParams) -> AppResult<Value> {
    let fault = NetworkFault::Bandwidth {
        bandwidth: BandwidthSpec {
            rate: params.rate,
            limit: params.limit,
            buffer: params.buffer,
            peakrate: params.peakrate,
            minburst: params.minburst,
        },
    };
    inject(client, params.common, fault).await
}

#[derive(Debug, Clone, Deserialize)]
pub struct FaultNameParams {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub ns: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FaultNamespaceParams {
    #[serde(default = "default_namespace")]
    pub ns: String,
}

#[instrument(skip(client))]
pub async fn delete_network_fault(client: &Client, params: &FaultNameParams) -> AppResult<Value> {
    crd::delete_custom_object(
        client,
        &CustomObjectNameParams {
            crd: network_chaos_crd(),
            name: params.name.clone(),
            ns: params.ns.clone(),
        },
    )
    .await
}

#[instrument(skip(client))]
pub async fn get_network_faults(client: &Client, params: &FaultNamespaceParams) -> AppResult<Value> {
    crd::list_custom_objects(
        client,
        &ListCustomObjectsParams {
            crd: network_chaos_crd(),
            ns: params.ns.clone(),
        },
    )
    .await
}

#[instrument(skip(client))]
pub async fn get_network_fault(client: &Client, params: &FaultNameParams) -> AppResult<Value> {
    crd::get_custom_object(
        client,
        &CustomObjectNameParams {
            crd: network_chaos_crd(),
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
    fn test_latency_args_from_activity_arguments() {
        let params: AddLatencyParams = serde_json::from_value(json!({
            "name": "slow-web",
            "ns": "shop",
            "label_selectors": "app=web,tier=front",
            "mode": "fixed",
            "mode_value": "2",
            "latency": "250ms",
            "jitter": "10ms",
            "duration": "1m"
        }))
        .unwrap();
        assert_eq!(params.common.selection.mode, SelectorMode::Fixed);

        let fault = NetworkFault::Delay {
            delay: DelaySpec {
                latency: params.latency,
                jitter: params.jitter,
                correlation: params.correlation,
            },
        };
        let (ns, body) = params.common.into_body(fault).unwrap();
        assert_eq!(ns, "shop");
        assert_eq!(body["kind"], "NetworkChaos");
        assert_eq!(body["metadata"]["name"], "slow-web");
        assert_eq!(body["spec"]["value"], "2");
        assert_eq!(body["spec"]["duration"], "1m");
        assert_eq!(
            body["spec"]["selector"]["labelSelectors"],
            json!({"app": "web", "tier": "front"})
        );
        assert_eq!(body["spec"]["delay"], json!({"latency": "250ms", "jitter": "10ms"}));
    }

    #[test]
    fn test_bandwidth_is_spelled_correctly() {
        let params: SetBandwidthParams = serde_json::from_value(json!({
            "name": "narrow",
            "rate": "1mbps",
            "limit": 20971520,
            "buffer": 10000,
            "external_targets": ["example.com"]
        }))
        .unwrap();
        let fault = NetworkFault::Bandwidth {
            bandwidth: BandwidthSpec {
                rate: params.rate,
                limit: params.limit,
                buffer: params.buffer,
                peakrate: params.peakrate,
                minburst: params.minburst,
            },
        };
        let (_, body) = params.common.into_body(fault).unwrap();
        assert_eq!(body["spec"]["action"], "bandwidth");
        assert_eq!(body["spec"]["bandwidth"]["rate"], "1mbps");
        assert_eq!(body["spec"]["externalTargets"], json!(["example.com"]));
        assert!(body["spec"].get("bandwdith").is_none());
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let parsed = serde_json::from_value::<SetLossParams>(json!({
            "name": "lossy",
            "mode": "most"
        }));
        assert!(parsed.is_err());
    }
}
