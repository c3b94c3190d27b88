//! Chaos Mesh resource types
//!
//! Typed `NetworkChaos` and `StressChaos` bodies. Everything is validated by
//! the builders before it is serialized, so a spec that reaches the API
//! server is always well formed.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::crd::CrdRef;
use crate::error::{AppError, AppResult};
use crate::k8s::selectors::{parse_key_values, split_list};

pub const CHAOS_MESH_GROUP: &str = "chaos-mesh.org";
pub const CHAOS_MESH_VERSION: &str = "v1alpha1";

/// Custom resource type holding network faults
pub fn network_chaos_crd() -> CrdRef {
    CrdRef::new(CHAOS_MESH_GROUP, CHAOS_MESH_VERSION, "networkchaos")
}

/// Custom resource type holding stressors
pub fn stress_chaos_crd() -> CrdRef {
    CrdRef::new(CHAOS_MESH_GROUP, CHAOS_MESH_VERSION, "stresschaos")
}

/// How many of the selected pods a fault lands on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SelectorMode {
    #[default]
    One,
    All,
    Fixed,
    FixedPercent,
    RandomMaxPercent,
}

impl SelectorMode {
    /// Modes that only make sense together with a value
    pub fn needs_value(self) -> bool {
        matches!(
            self,
            SelectorMode::Fixed | SelectorMode::FixedPercent | SelectorMode::RandomMaxPercent
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    #[default]
    To,
    From,
    Both,
}

/// A comma separated string or an explicit list
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ListArg {
    Text(String),
    Items(Vec<String>),
}

impl ListArg {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            ListArg::Text(text) => split_list(&text),
            ListArg::Items(items) => items,
        }
    }
}

/// A `k=v,k2=v2` string or an explicit mapping
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum KeyValuesArg {
    Text(String),
    Map(BTreeMap<String, String>),
}

impl KeyValuesArg {
    pub fn into_map(self) -> AppResult<BTreeMap<String, String>> {
        match self {
            KeyValuesArg::Text(text) => parse_key_values(&text),
            KeyValuesArg::Map(map) => Ok(map),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSelectorSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_selectors: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation_selectors: Option<BTreeMap<String, String>>,
}

impl PodSelectorSpec {
    pub fn from_args(
        namespaces: Option<ListArg>,
        labels: Option<KeyValuesArg>,
        annotations: Option<KeyValuesArg>,
    ) -> AppResult<Self> {
        Ok(Self {
            namespaces: namespaces.map(ListArg::into_vec).filter(|n| !n.is_empty()),
            label_selectors: labels.map(KeyValuesArg::into_map).transpose()?.filter(|m| !m.is_empty()),
            annotation_selectors: annotations
                .map(KeyValuesArg::into_map)
                .transpose()?
                .filter(|m| !m.is_empty()),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_none() && self.label_selectors.is_none() && self.annotation_selectors.is_none()
    }
}

fn checked_value(mode: SelectorMode, value: Option<String>, what: &str) -> AppResult<Option<String>> {
    match (mode.needs_value(), value) {
        (true, None) => Err(AppError::Configuration(format!(
            "{} '{}' requires a value",
            what, mode
        ))),
        (true, value) => Ok(value),
        (false, _) => Ok(None),
    }
}

/// Pods selection shared by every Chaos Mesh action
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SelectorArgs {
    pub namespaces_selectors: Option<ListArg>,
    pub label_selectors: Option<KeyValuesArg>,
    pub annotations_selectors: Option<KeyValuesArg>,
    pub mode: SelectorMode,
    pub mode_value: Option<String>,
}

/// The far end of a network fault
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TargetArgs {
    pub direction: Direction,
    pub external_targets: Option<ListArg>,
    pub target_mode: SelectorMode,
    pub target_mode_value: Option<String>,
    pub target_namespaces_selectors: Option<ListArg>,
    pub target_label_selectors: Option<KeyValuesArg>,
    pub target_annotations_selectors: Option<KeyValuesArg>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetSpec {
    pub mode: SelectorMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub selector: PodSelectorSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DelaySpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LossSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DuplicateSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CorruptSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrupt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReorderSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reorder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandwidthSpec {
    pub rate: String,
    pub limit: u64,
    pub buffer: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peakrate: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minburst: Option<u64>,
}

/// The fault itself: `action` plus the matching settings block
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum NetworkFault {
    Delay { delay: DelaySpec },
    Loss { loss: LossSpec },
    Duplicate { duplicate: DuplicateSpec },
    Corrupt { corrupt: CorruptSpec },
    Reorder { reorder: ReorderSpec },
    Bandwidth { bandwidth: BandwidthSpec },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkChaosSpec {
    #[serde(flatten)]
    pub fault: NetworkFault,
    pub mode: SelectorMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub selector: PodSelectorSpec,
    pub direction: Direction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_targets: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

impl NetworkChaosSpec {
    /// Validate the selection and the target, then assemble the `spec` block
    pub fn build(
        fault: NetworkFault,
        selection: SelectorArgs,
        target: TargetArgs,
        duration: Option<String>,
    ) -> AppResult<Self> {
        let value = checked_value(selection.mode, selection.mode_value, "mode")?;
        let selector = PodSelectorSpec::from_args(
            selection.namespaces_selectors,
            selection.label_selectors,
            selection.annotations_selectors,
        )?;

        let target_selector = PodSelectorSpec::from_args(
            target.target_namespaces_selectors,
            target.target_label_selectors,
            target.target_annotations_selectors,
        )?;
        let target_spec = if target_selector.is_empty() {
            None
        } else {
            Some(TargetSpec {
                mode: target.target_mode,
                value: checked_value(target.target_mode, target.target_mode_value, "target mode")?,
                selector: target_selector,
            })
        };

        if target.direction != Direction::To && target_spec.is_none() {
            return Err(AppError::Configuration(format!(
                "direction '{}' requires a target selector",
                target.direction
            )));
        }

        Ok(Self {
            fault,
            mode: selection.mode,
            value,
            selector,
            direction: target.direction,
            target: target_spec,
            external_targets: target
                .external_targets
                .map(ListArg::into_vec)
                .filter(|t| !t.is_empty()),
            duration,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuStressor {
    pub workers: u32,
    pub load: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStressor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oom_score_adj: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stressors {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuStressor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryStressor>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StressChaosSpec {
    pub mode: SelectorMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub selector: PodSelectorSpec,
    pub stressors: Stressors,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stressng_stressors: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_names: Option<Vec<String>>,
    pub duration: String,
}

impl StressChaosSpec {
    pub fn build(
        stressors: Stressors,
        selection: SelectorArgs,
        container_names: Option<ListArg>,
        stressng_stressors: Option<String>,
        duration: String,
    ) -> AppResult<Self> {
        if stressors.cpu.is_none() && stressors.memory.is_none() && stressng_stressors.is_none() {
            return Err(AppError::configuration("at least one stressor must be given"));
        }
        Ok(Self {
            mode: selection.mode,
            value: checked_value(selection.mode, selection.mode_value, "mode")?,
            selector: PodSelectorSpec::from_args(
                selection.namespaces_selectors,
                selection.label_selectors,
                selection.annotations_selectors,
            )?,
            stressors,
            stressng_stressors,
            container_names: container_names.map(ListArg::into_vec).filter(|c| !c.is_empty()),
            duration,
        })
    }
}

/// A complete Chaos Mesh object, ready to be posted
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChaosResource<S> {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: S,
}

impl<S: Serialize> ChaosResource<S> {
    pub fn new(kind: &str, name: &str, ns: &str, spec: S) -> AppResult<Self> {
        if name.trim().is_empty() {
            return Err(AppError::configuration("a fault needs a name"));
        }
        Ok(Self {
            api_version: format!("{}/{}", CHAOS_MESH_GROUP, CHAOS_MESH_VERSION),
            kind: kind.to_string(),
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(ns.to_string()),
                ..Default::default()
            },
            spec,
        })
    }

    pub fn to_body(&self) -> AppResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn labels(text: &str) -> Option<KeyValuesArg> {
        Some(KeyValuesArg::Text(text.to_string()))
    }

    #[test]
    fn test_delay_spec_serializes_action_and_block() {
        let spec = NetworkChaosSpec::build(
            NetworkFault::Delay {
                delay: DelaySpec {
                    latency: Some("100ms".to_string()),
                    ..Default::default()
                },
            },
            SelectorArgs {
                label_selectors: labels("app=web"),
                ..Default::default()
            },
            TargetArgs::default(),
            None,
        )
        .unwrap();

        let body = serde_json::to_value(&spec).unwrap();
        assert_eq!(body["action"], "delay");
        assert_eq!(body["delay"], json!({"latency": "100ms"}));
        assert_eq!(body["mode"], "one");
        assert_eq!(body["direction"], "to");
        assert_eq!(body["selector"], json!({"labelSelectors": {"app": "web"}}));
        assert!(body.get("target").is_none());
        assert!(body.get("value").is_none());
    }

    #[test]
    fn test_mode_value_is_required_for_counted_modes() {
        let selection = SelectorArgs {
            mode: SelectorMode::FixedPercent,
            ..Default::default()
        };
        let err = NetworkChaosSpec::build(
            NetworkFault::Loss { loss: LossSpec::default() },
            selection,
            TargetArgs::default(),
            None,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "mode 'fixed-percent' requires a value");
    }

    #[test]
    fn test_direction_from_needs_a_target() {
        let target = TargetArgs {
            direction: Direction::Both,
            ..Default::default()
        };
        assert!(matches!(
            NetworkChaosSpec::build(
                NetworkFault::Loss { loss: LossSpec::default() },
                SelectorArgs::default(),
                target.clone(),
                None,
            ),
            Err(AppError::Configuration(_))
        ));

        let target = TargetArgs {
            target_namespaces_selectors: Some(ListArg::Text("db,cache".to_string())),
            ..target
        };
        let spec = NetworkChaosSpec::build(
            NetworkFault::Loss { loss: LossSpec::default() },
            SelectorArgs::default(),
            target,
            None,
        )
        .unwrap();
        let target = spec.target.unwrap();
        assert_eq!(target.selector.namespaces, Some(vec!["db".to_string(), "cache".to_string()]));
        assert_eq!(target.mode, SelectorMode::One);
    }

    #[test]
    fn test_stress_spec_needs_a_stressor() {
        assert!(StressChaosSpec::build(
            Stressors::default(),
            SelectorArgs::default(),
            None,
            None,
            "30s".to_string()
        )
        .is_err());

        let spec = StressChaosSpec::build(
            Stressors {
                memory: Some(MemoryStressor {
                    size: Some("256MB".to_string()),
                    oom_score_adj: Some(-100),
                    ..Default::default()
                }),
                ..Default::default()
            },
            SelectorArgs::default(),
            Some(ListArg::Items(vec!["app".to_string()])),
            None,
            "30s".to_string(),
        )
        .unwrap();
        let body = serde_json::to_value(&spec).unwrap();
        assert_eq!(body["stressors"]["memory"], json!({"size": "256MB", "oomScoreAdj": -100}));
        assert_eq!(body["containerNames"], json!(["app"]));
        assert!(body.get("direction").is_none());
    }

    #[test]
    fn test_resource_wraps_spec_with_metadata() {
        let resource = ChaosResource::new("StressChaos", "burn", "shop", json!({})).unwrap();
        let body = resource.to_body().unwrap();
        assert_eq!(body["apiVersion"], "chaos-mesh.org/v1alpha1");
        assert_eq!(body["metadata"]["namespace"], "shop");
        assert!(ChaosResource::new("StressChaos", " ", "shop", json!({})).is_err());
    }
}
