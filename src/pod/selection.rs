//! Choosing which pods an action applies to

use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams};
use kube::{Client, ResourceExt};
use regex::Regex;
use serde::Deserialize;
use strum::{Display, EnumString};
use tracing::{debug, instrument};

use crate::error::{AppError, AppResult};
use crate::k8s::default_namespace;
use crate::k8s::sampling::{pick, Pick, RandomSource};

/// How `qty` is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum QuantityMode {
    Fixed,
    Percentage,
}

/// Ordering applied before the first `qty` pods are taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum PodOrder {
    Alphabetic,
    Oldest,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PodSelection {
    pub label_selector: Option<String>,
    pub name_pattern: Option<String>,
    pub all: bool,
    pub rand: bool,
    pub mode: String,
    pub qty: i64,
    pub ns: String,
    pub order: String,
}

impl Default for PodSelection {
    fn default() -> Self {
        Self {
            label_selector: None,
            name_pattern: None,
            all: false,
            rand: false,
            mode: QuantityMode::Fixed.to_string(),
            qty: 1,
            ns: default_namespace(),
            order: PodOrder::Alphabetic.to_string(),
        }
    }
}

/// A [`PodSelection`] whose inputs have been checked
#[derive(Debug, Clone)]
pub struct SelectionPlan {
    pub mode: QuantityMode,
    pub order: PodOrder,
    pub qty: usize,
    pub name_pattern: Option<Regex>,
    pub all: bool,
    pub rand: bool,
}

impl PodSelection {
    /// Reject bad input before anything is sent to the cluster
    pub fn plan(&self) -> AppResult<SelectionPlan> {
        if self.qty < 0 {
            return Err(AppError::Configuration(format!(
                "Cannot select pods. Quantity '{}' is negative.",
                self.qty
            )));
        }
        let mode = self.mode.parse::<QuantityMode>().map_err(|_| {
            AppError::Configuration(format!("Cannot select pods. Mode '{}' is invalid.", self.mode))
        })?;
        let order = self.order.parse::<PodOrder>().map_err(|_| {
            AppError::Configuration(format!(
                "Cannot select pods. Order '{}' is invalid.",
                self.order
            ))
        })?;
        let name_pattern = self
            .name_pattern
            .as_deref()
            .map(|p| Regex::new(&format!("^(?:{})", p)))
            .transpose()
            .map_err(|e| AppError::Configuration(format!("invalid name pattern: {}", e)))?;

        Ok(SelectionPlan {
            mode,
            order,
            qty: self.qty as usize,
            name_pattern,
            all: self.all,
            rand: self.rand,
        })
    }
}

impl SelectionPlan {
    /// Narrow a pod list: name filter, ordering, then quantity
    pub fn apply(&self, pods: Vec<Pod>, rng: &mut dyn RandomSource) -> Vec<Pod> {
        let mut pods: Vec<Pod> = match &self.name_pattern {
            Some(re) => pods.into_iter().filter(|p| re.is_match(&p.name_any())).collect(),
            None => pods,
        };

        match self.order {
            PodOrder::Alphabetic => pods.sort_by_key(|p| p.name_any()),
            PodOrder::Oldest => pods.sort_by_key(|p| p.creation_timestamp().map(|t| t.0)),
        }

        if self.all {
            return pods;
        }

        let qty = match self.mode {
            QuantityMode::Fixed => self.qty,
            QuantityMode::Percentage => self.qty.saturating_mul(pods.len()).saturating_add(99) / 100,
        }
        .min(pods.len());

        if self.rand {
            pick(pods, Pick::Random(qty), rng)
        } else {
            pods.truncate(qty);
            pods
        }
    }
}

/// List pods in the selection namespace and narrow them down
#[instrument(skip(client, rng))]
pub async fn select_pods(
    client: &Client,
    selection: &PodSelection,
    rng: &mut dyn RandomSource,
) -> AppResult<Vec<Pod>> {
    let plan = selection.plan()?;

    let api: Api<Pod> = Api::namespaced(client.clone(), &selection.ns);
    let mut params = ListParams::default();
    if let Some(labels) = selection.label_selector.as_deref().filter(|l| !l.is_empty()) {
        params = params.labels(labels);
    }
    let list = api
        .list(&params)
        .await
        .map_err(|e| AppError::request("Failed to list pods", e))?;

    let selected = plan.apply(list.items, rng);
    debug!(
        pods = ?selected.iter().map(|p| p.name_any()).collect::<Vec<_>>(),
        "Selected pods"
    );
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::sampling::MockRandomSource;
    use serde_json::json;

    fn pods(names: &[(&str, &str)]) -> Vec<Pod> {
        names
            .iter()
            .map(|(name, created)| {
                serde_json::from_value(json!({
                    "metadata": {"name": name, "creationTimestamp": created},
                    "spec": {"containers": []}
                }))
                .unwrap()
            })
            .collect()
    }

    fn names(pods: &[Pod]) -> Vec<String> {
        pods.iter().map(|p| p.name_any()).collect()
    }

    fn sample() -> Vec<Pod> {
        pods(&[
            ("web-b", "2024-01-02T00:00:00Z"),
            ("web-a", "2024-01-03T00:00:00Z"),
            ("db-0", "2024-01-01T00:00:00Z"),
        ])
    }

    #[test]
    fn test_negative_quantity_is_rejected() {
        let selection = PodSelection {
            qty: -1,
            ..Default::default()
        };
        let err = selection.plan().unwrap_err();
        assert_eq!(err.to_string(), "Cannot select pods. Quantity '-1' is negative.");
    }

    #[test]
    fn test_unknown_mode_and_order_are_rejected() {
        let bad_mode = PodSelection {
            mode: "some".to_string(),
            ..Default::default()
        };
        assert!(matches!(bad_mode.plan(), Err(AppError::Configuration(_))));

        let bad_order = PodSelection {
            order: "newest".to_string(),
            ..Default::default()
        };
        assert!(matches!(bad_order.plan(), Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_name_pattern_is_anchored_at_start() {
        let mut rng = MockRandomSource::new();
        let plan = PodSelection {
            name_pattern: Some("web-".to_string()),
            all: true,
            ..Default::default()
        }
        .plan()
        .unwrap();
        let mut more = sample();
        more.extend(pods(&[("old-web-c", "2024-01-04T00:00:00Z")]));

        assert_eq!(names(&plan.apply(more, &mut rng)), vec!["web-a", "web-b"]);
    }

    #[test]
    fn test_quantity_is_capped_at_match_count() {
        let mut rng = MockRandomSource::new();
        let plan = PodSelection {
            qty: 10,
            ..Default::default()
        }
        .plan()
        .unwrap();
        assert_eq!(plan.apply(sample(), &mut rng).len(), 3);
    }

    #[test]
    fn test_percentage_rounds_up_and_oldest_first() {
        let mut rng = MockRandomSource::new();
        let plan = PodSelection {
            mode: "percentage".to_string(),
            qty: 40,
            order: "oldest".to_string(),
            ..Default::default()
        }
        .plan()
        .unwrap();
        // ceil(40% of 3) = 2
        assert_eq!(names(&plan.apply(sample(), &mut rng)), vec!["db-0", "web-b"]);
    }

    #[test]
    fn test_huge_percentage_takes_everything() {
        let mut rng = MockRandomSource::new();
        let plan = PodSelection {
            mode: "percentage".to_string(),
            qty: i64::MAX,
            ..Default::default()
        }
        .plan()
        .unwrap();
        assert_eq!(plan.apply(sample(), &mut rng).len(), 3);
    }

    #[test]
    fn test_rand_delegates_to_source() {
        let mut rng = MockRandomSource::new();
        rng.expect_sample()
            .withf(|len, amount| *len == 3 && *amount == 1)
            .times(1)
            .returning(|_, _| vec![2]);
        let plan = PodSelection {
            rand: true,
            ..Default::default()
        }
        .plan()
        .unwrap();
        assert_eq!(names(&plan.apply(sample(), &mut rng)), vec!["web-b"]);
    }
}
