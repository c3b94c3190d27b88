//! Pod actions and probes

pub mod actions;
pub mod probes;
pub mod selection;

pub use actions::{exec_in_pods, terminate_pods, ExecInPodsParams, ExecResult, TerminatePodsParams};
pub use probes::{
    all_pods_healthy, count_pods, pod_is_not_available, pods_in_conditions, pods_in_phase,
    pods_not_in_phase, read_pod_logs, CountPodsParams, NamespaceParams, PodAvailabilityParams,
    PodConditionsParams, PodPhaseParams, ReadPodLogsParams,
};
pub use selection::{select_pods, PodOrder, PodSelection, QuantityMode};
