//! Node actions and probes: selection, cordon, drain, delete

pub mod actions;
pub mod drain;
pub mod probes;
pub mod selection;

pub use actions::{
    cordon_node, create_node, delete_nodes, uncordon_node, CordonParams, CreateNodeParams,
    DeleteNodesParams,
};
pub use drain::{classify_pod, drain_nodes, DrainParams, PodDisposition};
pub use probes::{get_nodes, GetNodesParams};
pub use selection::{select_nodes, NodeTarget};
