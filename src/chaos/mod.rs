//! Chaos Mesh faults
//!
//! Builds typed `NetworkChaos` / `StressChaos` objects and manages them
//! through the custom resource calls:
//! - Latency, loss, duplication, corruption, reordering and bandwidth caps
//! - CPU and memory stressors

pub mod network;
pub mod stress;
pub mod types;

pub use network::{
    add_latency, corrupt_packets, delete_network_fault, duplicate_packets, get_network_fault,
    get_network_faults, reorder_packets, set_bandwidth, set_loss,
};
pub use stress::{delete_stressor, get_stressor, get_stressors, stress_cpu, stress_memory};
pub use types::*;
