//! Derived topology graph types.
//!
//! The graph is recomputed on demand from the current inventory snapshot
//! and never persisted.

use serde::{Deserialize, Serialize};

use crate::ids::DeviceId;

/// One node per known device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: DeviceId,
    /// Hostname when known, otherwise the management IP.
    pub label: String,
    pub vendor: Option<String>,
    pub ip: String,
}

/// One edge per resolvable neighbor observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: DeviceId,
    pub target: DeviceId,
    pub local_if: Option<String>,
    pub remote_port: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}
