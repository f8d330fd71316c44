//! Core data model definitions shared across Trellis crates.
#![allow(missing_docs)]

pub mod device;
pub mod ids;
pub mod observation;
pub mod topology;

pub use device::{Device, Interface, Neighbor, Protocol, Service};
pub use ids::DeviceId;
pub use observation::{
    HostFacts, InterfaceFacts, NeighborFacts, ScanProfile, ServiceFacts,
    SnmpFacts,
};
pub use topology::{Edge, Node, TopologyGraph};
