//! Inventory store port and implementations.
//!
//! The store is the single shared resource of the pipeline: all ingestion
//! writes and all topology reads go through the [`Inventory`] trait. Child
//! collections (interfaces, services, neighbors) follow a full-replace
//! lifecycle scoped to one device, and a replace must be atomic as observed
//! by any concurrent reader.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use trellis_model::{Device, DeviceId, Interface, Neighbor, Service};

use crate::error::Result;

#[async_trait]
pub trait Inventory: Send + Sync {
    /// Find the device owning `mgmt_ip`, creating it (with `first_seen`
    /// set to now) when absent. The store never holds two devices with the
    /// same management IP.
    async fn find_or_create_device(&self, mgmt_ip: &str) -> Result<Device>;

    /// Persist the scalar columns of an existing device.
    async fn update_device(&self, device: &Device) -> Result<()>;

    async fn get_device(&self, id: DeviceId) -> Result<Option<Device>>;
    async fn get_device_by_ip(&self, mgmt_ip: &str) -> Result<Option<Device>>;
    async fn list_devices(&self) -> Result<Vec<Device>>;

    async fn list_interfaces(&self, device: DeviceId) -> Result<Vec<Interface>>;
    async fn list_services(&self, device: DeviceId) -> Result<Vec<Service>>;
    /// All neighbor observations, ordered by local device id then insertion
    /// order. The synthesizer relies on this ordering for deterministic
    /// edge dedup.
    async fn list_neighbors(&self) -> Result<Vec<Neighbor>>;

    /// Atomically discard and rebuild the interface set of one device.
    async fn replace_interfaces(
        &self,
        device: DeviceId,
        rows: Vec<Interface>,
    ) -> Result<()>;

    /// Atomically discard and rebuild the service set of one device.
    async fn replace_services(
        &self,
        device: DeviceId,
        rows: Vec<Service>,
    ) -> Result<()>;

    /// Atomically discard and rebuild the neighbor observations of one
    /// device. Never touches rows owned by other devices.
    async fn replace_neighbors(
        &self,
        device: DeviceId,
        rows: Vec<Neighbor>,
    ) -> Result<()>;
}
