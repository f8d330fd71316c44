use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use trellis_model::{Device, DeviceId, Interface, Neighbor, Service};

use crate::error::{InventoryError, Result};
use crate::inventory::Inventory;

/// In-memory inventory backend.
///
/// All tables live behind one `RwLock`, so a child replace is a single
/// write-guard critical section: no reader can observe the deleted-but-not-
/// reinserted window. Tables are `BTreeMap`s keyed by device id, which gives
/// `list_neighbors` its deterministic ordering.
#[derive(Debug, Default)]
pub struct MemoryInventory {
    inner: RwLock<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    devices: BTreeMap<DeviceId, Device>,
    by_ip: BTreeMap<String, DeviceId>,
    interfaces: BTreeMap<DeviceId, Vec<Interface>>,
    services: BTreeMap<DeviceId, Vec<Service>>,
    neighbors: BTreeMap<DeviceId, Vec<Neighbor>>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Inventory for MemoryInventory {
    async fn find_or_create_device(&self, mgmt_ip: &str) -> Result<Device> {
        let mut tables = self.inner.write().await;
        if let Some(id) = tables.by_ip.get(mgmt_ip).copied() {
            return tables
                .devices
                .get(&id)
                .cloned()
                .ok_or_else(|| {
                    InventoryError::Conflict(format!(
                        "ip index points at missing device {id}"
                    ))
                });
        }

        tables.next_id += 1;
        let id = DeviceId(tables.next_id);
        let device = Device::new(id, mgmt_ip, Utc::now());
        tables.devices.insert(id, device.clone());
        tables.by_ip.insert(mgmt_ip.to_string(), id);
        Ok(device)
    }

    async fn update_device(&self, device: &Device) -> Result<()> {
        let mut tables = self.inner.write().await;
        if !tables.devices.contains_key(&device.id) {
            return Err(InventoryError::NotFound(format!(
                "device {}",
                device.id
            )));
        }
        // The ip index must follow a mgmt_ip rewrite.
        if let Some(existing) = tables.by_ip.get(&device.mgmt_ip).copied()
            && existing != device.id
        {
            return Err(InventoryError::Conflict(format!(
                "mgmt_ip {} already owned by device {existing}",
                device.mgmt_ip
            )));
        }
        tables.by_ip.retain(|_, id| *id != device.id);
        tables.by_ip.insert(device.mgmt_ip.clone(), device.id);
        tables.devices.insert(device.id, device.clone());
        Ok(())
    }

    async fn get_device(&self, id: DeviceId) -> Result<Option<Device>> {
        Ok(self.inner.read().await.devices.get(&id).cloned())
    }

    async fn get_device_by_ip(&self, mgmt_ip: &str) -> Result<Option<Device>> {
        let tables = self.inner.read().await;
        Ok(tables
            .by_ip
            .get(mgmt_ip)
            .and_then(|id| tables.devices.get(id))
            .cloned())
    }

    async fn list_devices(&self) -> Result<Vec<Device>> {
        Ok(self.inner.read().await.devices.values().cloned().collect())
    }

    async fn list_interfaces(&self, device: DeviceId) -> Result<Vec<Interface>> {
        let tables = self.inner.read().await;
        Ok(tables.interfaces.get(&device).cloned().unwrap_or_default())
    }

    async fn list_services(&self, device: DeviceId) -> Result<Vec<Service>> {
        let tables = self.inner.read().await;
        Ok(tables.services.get(&device).cloned().unwrap_or_default())
    }

    async fn list_neighbors(&self) -> Result<Vec<Neighbor>> {
        let tables = self.inner.read().await;
        Ok(tables.neighbors.values().flatten().cloned().collect())
    }

    async fn replace_interfaces(
        &self,
        device: DeviceId,
        rows: Vec<Interface>,
    ) -> Result<()> {
        let mut tables = self.inner.write().await;
        ensure_device(&tables, device)?;
        tables.interfaces.insert(device, rows);
        Ok(())
    }

    async fn replace_services(
        &self,
        device: DeviceId,
        rows: Vec<Service>,
    ) -> Result<()> {
        let mut tables = self.inner.write().await;
        ensure_device(&tables, device)?;
        tables.services.insert(device, rows);
        Ok(())
    }

    async fn replace_neighbors(
        &self,
        device: DeviceId,
        rows: Vec<Neighbor>,
    ) -> Result<()> {
        let mut tables = self.inner.write().await;
        ensure_device(&tables, device)?;
        tables.neighbors.insert(device, rows);
        Ok(())
    }
}

fn ensure_device(tables: &Tables, device: DeviceId) -> Result<()> {
    if tables.devices.contains_key(&device) {
        Ok(())
    } else {
        Err(InventoryError::NotFound(format!("device {device}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn find_or_create_is_idempotent_per_ip() {
        let store = MemoryInventory::new();

        let first = store.find_or_create_device("10.0.0.1").await.unwrap();
        let second = store.find_or_create_device("10.0.0.1").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.first_seen, second.first_seen);

        let other = store.find_or_create_device("10.0.0.2").await.unwrap();
        assert_ne!(first.id, other.id);

        let devices = store.list_devices().await.unwrap();
        assert_eq!(devices.len(), 2);
    }

    #[tokio::test]
    async fn replace_discards_prior_rows() {
        let store = MemoryInventory::new();
        let device = store.find_or_create_device("10.0.0.1").await.unwrap();

        let row = |name: &str| Interface {
            device_id: device.id,
            name: Some(name.to_string()),
            admin_up: Some(true),
            oper_up: Some(true),
            speed: None,
            description: None,
        };

        store
            .replace_interfaces(device.id, vec![row("ge-0/0/0"), row("ge-0/0/1")])
            .await
            .unwrap();
        store
            .replace_interfaces(device.id, vec![row("xe-0/1/0")])
            .await
            .unwrap();

        let rows = store.list_interfaces(device.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name.as_deref(), Some("xe-0/1/0"));
    }

    #[tokio::test]
    async fn replace_is_scoped_to_one_device() {
        let store = MemoryInventory::new();
        let a = store.find_or_create_device("10.0.0.1").await.unwrap();
        let b = store.find_or_create_device("10.0.0.2").await.unwrap();

        let neighbor = |owner: DeviceId, name: &str| Neighbor {
            local_device_id: owner,
            local_if: None,
            remote_sysname: Some(name.to_string()),
            remote_port: None,
            remote_mgmt_ip: None,
        };

        store
            .replace_neighbors(a.id, vec![neighbor(a.id, "sw1")])
            .await
            .unwrap();
        store
            .replace_neighbors(b.id, vec![neighbor(b.id, "sw2")])
            .await
            .unwrap();
        store.replace_neighbors(a.id, vec![]).await.unwrap();

        let all = store.list_neighbors().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].local_device_id, b.id);
    }

    #[tokio::test]
    async fn replace_for_unknown_device_is_an_error() {
        let store = MemoryInventory::new();
        let err = store
            .replace_services(DeviceId(42), vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::NotFound(_)));
    }
}
