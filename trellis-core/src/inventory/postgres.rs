use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row, postgres::PgRow};
use trellis_model::{Device, DeviceId, Interface, Neighbor, Protocol, Service};

use crate::error::{InventoryError, Result};
use crate::inventory::Inventory;

/// Postgres inventory backend.
///
/// Child replacement runs delete-then-insert inside one transaction, so the
/// empty interim state is never visible to other connections.
#[derive(Clone, Debug)]
pub struct PostgresInventory {
    pool: PgPool,
}

impl PostgresInventory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(pool: &PgPool) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(|e| InventoryError::Database(e.to_string()))
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }
}

const DEVICE_COLUMNS: &str = "id, hostname, mgmt_ip, mac, vendor, model, \
     serial, os, os_version, notes, metadata, first_seen, last_seen";

fn device_from_row(row: &PgRow) -> Result<Device> {
    Ok(Device {
        id: DeviceId(row.try_get("id")?),
        hostname: row.try_get("hostname")?,
        mgmt_ip: row.try_get("mgmt_ip")?,
        mac: row.try_get("mac")?,
        vendor: row.try_get("vendor")?,
        model: row.try_get("model")?,
        serial: row.try_get("serial")?,
        os: row.try_get("os")?,
        os_version: row.try_get("os_version")?,
        notes: row.try_get("notes")?,
        metadata: row.try_get("metadata")?,
        first_seen: row.try_get("first_seen")?,
        last_seen: row.try_get("last_seen")?,
    })
}

#[async_trait]
impl Inventory for PostgresInventory {
    async fn find_or_create_device(&self, mgmt_ip: &str) -> Result<Device> {
        if let Some(device) = self.get_device_by_ip(mgmt_ip).await? {
            return Ok(device);
        }

        let now = Utc::now();
        // A concurrent creator loses the unique-index race and falls back
        // to the select.
        let inserted = sqlx::query(&format!(
            "INSERT INTO devices (mgmt_ip, metadata, first_seen, last_seen) \
             VALUES ($1, '{{}}'::jsonb, $2, $2) \
             ON CONFLICT (mgmt_ip) DO NOTHING \
             RETURNING {DEVICE_COLUMNS}"
        ))
        .bind(mgmt_ip)
        .bind(now)
        .fetch_optional(self.pool())
        .await?;

        match inserted {
            Some(row) => device_from_row(&row),
            None => self.get_device_by_ip(mgmt_ip).await?.ok_or_else(|| {
                InventoryError::Conflict(format!(
                    "device for {mgmt_ip} vanished during creation"
                ))
            }),
        }
    }

    async fn update_device(&self, device: &Device) -> Result<()> {
        let result = sqlx::query(
            "UPDATE devices SET hostname = $2, mgmt_ip = $3, mac = $4, \
             vendor = $5, model = $6, serial = $7, os = $8, os_version = $9, \
             notes = $10, metadata = $11, last_seen = $12 WHERE id = $1",
        )
        .bind(device.id.as_i64())
        .bind(&device.hostname)
        .bind(&device.mgmt_ip)
        .bind(&device.mac)
        .bind(&device.vendor)
        .bind(&device.model)
        .bind(&device.serial)
        .bind(&device.os)
        .bind(&device.os_version)
        .bind(&device.notes)
        .bind(&device.metadata)
        .bind(device.last_seen)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(InventoryError::NotFound(format!(
                "device {}",
                device.id
            )));
        }
        Ok(())
    }

    async fn get_device(&self, id: DeviceId) -> Result<Option<Device>> {
        let row = sqlx::query(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices WHERE id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(self.pool())
        .await?;
        row.as_ref().map(device_from_row).transpose()
    }

    async fn get_device_by_ip(&self, mgmt_ip: &str) -> Result<Option<Device>> {
        let row = sqlx::query(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices WHERE mgmt_ip = $1"
        ))
        .bind(mgmt_ip)
        .fetch_optional(self.pool())
        .await?;
        row.as_ref().map(device_from_row).transpose()
    }

    async fn list_devices(&self) -> Result<Vec<Device>> {
        let rows = sqlx::query(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices ORDER BY id"
        ))
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(device_from_row).collect()
    }

    async fn list_interfaces(&self, device: DeviceId) -> Result<Vec<Interface>> {
        let rows = sqlx::query(
            "SELECT device_id, name, admin_up, oper_up, speed, description \
             FROM interfaces WHERE device_id = $1 ORDER BY id",
        )
        .bind(device.as_i64())
        .fetch_all(self.pool())
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Interface {
                    device_id: DeviceId(row.try_get("device_id")?),
                    name: row.try_get("name")?,
                    admin_up: row.try_get("admin_up")?,
                    oper_up: row.try_get("oper_up")?,
                    speed: row.try_get("speed")?,
                    description: row.try_get("description")?,
                })
            })
            .collect()
    }

    async fn list_services(&self, device: DeviceId) -> Result<Vec<Service>> {
        let rows = sqlx::query(
            "SELECT device_id, port, protocol, name, product, version \
             FROM services WHERE device_id = $1 ORDER BY id",
        )
        .bind(device.as_i64())
        .fetch_all(self.pool())
        .await?;

        rows.iter()
            .map(|row| {
                let protocol: String = row.try_get("protocol")?;
                let port: i32 = row.try_get("port")?;
                Ok(Service {
                    device_id: DeviceId(row.try_get("device_id")?),
                    port: u16::try_from(port).map_err(|_| {
                        InventoryError::Database(format!(
                            "port {port} out of range"
                        ))
                    })?,
                    protocol: Protocol::parse(&protocol).ok_or_else(|| {
                        InventoryError::Database(format!(
                            "unknown protocol {protocol}"
                        ))
                    })?,
                    name: row.try_get("name")?,
                    product: row.try_get("product")?,
                    version: row.try_get("version")?,
                })
            })
            .collect()
    }

    async fn list_neighbors(&self) -> Result<Vec<Neighbor>> {
        let rows = sqlx::query(
            "SELECT local_device_id, local_if, remote_sysname, remote_port, \
             remote_mgmt_ip FROM neighbors ORDER BY local_device_id, id",
        )
        .fetch_all(self.pool())
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Neighbor {
                    local_device_id: DeviceId(
                        row.try_get("local_device_id")?,
                    ),
                    local_if: row.try_get("local_if")?,
                    remote_sysname: row.try_get("remote_sysname")?,
                    remote_port: row.try_get("remote_port")?,
                    remote_mgmt_ip: row.try_get("remote_mgmt_ip")?,
                })
            })
            .collect()
    }

    async fn replace_interfaces(
        &self,
        device: DeviceId,
        rows: Vec<Interface>,
    ) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM interfaces WHERE device_id = $1")
            .bind(device.as_i64())
            .execute(&mut *tx)
            .await?;

        for row in &rows {
            sqlx::query(
                "INSERT INTO interfaces \
                 (device_id, name, admin_up, oper_up, speed, description) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(device.as_i64())
            .bind(&row.name)
            .bind(row.admin_up)
            .bind(row.oper_up)
            .bind(&row.speed)
            .bind(&row.description)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn replace_services(
        &self,
        device: DeviceId,
        rows: Vec<Service>,
    ) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM services WHERE device_id = $1")
            .bind(device.as_i64())
            .execute(&mut *tx)
            .await?;

        for row in &rows {
            sqlx::query(
                "INSERT INTO services \
                 (device_id, port, protocol, name, product, version) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(device.as_i64())
            .bind(i32::from(row.port))
            .bind(row.protocol.as_str())
            .bind(&row.name)
            .bind(&row.product)
            .bind(&row.version)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn replace_neighbors(
        &self,
        device: DeviceId,
        rows: Vec<Neighbor>,
    ) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM neighbors WHERE local_device_id = $1")
            .bind(device.as_i64())
            .execute(&mut *tx)
            .await?;

        for row in &rows {
            sqlx::query(
                "INSERT INTO neighbors \
                 (local_device_id, local_if, remote_sysname, remote_port, \
                  remote_mgmt_ip) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(device.as_i64())
            .bind(&row.local_if)
            .bind(&row.remote_sysname)
            .bind(&row.remote_port)
            .bind(&row.remote_mgmt_ip)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
