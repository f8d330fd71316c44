use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::DeviceId;

/// A discovered network host, keyed by management IP.
///
/// `first_seen` is set once at creation; `last_seen` is bumped on every
/// successful observation. Scalar attributes are only overwritten by
/// observations that actually supply a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub hostname: Option<String>,
    pub mgmt_ip: String,
    pub mac: Option<String>,
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub serial: Option<String>,
    pub os: Option<String>,
    pub os_version: Option<String>,
    pub notes: Option<String>,
    pub metadata: serde_json::Value,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl Device {
    pub fn new(id: DeviceId, mgmt_ip: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            hostname: None,
            mgmt_ip: mgmt_ip.into(),
            mac: None,
            vendor: None,
            model: None,
            serial: None,
            os: None,
            os_version: None,
            notes: None,
            metadata: serde_json::Value::Object(Default::default()),
            first_seen: now,
            last_seen: now,
        }
    }
}

/// A network interface owned by exactly one device.
///
/// `admin_up`/`oper_up` are tri-state: `None` means the source did not
/// report a status. The whole set is replaced on every successful poll of
/// the owning device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub device_id: DeviceId,
    pub name: Option<String>,
    pub admin_up: Option<bool>,
    pub oper_up: Option<bool>,
    /// Opaque speed string; units vary by source (bps from SNMP ifSpeed).
    pub speed: Option<String>,
    pub description: Option<String>,
}

/// Transport protocol of a discovered service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "tcp" => Some(Protocol::Tcp),
            "udp" => Some(Protocol::Udp),
            _ => None,
        }
    }
}

/// A service listening on a device, as reported by the active scan.
/// Full-replace lifecycle, same as [`Interface`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub device_id: DeviceId,
    pub port: u16,
    pub protocol: Protocol,
    pub name: Option<String>,
    pub product: Option<String>,
    pub version: Option<String>,
}

/// A directional adjacency observation owned by the local device.
///
/// Re-polling a device replaces only that device's rows; the remote
/// device's own observations are never touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighbor {
    pub local_device_id: DeviceId,
    pub local_if: Option<String>,
    pub remote_sysname: Option<String>,
    pub remote_port: Option<String>,
    pub remote_mgmt_ip: Option<String>,
}
