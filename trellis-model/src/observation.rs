//! Raw per-host facts produced by the discovery adapters.
//!
//! These are reports, not records: fields the source could not observe are
//! simply absent, and reconciliation must never let an absent field clobber
//! a stored value.

use serde::{Deserialize, Serialize};

use crate::device::Protocol;

/// Resource-cost/thoroughness tradeoff for an active scan.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ScanProfile {
    Fast,
    #[default]
    Standard,
    Deep,
}

impl ScanProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanProfile::Fast => "fast",
            ScanProfile::Standard => "standard",
            ScanProfile::Deep => "deep",
        }
    }
}

/// Everything the active scan learned about one reachable host.
/// Hosts not found "up" never produce a `HostFacts` at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostFacts {
    pub addr: String,
    pub hostname: Option<String>,
    pub mac: Option<String>,
    pub vendor: Option<String>,
    pub os: Option<String>,
    pub services: Vec<ServiceFacts>,
}

/// One open port observed by the scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceFacts {
    pub port: u16,
    pub protocol: Protocol,
    pub name: Option<String>,
    pub product: Option<String>,
    pub version: Option<String>,
    pub state: Option<String>,
}

impl ServiceFacts {
    pub fn is_open(&self) -> bool {
        self.state.as_deref().is_none_or(|s| s == "open")
    }
}

/// Everything one SNMP poll learned about a host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnmpFacts {
    pub sys_name: Option<String>,
    pub sys_descr: Option<String>,
    pub interfaces: Vec<InterfaceFacts>,
    pub neighbors: Vec<NeighborFacts>,
}

impl SnmpFacts {
    /// True when the poll produced nothing usable at all.
    pub fn is_empty(&self) -> bool {
        self.sys_name.is_none()
            && self.sys_descr.is_none()
            && self.interfaces.is_empty()
            && self.neighbors.is_empty()
    }
}

/// One row of the SNMP interface table, keyed by ifIndex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceFacts {
    pub index: String,
    pub name: Option<String>,
    pub admin_up: Option<bool>,
    pub oper_up: Option<bool>,
    pub speed: Option<String>,
    pub description: Option<String>,
}

/// One LLDP remote-table entry, keyed by its instance sub-ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborFacts {
    pub instance: String,
    pub remote_sysname: Option<String>,
    pub remote_port: Option<String>,
}
