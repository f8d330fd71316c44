//! SNMPv2c poll adapter.
//!
//! One poll per host: a pair of scalar gets for sysName/sysDescr, then
//! getnext walks over the interface table and the LLDP remote table. A
//! table that fails mid-walk degrades to empty rather than failing the
//! whole poll; a poll that yields nothing at all is reported as the host
//! being unreachable.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use snmp2::{AsyncSession, Oid, Value};
use tokio::time::timeout;
use tracing::warn;
use trellis_model::{InterfaceFacts, NeighborFacts, SnmpFacts};

use crate::adapters::SnmpAdapter;
use crate::error::{InventoryError, Result};

const OID_SYS_DESCR: &[u64] = &[1, 3, 6, 1, 2, 1, 1, 1, 0];
const OID_SYS_NAME: &[u64] = &[1, 3, 6, 1, 2, 1, 1, 5, 0];

// IF-MIB interface table columns, rows keyed by ifIndex.
const OID_IF_DESCR: &[u64] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 2];
const OID_IF_SPEED: &[u64] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 5];
const OID_IF_ADMIN_STATUS: &[u64] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 7];
const OID_IF_OPER_STATUS: &[u64] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 8];
const OID_IF_ALIAS: &[u64] = &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 18];

// LLDP-MIB remote table columns, rows keyed by timeMark.localPort.index.
const OID_LLDP_REM_PORT_ID: &[u64] = &[1, 0, 8802, 1, 1, 2, 1, 4, 1, 1, 7];
const OID_LLDP_REM_SYS_NAME: &[u64] = &[1, 0, 8802, 1, 1, 2, 1, 4, 1, 1, 9];

/// Hard cap on rows per table walk, in case an agent loops.
const MAX_WALK_ROWS: usize = 4096;

#[derive(Debug, Clone)]
pub struct Snmp2Poller {
    port: u16,
    timeout: Duration,
}

impl Snmp2Poller {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }
}

impl Default for Snmp2Poller {
    fn default() -> Self {
        Self::new(161, Duration::from_secs(2))
    }
}

#[async_trait]
impl SnmpAdapter for Snmp2Poller {
    async fn poll(&self, host: &str, community: &str) -> Result<SnmpFacts> {
        let addr = format!("{}:{}", host, self.port);
        let mut session = match timeout(
            self.timeout,
            AsyncSession::new_v2c(&addr, community.as_bytes(), 0),
        )
        .await
        {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                return Err(InventoryError::HostUnreachable(format!(
                    "snmp session to {addr}: {e}"
                )));
            }
            Err(_) => {
                return Err(InventoryError::HostUnreachable(format!(
                    "snmp session to {addr} timed out"
                )));
            }
        };

        let mut facts = SnmpFacts {
            sys_name: self.get_string(&mut session, OID_SYS_NAME).await,
            sys_descr: self.get_string(&mut session, OID_SYS_DESCR).await,
            ..SnmpFacts::default()
        };

        let descrs = self.walk(&mut session, host, OID_IF_DESCR).await;
        let speeds = self.walk(&mut session, host, OID_IF_SPEED).await;
        let admin = self.walk(&mut session, host, OID_IF_ADMIN_STATUS).await;
        let oper = self.walk(&mut session, host, OID_IF_OPER_STATUS).await;
        let aliases = self.walk(&mut session, host, OID_IF_ALIAS).await;
        facts.interfaces =
            assemble_interfaces(&descrs, &speeds, &admin, &oper, &aliases);

        let rem_ports =
            self.walk(&mut session, host, OID_LLDP_REM_PORT_ID).await;
        let rem_names =
            self.walk(&mut session, host, OID_LLDP_REM_SYS_NAME).await;
        facts.neighbors = assemble_neighbors(&rem_ports, &rem_names);

        if facts.is_empty() {
            return Err(InventoryError::HostUnreachable(format!(
                "{host} did not answer snmp queries"
            )));
        }
        Ok(facts)
    }
}

impl Snmp2Poller {
    async fn get_string(
        &self,
        session: &mut AsyncSession,
        oid: &[u64],
    ) -> Option<String> {
        let oid = Oid::from(oid).ok()?;
        let mut response =
            match timeout(self.timeout, session.get(&oid)).await {
                Ok(Ok(pdu)) => pdu,
                _ => return None,
            };
        let (_, value) = response.varbinds.next()?;
        value_text(&value).filter(|s| !s.is_empty())
    }

    /// Walk every row under `root`, returning `(row_suffix, value)` pairs.
    /// The suffix is the dotted instance part after the column OID.
    async fn walk(
        &self,
        session: &mut AsyncSession,
        host: &str,
        root: &[u64],
    ) -> BTreeMap<String, String> {
        let mut rows = BTreeMap::new();
        let Ok(start) = Oid::from(root) else {
            return rows;
        };
        let prefix = format!("{start}.");
        let mut current = start;

        loop {
            let mut response =
                match timeout(self.timeout, session.getnext(&current)).await
                {
                    Ok(Ok(pdu)) => pdu,
                    Ok(Err(e)) => {
                        warn!(host, oid = %prefix, "snmp walk aborted: {e}");
                        break;
                    }
                    Err(_) => {
                        warn!(host, oid = %prefix, "snmp walk timed out");
                        break;
                    }
                };
            let Some((oid, value)) = response.varbinds.next() else {
                break;
            };
            let dotted = oid.to_string();
            if !dotted.starts_with(&prefix) {
                break;
            }
            if let Some(text) = value_text(&value) {
                rows.insert(dotted[prefix.len()..].to_string(), text);
            }
            if rows.len() >= MAX_WALK_ROWS {
                warn!(host, oid = %prefix, "snmp walk truncated");
                break;
            }
            current = oid.to_owned();
        }
        rows
    }
}

fn value_text(value: &Value<'_>) -> Option<String> {
    match value {
        Value::OctetString(bytes) => {
            Some(String::from_utf8_lossy(bytes).trim().to_string())
        }
        Value::Integer(i) => Some(i.to_string()),
        Value::Counter32(v) | Value::Unsigned32(v) | Value::Timeticks(v) => {
            Some(v.to_string())
        }
        Value::Counter64(v) => Some(v.to_string()),
        Value::IpAddress(octets) => Some(
            octets
                .iter()
                .map(|o| o.to_string())
                .collect::<Vec<_>>()
                .join("."),
        ),
        _ => None,
    }
}

/// Join the per-column walks into interface rows, keyed by ifIndex. The
/// descr column drives the row set; the others fill in when present.
fn assemble_interfaces(
    descrs: &BTreeMap<String, String>,
    speeds: &BTreeMap<String, String>,
    admin: &BTreeMap<String, String>,
    oper: &BTreeMap<String, String>,
    aliases: &BTreeMap<String, String>,
) -> Vec<InterfaceFacts> {
    descrs
        .iter()
        .map(|(index, name)| InterfaceFacts {
            index: index.clone(),
            name: Some(name.clone()).filter(|n| !n.is_empty()),
            // ifAdminStatus / ifOperStatus: 1 = up, anything else is down.
            admin_up: admin.get(index).map(|v| v == "1"),
            oper_up: oper.get(index).map(|v| v == "1"),
            speed: speeds.get(index).cloned(),
            description: aliases
                .get(index)
                .filter(|a| !a.is_empty())
                .cloned(),
        })
        .collect()
}

/// Join the LLDP remote-table walks into neighbor rows. Either column can
/// establish a row; an entry with neither name nor port says nothing.
fn assemble_neighbors(
    rem_ports: &BTreeMap<String, String>,
    rem_names: &BTreeMap<String, String>,
) -> Vec<NeighborFacts> {
    let mut instances: Vec<&String> = rem_names.keys().collect();
    for instance in rem_ports.keys() {
        if !rem_names.contains_key(instance) {
            instances.push(instance);
        }
    }
    instances.sort();

    instances
        .into_iter()
        .map(|instance| NeighborFacts {
            instance: instance.clone(),
            remote_sysname: rem_names
                .get(instance)
                .filter(|n| !n.is_empty())
                .cloned(),
            remote_port: rem_ports
                .get(instance)
                .filter(|p| !p.is_empty())
                .cloned(),
        })
        .collect()
}
