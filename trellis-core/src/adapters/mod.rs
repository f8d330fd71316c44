//! Discovery adapters: pluggable capabilities that turn targets into raw
//! per-host facts. The pipeline treats their output as opaque, possibly
//! incomplete reports from uncontrolled external tools.

pub mod nmap;
pub mod snmp;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use trellis_model::{HostFacts, ScanProfile, SnmpFacts};

use crate::error::Result;

/// Active network scan: given targets, produce facts for every host found
/// "up", or fail the whole invocation.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ScanAdapter: Send + Sync {
    async fn scan(
        &self,
        targets: &[String],
        profile: ScanProfile,
        skip_ping: bool,
    ) -> Result<Vec<HostFacts>>;
}

/// SNMP v2c poll of a single host.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SnmpAdapter: Send + Sync {
    async fn poll(&self, host: &str, community: &str) -> Result<SnmpFacts>;
}
