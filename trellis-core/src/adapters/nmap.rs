//! Active scan adapter backed by the `nmap` binary.
//!
//! The tool is spawned with XML output on stdout and the report is parsed
//! into [`HostFacts`]. Hosts the scan does not report as "up" are omitted
//! entirely; absent attributes stay absent rather than defaulting.

use async_trait::async_trait;
use roxmltree::{Document, Node};
use tokio::process::Command;
use tracing::debug;
use trellis_model::{HostFacts, Protocol, ScanProfile, ServiceFacts};

use crate::adapters::ScanAdapter;
use crate::error::{InventoryError, Result};

/// Fixed argument sets per profile. Timeouts and retry caps keep a single
/// slow host from dragging the whole batch.
fn profile_args(profile: ScanProfile) -> &'static [&'static str] {
    match profile {
        ScanProfile::Fast => &["-T4", "-F"],
        ScanProfile::Standard => {
            &["-sS", "-sV", "--host-timeout", "30s", "--max-retries", "1"]
        }
        ScanProfile::Deep => &[
            "-sS",
            "-sU",
            "-sV",
            "-O",
            "--host-timeout",
            "60s",
            "--max-retries",
            "1",
        ],
    }
}

#[derive(Debug, Clone)]
pub struct NmapScanner {
    binary: String,
}

impl NmapScanner {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for NmapScanner {
    fn default() -> Self {
        Self::new("nmap")
    }
}

#[async_trait]
impl ScanAdapter for NmapScanner {
    async fn scan(
        &self,
        targets: &[String],
        profile: ScanProfile,
        skip_ping: bool,
    ) -> Result<Vec<HostFacts>> {
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let mut cmd = Command::new(&self.binary);
        cmd.args(profile_args(profile));
        if skip_ping {
            cmd.arg("-Pn");
        }
        cmd.args(["-oX", "-"]);
        cmd.args(targets);
        cmd.kill_on_drop(true);

        debug!(binary = %self.binary, profile = profile.as_str(), targets = targets.len(), "invoking scan tool");

        let output = cmd.output().await.map_err(|e| {
            InventoryError::AdapterUnavailable(format!(
                "failed to launch {}: {e}",
                self.binary
            ))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InventoryError::AdapterUnavailable(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }

        parse_report(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse an nmap XML report (`-oX -`) into per-host facts.
pub fn parse_report(xml: &str) -> Result<Vec<HostFacts>> {
    let doc = Document::parse(xml).map_err(|e| {
        InventoryError::AdapterUnavailable(format!(
            "unparseable scan report: {e}"
        ))
    })?;

    let mut hosts = Vec::new();
    for host in doc
        .root_element()
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "host")
    {
        if let Some(facts) = parse_host(&host) {
            hosts.push(facts);
        }
    }
    Ok(hosts)
}

fn parse_host(host: &Node<'_, '_>) -> Option<HostFacts> {
    let up = host
        .children()
        .find(|n| n.tag_name().name() == "status")
        .and_then(|n| n.attribute("state"))
        .is_some_and(|state| state == "up");
    if !up {
        return None;
    }

    let mut facts = HostFacts::default();

    for address in host
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "address")
    {
        let Some(addr) = address.attribute("addr") else {
            continue;
        };
        match address.attribute("addrtype") {
            Some("ipv4") | Some("ipv6") => facts.addr = addr.to_string(),
            Some("mac") => {
                facts.mac = Some(addr.to_string());
                facts.vendor =
                    address.attribute("vendor").map(str::to_string);
            }
            _ => {}
        }
    }
    if facts.addr.is_empty() {
        return None;
    }

    facts.hostname = host
        .children()
        .find(|n| n.tag_name().name() == "hostnames")
        .and_then(|names| {
            names
                .children()
                .find(|n| n.tag_name().name() == "hostname")
        })
        .and_then(|n| n.attribute("name"))
        .map(str::to_string);

    // Highest-accuracy OS match wins.
    facts.os = host
        .children()
        .find(|n| n.tag_name().name() == "os")
        .map(|os| {
            os.children()
                .filter(|n| n.tag_name().name() == "osmatch")
                .filter_map(|m| {
                    let name = m.attribute("name")?;
                    let accuracy: u32 =
                        m.attribute("accuracy")?.parse().ok()?;
                    Some((accuracy, name))
                })
                .max_by_key(|(accuracy, _)| *accuracy)
                .map(|(_, name)| name.to_string())
        })
        .unwrap_or(None);

    if let Some(ports) = host
        .children()
        .find(|n| n.tag_name().name() == "ports")
    {
        for port in ports
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "port")
        {
            if let Some(service) = parse_port(&port) {
                facts.services.push(service);
            }
        }
    }

    Some(facts)
}

fn parse_port(port: &Node<'_, '_>) -> Option<ServiceFacts> {
    let protocol = Protocol::parse(port.attribute("protocol")?)?;
    let portid: u16 = port.attribute("portid")?.parse().ok()?;

    let state = port
        .children()
        .find(|n| n.tag_name().name() == "state")
        .and_then(|n| n.attribute("state"))
        .map(str::to_string);

    let service = port
        .children()
        .find(|n| n.tag_name().name() == "service");

    Some(ServiceFacts {
        port: portid,
        protocol,
        name: service
            .and_then(|s| s.attribute("name"))
            .map(str::to_string),
        product: service
            .and_then(|s| s.attribute("product"))
            .map(str::to_string),
        version: service
            .and_then(|s| s.attribute("version"))
            .map(str::to_string),
        state,
    })
}
