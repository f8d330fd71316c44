//! Server configuration: defaults, optional TOML file, environment
//! overrides (in that order, later wins).

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub scan: ScanConfig,
    pub snmp: SnmpConfig,
    pub ws: WsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres connection URL. Absent means the in-memory store.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub nmap_path: String,
    /// Upper bound on one adapter invocation, scan or poll.
    pub adapter_timeout_secs: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            nmap_path: "nmap".to_string(),
            adapter_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnmpConfig {
    pub port: u16,
    pub timeout_secs: u64,
    pub default_community: String,
}

impl Default for SnmpConfig {
    fn default() -> Self {
        Self {
            port: 161,
            timeout_secs: 2,
            default_community: "public".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WsConfig {
    pub keepalive_secs: u64,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self { keepalive_secs: 30 }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).with_context(|| {
                    format!("failed to read config file {}", path.display())
                })?;
                toml::from_str(&raw).with_context(|| {
                    format!("failed to parse config file {}", path.display())
                })?
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("TRELLIS_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            && !url.is_empty()
        {
            self.database.url = Some(url);
        }
        if let Ok(path) = std::env::var("TRELLIS_NMAP_PATH")
            && !path.is_empty()
        {
            self.scan.nmap_path = path;
        }
        if let Ok(community) = std::env::var("TRELLIS_SNMP_COMMUNITY")
            && !community.is_empty()
        {
            self.snmp.default_community = community;
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_secs(self.scan.adapter_timeout_secs)
    }

    pub fn snmp_timeout(&self) -> Duration {
        Duration::from_secs(self.snmp.timeout_secs)
    }

    pub fn ws_keepalive(&self) -> Duration {
        Duration::from_secs(self.ws.keepalive_secs)
    }
}
