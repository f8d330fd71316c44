//! Ingestion pipeline: adapters in, inventory writes out.
//!
//! Reconciliation is upsert-by-management-IP for device scalars and
//! full-replace for child collections. Writes for one device are serialized
//! on a per-IP lock so a scan and a poll hitting the same host cannot
//! interleave their replace phases. A batch that changed anything fires a
//! single change notification at the end.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;
use tracing::{info, warn};
use trellis_model::{
    Device, HostFacts, Interface, Neighbor, ScanProfile, Service, SnmpFacts,
};

use crate::adapters::{ScanAdapter, SnmpAdapter};
use crate::error::{InventoryError, Result};
use crate::inventory::Inventory;

/// Receives a signal whenever ingestion changed inventory state. The
/// pipeline holds at most one listener, handed to it explicitly at
/// construction; without one, notifications are dropped.
pub trait ChangeListener: Send + Sync {
    fn topology_changed(&self);
}

#[derive(Clone, Default)]
pub struct ChangeNotifier {
    listener: Option<Arc<dyn ChangeListener>>,
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("enabled", &self.listener.is_some())
            .finish()
    }
}

impl ChangeNotifier {
    pub fn new(listener: Arc<dyn ChangeListener>) -> Self {
        Self {
            listener: Some(listener),
        }
    }

    /// A notifier that drops every signal. Used by one-shot tools and
    /// tests that do not care about fanout.
    pub fn disabled() -> Self {
        Self { listener: None }
    }

    pub fn notify(&self) {
        if let Some(listener) = &self.listener {
            listener.topology_changed();
        }
    }
}

/// Summary of one SNMP poll, returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct SnmpPollOutcome {
    pub host: String,
    pub sys_name: Option<String>,
    pub interfaces: usize,
    pub neighbors: usize,
}

pub struct IngestionPipeline {
    inventory: Arc<dyn Inventory>,
    scanner: Arc<dyn ScanAdapter>,
    snmp: Arc<dyn SnmpAdapter>,
    notifier: ChangeNotifier,
    adapter_timeout: Duration,
    device_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for IngestionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("adapter_timeout", &self.adapter_timeout)
            .field("device_locks", &self.device_locks.len())
            .finish()
    }
}

impl IngestionPipeline {
    pub fn new(
        inventory: Arc<dyn Inventory>,
        scanner: Arc<dyn ScanAdapter>,
        snmp: Arc<dyn SnmpAdapter>,
        notifier: ChangeNotifier,
        adapter_timeout: Duration,
    ) -> Self {
        Self {
            inventory,
            scanner,
            snmp,
            notifier,
            adapter_timeout,
            device_locks: DashMap::new(),
        }
    }

    /// Run an active scan and reconcile every host it reports as up.
    ///
    /// Returns the management IPs that were persisted. Per-host reconcile
    /// failures are logged and skipped; the batch keeps going. One change
    /// notification fires at the end iff anything was persisted.
    pub async fn run_scan(
        &self,
        targets: &[String],
        profile: ScanProfile,
        skip_ping: bool,
    ) -> Result<Vec<String>> {
        let hosts = match timeout(
            self.adapter_timeout,
            self.scanner.scan(targets, profile, skip_ping),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(InventoryError::AdapterTimeout),
        };

        let mut affected = Vec::new();
        for facts in hosts {
            let addr = facts.addr.clone();
            match self.reconcile_scan_host(facts).await {
                Ok(()) => affected.push(addr),
                Err(e) => warn!(host = %addr, "scan reconcile failed: {e}"),
            }
        }

        info!(
            targets = targets.len(),
            profile = profile.as_str(),
            persisted = affected.len(),
            "scan batch complete"
        );
        if !affected.is_empty() {
            self.notifier.notify();
        }
        Ok(affected)
    }

    /// Poll one host over SNMP and reconcile the result.
    pub async fn poll_snmp(
        &self,
        host: &str,
        community: &str,
    ) -> Result<SnmpPollOutcome> {
        let facts = match timeout(
            self.adapter_timeout,
            self.snmp.poll(host, community),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(InventoryError::AdapterTimeout),
        };

        let outcome = self.reconcile_snmp(host, facts).await?;
        info!(
            host,
            interfaces = outcome.interfaces,
            neighbors = outcome.neighbors,
            "snmp poll complete"
        );
        self.notifier.notify();
        Ok(outcome)
    }

    async fn reconcile_scan_host(&self, facts: HostFacts) -> Result<()> {
        let _guard = self.lock_device(&facts.addr).await;

        let mut device =
            self.inventory.find_or_create_device(&facts.addr).await?;
        merge_scan_scalars(&mut device, &facts);
        device.last_seen = Utc::now();
        self.inventory.update_device(&device).await?;

        let services: Vec<Service> = facts
            .services
            .iter()
            .filter(|s| s.is_open())
            .map(|s| Service {
                device_id: device.id,
                port: s.port,
                protocol: s.protocol,
                name: s.name.clone(),
                product: s.product.clone(),
                version: s.version.clone(),
            })
            .collect();
        self.inventory.replace_services(device.id, services).await
    }

    async fn reconcile_snmp(
        &self,
        host: &str,
        facts: SnmpFacts,
    ) -> Result<SnmpPollOutcome> {
        let _guard = self.lock_device(host).await;

        let mut device = self.inventory.find_or_create_device(host).await?;
        merge_snmp_scalars(&mut device, &facts);
        device.last_seen = Utc::now();
        self.inventory.update_device(&device).await?;

        let interfaces: Vec<Interface> = facts
            .interfaces
            .iter()
            .map(|row| Interface {
                device_id: device.id,
                name: row.name.clone(),
                admin_up: row.admin_up,
                oper_up: row.oper_up,
                speed: row.speed.clone(),
                description: row.description.clone(),
            })
            .collect();
        let interfaces_count = interfaces.len();
        self.inventory
            .replace_interfaces(device.id, interfaces)
            .await?;

        // LLDP gives remote identity only; the local port and remote
        // management IP are not observed on this path.
        let neighbors: Vec<Neighbor> = facts
            .neighbors
            .iter()
            .map(|row| Neighbor {
                local_device_id: device.id,
                local_if: None,
                remote_sysname: row.remote_sysname.clone(),
                remote_port: row.remote_port.clone(),
                remote_mgmt_ip: None,
            })
            .collect();
        let neighbors_count = neighbors.len();
        self.inventory
            .replace_neighbors(device.id, neighbors)
            .await?;

        Ok(SnmpPollOutcome {
            host: host.to_string(),
            sys_name: device.hostname,
            interfaces: interfaces_count,
            neighbors: neighbors_count,
        })
    }

    async fn lock_device(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .device_locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }
}

/// Overwrite device scalars with scan facts that carry a value; absent
/// facts leave the stored value alone.
fn merge_scan_scalars(device: &mut Device, facts: &HostFacts) {
    if let Some(hostname) = &facts.hostname {
        device.hostname = Some(hostname.clone());
    }
    if let Some(mac) = &facts.mac {
        device.mac = Some(mac.clone());
    }
    if let Some(vendor) = &facts.vendor {
        device.vendor = Some(vendor.clone());
    }
    if let Some(os) = &facts.os {
        device.os = Some(os.clone());
    }
}

fn merge_snmp_scalars(device: &mut Device, facts: &SnmpFacts) {
    if let Some(sys_name) = &facts.sys_name {
        device.hostname = Some(sys_name.clone());
    }
    if let Some(sys_descr) = &facts.sys_descr {
        if let Some(vendor) = infer_vendor(sys_descr) {
            device.vendor = Some(vendor.to_string());
        }
        device.os = Some(truncate_chars(sys_descr, 255));
    }
}

/// Map a sysDescr to a vendor name by substring, case-insensitively. No
/// match leaves the stored vendor untouched.
pub fn infer_vendor(sys_descr: &str) -> Option<&'static str> {
    let d = sys_descr.to_lowercase();
    if d.contains("juniper") {
        Some("Juniper")
    } else if d.contains("cisco") {
        Some("Cisco")
    } else if d.contains("pfsense") {
        Some("pfSense")
    } else if d.contains("ubiquiti") || d.contains("unifi") {
        Some("Ubiquiti")
    } else {
        None
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::adapters::{MockScanAdapter, MockSnmpAdapter};
    use crate::inventory::memory::MemoryInventory;
    use trellis_model::{InterfaceFacts, NeighborFacts, Protocol, ServiceFacts};

    #[derive(Default)]
    struct CountingListener {
        fired: AtomicUsize,
    }

    impl ChangeListener for CountingListener {
        fn topology_changed(&self) {
            self.fired.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn pipeline(
        inventory: Arc<MemoryInventory>,
        scanner: MockScanAdapter,
        snmp: MockSnmpAdapter,
        listener: Arc<CountingListener>,
    ) -> IngestionPipeline {
        IngestionPipeline::new(
            inventory,
            Arc::new(scanner),
            Arc::new(snmp),
            ChangeNotifier::new(listener),
            Duration::from_secs(5),
        )
    }

    fn host(addr: &str) -> HostFacts {
        HostFacts {
            addr: addr.to_string(),
            hostname: Some(format!("host-{addr}")),
            services: vec![
                ServiceFacts {
                    port: 22,
                    protocol: Protocol::Tcp,
                    name: Some("ssh".to_string()),
                    product: None,
                    version: None,
                    state: Some("open".to_string()),
                },
                ServiceFacts {
                    port: 23,
                    protocol: Protocol::Tcp,
                    name: Some("telnet".to_string()),
                    product: None,
                    version: None,
                    state: Some("closed".to_string()),
                },
            ],
            ..HostFacts::default()
        }
    }

    #[tokio::test]
    async fn scan_batch_notifies_once_and_keeps_only_open_services() {
        let inventory = Arc::new(MemoryInventory::new());
        let listener = Arc::new(CountingListener::default());

        let mut scanner = MockScanAdapter::new();
        scanner.expect_scan().returning(|_, _, _| {
            Ok(vec![host("10.0.0.1"), host("10.0.0.2")])
        });

        let pipe = pipeline(
            inventory.clone(),
            scanner,
            MockSnmpAdapter::new(),
            listener.clone(),
        );
        let affected = pipe
            .run_scan(
                &["10.0.0.0/24".to_string()],
                ScanProfile::Standard,
                false,
            )
            .await
            .unwrap();

        assert_eq!(affected, vec!["10.0.0.1", "10.0.0.2"]);
        assert_eq!(listener.fired.load(Ordering::SeqCst), 1);

        let device = inventory
            .get_device_by_ip("10.0.0.1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(device.hostname.as_deref(), Some("host-10.0.0.1"));
        let services = inventory.list_services(device.id).await.unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].port, 22);
    }

    #[tokio::test]
    async fn empty_scan_batch_does_not_notify() {
        let inventory = Arc::new(MemoryInventory::new());
        let listener = Arc::new(CountingListener::default());

        let mut scanner = MockScanAdapter::new();
        scanner.expect_scan().returning(|_, _, _| Ok(Vec::new()));

        let pipe = pipeline(
            inventory,
            scanner,
            MockSnmpAdapter::new(),
            listener.clone(),
        );
        let affected = pipe
            .run_scan(&["10.0.0.0/24".to_string()], ScanProfile::Fast, true)
            .await
            .unwrap();

        assert!(affected.is_empty());
        assert_eq!(listener.fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn scan_adapter_failure_propagates() {
        let inventory = Arc::new(MemoryInventory::new());
        let listener = Arc::new(CountingListener::default());

        let mut scanner = MockScanAdapter::new();
        scanner.expect_scan().returning(|_, _, _| {
            Err(InventoryError::AdapterUnavailable(
                "nmap not found".to_string(),
            ))
        });

        let pipe = pipeline(
            inventory,
            scanner,
            MockSnmpAdapter::new(),
            listener.clone(),
        );
        let err = pipe
            .run_scan(
                &["10.0.0.0/24".to_string()],
                ScanProfile::Standard,
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::AdapterUnavailable(_)));
        assert_eq!(listener.fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn slow_scan_adapter_times_out() {
        struct SlowScanner;

        #[async_trait::async_trait]
        impl crate::adapters::ScanAdapter for SlowScanner {
            async fn scan(
                &self,
                _targets: &[String],
                _profile: ScanProfile,
                _skip_ping: bool,
            ) -> crate::error::Result<Vec<HostFacts>> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Vec::new())
            }
        }

        let pipe = IngestionPipeline::new(
            Arc::new(MemoryInventory::new()),
            Arc::new(SlowScanner),
            Arc::new(MockSnmpAdapter::new()),
            ChangeNotifier::disabled(),
            Duration::from_millis(20),
        );
        let err = pipe
            .run_scan(
                &["10.0.0.0/24".to_string()],
                ScanProfile::Standard,
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::AdapterTimeout));
    }

    #[tokio::test]
    async fn snmp_poll_replaces_children_and_reports_counts() {
        let inventory = Arc::new(MemoryInventory::new());
        let listener = Arc::new(CountingListener::default());

        let mut snmp = MockSnmpAdapter::new();
        snmp.expect_poll().returning(|_, _| {
            Ok(SnmpFacts {
                sys_name: Some("core-sw1".to_string()),
                sys_descr: Some("Juniper Networks EX2200".to_string()),
                interfaces: vec![InterfaceFacts {
                    index: "1".to_string(),
                    name: Some("ge-0/0/0".to_string()),
                    admin_up: Some(true),
                    oper_up: Some(true),
                    speed: Some("1000000000".to_string()),
                    description: None,
                }],
                neighbors: vec![NeighborFacts {
                    instance: "0.1.1".to_string(),
                    remote_sysname: Some("gw".to_string()),
                    remote_port: Some("eth0".to_string()),
                }],
            })
        });

        let pipe = pipeline(
            inventory.clone(),
            MockScanAdapter::new(),
            snmp,
            listener.clone(),
        );
        let outcome =
            pipe.poll_snmp("10.0.0.5", "public").await.unwrap();

        assert_eq!(outcome.sys_name.as_deref(), Some("core-sw1"));
        assert_eq!(outcome.interfaces, 1);
        assert_eq!(outcome.neighbors, 1);
        assert_eq!(listener.fired.load(Ordering::SeqCst), 1);

        let device = inventory
            .get_device_by_ip("10.0.0.5")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(device.vendor.as_deref(), Some("Juniper"));
        assert_eq!(
            inventory.list_interfaces(device.id).await.unwrap().len(),
            1
        );
        let neighbors = inventory.list_neighbors().await.unwrap();
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].local_device_id, device.id);
        assert_eq!(neighbors[0].local_if, None);
    }

    #[test]
    fn vendor_inference_is_case_insensitive() {
        assert_eq!(
            infer_vendor("Juniper Networks, Inc. ex2200-c-12t-2g"),
            Some("Juniper")
        );
        assert_eq!(infer_vendor("CISCO IOS XE"), Some("Cisco"));
        assert_eq!(infer_vendor("pfSense 2.7.2-RELEASE"), Some("pfSense"));
        assert_eq!(infer_vendor("UniFi Switch 24"), Some("Ubiquiti"));
        assert_eq!(infer_vendor("Linux core-sw 6.1.0"), None);
    }

    #[test]
    fn scan_merge_never_clobbers_with_absent_fields() {
        let mut device =
            Device::new(1.into(), "192.168.3.1", Utc::now());
        device.vendor = Some("Juniper".to_string());
        device.hostname = Some("gw.lan".to_string());

        merge_scan_scalars(&mut device, &HostFacts::default());
        assert_eq!(device.vendor.as_deref(), Some("Juniper"));
        assert_eq!(device.hostname.as_deref(), Some("gw.lan"));

        let facts = HostFacts {
            hostname: Some("gw2.lan".to_string()),
            ..HostFacts::default()
        };
        merge_scan_scalars(&mut device, &facts);
        assert_eq!(device.hostname.as_deref(), Some("gw2.lan"));
        assert_eq!(device.vendor.as_deref(), Some("Juniper"));
    }

    #[test]
    fn snmp_merge_keeps_vendor_when_descr_is_unrecognized() {
        let mut device =
            Device::new(1.into(), "192.168.3.1", Utc::now());
        device.vendor = Some("Cisco".to_string());

        let facts = SnmpFacts {
            sys_descr: Some("Linux appliance 6.1".to_string()),
            ..SnmpFacts::default()
        };
        merge_snmp_scalars(&mut device, &facts);
        assert_eq!(device.vendor.as_deref(), Some("Cisco"));
        assert_eq!(device.os.as_deref(), Some("Linux appliance 6.1"));
    }

    #[test]
    fn sysdescr_is_truncated_for_os() {
        let long = "x".repeat(300);
        let facts = SnmpFacts {
            sys_descr: Some(long),
            ..SnmpFacts::default()
        };
        let mut device =
            Device::new(1.into(), "192.168.3.1", Utc::now());
        merge_snmp_scalars(&mut device, &facts);
        assert_eq!(device.os.as_ref().map(String::len), Some(255));
    }
}
