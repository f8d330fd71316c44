//! Topology synthesis: inventory snapshot in, node/edge graph out.
//!
//! Pure and deterministic for a given snapshot. Neighbor rows carry
//! names and addresses rather than device ids, so the remote endpoint is
//! resolved by best-effort identity matching; rows that resolve to nothing
//! are dropped, not errors.

use std::collections::HashSet;

use trellis_model::{Device, DeviceId, Edge, Neighbor, Node, TopologyGraph};

/// Build the graph from a device list and the full neighbor table.
///
/// Nodes enumerate every device exactly once, labeled by hostname when
/// known, management IP otherwise. Each neighbor row contributes at most
/// one edge; multiple rows resolving to the same unordered device pair
/// keep the first row encountered and drop the rest, so re-polls do not
/// accumulate parallel edges.
pub fn build_topology(
    devices: &[Device],
    neighbors: &[Neighbor],
) -> TopologyGraph {
    let nodes: Vec<Node> = devices
        .iter()
        .map(|d| Node {
            id: d.id,
            label: d
                .hostname
                .clone()
                .unwrap_or_else(|| d.mgmt_ip.clone()),
            vendor: d.vendor.clone(),
            ip: d.mgmt_ip.clone(),
        })
        .collect();

    let mut seen: HashSet<(DeviceId, DeviceId)> = HashSet::new();
    let mut edges = Vec::new();
    for neighbor in neighbors {
        let Some(remote) = resolve_remote(devices, neighbor) else {
            continue;
        };
        if remote == neighbor.local_device_id {
            continue;
        }
        let key = pair_key(neighbor.local_device_id, remote);
        if !seen.insert(key) {
            continue;
        }
        edges.push(Edge {
            source: neighbor.local_device_id,
            target: remote,
            local_if: neighbor.local_if.clone(),
            remote_port: neighbor.remote_port.clone(),
        });
    }

    TopologyGraph { nodes, edges }
}

/// Resolve a neighbor's remote endpoint to a known device.
///
/// Rules apply in strict priority order across the whole device list:
/// an exact management-IP match beats any hostname match, even one that
/// appears earlier in the list. Hostname comparison ignores ASCII case.
fn resolve_remote(
    devices: &[Device],
    neighbor: &Neighbor,
) -> Option<DeviceId> {
    if let Some(remote_ip) = &neighbor.remote_mgmt_ip
        && let Some(device) =
            devices.iter().find(|d| &d.mgmt_ip == remote_ip)
    {
        return Some(device.id);
    }
    let sysname = neighbor.remote_sysname.as_deref()?;
    devices
        .iter()
        .find(|d| {
            d.hostname
                .as_deref()
                .is_some_and(|h| h.eq_ignore_ascii_case(sysname))
        })
        .map(|d| d.id)
}

fn pair_key(a: DeviceId, b: DeviceId) -> (DeviceId, DeviceId) {
    if a.as_i64() <= b.as_i64() {
        (a, b)
    } else {
        (b, a)
    }
}
