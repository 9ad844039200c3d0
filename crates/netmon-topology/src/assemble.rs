//! Topology assembly: backbone template, device placement, and the
//! hypervisor-resource overlay.

use std::net::IpAddr;

use netmon_core::types::{DeviceRecord, ManagedResource, NodeKind, ResourceKind};

use crate::classify::{self, CAMERA_KEYWORDS, STREAMING_KEYWORDS};
use crate::config::{BackboneRole, TopologyConfig};
use crate::error::{Result, TopologyError};
use crate::graph::{TopologyGraph, TopologyNode};
use crate::resolve::CorrelationTable;

/// Builds topology graphs from resolved devices.
///
/// Every call to [`rebuild`](Self::rebuild) returns a fresh graph; nothing
/// is carried over from earlier cycles.
#[derive(Debug, Clone, Default)]
pub struct TopologyAssembler {
    config: TopologyConfig,
}

impl TopologyAssembler {
    pub fn new(config: TopologyConfig) -> Self {
        Self { config }
    }

    /// Build a new graph: backbone template, then one placement per device.
    pub fn rebuild(&self, devices: &[DeviceRecord]) -> Result<TopologyGraph> {
        let mut graph = self.backbone()?;
        let mut refreshed = 0usize;

        for device in devices {
            if self.refresh_backbone(&mut graph, device)? {
                refreshed += 1;
                continue;
            }
            self.place(&mut graph, device)?;
        }

        verify_backbone(&graph)?;

        tracing::debug!(
            devices = devices.len(),
            backbone_refreshed = refreshed,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Topology rebuilt"
        );

        Ok(graph)
    }

    /// Overlay hypervisor-managed resources beneath the router VM.
    ///
    /// A resource whose address already has a node takes that node over:
    /// its attributes are replaced and every prior edge is dropped before it
    /// is attached to the router VM.
    pub fn add_managed_resources(
        &self,
        graph: &mut TopologyGraph,
        resources: &[ManagedResource],
        correlation: &CorrelationTable,
    ) -> Result<()> {
        let router_vm = BackboneRole::RouterVm.node_id();
        if !graph.contains(router_vm) {
            return Err(TopologyError::MissingBackbone {
                id: router_vm.to_string(),
            });
        }

        for resource in resources {
            if resource.kind == ResourceKind::Node
                || resource
                    .name
                    .eq_ignore_ascii_case(&self.config.router_vm_resource)
            {
                continue;
            }

            let identity = resource.mac.as_ref().and_then(|mac| correlation.get(mac));
            let address = identity.map(|entry| entry.address);

            if let Some(node) = address.and_then(|a| graph.node_mut(&a.to_string())) {
                node.label = resource.name.clone();
                node.kind = NodeKind::HypervisorResource;
                node.status = resource.status.clone();
                node.mac = resource.mac.clone();

                let id = node.id.clone();
                let dropped = graph.detach(&id);
                graph.connect(router_vm, &id)?;
                tracing::debug!(node = %id, resource = %resource.name, dropped, "Re-parented node under router VM");
                continue;
            }

            let id = match address {
                Some(address) => address.to_string(),
                None if resource.name.trim().is_empty() => {
                    tracing::warn!(resource_id = %resource.id, "Skipping unnamed resource without address");
                    continue;
                }
                None => resource.name.clone(),
            };

            graph.insert_node(TopologyNode {
                id: id.clone(),
                label: resource.name.clone(),
                kind: NodeKind::HypervisorResource,
                address,
                mac: resource.mac.clone(),
                hostname: identity.and_then(|entry| entry.hostname.clone()),
                status: resource.status.clone(),
            })?;
            graph.connect(router_vm, &id)?;
        }

        Ok(())
    }

    /// Record the externally observed public address on the modem.
    pub fn set_public_address(&self, graph: &mut TopologyGraph, address: IpAddr) {
        if let Some(modem) = graph.node_mut(BackboneRole::Modem.node_id()) {
            modem.address = Some(address);
        }
    }

    /// The parent a device is attached to.
    pub fn parent_for(&self, address: IpAddr, hostname: Option<&str>) -> BackboneRole {
        let hostname = hostname.unwrap_or_default();

        if self.config.in_iot_subnet(address) {
            if classify::matches_any(hostname, CAMERA_KEYWORDS) {
                // Wired PoE cameras.
                BackboneRole::MainSwitch
            } else {
                BackboneRole::IotRouter
            }
        } else if classify::matches_any(hostname, STREAMING_KEYWORDS) {
            BackboneRole::StreamingSwitch
        } else {
            BackboneRole::MainSwitch
        }
    }

    fn backbone(&self) -> Result<TopologyGraph> {
        let mut graph = TopologyGraph::new();
        let backbone = &self.config.backbone;

        for role in BackboneRole::ALL {
            let configured = backbone.get(role);
            graph.insert_node(TopologyNode {
                address: configured.address,
                mac: configured.mac.clone(),
                ..TopologyNode::new(role.node_id(), backbone.label(role), role.kind())
            })?;
            if let Some(parent) = role.parent() {
                graph.connect(parent.node_id(), role.node_id())?;
            }
        }

        Ok(graph)
    }

    /// Refresh the backbone node a device's hardware address identifies.
    /// Returns whether the device was consumed.
    fn refresh_backbone(&self, graph: &mut TopologyGraph, device: &DeviceRecord) -> Result<bool> {
        let Some(mac) = &device.mac else {
            return Ok(false);
        };
        let Some(role) = self.config.backbone.role_for_mac(mac) else {
            return Ok(false);
        };

        let node = graph
            .node_mut(role.node_id())
            .ok_or_else(|| TopologyError::MissingBackbone {
                id: role.node_id().to_string(),
            })?;
        node.address = Some(device.address);
        node.mac = Some(mac.clone());
        Ok(true)
    }

    fn place(&self, graph: &mut TopologyGraph, device: &DeviceRecord) -> Result<()> {
        let hostname = device.hostname.as_deref();
        let id = device.address.to_string();

        graph.insert_node(TopologyNode {
            address: Some(device.address),
            mac: device.mac.clone(),
            hostname: device.hostname.clone(),
            ..TopologyNode::new(id.clone(), device_label(device), classify::classify(hostname))
        })?;

        let parent = self.parent_for(device.address, hostname);
        graph.connect(parent.node_id(), &id)
    }
}

/// Description, else resolved hostname, else blank. Never an address.
pub fn device_label(device: &DeviceRecord) -> String {
    device
        .description
        .as_deref()
        .or(device.hostname.as_deref())
        .unwrap_or_default()
        .to_string()
}

fn verify_backbone(graph: &TopologyGraph) -> Result<()> {
    match BackboneRole::ALL
        .iter()
        .find(|role| !graph.contains(role.node_id()))
    {
        Some(role) => Err(TopologyError::MissingBackbone {
            id: role.node_id().to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::{resolve, CorrelationEntry};
    use netmon_core::types::{MacAddress, ProbeDevice};
    use std::collections::BTreeSet;

    fn device(address: &str, mac: &str, hostname: &str) -> DeviceRecord {
        DeviceRecord::new(address.parse().unwrap())
            .with_mac(mac)
            .with_hostname(hostname)
    }

    fn resource(name: &str, kind: ResourceKind, mac: Option<&str>) -> ManagedResource {
        ManagedResource {
            name: name.to_string(),
            kind,
            id: "100".to_string(),
            status: Some("running".to_string()),
            parent_node: Some("pve".to_string()),
            mac: mac.and_then(MacAddress::parse),
        }
    }

    fn node_ids(graph: &TopologyGraph) -> BTreeSet<String> {
        graph.nodes().map(|n| n.id.clone()).collect()
    }

    fn edge_set(graph: &TopologyGraph) -> BTreeSet<(String, String)> {
        graph
            .edges()
            .map(|e| (e.source.clone(), e.target.clone()))
            .collect()
    }

    #[test]
    fn test_backbone_always_present() {
        let assembler = TopologyAssembler::default();
        for devices in [
            vec![],
            vec![device("192.168.1.9", "aa:bb:cc:dd:ee:09", "nas")],
            vec![device("10.9.9.9", "", "Unknown")],
        ] {
            let graph = assembler.rebuild(&devices).unwrap();
            for role in BackboneRole::ALL {
                assert!(graph.contains(role.node_id()), "missing {role:?}");
            }
        }
    }

    #[test]
    fn test_backbone_is_a_tree() {
        let graph = TopologyAssembler::default().rebuild(&[]).unwrap();
        assert_eq!(graph.node_count(), 7);
        assert_eq!(graph.edge_count(), 6);
        assert_eq!(
            graph.neighbors("Main Switch").len(),
            4,
            "router VM above, three downstream devices below"
        );
    }

    #[test]
    fn test_backbone_mac_refreshes_instead_of_duplicating() {
        let assembler = TopologyAssembler::default();
        let graph = assembler
            .rebuild(&[device("192.168.1.250", "D8:07:B6:75:2F:F4", "switch")])
            .unwrap();

        assert!(!graph.contains("192.168.1.250"));
        let switch = graph.node("Main Switch").unwrap();
        assert_eq!(switch.address, Some("192.168.1.250".parse().unwrap()));
        assert_eq!(graph.node_count(), 7);
    }

    #[test]
    fn test_living_room_tv_goes_to_streaming_switch() {
        let graph = TopologyAssembler::default()
            .rebuild(&[device("192.168.1.50", "aa:bb:cc:dd:ee:01", "living-room-tv")])
            .unwrap();

        let node = graph.node("192.168.1.50").unwrap();
        assert_eq!(node.kind, NodeKind::SmartTv);
        assert_eq!(node.label, "living-room-tv");
        assert_eq!(graph.neighbors("192.168.1.50"), vec!["Streaming Switch"]);
    }

    #[test]
    fn test_iot_subnet_placement() {
        let graph = TopologyAssembler::default()
            .rebuild(&[
                device("192.168.20.15", "aa:bb:cc:dd:ee:15", "smart-plug"),
                device("192.168.30.7", "aa:bb:cc:dd:ee:07", "Porch-Cam"),
                device("192.168.20.16", "aa:bb:cc:dd:ee:16", "bedroom-tv"),
            ])
            .unwrap();

        assert_eq!(graph.neighbors("192.168.20.15"), vec!["IoT Router"]);
        assert_eq!(graph.neighbors("192.168.30.7"), vec!["Main Switch"]);
        // Subnet rule precedes the streaming rule.
        assert_eq!(graph.neighbors("192.168.20.16"), vec!["IoT Router"]);
    }

    #[test]
    fn test_default_parent_is_main_switch() {
        let graph = TopologyAssembler::default()
            .rebuild(&[device("192.168.1.77", "aa:bb:cc:dd:ee:77", "Unknown")])
            .unwrap();
        assert_eq!(graph.neighbors("192.168.1.77"), vec!["Main Switch"]);
        assert_eq!(graph.node("192.168.1.77").unwrap().label, "");
    }

    #[test]
    fn test_label_never_uses_address() {
        let described = device("192.168.1.5", "aa:bb:cc:dd:ee:05", "host5")
            .with_description("Office NAS");
        assert_eq!(device_label(&described), "Office NAS");
        assert_eq!(
            device_label(&device("192.168.1.6", "aa:bb:cc:dd:ee:06", "host6")),
            "host6"
        );
        assert_eq!(
            device_label(&device("192.168.1.7", "aa:bb:cc:dd:ee:07", "")),
            ""
        );
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let assembler = TopologyAssembler::default();
        let devices = vec![
            device("192.168.1.50", "aa:bb:cc:dd:ee:01", "living-room-tv"),
            device("192.168.20.3", "aa:bb:cc:dd:ee:02", "plug"),
            device("192.168.1.3", "60:a4:b7:5c:5a:00", "router"),
            device("192.168.1.80", "aa:bb:cc:dd:ee:03", "Unknown"),
        ];
        let mut reversed = devices.clone();
        reversed.reverse();

        let first = assembler.rebuild(&devices).unwrap();
        let second = assembler.rebuild(&devices).unwrap();
        let shuffled = assembler.rebuild(&reversed).unwrap();

        assert_eq!(node_ids(&first), node_ids(&second));
        assert_eq!(edge_set(&first), edge_set(&second));
        assert_eq!(node_ids(&first), node_ids(&shuffled));
        assert_eq!(edge_set(&first), edge_set(&shuffled));
    }

    #[test]
    fn test_duplicate_device_address_is_invariant_violation() {
        let result = TopologyAssembler::default().rebuild(&[
            device("192.168.1.10", "aa:bb:cc:dd:ee:10", "a"),
            device("192.168.1.10", "aa:bb:cc:dd:ee:11", "b"),
        ]);
        assert_eq!(
            result.unwrap_err(),
            TopologyError::DuplicateNode {
                id: "192.168.1.10".to_string()
            }
        );
    }

    #[test]
    fn test_resource_takes_over_discovered_node() {
        let assembler = TopologyAssembler::default();
        let resolution = resolve(
            &[ProbeDevice {
                address: "192.168.1.60".parse().unwrap(),
                mac: MacAddress::parse("aa:bb:cc:dd:ee:60"),
                hostname: Some("web".to_string()),
            }],
            &[],
            &[],
        );
        let mut graph = assembler.rebuild(&resolution.devices).unwrap();
        assert_eq!(graph.neighbors("192.168.1.60"), vec!["Main Switch"]);

        assembler
            .add_managed_resources(
                &mut graph,
                &[resource("web-vm", ResourceKind::Vm, Some("AA:BB:CC:DD:EE:60"))],
                &resolution.correlation,
            )
            .unwrap();

        assert_eq!(graph.neighbors("192.168.1.60"), vec!["Router VM"]);
        let node = graph.node("192.168.1.60").unwrap();
        assert_eq!(node.kind, NodeKind::HypervisorResource);
        assert_eq!(node.label, "web-vm");
        assert_eq!(node.status.as_deref(), Some("running"));
    }

    #[test]
    fn test_unresolved_resource_keyed_by_name() {
        let assembler = TopologyAssembler::default();
        let mut graph = assembler.rebuild(&[]).unwrap();

        assembler
            .add_managed_resources(
                &mut graph,
                &[
                    resource("pve", ResourceKind::Node, None),
                    resource("OPNsense", ResourceKind::Vm, Some("aa:bb:cc:dd:ee:01")),
                    resource("pihole", ResourceKind::Container, None),
                ],
                &CorrelationTable::default(),
            )
            .unwrap();

        assert!(!graph.contains("pve"));
        assert!(!graph.contains("OPNsense"));
        assert_eq!(graph.neighbors("pihole"), vec!["Router VM"]);
        assert_eq!(graph.node("pihole").unwrap().address, None);
    }

    #[test]
    fn test_correlated_resource_without_node_keyed_by_address() {
        let assembler = TopologyAssembler::default();
        let mut graph = assembler.rebuild(&[]).unwrap();
        let mut correlation = CorrelationTable::default();
        correlation.insert(
            MacAddress::parse("aa:bb:cc:dd:ee:70").unwrap(),
            CorrelationEntry {
                address: "192.168.1.70".parse().unwrap(),
                hostname: Some("backup".to_string()),
            },
        );

        assembler
            .add_managed_resources(
                &mut graph,
                &[resource("backup-ct", ResourceKind::Container, Some("aa:bb:cc:dd:ee:70"))],
                &correlation,
            )
            .unwrap();

        let node = graph.node("192.168.1.70").unwrap();
        assert_eq!(node.label, "backup-ct");
        assert_eq!(node.hostname.as_deref(), Some("backup"));
        assert_eq!(graph.neighbors("192.168.1.70"), vec!["Router VM"]);
    }

    #[test]
    fn test_resource_name_collision_is_reported() {
        let assembler = TopologyAssembler::default();
        let mut graph = assembler.rebuild(&[]).unwrap();
        let result = assembler.add_managed_resources(
            &mut graph,
            &[
                resource("dup", ResourceKind::Vm, None),
                resource("dup", ResourceKind::Container, None),
            ],
            &CorrelationTable::default(),
        );
        assert!(matches!(result, Err(TopologyError::DuplicateNode { .. })));
    }

    #[test]
    fn test_public_address_on_modem() {
        let assembler = TopologyAssembler::default();
        let mut graph = assembler.rebuild(&[]).unwrap();
        assert_eq!(graph.node("Cable Modem").unwrap().address, None);

        assembler.set_public_address(&mut graph, "203.0.113.7".parse().unwrap());
        assert_eq!(
            graph.node("Cable Modem").unwrap().address,
            Some("203.0.113.7".parse().unwrap())
        );
    }
}
