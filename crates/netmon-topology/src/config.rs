//! Backbone template and segmentation configuration.

use std::net::{IpAddr, Ipv4Addr};

use ipnet::IpNet;
use netmon_core::types::{MacAddress, NodeKind};
use serde::Deserialize;

/// A fixed infrastructure role in the backbone template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BackboneRole {
    Modem,
    HypervisorHost,
    RouterVm,
    MainSwitch,
    MainRouter,
    IotRouter,
    StreamingSwitch,
}

impl BackboneRole {
    /// All roles in template order (every parent precedes its children).
    pub const ALL: [BackboneRole; 7] = [
        Self::Modem,
        Self::HypervisorHost,
        Self::RouterVm,
        Self::MainSwitch,
        Self::MainRouter,
        Self::IotRouter,
        Self::StreamingSwitch,
    ];

    /// Roles whose absence is reported as critical.
    pub const CRITICAL: [BackboneRole; 4] = [
        Self::MainSwitch,
        Self::MainRouter,
        Self::IotRouter,
        Self::RouterVm,
    ];

    /// Stable node id. Fixed, never discovered.
    pub fn node_id(&self) -> &'static str {
        match self {
            Self::Modem => "Cable Modem",
            Self::HypervisorHost => "Hypervisor Host",
            Self::RouterVm => "Router VM",
            Self::MainSwitch => "Main Switch",
            Self::MainRouter => "Main Router",
            Self::IotRouter => "IoT Router",
            Self::StreamingSwitch => "Streaming Switch",
        }
    }

    pub fn parent(&self) -> Option<BackboneRole> {
        match self {
            Self::Modem => None,
            Self::HypervisorHost => Some(Self::Modem),
            Self::RouterVm => Some(Self::HypervisorHost),
            Self::MainSwitch => Some(Self::RouterVm),
            Self::MainRouter | Self::IotRouter | Self::StreamingSwitch => Some(Self::MainSwitch),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Modem => NodeKind::Modem,
            Self::HypervisorHost => NodeKind::HypervisorHost,
            Self::RouterVm => NodeKind::RouterVm,
            Self::MainSwitch | Self::StreamingSwitch => NodeKind::Switch,
            Self::MainRouter | Self::IotRouter => NodeKind::SubRouter,
        }
    }
}

/// Configured attributes of one backbone node.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct BackboneNode {
    /// Display label; the node id is used when unset.
    #[serde(default)]
    pub label: Option<String>,

    /// Identifying hardware address. Discovered devices with this address
    /// refresh the backbone node instead of becoming leaves.
    #[serde(default)]
    pub mac: Option<MacAddress>,

    /// Provisional address shown until a matching device is observed.
    #[serde(default)]
    pub address: Option<IpAddr>,
}

impl BackboneNode {
    fn new(label: &str, mac: Option<&str>, address: Option<[u8; 4]>) -> Self {
        Self {
            label: Some(label.to_string()),
            mac: mac.and_then(MacAddress::parse),
            address: address.map(|o| IpAddr::V4(Ipv4Addr::from(o))),
        }
    }
}

/// Per-role backbone configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackboneConfig {
    pub modem: BackboneNode,
    pub hypervisor_host: BackboneNode,
    pub router_vm: BackboneNode,
    pub main_switch: BackboneNode,
    pub main_router: BackboneNode,
    pub iot_router: BackboneNode,
    pub streaming_switch: BackboneNode,
}

impl BackboneConfig {
    pub fn get(&self, role: BackboneRole) -> &BackboneNode {
        match role {
            BackboneRole::Modem => &self.modem,
            BackboneRole::HypervisorHost => &self.hypervisor_host,
            BackboneRole::RouterVm => &self.router_vm,
            BackboneRole::MainSwitch => &self.main_switch,
            BackboneRole::MainRouter => &self.main_router,
            BackboneRole::IotRouter => &self.iot_router,
            BackboneRole::StreamingSwitch => &self.streaming_switch,
        }
    }

    /// Label for a role, falling back to its node id.
    pub fn label(&self, role: BackboneRole) -> &str {
        self.get(role).label.as_deref().unwrap_or(role.node_id())
    }

    /// The role identified by a hardware address, if any.
    pub fn role_for_mac(&self, mac: &MacAddress) -> Option<BackboneRole> {
        BackboneRole::ALL
            .into_iter()
            .find(|role| self.get(*role).mac.as_ref() == Some(mac))
    }
}

impl Default for BackboneConfig {
    fn default() -> Self {
        Self {
            modem: BackboneNode::new("Cable Modem", None, None),
            hypervisor_host: BackboneNode::new("Proxmox Host", None, Some([192, 168, 1, 100])),
            router_vm: BackboneNode::new("OPNsense VM", None, Some([192, 168, 1, 1])),
            main_switch: BackboneNode::new(
                "Main Switch",
                Some("d8:07:b6:75:2f:f4"),
                Some([192, 168, 1, 2]),
            ),
            main_router: BackboneNode::new(
                "Main Router",
                Some("60:a4:b7:5c:5a:00"),
                Some([192, 168, 1, 3]),
            ),
            iot_router: BackboneNode::new(
                "IoT Router",
                Some("e4:f4:c6:0b:33:1d"),
                Some([192, 168, 20, 1]),
            ),
            streaming_switch: BackboneNode::new(
                "Streaming Switch",
                Some("54:07:7d:27:69:71"),
                Some([192, 168, 1, 4]),
            ),
        }
    }
}

/// Topology assembly configuration.
///
/// Loaded from the `[topology]` section or `NETMON__TOPOLOGY__` environment
/// variables.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TopologyConfig {
    #[serde(default)]
    pub backbone: BackboneConfig,

    /// Subnets behind the IoT router (IoT and camera VLANs).
    #[serde(default = "default_iot_subnets")]
    pub iot_subnets: Vec<IpNet>,

    /// Hypervisor resource name of the router VM, already represented by
    /// its backbone node.
    #[serde(default = "default_router_vm_resource")]
    pub router_vm_resource: String,
}

fn default_iot_subnets() -> Vec<IpNet> {
    ["192.168.20.0/24", "192.168.30.0/24"]
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect()
}

fn default_router_vm_resource() -> String {
    "OPNsense".to_string()
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            backbone: BackboneConfig::default(),
            iot_subnets: default_iot_subnets(),
            router_vm_resource: default_router_vm_resource(),
        }
    }
}

impl TopologyConfig {
    pub fn in_iot_subnet(&self, address: IpAddr) -> bool {
        self.iot_subnets.iter().any(|net| net.contains(&address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parents_precede_children() {
        for (i, role) in BackboneRole::ALL.iter().enumerate() {
            if let Some(parent) = role.parent() {
                let parent_pos = BackboneRole::ALL.iter().position(|r| *r == parent).unwrap();
                assert!(parent_pos < i, "{role:?} listed before its parent");
            }
        }
    }

    #[test]
    fn test_default_backbone_macs() {
        let config = BackboneConfig::default();
        let mac = MacAddress::parse("E4:F4:C6:0B:33:1D").unwrap();
        assert_eq!(config.role_for_mac(&mac), Some(BackboneRole::IotRouter));
        assert_eq!(config.label(BackboneRole::RouterVm), "OPNsense VM");
    }

    #[test]
    fn test_iot_subnet_membership() {
        let config = TopologyConfig::default();
        assert!(config.in_iot_subnet("192.168.20.14".parse().unwrap()));
        assert!(config.in_iot_subnet("192.168.30.2".parse().unwrap()));
        assert!(!config.in_iot_subnet("192.168.1.20".parse().unwrap()));
    }

    #[test]
    fn test_partial_backbone_override() {
        let config: TopologyConfig = serde_json::from_str(
            r#"{"backbone": {"main_switch": {"mac": "00:11:22:33:44:55"}}}"#,
        )
        .unwrap();
        assert_eq!(config.backbone.label(BackboneRole::MainSwitch), "Main Switch");
        assert_eq!(
            config.backbone.main_switch.mac.as_ref().map(MacAddress::as_str),
            Some("00:11:22:33:44:55")
        );
        // Untouched roles keep their defaults.
        assert_eq!(config.backbone.iot_router, BackboneConfig::default().iot_router);
        assert_eq!(config.iot_subnets.len(), 2);
    }
}
