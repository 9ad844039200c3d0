//! Core domain types for the netmon topology.
//!
//! Records as delivered by the three sources (discovery probe, router,
//! hypervisor), the canonical device record they resolve into, and the
//! node kinds and alerts the topology engine produces.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::NetmonError;

// ── Hardware address ──────────────────────────────────────────────

/// A link-layer address in canonical lowercase colon-separated form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress(String);

impl MacAddress {
    /// Parse any common notation (`AA:BB:..`, `aa-bb-..`, `aabb.ccdd.eeff`,
    /// bare hex). Returns `None` for anything that is not 48 bits of hex.
    pub fn parse(raw: &str) -> Option<Self> {
        let digits: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | '.'))
            .collect();

        if digits.len() != 12 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }

        let lower = digits.to_ascii_lowercase();
        let octets: Vec<&str> = (0..6).map(|i| &lower[i * 2..i * 2 + 2]).collect();
        Some(Self(octets.join(":")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for MacAddress {
    type Err = NetmonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| NetmonError::Malformed {
            field: "hardware address",
            value: s.to_string(),
        })
    }
}

impl TryFrom<String> for MacAddress {
    type Error = NetmonError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse an optional raw hardware address, treating malformed input as absent.
pub fn parse_optional_mac(raw: Option<&str>) -> Option<MacAddress> {
    raw.and_then(MacAddress::parse)
}

// ── Hostnames ─────────────────────────────────────────────────────

/// Placeholder some sources report for a hostname they could not resolve.
pub const UNRESOLVED_HOSTNAME: &str = "Unknown";

/// Normalize a reported hostname: empty and the "Unknown" placeholder become `None`.
pub fn normalize_hostname(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() || trimmed == UNRESOLVED_HOSTNAME {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

// ── Device records ────────────────────────────────────────────────

/// One canonical record per observed network endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub address: IpAddr,
    pub mac: Option<MacAddress>,
    /// `None` means unresolved.
    pub hostname: Option<String>,
    /// Operator-assigned label, e.g. a static lease description.
    pub description: Option<String>,
}

impl DeviceRecord {
    pub fn new(address: IpAddr) -> Self {
        Self {
            address,
            mac: None,
            hostname: None,
            description: None,
        }
    }

    pub fn with_mac(mut self, mac: &str) -> Self {
        self.mac = MacAddress::parse(mac);
        self
    }

    pub fn with_hostname(mut self, hostname: &str) -> Self {
        self.hostname = normalize_hostname(Some(hostname));
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = non_empty(Some(description));
        self
    }
}

/// A host answering the active discovery probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeDevice {
    pub address: IpAddr,
    pub mac: Option<MacAddress>,
    pub hostname: Option<String>,
}

/// A row of the router's live neighbor (ARP) table, as delivered.
///
/// Some firmware versions report the address under `ip`, others under
/// `address`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborEntry {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
}

impl NeighborEntry {
    /// The reported address, preferring `ip` over `address`.
    pub fn reported_address(&self) -> Option<&str> {
        [self.ip.as_deref(), self.address.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
    }
}

/// A row of the router's lease table, as delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub descr: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl LeaseRecord {
    pub fn parsed_address(&self) -> Option<IpAddr> {
        self.address.as_deref()?.trim().parse().ok()
    }

    pub fn parsed_mac(&self) -> Option<MacAddress> {
        parse_optional_mac(self.mac.as_deref())
    }

    pub fn resolved_hostname(&self) -> Option<String> {
        normalize_hostname(self.hostname.as_deref())
    }

    /// Operator description; `descr` wins over `description` when both are set.
    pub fn resolved_description(&self) -> Option<String> {
        non_empty(self.descr.as_deref()).or_else(|| non_empty(self.description.as_deref()))
    }
}

// ── Hypervisor resources ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// A hypervisor host.
    Node,
    #[serde(alias = "qemu")]
    Vm,
    #[serde(alias = "lxc")]
    Container,
}

/// A compute resource from the hypervisor inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedResource {
    pub name: String,
    pub kind: ResourceKind,
    pub id: String,
    pub status: Option<String>,
    pub parent_node: Option<String>,
    pub mac: Option<MacAddress>,
}

// ── Topology node kinds ───────────────────────────────────────────

/// The closed set of roles a topology node can have.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    // Infrastructure
    Modem,
    HypervisorHost,
    RouterVm,
    Switch,
    SubRouter,
    // Leaves
    Device,
    SmartTv,
    Camera,
    Mobile,
    VoiceAssistant,
    Printer,
    Computer,
    Server,
    Router,
    HypervisorResource,
}

impl NodeKind {
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::Modem | Self::HypervisorHost | Self::RouterVm | Self::Switch | Self::SubRouter
        )
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Modem => "Modem",
            Self::HypervisorHost => "Hypervisor Host",
            Self::RouterVm => "Router VM",
            Self::Switch => "Switch",
            Self::SubRouter => "Sub-Router",
            Self::Device => "Device",
            Self::SmartTv => "Smart TV",
            Self::Camera => "Camera",
            Self::Mobile => "Mobile",
            Self::VoiceAssistant => "Voice Assistant",
            Self::Printer => "Printer",
            Self::Computer => "Computer",
            Self::Server => "Server",
            Self::Router => "Router",
            Self::HypervisorResource => "Hypervisor Resource",
        }
    }
}

// ── Alerts ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A severity-tagged finding, from a provider or derived from the graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub severity: Severity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self::at(severity, message, Utc::now())
    }

    pub fn at(severity: Severity, message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            severity,
            message: message.into(),
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_normalizes_case_and_separators() {
        let expected = "aa:bb:cc:dd:ee:01";
        assert_eq!(MacAddress::parse("AA:BB:CC:DD:EE:01").unwrap().as_str(), expected);
        assert_eq!(MacAddress::parse("aa-bb-cc-dd-ee-01").unwrap().as_str(), expected);
        assert_eq!(MacAddress::parse("aabb.ccdd.ee01").unwrap().as_str(), expected);
        assert_eq!(MacAddress::parse(" AABBCCDDEE01 ").unwrap().as_str(), expected);
    }

    #[test]
    fn mac_rejects_malformed() {
        assert!(MacAddress::parse("").is_none());
        assert!(MacAddress::parse("aa:bb:cc:dd:ee").is_none());
        assert!(MacAddress::parse("zz:bb:cc:dd:ee:01").is_none());
        assert!("not-a-mac".parse::<MacAddress>().is_err());
    }

    #[test]
    fn mac_deserializes_through_normalization() {
        let mac: MacAddress = serde_json::from_str("\"D8:07:B6:75:2F:F4\"").unwrap();
        assert_eq!(mac.as_str(), "d8:07:b6:75:2f:f4");
        assert!(serde_json::from_str::<MacAddress>("\"bogus\"").is_err());
    }

    #[test]
    fn unknown_hostname_is_unresolved() {
        assert_eq!(normalize_hostname(Some("Unknown")), None);
        assert_eq!(normalize_hostname(Some("   ")), None);
        assert_eq!(normalize_hostname(None), None);
        assert_eq!(normalize_hostname(Some(" nas ")), Some("nas".to_string()));
        // Only the exact placeholder is unresolved.
        assert_eq!(normalize_hostname(Some("unknown")), Some("unknown".to_string()));
        assert_eq!(normalize_hostname(Some("UNKNOWN")), Some("UNKNOWN".to_string()));
    }

    #[test]
    fn neighbor_entry_falls_back_to_alternate_address() {
        let entry: NeighborEntry =
            serde_json::from_str(r#"{"address": "192.168.1.9", "mac": "aa:bb:cc:dd:ee:09"}"#)
                .unwrap();
        assert_eq!(entry.reported_address(), Some("192.168.1.9"));

        let both = NeighborEntry {
            ip: Some("10.0.0.1".to_string()),
            address: Some("10.0.0.2".to_string()),
            ..Default::default()
        };
        assert_eq!(both.reported_address(), Some("10.0.0.1"));
    }

    #[test]
    fn lease_prefers_descr() {
        let lease = LeaseRecord {
            descr: Some("Office printer".to_string()),
            description: Some("ignored".to_string()),
            ..Default::default()
        };
        assert_eq!(lease.resolved_description().as_deref(), Some("Office printer"));

        let blank = LeaseRecord {
            descr: Some(String::new()),
            description: Some("fallback".to_string()),
            ..Default::default()
        };
        assert_eq!(blank.resolved_description().as_deref(), Some("fallback"));
    }

    #[test]
    fn resource_kind_accepts_hypervisor_names() {
        let vm: ResourceKind = serde_json::from_str("\"qemu\"").unwrap();
        let ct: ResourceKind = serde_json::from_str("\"lxc\"").unwrap();
        assert_eq!(vm, ResourceKind::Vm);
        assert_eq!(ct, ResourceKind::Container);
    }

    #[test]
    fn severity_serializes_lowercase() {
        let alert = Alert::new(Severity::Warning, "x");
        let json = serde_json::to_string(&alert).unwrap();
        assert!(json.contains("\"severity\":\"warning\""));
    }

    #[test]
    fn infrastructure_kinds() {
        assert!(NodeKind::RouterVm.is_infrastructure());
        assert!(NodeKind::SubRouter.is_infrastructure());
        assert!(!NodeKind::SmartTv.is_infrastructure());
        assert!(!NodeKind::HypervisorResource.is_infrastructure());
        assert_eq!(NodeKind::SmartTv.display_name(), "Smart TV");
    }
}
