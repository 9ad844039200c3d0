//! Nmap XML output deserialization.
//!
//! A ping sweep (`-sn -oX -`) reports host state, addresses and PTR names;
//! only those parts of the document are modelled.

use std::net::IpAddr;

use netmon_core::types::{MacAddress, ProbeDevice};
use serde::Deserialize;

use crate::error::{DiscoverError, Result};

/// Root element: `<nmaprun>`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename = "nmaprun")]
pub struct NmapRun {
    #[serde(rename = "@args")]
    pub args: Option<String>,
    #[serde(rename = "host", default)]
    pub hosts: Vec<SweepHost>,
}

/// One `<host>` of a ping sweep.
#[derive(Debug, Clone, Deserialize)]
pub struct SweepHost {
    #[serde(rename = "status")]
    state: Option<HostState>,
    #[serde(rename = "address", default)]
    addresses: Vec<HostAddress>,
    #[serde(rename = "hostnames", default)]
    names: Option<HostNames>,
}

#[derive(Debug, Clone, Deserialize)]
struct HostState {
    #[serde(rename = "@state")]
    state: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum AddrType {
    Ipv4,
    Ipv6,
    Mac,
}

#[derive(Debug, Clone, Deserialize)]
struct HostAddress {
    #[serde(rename = "@addr")]
    addr: String,
    #[serde(rename = "@addrtype")]
    kind: AddrType,
}

#[derive(Debug, Clone, Deserialize)]
struct HostNames {
    #[serde(rename = "hostname", default)]
    entries: Vec<HostName>,
}

#[derive(Debug, Clone, Deserialize)]
struct HostName {
    #[serde(rename = "@name")]
    name: String,
}

impl SweepHost {
    fn address_of(&self, kind: AddrType) -> Option<&str> {
        self.addresses
            .iter()
            .find(|a| a.kind == kind)
            .map(|a| a.addr.as_str())
    }

    pub fn ipv4(&self) -> Option<&str> {
        self.address_of(AddrType::Ipv4)
    }

    pub fn mac(&self) -> Option<&str> {
        self.address_of(AddrType::Mac)
    }

    /// First reported name, normally the PTR record.
    pub fn hostname(&self) -> Option<&str> {
        self.names
            .as_ref()?
            .entries
            .first()
            .map(|entry| entry.name.as_str())
    }

    pub fn is_up(&self) -> bool {
        matches!(&self.state, Some(s) if s.state == "up")
    }

    /// A live host as a probe record. Hosts that are down or lack a
    /// parseable IPv4 address yield `None`.
    pub fn to_probe_device(&self) -> Option<ProbeDevice> {
        if !self.is_up() {
            return None;
        }
        let address: IpAddr = self.ipv4()?.parse().ok()?;
        Some(ProbeDevice {
            address,
            mac: self.mac().and_then(MacAddress::parse),
            hostname: self.hostname().map(str::to_string),
        })
    }
}

impl NmapRun {
    pub fn probe_devices(&self) -> Vec<ProbeDevice> {
        self.hosts
            .iter()
            .filter_map(SweepHost::to_probe_device)
            .collect()
    }
}

/// Parse a sweep document.
pub fn parse_nmap_xml(xml: &[u8]) -> Result<NmapRun> {
    quick_xml::de::from_reader(xml).map_err(|e| DiscoverError::XmlParse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SWEEP_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nmaprun>
<nmaprun scanner="nmap" args="nmap -sn -oX - 192.168.1.0/24" startstr="Sat Oct 17 10:00:00 2026">
  <host>
    <status state="up" reason="arp-response"/>
    <address addr="192.168.1.50" addrtype="ipv4"/>
    <address addr="AA:BB:CC:DD:EE:01" addrtype="mac" vendor="TestVendor"/>
    <hostnames>
      <hostname name="living-room-tv.lan" type="PTR"/>
    </hostnames>
  </host>
  <host>
    <status state="up" reason="localhost-response"/>
    <address addr="192.168.1.10" addrtype="ipv4"/>
  </host>
  <host>
    <status state="down" reason="no-response"/>
    <address addr="192.168.1.99" addrtype="ipv4"/>
  </host>
  <runstats>
    <finished time="1790000000" elapsed="2.50"/>
    <hosts up="2" down="1" total="3"/>
  </runstats>
</nmaprun>"#;

    #[test]
    fn test_parse_sweep() {
        let run = parse_nmap_xml(SWEEP_XML.as_bytes()).unwrap();
        assert_eq!(run.hosts.len(), 3);
        assert_eq!(run.args.as_deref(), Some("nmap -sn -oX - 192.168.1.0/24"));

        let tv = &run.hosts[0];
        assert!(tv.is_up());
        assert_eq!(tv.ipv4(), Some("192.168.1.50"));
        assert_eq!(tv.mac(), Some("AA:BB:CC:DD:EE:01"));
        assert_eq!(tv.hostname(), Some("living-room-tv.lan"));
    }

    #[test]
    fn test_probe_devices_skip_down_hosts() {
        let devices = parse_nmap_xml(SWEEP_XML.as_bytes()).unwrap().probe_devices();
        assert_eq!(devices.len(), 2);

        assert_eq!(devices[0].address, "192.168.1.50".parse::<IpAddr>().unwrap());
        assert_eq!(
            devices[0].mac.as_ref().map(MacAddress::as_str),
            Some("aa:bb:cc:dd:ee:01")
        );
        assert_eq!(devices[0].hostname.as_deref(), Some("living-room-tv.lan"));

        // The scanning host itself reports no hardware address.
        assert_eq!(devices[1].mac, None);
        assert_eq!(devices[1].hostname, None);
    }

    #[test]
    fn test_parse_empty_sweep() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<nmaprun scanner="nmap" args="nmap -sn 192.168.99.0/24">
  <runstats>
    <finished elapsed="1.00"/>
    <hosts up="0" down="256" total="256"/>
  </runstats>
</nmaprun>"#;
        assert!(parse_nmap_xml(xml.as_bytes()).unwrap().hosts.is_empty());
    }

    #[test]
    fn test_garbage_is_parse_error() {
        assert!(matches!(
            parse_nmap_xml(br#"<nmaprun><host><status state="up"#),
            Err(DiscoverError::XmlParse(_))
        ));
    }
}
