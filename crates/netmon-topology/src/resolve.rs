//! Identity resolution across the discovery probe and the router tables.
//!
//! Produces one canonical [`DeviceRecord`] per address, plus the
//! hardware-address correlation table used to place hypervisor resources.

use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;

use netmon_core::types::{
    normalize_hostname, parse_optional_mac, DeviceRecord, LeaseRecord, MacAddress, NeighborEntry,
    ProbeDevice,
};
use serde::Serialize;

/// Likely network identity of a hardware address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrelationEntry {
    pub address: IpAddr,
    pub hostname: Option<String>,
}

/// Hardware address → network identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationTable {
    entries: BTreeMap<MacAddress, CorrelationEntry>,
}

impl CorrelationTable {
    pub fn get(&self, mac: &MacAddress) -> Option<&CorrelationEntry> {
        self.entries.get(mac)
    }

    pub fn insert(&mut self, mac: MacAddress, entry: CorrelationEntry) {
        self.entries.insert(mac, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Output of one resolution pass.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Resolved records, ordered by address.
    pub devices: Vec<DeviceRecord>,
    pub correlation: CorrelationTable,
    /// Neighbor rows dropped for lacking a usable address or hardware address.
    pub skipped: usize,
}

/// Merge the three sources into resolved device records.
///
/// Any source may be empty (unavailable this cycle); resolution itself
/// cannot fail.
pub fn resolve(
    probe: &[ProbeDevice],
    neighbors: &[NeighborEntry],
    leases: &[LeaseRecord],
) -> Resolution {
    let mut records: BTreeMap<IpAddr, DeviceRecord> = BTreeMap::new();

    for found in probe {
        records.entry(found.address).or_insert_with(|| DeviceRecord {
            address: found.address,
            mac: found.mac.clone(),
            hostname: normalize_hostname(found.hostname.as_deref()),
            description: None,
        });
    }

    let skipped = merge_neighbors(&mut records, neighbors);
    enrich_from_leases(&mut records, leases);
    let correlation = build_correlation(&records, leases);

    tracing::debug!(
        probe = probe.len(),
        neighbors = neighbors.len(),
        leases = leases.len(),
        resolved = records.len(),
        skipped,
        correlated = correlation.len(),
        "Identity resolution complete"
    );

    Resolution {
        devices: records.into_values().collect(),
        correlation,
        skipped,
    }
}

/// Fold live neighbor rows into the record set. Returns the number skipped.
fn merge_neighbors(records: &mut BTreeMap<IpAddr, DeviceRecord>, neighbors: &[NeighborEntry]) -> usize {
    let mut skipped = 0;

    for entry in neighbors {
        let address = entry
            .reported_address()
            .and_then(|raw| raw.parse::<IpAddr>().ok());
        let mac = parse_optional_mac(entry.mac.as_deref());

        let (Some(address), Some(mac)) = (address, mac) else {
            skipped += 1;
            continue;
        };
        let hostname = normalize_hostname(entry.hostname.as_deref());

        match records.get_mut(&address) {
            Some(existing) => {
                if existing.mac.is_none() {
                    existing.mac = Some(mac);
                }
                if existing.hostname.is_none() {
                    existing.hostname = hostname;
                }
            }
            None => {
                records.insert(
                    address,
                    DeviceRecord {
                        address,
                        mac: Some(mac),
                        hostname,
                        description: None,
                    },
                );
            }
        }
    }

    skipped
}

/// Fill unresolved hostnames and empty descriptions from the lease table.
fn enrich_from_leases(records: &mut BTreeMap<IpAddr, DeviceRecord>, leases: &[LeaseRecord]) {
    let mut by_address: HashMap<IpAddr, &LeaseRecord> = HashMap::new();
    let mut by_mac: HashMap<MacAddress, &LeaseRecord> = HashMap::new();

    for lease in leases {
        if let Some(address) = lease.parsed_address() {
            by_address.insert(address, lease);
        }
        if let Some(mac) = lease.parsed_mac() {
            by_mac.insert(mac, lease);
        }
    }

    for record in records.values_mut() {
        if let Some(lease) = by_address.get(&record.address) {
            if record.hostname.is_none() {
                record.hostname = lease.resolved_hostname();
            }
            if record.description.is_none() {
                record.description = lease.resolved_description();
            }
        }

        if record.description.is_none() {
            if let Some(lease) = record.mac.as_ref().and_then(|mac| by_mac.get(mac)) {
                record.description = lease.resolved_description();
            }
        }
    }
}

/// Leases first, then live records on top: observed beats reserved.
fn build_correlation(
    records: &BTreeMap<IpAddr, DeviceRecord>,
    leases: &[LeaseRecord],
) -> CorrelationTable {
    let mut table = CorrelationTable::default();

    for lease in leases {
        if let (Some(mac), Some(address)) = (lease.parsed_mac(), lease.parsed_address()) {
            table.insert(
                mac,
                CorrelationEntry {
                    address,
                    hostname: lease.resolved_hostname(),
                },
            );
        }
    }

    for record in records.values() {
        if let Some(mac) = &record.mac {
            table.insert(
                mac.clone(),
                CorrelationEntry {
                    address: record.address,
                    hostname: record.hostname.clone(),
                },
            );
        }
    }

    table
}
