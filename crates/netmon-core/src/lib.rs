//! netmon-core: Shared types, configuration, and error handling for netmon.
//!
//! This crate provides the foundational types used across all netmon components:
//! - Device records as reported by the discovery probe and the router
//! - Hypervisor resources and hardware-address normalization
//! - Node kinds for the topology graph
//! - Severity-tagged alerts
//! - Layered configuration loading
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use error::NetmonError;
pub use types::{
    Alert, DeviceRecord, LeaseRecord, MacAddress, ManagedResource, NeighborEntry, NodeKind,
    ProbeDevice, ResourceKind, Severity,
};
