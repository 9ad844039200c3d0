//! netmon-discover: Source clients, scan cycles and the HTTP API.
//!
//! Sweeps the local segment with nmap, reads the router's lease and
//! neighbor tables and the hypervisor inventory, feeds them through
//! `netmon-topology` on every cycle, and serves the published snapshot
//! and derived alerts over HTTP.

pub mod advisory;
pub mod alerts;
pub mod api;
pub mod config;
pub mod cycle;
pub mod error;
pub mod hypervisor;
pub mod nmap_xml;
pub mod notify;
pub mod probe;
pub mod router;
pub mod sources;
