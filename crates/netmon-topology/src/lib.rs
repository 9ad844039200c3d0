//! netmon-topology: Fuses device records into the network topology graph.
//!
//! Resolves probe, neighbor-table and lease records into one record per
//! address, rebuilds the graph from the backbone template on every cycle,
//! overlays hypervisor resources, publishes immutable snapshots, and derives
//! alerts from whatever snapshot is current.

pub mod alerts;
pub mod assemble;
pub mod classify;
pub mod config;
pub mod error;
pub mod graph;
pub mod resolve;
pub mod store;

pub use alerts::{derive_alerts, fallback_insights};
pub use assemble::TopologyAssembler;
pub use config::{BackboneRole, TopologyConfig};
pub use error::TopologyError;
pub use graph::{TopologyEdge, TopologyGraph, TopologyNode};
pub use resolve::{resolve, CorrelationTable, Resolution};
pub use store::{TopologySnapshot, TopologyStore};
