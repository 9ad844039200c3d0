//! Published topology snapshots.
//!
//! Readers always see a complete graph: a snapshot is built in full before
//! it replaces the current one, and replacement is a single pointer swap.

use std::net::IpAddr;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use netmon_core::types::{MacAddress, NodeKind};
use serde::Serialize;

use crate::graph::{TopologyEdge, TopologyGraph, TopologyNode};

/// Node attributes as rendered by the frontend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeData {
    pub label: String,
    pub ip: Option<IpAddr>,
    pub mac: Option<MacAddress>,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub status: Option<String>,
    pub hostname: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotNode {
    pub id: String,
    pub data: NodeData,
}

impl From<TopologyNode> for SnapshotNode {
    fn from(node: TopologyNode) -> Self {
        Self {
            id: node.id,
            data: NodeData {
                label: node.label,
                ip: node.address,
                mac: node.mac,
                kind: node.kind,
                status: node.status,
                hostname: node.hostname,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

impl SnapshotEdge {
    /// The endpoint opposite `id`.
    pub fn other(&self, id: &str) -> Option<&str> {
        if self.source == id {
            Some(self.target.as_str())
        } else if self.target == id {
            Some(self.source.as_str())
        } else {
            None
        }
    }
}

impl From<TopologyEdge> for SnapshotEdge {
    fn from(edge: TopologyEdge) -> Self {
        Self {
            id: format!("e{}-{}", edge.source, edge.target),
            source: edge.source,
            target: edge.target,
        }
    }
}

/// An immutable view of one assembled topology.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TopologySnapshot {
    pub nodes: Vec<SnapshotNode>,
    pub edges: Vec<SnapshotEdge>,
    pub last_update: Option<DateTime<Utc>>,
}

impl TopologySnapshot {
    /// The snapshot served before the first cycle completes.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_graph(graph: TopologyGraph, last_update: DateTime<Utc>) -> Self {
        let (nodes, edges) = graph.into_parts();
        Self {
            nodes: nodes.into_iter().map(SnapshotNode::from).collect(),
            edges: edges.into_iter().map(SnapshotEdge::from).collect(),
            last_update: Some(last_update),
        }
    }

    pub fn node(&self, id: &str) -> Option<&SnapshotNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn neighbors(&self, id: &str) -> Vec<&str> {
        self.edges.iter().filter_map(|e| e.other(id)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Holder of the current snapshot.
#[derive(Debug)]
pub struct TopologyStore {
    current: RwLock<Arc<TopologySnapshot>>,
}

impl Default for TopologyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TopologyStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(TopologySnapshot::empty())),
        }
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> Arc<TopologySnapshot> {
        let guard = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Replace the current snapshot with one built from `graph`.
    pub fn publish(&self, graph: TopologyGraph) -> Arc<TopologySnapshot> {
        let snapshot = Arc::new(TopologySnapshot::from_graph(graph, Utc::now()));

        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::clone(&snapshot);
        drop(guard);

        tracing::info!(
            nodes = snapshot.nodes.len(),
            edges = snapshot.edges.len(),
            "Published topology snapshot"
        );
        snapshot
    }
}
