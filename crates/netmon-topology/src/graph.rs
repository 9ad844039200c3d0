//! Owned topology graph.
//!
//! Nodes are keyed by their stable id; edges are undirected and deduplicated
//! by endpoint pair, stored parent → child for presentation. Both maps are
//! ordered, so iteration (and therefore snapshots) is deterministic.

use std::collections::BTreeMap;
use std::net::IpAddr;

use netmon_core::types::{MacAddress, NodeKind};
use crate::error::{Result, TopologyError};

/// A vertex in the topology graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyNode {
    pub id: String,
    /// Display name: description, else hostname, else blank.
    pub label: String,
    pub kind: NodeKind,
    pub address: Option<IpAddr>,
    pub mac: Option<MacAddress>,
    pub hostname: Option<String>,
    pub status: Option<String>,
}

impl TopologyNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            address: None,
            mac: None,
            hostname: None,
            status: None,
        }
    }
}

/// Undirected adjacency between two node ids.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TopologyEdge {
    pub source: String,
    pub target: String,
}

impl TopologyEdge {
    pub fn touches(&self, id: &str) -> bool {
        self.source == id || self.target == id
    }

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

fn edge_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct TopologyGraph {
    nodes: BTreeMap<String, TopologyNode>,
    edges: BTreeMap<(String, String), TopologyEdge>,
}

impl TopologyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node. Ids are unique: a second node with the same id is an
    /// invariant violation.
    pub fn insert_node(&mut self, node: TopologyNode) -> Result<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(TopologyError::DuplicateNode { id: node.id });
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&TopologyNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut TopologyNode> {
        self.nodes.get_mut(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TopologyNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &TopologyEdge> {
        self.edges.values()
    }

    /// Connect `source` (parent) to `target` (child). Connecting an already
    /// adjacent pair is a no-op.
    pub fn connect(&mut self, source: &str, target: &str) -> Result<()> {
        for id in [source, target] {
            if !self.contains(id) {
                return Err(TopologyError::UnknownNode { id: id.to_string() });
            }
        }

        self.edges
            .entry(edge_key(source, target))
            .or_insert_with(|| TopologyEdge {
                source: source.to_string(),
                target: target.to_string(),
            });
        Ok(())
    }

    /// Remove every edge touching `id`. Returns how many were removed.
    pub fn detach(&mut self, id: &str) -> usize {
        let before = self.edges.len();
        self.edges.retain(|_, edge| !edge.touches(id));
        before - self.edges.len()
    }

    /// Edges with `id` as an endpoint.
    pub fn edges_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a TopologyEdge> + 'a {
        self.edges.values().filter(move |e| e.touches(id))
    }

    /// Ids adjacent to `id`, in edge order.
    pub fn neighbors(&self, id: &str) -> Vec<&str> {
        self.edges.values().filter_map(|e| e.other(id)).collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub(crate) fn into_parts(self) -> (Vec<TopologyNode>, Vec<TopologyEdge>) {
        (
            self.nodes.into_values().collect(),
            self.edges.into_values().collect(),
        )
    }
}
