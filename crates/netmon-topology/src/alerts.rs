//! Alert derivation over a published snapshot.
//!
//! External alerts (router, advisory) pass through first; graph rules run
//! after them in table order. Rules are isolated: a rule that fails is
//! logged and contributes nothing.

use chrono::{DateTime, Utc};
use netmon_core::types::{Alert, NodeKind, Severity};

use crate::config::BackboneRole;
use crate::error::Result;
use crate::store::TopologySnapshot;

/// One graph rule.
#[derive(Clone, Copy)]
pub struct AlertRule {
    pub name: &'static str,
    pub check: fn(&TopologySnapshot, DateTime<Utc>) -> Result<Vec<Alert>>,
}

impl std::fmt::Debug for AlertRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertRule").field("name", &self.name).finish()
    }
}

pub const GRAPH_RULES: &[AlertRule] = &[
    AlertRule {
        name: "missing_backbone",
        check: missing_backbone,
    },
    AlertRule {
        name: "unknown_devices",
        check: unknown_devices,
    },
];

/// External alerts followed by the graph-derived ones.
pub fn derive_alerts(snapshot: &TopologySnapshot, external: &[Alert]) -> Vec<Alert> {
    derive_alerts_with(GRAPH_RULES, snapshot, external)
}

pub fn derive_alerts_with(
    rules: &[AlertRule],
    snapshot: &TopologySnapshot,
    external: &[Alert],
) -> Vec<Alert> {
    let timestamp = snapshot.last_update.unwrap_or_else(Utc::now);
    let mut alerts = external.to_vec();

    for rule in rules {
        match (rule.check)(snapshot, timestamp) {
            Ok(found) => alerts.extend(found),
            Err(e) => {
                tracing::warn!(rule = rule.name, error = %e, "Alert rule failed");
            }
        }
    }

    alerts
}

fn missing_backbone(snapshot: &TopologySnapshot, at: DateTime<Utc>) -> Result<Vec<Alert>> {
    Ok(BackboneRole::CRITICAL
        .iter()
        .filter(|role| !snapshot.contains(role.node_id()))
        .map(|role| {
            Alert::at(
                Severity::Error,
                format!("critical infrastructure missing: {}", role.node_id()),
                at,
            )
        })
        .collect())
}

fn unknown_devices(snapshot: &TopologySnapshot, at: DateTime<Utc>) -> Result<Vec<Alert>> {
    let mut alerts = Vec::new();

    for node in &snapshot.nodes {
        if node.data.kind.is_infrastructure() {
            continue;
        }
        if !snapshot.edges.iter().any(|e| e.other(&node.id).is_some()) {
            tracing::warn!(node = %node.id, "Leaf node has no edge");
        }

        let label = node.data.label.trim();
        if label.is_empty() || label.contains("Unknown") {
            let address = node
                .data
                .ip
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "No IP".to_string());
            alerts.push(Alert::at(
                Severity::Warning,
                format!("unknown device detected: {address}"),
                at,
            ));
        }
    }

    Ok(alerts)
}

/// Heuristic insights used when the advisory summarizer is unavailable.
pub fn fallback_insights(snapshot: &TopologySnapshot, provider_alerts: &[Alert]) -> Vec<Alert> {
    let mut insights = Vec::new();

    let unresolved = snapshot
        .nodes
        .iter()
        .filter(|n| {
            !n.data.kind.is_infrastructure()
                && n.data.kind != NodeKind::HypervisorResource
                && n.data.hostname.is_none()
        })
        .count();
    if unresolved > 0 {
        insights.push(Alert::new(
            Severity::Info,
            format!("detected {unresolved} devices with unknown hostnames"),
        ));
    }

    if provider_alerts.iter().any(|a| a.message.contains("CPU")) {
        insights.push(Alert::new(Severity::Warning, "high firewall load detected"));
    }

    insights
}
