//! Alert evaluation against the current snapshot.
//!
//! Collects router health, graph-derived findings, advisory or heuristic
//! insights and hypervisor reachability, then pushes any errors through the
//! notifier. Every collaborator may be down; evaluation always returns.

use std::sync::Arc;

use netmon_core::types::{Alert, Severity};
use netmon_topology::{derive_alerts, fallback_insights, TopologySnapshot};

use crate::notify::Notifier;
use crate::sources::{Advisor, InventorySource, RouterSource};

pub const HYPERVISOR_UNREACHABLE: &str = "hypervisor API unreachable or no nodes found";

#[derive(Clone)]
pub struct AlertPipeline {
    router: Arc<dyn RouterSource>,
    hypervisor: Arc<dyn InventorySource>,
    advisor: Arc<dyn Advisor>,
    notifier: Arc<Notifier>,
}

impl AlertPipeline {
    pub fn new(
        router: Arc<dyn RouterSource>,
        hypervisor: Arc<dyn InventorySource>,
        advisor: Arc<dyn Advisor>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            router,
            hypervisor,
            advisor,
            notifier,
        }
    }

    pub async fn evaluate(&self, snapshot: &TopologySnapshot) -> Vec<Alert> {
        let provider = self.router.system_alerts().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Router health unavailable");
            Vec::new()
        });

        let mut alerts = derive_alerts(snapshot, &provider);
        alerts.extend(self.insights(snapshot, &provider).await);

        if self.hypervisor.is_configured() {
            let reachable = match self.hypervisor.reachable().await {
                Ok(reachable) => reachable,
                Err(e) => {
                    tracing::warn!(error = %e, "Hypervisor health check failed");
                    false
                }
            };
            if !reachable {
                alerts.push(Alert::new(Severity::Warning, HYPERVISOR_UNREACHABLE));
            }
        }

        match self.notifier.notify_errors(&alerts).await {
            Ok(outcome) => tracing::debug!(?outcome, "Notification pass complete"),
            Err(e) => tracing::error!(error = %e, "Failed to send alert notification"),
        }

        alerts
    }

    async fn insights(&self, snapshot: &TopologySnapshot, provider: &[Alert]) -> Vec<Alert> {
        if !self.advisor.available().await {
            return fallback_insights(snapshot, provider);
        }
        match self.advisor.analyze(snapshot, provider).await {
            Ok(findings) => findings,
            Err(e) => {
                tracing::warn!(error = %e, "Advisory analysis failed, using heuristics");
                fallback_insights(snapshot, provider)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::sources::BoxFuture;

    /// Advisor with a scripted answer. `None` findings means the call fails.
    #[derive(Default)]
    pub struct FakeAdvisor {
        pub available: bool,
        pub findings: Option<Vec<Alert>>,
        pub reply: Option<String>,
    }

    impl Advisor for FakeAdvisor {
        fn available<'a>(&'a self) -> BoxFuture<'a, bool> {
            Box::pin(async move { self.available })
        }

        fn analyze<'a>(
            &'a self,
            _snapshot: &'a TopologySnapshot,
            _provider_alerts: &'a [Alert],
        ) -> BoxFuture<'a, anyhow::Result<Vec<Alert>>> {
            Box::pin(async move {
                self.findings
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("model returned prose"))
            })
        }

        fn chat<'a>(
            &'a self,
            _message: &'a str,
            _snapshot: &'a TopologySnapshot,
        ) -> BoxFuture<'a, anyhow::Result<String>> {
            Box::pin(async move {
                self.reply
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("connection reset"))
            })
        }
    }
}
