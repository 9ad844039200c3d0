//! Scan cycle coordination.
//!
//! A cycle gathers every source, resolves identities, rebuilds the graph,
//! overlays the hypervisor inventory and publishes one snapshot. Cycles are
//! mutually exclusive: a single-permit semaphore guards them, and a trigger
//! while a cycle is in flight is rejected as busy.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{interval_at, Duration, MissedTickBehavior};
use uuid::Uuid;

use netmon_topology::{resolve, TopologyAssembler, TopologyConfig, TopologyStore};

use crate::error::{DiscoverError, Result};
use crate::sources::{DeviceProbe, InventorySource, PublicAddressSource, RouterSource};

/// The collaborators a cycle reads from.
#[derive(Clone)]
pub struct Sources {
    pub probe: Arc<dyn DeviceProbe>,
    pub router: Arc<dyn RouterSource>,
    pub hypervisor: Arc<dyn InventorySource>,
    pub public_address: Arc<dyn PublicAddressSource>,
}

/// Outcome of one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub scan_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub devices: usize,
    pub nodes: usize,
    pub edges: usize,
    pub resources: usize,
    /// Sources that failed and contributed no data.
    pub degraded_sources: Vec<String>,
    /// Invariant violation that blocked publication.
    pub error: Option<String>,
    pub published: bool,
}

impl CycleReport {
    fn new(scan_id: Uuid) -> Self {
        Self {
            scan_id,
            started_at: Utc::now(),
            duration_ms: 0,
            devices: 0,
            nodes: 0,
            edges: 0,
            resources: 0,
            degraded_sources: Vec::new(),
            error: None,
            published: false,
        }
    }

    /// Fail unless this cycle published a snapshot.
    pub fn ensure_published(&self) -> Result<()> {
        if self.published {
            return Ok(());
        }
        Err(DiscoverError::NotPublished {
            scan_id: self.scan_id,
            reason: self
                .error
                .clone()
                .unwrap_or_else(|| "no snapshot produced".to_string()),
        })
    }

    fn degrade(&mut self, source: &str, error: &DiscoverError) {
        tracing::warn!(scan_id = %self.scan_id, source, error = %error, "Source unavailable, continuing without it");
        self.degraded_sources.push(source.to_string());
    }
}

/// Runs scan cycles against a shared snapshot store.
pub struct ScanCoordinator {
    sources: Sources,
    assembler: TopologyAssembler,
    store: Arc<TopologyStore>,
    in_flight: Arc<Semaphore>,
    last_report: RwLock<Option<CycleReport>>,
}

impl ScanCoordinator {
    pub fn new(sources: Sources, topology: TopologyConfig, store: Arc<TopologyStore>) -> Self {
        Self {
            sources,
            assembler: TopologyAssembler::new(topology),
            store,
            in_flight: Arc::new(Semaphore::new(1)),
            last_report: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &Arc<TopologyStore> {
        &self.store
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.available_permits() == 0
    }

    pub fn last_report(&self) -> Option<CycleReport> {
        self.last_report
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn try_begin(&self) -> Result<OwnedSemaphorePermit> {
        Arc::clone(&self.in_flight)
            .try_acquire_owned()
            .map_err(|_| DiscoverError::CycleInProgress)
    }

    /// Start a cycle in the background. Returns its scan id, or
    /// `CycleInProgress` if one is already running.
    pub fn trigger(self: &Arc<Self>) -> Result<Uuid> {
        let permit = self.try_begin()?;
        let scan_id = Uuid::new_v4();
        let this = Arc::clone(self);

        tokio::spawn(async move {
            this.execute(scan_id).await;
            drop(permit);
        });

        Ok(scan_id)
    }

    /// Run one cycle to completion.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let _permit = self.try_begin()?;
        Ok(self.execute(Uuid::new_v4()).await)
    }

    /// Run cycles on a fixed interval until the task is dropped. The first
    /// run is one interval out. Ticks that land while a cycle is still
    /// running are skipped.
    pub async fn run_periodic(self: Arc<Self>, every: Duration) {
        let mut ticker = interval_at(tokio::time::Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            tracing::info!(interval_secs = every.as_secs(), "Scheduled scan triggered");

            match self.run_cycle().await {
                Ok(_) => {}
                Err(DiscoverError::CycleInProgress) => {
                    tracing::info!("Cycle already in progress, skipping scheduled run");
                }
                Err(e) => tracing::error!(error = %e, "Scheduled scan failed"),
            }
        }
    }

    async fn execute(&self, scan_id: Uuid) -> CycleReport {
        let start = Instant::now();
        let mut report = CycleReport::new(scan_id);
        tracing::info!(scan_id = %scan_id, "Starting scan cycle");

        if let Err(e) = self.rebuild(&mut report).await {
            tracing::error!(scan_id = %scan_id, error = %e, "Topology invariant violated, keeping previous snapshot");
            report.error = Some(e.to_string());
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            scan_id = %scan_id,
            devices = report.devices,
            nodes = report.nodes,
            edges = report.edges,
            resources = report.resources,
            degraded = report.degraded_sources.len(),
            published = report.published,
            duration_ms = report.duration_ms,
            "Scan cycle complete"
        );

        *self
            .last_report
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(report.clone());
        report
    }

    /// Gather → resolve → rebuild → overlay → publish. Source failures
    /// degrade in place; only topology invariant violations are returned.
    async fn rebuild(&self, report: &mut CycleReport) -> Result<()> {
        let (probe, neighbors, leases) = tokio::join!(
            self.sources.probe.sweep(),
            self.sources.router.neighbors(),
            self.sources.router.leases(),
        );
        let probe = probe.unwrap_or_else(|e| {
            report.degrade("probe", &e);
            Vec::new()
        });
        let neighbors = neighbors.unwrap_or_else(|e| {
            report.degrade("router.neighbors", &e);
            Vec::new()
        });
        let leases = leases.unwrap_or_else(|e| {
            report.degrade("router.leases", &e);
            Vec::new()
        });

        let resolution = resolve(&probe, &neighbors, &leases);
        report.devices = resolution.devices.len();

        let mut graph = self.assembler.rebuild(&resolution.devices)?;

        match self.sources.public_address.lookup().await {
            Ok(address) => self.assembler.set_public_address(&mut graph, address),
            Err(e) => report.degrade("public_address", &e),
        }

        let resources = self.sources.hypervisor.resources().await.unwrap_or_else(|e| {
            report.degrade("hypervisor", &e);
            Vec::new()
        });
        report.resources = resources.len();
        self.assembler
            .add_managed_resources(&mut graph, &resources, &resolution.correlation)?;

        report.nodes = graph.node_count();
        report.edges = graph.edge_count();
        self.store.publish(graph);
        report.published = true;
        Ok(())
    }
}
