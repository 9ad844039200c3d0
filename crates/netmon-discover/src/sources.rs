//! Collaborator seams used by the scan cycle and the alert pipeline.
//!
//! Each trait returns boxed futures so the coordinator can hold sources as
//! `Arc<dyn _>` and tests can substitute in-memory fakes.

use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::time::Duration;

use netmon_core::types::{Alert, LeaseRecord, ManagedResource, NeighborEntry, ProbeDevice};
use netmon_topology::TopologySnapshot;
use reqwest::Client;

use crate::advisory::OllamaAdvisor;
use crate::error::{DiscoverError, Result};
use crate::hypervisor::HypervisorClient;
use crate::probe::NmapProbe;
use crate::router::RouterClient;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Active local-segment discovery.
pub trait DeviceProbe: Send + Sync {
    fn sweep<'a>(&'a self) -> BoxFuture<'a, Result<Vec<ProbeDevice>>>;
}

/// Router lease table, neighbor table and health.
pub trait RouterSource: Send + Sync {
    fn neighbors<'a>(&'a self) -> BoxFuture<'a, Result<Vec<NeighborEntry>>>;
    fn leases<'a>(&'a self) -> BoxFuture<'a, Result<Vec<LeaseRecord>>>;
    fn system_alerts<'a>(&'a self) -> BoxFuture<'a, Result<Vec<Alert>>>;
}

/// Hypervisor inventory.
pub trait InventorySource: Send + Sync {
    fn is_configured(&self) -> bool;
    fn resources<'a>(&'a self) -> BoxFuture<'a, Result<Vec<ManagedResource>>>;
    fn reachable<'a>(&'a self) -> BoxFuture<'a, Result<bool>>;
}

/// Externally observed address of the uplink.
pub trait PublicAddressSource: Send + Sync {
    fn lookup<'a>(&'a self) -> BoxFuture<'a, Result<IpAddr>>;
}

/// Advisory summarizer.
pub trait Advisor: Send + Sync {
    fn available<'a>(&'a self) -> BoxFuture<'a, bool>;
    fn analyze<'a>(
        &'a self,
        snapshot: &'a TopologySnapshot,
        provider_alerts: &'a [Alert],
    ) -> BoxFuture<'a, anyhow::Result<Vec<Alert>>>;
    fn chat<'a>(
        &'a self,
        message: &'a str,
        snapshot: &'a TopologySnapshot,
    ) -> BoxFuture<'a, anyhow::Result<String>>;
}

impl DeviceProbe for NmapProbe {
    fn sweep<'a>(&'a self) -> BoxFuture<'a, Result<Vec<ProbeDevice>>> {
        Box::pin(NmapProbe::sweep(self))
    }
}

impl RouterSource for RouterClient {
    fn neighbors<'a>(&'a self) -> BoxFuture<'a, Result<Vec<NeighborEntry>>> {
        Box::pin(RouterClient::neighbors(self))
    }

    fn leases<'a>(&'a self) -> BoxFuture<'a, Result<Vec<LeaseRecord>>> {
        Box::pin(RouterClient::leases(self))
    }

    fn system_alerts<'a>(&'a self) -> BoxFuture<'a, Result<Vec<Alert>>> {
        Box::pin(RouterClient::system_alerts(self))
    }
}

impl InventorySource for HypervisorClient {
    fn is_configured(&self) -> bool {
        HypervisorClient::is_configured(self)
    }

    fn resources<'a>(&'a self) -> BoxFuture<'a, Result<Vec<ManagedResource>>> {
        Box::pin(HypervisorClient::resources(self))
    }

    fn reachable<'a>(&'a self) -> BoxFuture<'a, Result<bool>> {
        Box::pin(HypervisorClient::reachable(self))
    }
}

impl Advisor for OllamaAdvisor {
    fn available<'a>(&'a self) -> BoxFuture<'a, bool> {
        Box::pin(OllamaAdvisor::available(self))
    }

    fn analyze<'a>(
        &'a self,
        snapshot: &'a TopologySnapshot,
        provider_alerts: &'a [Alert],
    ) -> BoxFuture<'a, anyhow::Result<Vec<Alert>>> {
        Box::pin(OllamaAdvisor::analyze(self, snapshot, provider_alerts))
    }

    fn chat<'a>(
        &'a self,
        message: &'a str,
        snapshot: &'a TopologySnapshot,
    ) -> BoxFuture<'a, anyhow::Result<String>> {
        Box::pin(OllamaAdvisor::chat(self, message, snapshot))
    }
}

/// Plain-text "what is my IP" lookup.
#[derive(Debug, Clone)]
pub struct PublicIpLookup {
    http: Client,
    url: String,
}

impl PublicIpLookup {
    pub const TIMEOUT: Duration = Duration::from_secs(3);

    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = Client::builder().timeout(Self::TIMEOUT).build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    pub async fn lookup(&self) -> Result<IpAddr> {
        let body = self
            .http
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        body.trim()
            .parse()
            .map_err(|_| DiscoverError::unavailable("public address", format!("unexpected reply: {}", body.trim())))
    }
}

impl PublicAddressSource for PublicIpLookup {
    fn lookup<'a>(&'a self) -> BoxFuture<'a, Result<IpAddr>> {
        Box::pin(PublicIpLookup::lookup(self))
    }
}
