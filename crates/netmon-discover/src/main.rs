//! CLI entry point for the netmon daemon.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use netmon_topology::TopologyStore;

use netmon_discover::advisory::OllamaAdvisor;
use netmon_discover::alerts::AlertPipeline;
use netmon_discover::api::{start_server, AppState};
use netmon_discover::config::MonitorConfig;
use netmon_discover::cycle::{ScanCoordinator, Sources};
use netmon_discover::hypervisor::HypervisorClient;
use netmon_discover::notify::Notifier;
use netmon_discover::probe::NmapProbe;
use netmon_discover::router::RouterClient;
use netmon_discover::sources::{Advisor, PublicIpLookup};

#[derive(Parser)]
#[command(name = "netmon")]
#[command(about = "Home network topology monitor")]
struct Cli {
    /// Config file prefix (default: netmon).
    #[arg(short, long, default_value = "netmon", global = true)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API, with optional scheduled scans.
    Serve,
    /// Run one scan cycle and print the snapshot as JSON.
    Scan,
    /// Run one scan cycle and print the derived alerts as JSON.
    Alerts,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let cli = Cli::parse();
    let config = MonitorConfig::load(&cli.config)?;
    let state = build_state(&config).await?;

    match cli.command {
        Command::Serve => serve(state, &config).await?,
        Command::Scan => {
            state.coordinator.run_cycle().await?.ensure_published()?;
            let snapshot = state.coordinator.store().snapshot();
            println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
        }
        Command::Alerts => {
            state.coordinator.run_cycle().await?.ensure_published()?;
            let snapshot = state.coordinator.store().snapshot();
            let alerts = state.alerts.evaluate(&snapshot).await;
            println!("{}", serde_json::to_string_pretty(&alerts)?);
        }
    }

    Ok(())
}

async fn build_state(config: &MonitorConfig) -> anyhow::Result<Arc<AppState>> {
    let probe = NmapProbe::new(&config.probe);
    match probe.verify_installation().await {
        Ok(version) => tracing::info!(nmap_version = %version.trim(), "Nmap verified"),
        Err(e) => tracing::warn!(error = %e, "Nmap unavailable, probe results will be empty"),
    }

    let router = Arc::new(RouterClient::new(&config.router)?);
    let hypervisor = Arc::new(HypervisorClient::new(&config.hypervisor)?);
    let advisor: Arc<dyn Advisor> = Arc::new(OllamaAdvisor::new(&config.advisory)?);
    let notifier = Arc::new(Notifier::new(&config.notify)?);

    let sources = Sources {
        probe: Arc::new(probe),
        router: router.clone(),
        hypervisor: hypervisor.clone(),
        public_address: Arc::new(PublicIpLookup::new(config.server.public_ip_url.clone())?),
    };
    let coordinator = Arc::new(ScanCoordinator::new(
        sources,
        config.topology.clone(),
        Arc::new(TopologyStore::new()),
    ));

    Ok(Arc::new(AppState {
        coordinator,
        alerts: AlertPipeline::new(router, hypervisor, advisor.clone(), notifier.clone()),
        advisor,
        notifier,
    }))
}

async fn serve(state: Arc<AppState>, config: &MonitorConfig) -> anyhow::Result<()> {
    if config.schedule.scan_on_start {
        match state.coordinator.trigger() {
            Ok(scan_id) => tracing::info!(scan_id = %scan_id, "Startup scan triggered"),
            Err(e) => tracing::warn!(error = %e, "Startup scan not started"),
        }
    }

    if config.schedule.interval_secs > 0 {
        let every = Duration::from_secs(config.schedule.interval_secs);
        tokio::spawn(Arc::clone(&state.coordinator).run_periodic(every));
        tracing::info!(interval_secs = config.schedule.interval_secs, "Scheduled scans enabled");
    }

    start_server(state, &config.server.bind_addr, &config.server.allowed_origins).await?;
    Ok(())
}
