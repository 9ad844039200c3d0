//! Configuration for the netmon daemon.
//!
//! Each section is loaded from `netmon.toml` or `NETMON__<SECTION>__<KEY>`
//! environment variables. Every field has a default, so a missing section
//! or key never fails startup.

use serde::Deserialize;

use netmon_core::config as layered;
use netmon_topology::TopologyConfig;

use crate::error::Result;

/// All daemon configuration sections.
#[derive(Debug, Clone, Default)]
pub struct MonitorConfig {
    pub probe: ProbeConfig,
    pub router: RouterConfig,
    pub hypervisor: HypervisorConfig,
    pub advisory: AdvisoryConfig,
    pub notify: NotifyConfig,
    pub server: ServerConfig,
    pub schedule: ScheduleConfig,
    pub topology: TopologyConfig,
}

impl MonitorConfig {
    /// Load every section from the layered file + environment sources.
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = layered::layered(file_prefix)?;
        Ok(Self {
            probe: layered::section(&cfg, "probe")?,
            router: layered::section(&cfg, "router")?,
            hypervisor: layered::section(&cfg, "hypervisor")?,
            advisory: layered::section(&cfg, "advisory")?,
            notify: layered::section(&cfg, "notify")?,
            server: layered::section(&cfg, "server")?,
            schedule: layered::section(&cfg, "schedule")?,
            topology: layered::section(&cfg, "topology")?,
        })
    }
}

/// Local-segment discovery probe.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Path to the nmap binary (default: "nmap").
    #[serde(default = "default_nmap_path")]
    pub nmap_path: String,

    /// Comma-separated CIDR ranges to sweep.
    #[serde(default = "default_ranges")]
    pub ranges: String,

    /// Per-range timeout in seconds.
    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u64,
}

impl ProbeConfig {
    pub fn range_list(&self) -> Vec<&str> {
        self.ranges
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .collect()
    }
}

/// OPNsense REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    /// Host (and optional port) of the router. Unset disables the client.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default)]
    pub verify_tls: bool,
    #[serde(default = "default_router_timeout")]
    pub timeout_secs: u64,
}

/// Proxmox VE API.
#[derive(Debug, Clone, Deserialize)]
pub struct HypervisorConfig {
    /// `host` or `host:port`. Unset disables the client.
    #[serde(default)]
    pub host: Option<String>,
    /// User including realm, e.g. `root@pam`.
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub verify_tls: bool,
    #[serde(default = "default_hypervisor_timeout")]
    pub timeout_secs: u64,
}

/// Local LLM used to summarize alerts and answer operator questions.
#[derive(Debug, Clone, Deserialize)]
pub struct AdvisoryConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_ollama_model")]
    pub model: String,
    #[serde(default = "default_advisory_timeout")]
    pub timeout_secs: u64,
    /// Devices included in the analysis prompt.
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,
}

/// ntfy push notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    /// Topic name. Unset disables notifications.
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default = "default_ntfy_server")]
    pub server: String,
    /// Minimum seconds between two error notifications.
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
}

/// HTTP API.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Frontend origins allowed by CORS.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    /// Plain-text public address lookup service.
    #[serde(default = "default_public_ip_url")]
    pub public_ip_url: String,
}

/// Periodic scan cycles.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between scheduled cycles. Zero disables scheduling.
    #[serde(default)]
    pub interval_secs: u64,
    /// Run one cycle immediately on startup.
    #[serde(default = "default_true")]
    pub scan_on_start: bool,
}

fn default_nmap_path() -> String {
    "nmap".to_string()
}

fn default_ranges() -> String {
    "192.168.1.0/24".to_string()
}

fn default_probe_timeout() -> u64 {
    120
}

fn default_router_timeout() -> u64 {
    5
}

fn default_hypervisor_timeout() -> u64 {
    10
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3".to_string()
}

fn default_advisory_timeout() -> u64 {
    30
}

fn default_context_limit() -> usize {
    50
}

fn default_ntfy_server() -> String {
    "https://ntfy.sh".to_string()
}

fn default_cooldown() -> u64 {
    600
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://localhost:3000".to_string(),
    ]
}

fn default_public_ip_url() -> String {
    "https://api.ipify.org".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            nmap_path: default_nmap_path(),
            ranges: default_ranges(),
            timeout_secs: default_probe_timeout(),
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            host: None,
            api_key: None,
            api_secret: None,
            verify_tls: false,
            timeout_secs: default_router_timeout(),
        }
    }
}

impl Default for HypervisorConfig {
    fn default() -> Self {
        Self {
            host: None,
            user: None,
            password: None,
            verify_tls: false,
            timeout_secs: default_hypervisor_timeout(),
        }
    }
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_ollama_model(),
            timeout_secs: default_advisory_timeout(),
            context_limit: default_context_limit(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            topic: None,
            server: default_ntfy_server(),
            cooldown_secs: default_cooldown(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            allowed_origins: default_allowed_origins(),
            public_ip_url: default_public_ip_url(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: 0,
            scan_on_start: default_true(),
        }
    }
}
