//! Error types for the netmon-discover crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("Nmap not found at path: {path}")]
    NmapNotFound { path: String },

    #[error("Nmap exited with code {code}: {stderr}")]
    NmapFailed { code: i32, stderr: String },

    #[error("Failed to parse nmap XML output: {0}")]
    XmlParse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{source_name} timed out after {secs}s")]
    Timeout { source_name: &'static str, secs: u64 },

    #[error("{source_name} unavailable: {reason}")]
    SourceUnavailable {
        source_name: &'static str,
        reason: String,
    },

    #[error("A scan cycle is already in progress")]
    CycleInProgress,

    #[error("Scan cycle {scan_id} did not publish: {reason}")]
    NotPublished { scan_id: uuid::Uuid, reason: String },

    #[error("Topology invariant violated: {0}")]
    Topology(#[from] netmon_topology::TopologyError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<netmon_core::NetmonError> for DiscoverError {
    fn from(e: netmon_core::NetmonError) -> Self {
        Self::Config(e.to_string())
    }
}

impl DiscoverError {
    pub fn unavailable(source_name: &'static str, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DiscoverError>;
