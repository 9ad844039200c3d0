//! Local-segment discovery probe.
//!
//! Runs an nmap ping sweep per configured range as a child process via
//! `tokio::process::Command` and converts the XML output into probe
//! records.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use netmon_core::types::ProbeDevice;
use tokio::process::Command;

use crate::config::ProbeConfig;
use crate::error::{DiscoverError, Result};
use crate::nmap_xml;

/// Wrapper around the nmap binary.
pub struct NmapProbe {
    nmap_path: String,
    ranges: Vec<String>,
    timeout: Duration,
}

impl NmapProbe {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            nmap_path: config.nmap_path.clone(),
            ranges: config.range_list().into_iter().map(String::from).collect(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Verify nmap is installed and accessible.
    pub async fn verify_installation(&self) -> Result<String> {
        let output = Command::new(&self.nmap_path)
            .arg("--version")
            .output()
            .await
            .map_err(|_| DiscoverError::NmapNotFound {
                path: self.nmap_path.clone(),
            })?;

        String::from_utf8(output.stdout).map_err(|e| DiscoverError::XmlParse(e.to_string()))
    }

    /// Sweep every configured range. A range that fails is logged and
    /// skipped; hosts seen in several ranges are reported once. Fails only
    /// when every range failed.
    pub async fn sweep(&self) -> Result<Vec<ProbeDevice>> {
        let mut batches = Vec::with_capacity(self.ranges.len());
        let mut last_error = None;
        for range in &self.ranges {
            match self.sweep_range(range).await {
                Ok(devices) => batches.push(devices),
                Err(e) => {
                    tracing::warn!(range = %range, error = %e, "Probe range failed, skipping");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if batches.is_empty() => Err(e),
            _ => Ok(merge_batches(batches)),
        }
    }

    /// Ping-sweep a single range.
    ///
    /// Nmap is invoked with `-oX -` to write XML to stdout. The process is
    /// killed if it outlives the configured timeout.
    pub async fn sweep_range(&self, range: &str) -> Result<Vec<ProbeDevice>> {
        let start = Instant::now();
        tracing::info!(range = %range, "Starting probe sweep");

        let mut command = Command::new(&self.nmap_path);
        command
            .arg("-sn")
            .arg("-oX")
            .arg("-")
            .arg("--noninteractive")
            .arg(range)
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| DiscoverError::Timeout {
                source_name: "probe",
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| DiscoverError::NmapNotFound {
                path: format!("{}: {e}", self.nmap_path),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(DiscoverError::NmapFailed {
                code: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        let devices = nmap_xml::parse_nmap_xml(&output.stdout)?.probe_devices();

        tracing::info!(
            range = %range,
            hosts_up = devices.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Probe sweep complete"
        );

        Ok(devices)
    }
}

/// Flatten per-range results, keeping the first record for each address.
fn merge_batches(batches: Vec<Vec<ProbeDevice>>) -> Vec<ProbeDevice> {
    let mut merged: BTreeMap<IpAddr, ProbeDevice> = BTreeMap::new();
    for device in batches.into_iter().flatten() {
        merged.entry(device.address).or_insert(device);
    }
    merged.into_values().collect()
}
