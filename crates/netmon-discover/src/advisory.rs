//! Local LLM advisory via Ollama.
//!
//! Summarizes the current topology and router alerts into extra findings
//! and answers free-form operator questions. Callers fall back to the
//! heuristic insights whenever this provider is unavailable or answers with
//! something unparseable.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use netmon_core::types::{Alert, Severity};
use netmon_topology::TopologySnapshot;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::AdvisoryConfig;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

const ANALYZE_PROMPT: &str = "Analyze this network device list and router alerts for anomalies. \
Look for: security risks, unknown devices, high load, or unusual services. \
Return ONLY a JSON array of objects with keys: 'severity' (info/warning/error), 'message' (string). \
Do not include markdown formatting or explanation text outside the JSON.";

/// Compact per-node context sent to the model.
#[derive(Debug, Serialize)]
struct NodeContext<'a> {
    label: &'a str,
    ip: Option<String>,
    #[serde(rename = "type")]
    kind: &'static str,
    hostname: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct Finding {
    #[serde(default)]
    severity: String,
    message: String,
}

#[derive(Debug, Clone)]
pub struct OllamaAdvisor {
    http: Client,
    endpoint: String,
    model: String,
    context_limit: usize,
}

impl OllamaAdvisor {
    pub fn new(config: &AdvisoryConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build advisory HTTP client")?;
        Ok(Self {
            http,
            endpoint: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            context_limit: config.context_limit,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Whether the Ollama server answers its model listing.
    pub async fn available(&self) -> bool {
        let result = self
            .http
            .get(format!("{}/api/tags", self.endpoint))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;
        match result {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(endpoint = %self.endpoint, error = %e, "Advisory endpoint unreachable");
                false
            }
        }
    }

    /// Ask the model for additional findings.
    pub async fn analyze(
        &self,
        snapshot: &TopologySnapshot,
        provider_alerts: &[Alert],
    ) -> Result<Vec<Alert>> {
        let context = json!({
            "devices": node_context(snapshot, self.context_limit),
            "router_alerts": provider_alerts,
        });
        let answer = self.generate(ANALYZE_PROMPT, &context).await?;
        parse_findings(&answer)
    }

    /// Answer an operator question with the current topology as context.
    pub async fn chat(&self, message: &str, snapshot: &TopologySnapshot) -> Result<String> {
        let nodes = node_context(snapshot, usize::MAX);
        let context = json!({
            "node_count": nodes.len(),
            "nodes": nodes,
        });
        self.generate(message, &context).await
    }

    async fn generate(&self, question: &str, context: &serde_json::Value) -> Result<String> {
        let prompt = build_prompt(question, context)?;

        let response = self
            .http
            .post(format!("{}/api/generate", self.endpoint))
            .json(&json!({
                "model": self.model,
                "prompt": prompt,
                "stream": false,
            }))
            .send()
            .await
            .context("Failed to call Ollama generate endpoint")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Ollama request failed with {}: {}", status, body));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse Ollama response JSON")?;
        payload
            .get("response")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Ollama response missing 'response' field"))
    }
}

fn node_context(snapshot: &TopologySnapshot, limit: usize) -> Vec<NodeContext<'_>> {
    snapshot
        .nodes
        .iter()
        .take(limit)
        .map(|node| NodeContext {
            label: &node.data.label,
            ip: node.data.ip.map(|ip| ip.to_string()),
            kind: node.data.kind.display_name(),
            hostname: node.data.hostname.as_deref(),
        })
        .collect()
}

fn build_prompt(question: &str, context: &serde_json::Value) -> Result<String> {
    let state = serde_json::to_string_pretty(context).context("Failed to encode network context")?;
    Ok(format!(
        "System Context: You are a network operations assistant monitoring a home lab network. \
Here is the current network state in JSON format:\n{state}\n\n\
Answering guidelines:\n\
- Be concise and professional.\n\
- Highlight any security risks or anomalies.\n\n\
User: {question}\nAssistant:"
    ))
}

/// Parse the model's findings, tolerating a surrounding code fence.
pub fn parse_findings(raw: &str) -> Result<Vec<Alert>> {
    let trimmed = raw.trim();
    let body = if trimmed.starts_with("```") {
        extract_json_array(trimmed).unwrap_or(trimmed)
    } else {
        trimmed
    };

    let findings: Vec<Finding> =
        serde_json::from_str(body).context("Failed to parse advisory findings JSON")?;

    let now = Utc::now();
    Ok(findings
        .into_iter()
        .filter(|f| !f.message.trim().is_empty())
        .map(|f| Alert::at(severity_from(&f.severity), f.message, now))
        .collect())
}

fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

fn severity_from(raw: &str) -> Severity {
    match raw.trim().to_ascii_lowercase().as_str() {
        "error" | "critical" => Severity::Error,
        "warning" | "warn" => Severity::Warning,
        _ => Severity::Info,
    }
}
