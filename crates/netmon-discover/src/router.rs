//! OPNsense REST API client.
//!
//! Supplies the lease table, the live neighbor (ARP) table and the system
//! status. An unconfigured client returns empty data for every call.

use std::time::Duration;

use netmon_core::types::{Alert, LeaseRecord, NeighborEntry, Severity};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::RouterConfig;
use crate::error::Result;

const LEASES_ENDPOINT: &str = "dhcpv4/leases/searchLease";
const ARP_ENDPOINTS: [&str; 2] = ["diagnostics/interface/getArp", "interfaces/diagnostics/arp"];
const STATUS_ENDPOINT: &str = "core/system/status";

#[derive(Debug, Clone)]
struct Credentials {
    base_url: String,
    key: String,
    secret: String,
}

#[derive(Debug, Clone)]
pub struct RouterClient {
    http: Client,
    credentials: Option<Credentials>,
}

impl RouterClient {
    pub fn new(config: &RouterConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;

        let credentials = match (&config.host, &config.api_key, &config.api_secret) {
            (Some(host), Some(key), Some(secret)) if !host.trim().is_empty() => Some(Credentials {
                base_url: format!("{}/api", base_url(host)),
                key: key.clone(),
                secret: secret.clone(),
            }),
            _ => None,
        };

        if credentials.is_none() {
            tracing::info!("Router client not configured, router data disabled");
        }

        Ok(Self { http, credentials })
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    async fn get(&self, creds: &Credentials, endpoint: &str) -> Result<Value> {
        let response = self
            .http
            .get(format!("{}/{endpoint}", creds.base_url))
            .basic_auth(&creds.key, Some(&creds.secret))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Static and dynamic leases.
    pub async fn leases(&self) -> Result<Vec<LeaseRecord>> {
        let Some(creds) = &self.credentials else {
            return Ok(Vec::new());
        };
        let body = self.get(creds, LEASES_ENDPOINT).await?;
        Ok(parse_rows(&body))
    }

    /// Live neighbor table. Tries each known endpoint until one returns rows.
    pub async fn neighbors(&self) -> Result<Vec<NeighborEntry>> {
        let Some(creds) = &self.credentials else {
            return Ok(Vec::new());
        };

        let mut last_error = None;
        for endpoint in ARP_ENDPOINTS {
            match self.get(creds, endpoint).await {
                Ok(body) => {
                    let rows: Vec<NeighborEntry> = parse_rows(&body);
                    if !rows.is_empty() {
                        tracing::debug!(endpoint, entries = rows.len(), "Fetched neighbor table");
                        return Ok(rows);
                    }
                }
                Err(e) => {
                    tracing::debug!(endpoint, error = %e, "Neighbor endpoint failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(Vec::new()),
        }
    }

    /// Router health as alerts.
    pub async fn system_alerts(&self) -> Result<Vec<Alert>> {
        let Some(creds) = &self.credentials else {
            return Ok(Vec::new());
        };
        let body = self.get(creds, STATUS_ENDPOINT).await?;
        Ok(parse_system_status(&body).into_iter().collect())
    }
}

/// Default to HTTPS when no scheme is given.
fn base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

/// Rows from either a bare array or a `{"rows": [...]}` envelope. Rows that
/// do not deserialize are skipped.
pub fn parse_rows<T: DeserializeOwned>(body: &Value) -> Vec<T> {
    let rows: &[Value] = match body {
        Value::Array(rows) => rows.as_slice(),
        Value::Object(map) => match map.get("rows") {
            Some(Value::Array(rows)) => rows.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    let mut parsed = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;
    for row in rows {
        match serde_json::from_value(row.clone()) {
            Ok(record) => parsed.push(record),
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::debug!(skipped, "Skipped malformed router rows");
    }
    parsed
}

/// Status `0` and `2` are healthy; `1` is a warning; anything else an error.
pub fn parse_system_status(body: &Value) -> Option<Alert> {
    let system = body
        .pointer("/metadata/system")
        .filter(|v| v.as_object().is_some_and(|m| !m.is_empty()))
        .or_else(|| body.get("system"))?;

    let code = match system.get("status")? {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    let message = system
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("Unknown status");

    let severity = match code.as_str() {
        "0" | "2" => return None,
        "1" => Severity::Warning,
        _ => Severity::Error,
    };
    Some(Alert::new(severity, format!("router system: {message}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiscoverError;
    use axum::{routing::get, Json, Router};
    use serde_json::json;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn configured(host: String) -> RouterClient {
        RouterClient::new(&RouterConfig {
            host: Some(host),
            api_key: Some("key".to_string()),
            api_secret: Some("secret".to_string()),
            ..RouterConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_parse_lease_rows() {
        let body = json!({
            "total": 3,
            "rows": [
                {"address": "192.168.1.30", "mac": "aa:bb:cc:dd:ee:30", "hostname": "echo", "descr": "Kitchen"},
                {"address": "192.168.1.31", "mac": "aa:bb:cc:dd:ee:31", "if": "lan"},
                "not-a-row"
            ]
        });
        let leases: Vec<LeaseRecord> = parse_rows(&body);
        assert_eq!(leases.len(), 2);
        assert_eq!(leases[0].resolved_description().as_deref(), Some("Kitchen"));
        assert_eq!(leases[1].hostname, None);
    }

    #[test]
    fn test_parse_neighbor_array() {
        let body = json!([
            {"ip": "192.168.20.5", "mac": "aa:bb:cc:dd:ee:05", "intf": "vlan20", "hostname": ""}
        ]);
        let rows: Vec<NeighborEntry> = parse_rows(&body);
        assert_eq!(rows[0].reported_address(), Some("192.168.20.5"));
        assert!(parse_rows::<NeighborEntry>(&json!("oops")).is_empty());
    }

    #[test]
    fn test_system_status_codes() {
        let ok = json!({"metadata": {"system": {"status": 2, "message": "No pending messages"}}});
        assert!(parse_system_status(&ok).is_none());

        let warn = json!({"system": {"status": "1", "message": "Firmware update available"}});
        let alert = parse_system_status(&warn).unwrap();
        assert_eq!(alert.severity, Severity::Warning);
        assert_eq!(alert.message, "router system: Firmware update available");

        let err = json!({"metadata": {"system": {"status": 5, "message": "CPU usage high"}}});
        assert_eq!(parse_system_status(&err).unwrap().severity, Severity::Error);

        assert!(parse_system_status(&json!({})).is_none());
    }

    #[test]
    fn test_base_url_defaults_to_https() {
        assert_eq!(base_url("10.0.0.1"), "https://10.0.0.1");
        assert_eq!(base_url("http://10.0.0.1:8080/"), "http://10.0.0.1:8080");
    }

    #[tokio::test]
    async fn test_unconfigured_client_returns_empty() {
        let client = RouterClient::new(&RouterConfig::default()).unwrap();
        assert!(!client.is_configured());
        assert!(client.leases().await.unwrap().is_empty());
        assert!(client.neighbors().await.unwrap().is_empty());
        assert!(client.system_alerts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_neighbor_endpoint_fallback() {
        let app = Router::new().route(
            "/api/interfaces/diagnostics/arp",
            get(|| async { Json(json!([{"ip": "192.168.1.7", "mac": "aa:bb:cc:dd:ee:07"}])) }),
        );
        let client = configured(serve(app).await);

        let rows = client.neighbors().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].mac.as_deref(), Some("aa:bb:cc:dd:ee:07"));
    }

    #[tokio::test]
    async fn test_leases_http_error_is_reported() {
        let client = configured(serve(Router::new()).await);
        assert!(matches!(client.leases().await, Err(DiscoverError::Http(_))));
    }
}
