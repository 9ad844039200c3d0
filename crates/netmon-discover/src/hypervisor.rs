//! Proxmox VE API client.
//!
//! Logs in with a ticket per inventory pass, then lists every cluster node
//! with its VMs and containers. Hardware addresses come from each guest's
//! `net0` configuration line.

use std::time::Duration;

use netmon_core::types::{MacAddress, ManagedResource, ResourceKind};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::config::HypervisorConfig;
use crate::error::{DiscoverError, Result};

const DEFAULT_PORT: u16 = 8006;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct Ticket {
    ticket: String,
}

#[derive(Debug, Deserialize)]
struct NodeEntry {
    node: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GuestEntry {
    vmid: Value,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GuestConfig {
    #[serde(default)]
    net0: Option<String>,
}

#[derive(Debug, Clone)]
struct Login {
    base_url: String,
    user: String,
    password: String,
}

/// An authenticated session for one inventory pass.
struct Session<'a> {
    http: &'a Client,
    base_url: &'a str,
    cookie: String,
}

impl Session<'_> {
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let envelope: Envelope<T> = self
            .http
            .get(format!("{}/{path}", self.base_url))
            .header(reqwest::header::COOKIE, &self.cookie)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(envelope.data)
    }
}

#[derive(Debug, Clone)]
pub struct HypervisorClient {
    http: Client,
    login: Option<Login>,
}

impl HypervisorClient {
    pub fn new(config: &HypervisorConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;

        let login = match (&config.host, &config.user, &config.password) {
            (Some(host), Some(user), Some(password)) if !host.trim().is_empty() => Some(Login {
                base_url: format!("{}/api2/json", base_url(host)),
                user: user.clone(),
                password: password.clone(),
            }),
            _ => None,
        };

        if login.is_none() {
            tracing::info!("Hypervisor client not configured, inventory disabled");
        }

        Ok(Self { http, login })
    }

    pub fn is_configured(&self) -> bool {
        self.login.is_some()
    }

    async fn session(&self) -> Result<Option<Session<'_>>> {
        let Some(login) = &self.login else {
            return Ok(None);
        };

        let ticket: Envelope<Ticket> = self
            .http
            .post(format!("{}/access/ticket", login.base_url))
            .form(&[("username", &login.user), ("password", &login.password)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(Some(Session {
            http: &self.http,
            base_url: &login.base_url,
            cookie: format!("PVEAuthCookie={}", ticket.data.ticket),
        }))
    }

    /// Whether the API answers with at least one node.
    pub async fn reachable(&self) -> Result<bool> {
        let Some(session) = self.session().await? else {
            return Err(DiscoverError::unavailable("hypervisor", "not configured"));
        };
        let nodes: Vec<NodeEntry> = session.get("nodes").await?;
        Ok(!nodes.is_empty())
    }

    /// Every node, VM and container. A guest whose configuration cannot be
    /// read is still listed, without a hardware address.
    pub async fn resources(&self) -> Result<Vec<ManagedResource>> {
        let Some(session) = self.session().await? else {
            return Ok(Vec::new());
        };

        let nodes: Vec<NodeEntry> = session.get("nodes").await?;
        let mut resources = Vec::new();

        for node in nodes {
            resources.push(ManagedResource {
                name: node.node.clone(),
                kind: ResourceKind::Node,
                id: node.node.clone(),
                status: Some(node.status.clone().unwrap_or_else(|| "online".to_string())),
                parent_node: None,
                mac: None,
            });

            for (kind, segment) in [(ResourceKind::Vm, "qemu"), (ResourceKind::Container, "lxc")] {
                let guests: Vec<GuestEntry> = match session
                    .get(&format!("nodes/{}/{segment}", node.node))
                    .await
                {
                    Ok(guests) => guests,
                    Err(e) => {
                        tracing::warn!(node = %node.node, kind = segment, error = %e, "Guest listing failed");
                        continue;
                    }
                };

                for guest in guests {
                    let id = vmid_string(&guest.vmid);
                    let config: GuestConfig = session
                        .get(&format!("nodes/{}/{segment}/{id}/config", node.node))
                        .await
                        .unwrap_or_default();
                    let mac = config.net0.as_deref().and_then(|net0| match kind {
                        ResourceKind::Container => container_mac(net0),
                        _ => vm_mac(net0),
                    });

                    resources.push(ManagedResource {
                        name: guest.name.unwrap_or_default(),
                        kind,
                        id,
                        status: guest.status,
                        parent_node: Some(node.node.clone()),
                        mac,
                    });
                }
            }
        }

        tracing::debug!(resources = resources.len(), "Fetched hypervisor inventory");
        Ok(resources)
    }
}

/// HTTPS on port 8006 unless the host says otherwise.
fn base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        return host.to_string();
    }
    let has_port = host
        .rsplit_once(':')
        .is_some_and(|(_, port)| port.parse::<u16>().is_ok());
    if has_port {
        format!("https://{host}")
    } else {
        format!("https://{host}:{DEFAULT_PORT}")
    }
}

fn vmid_string(vmid: &Value) -> String {
    match vmid {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// VM NICs: `virtio=BC:24:11:00:00:01,bridge=vmbr0`.
pub fn vm_mac(net0: &str) -> Option<MacAddress> {
    net0.split(',')
        .filter_map(|part| part.split_once('=').map(|(_, value)| value.trim()))
        .find(|value| value.len() == 17 && value.matches(':').count() == 5)
        .and_then(MacAddress::parse)
}

/// Container NICs: `name=eth0,bridge=vmbr0,hwaddr=BC:24:11:00:00:02,ip=dhcp`.
pub fn container_mac(net0: &str) -> Option<MacAddress> {
    net0.split(',')
        .filter_map(|part| part.trim().strip_prefix("hwaddr="))
        .find_map(MacAddress::parse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Path,
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Json, Router,
    };
    use serde_json::json;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("cookie")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "PVEAuthCookie=ticket-1")
    }

    fn fake_api() -> Router {
        Router::new()
            .route(
                "/api2/json/access/ticket",
                post(|| async { Json(json!({"data": {"ticket": "ticket-1", "CSRFPreventionToken": "x"}})) }),
            )
            .route(
                "/api2/json/nodes",
                get(|headers: HeaderMap| async move {
                    if !authorized(&headers) {
                        return Err(StatusCode::UNAUTHORIZED);
                    }
                    Ok(Json(json!({"data": [{"node": "pve", "status": "online"}]})))
                }),
            )
            .route(
                "/api2/json/nodes/pve/qemu",
                get(|| async {
                    Json(json!({"data": [
                        {"vmid": 100, "name": "OPNsense", "status": "running"},
                        {"vmid": 101, "name": "web", "status": "stopped"}
                    ]}))
                }),
            )
            .route(
                "/api2/json/nodes/pve/lxc",
                get(|| async { Json(json!({"data": [{"vmid": "200", "name": "pihole", "status": "running"}]})) }),
            )
            .route(
                "/api2/json/nodes/pve/:kind/:vmid/config",
                get(|Path((_, vmid)): Path<(String, String)>| async move {
                    let net0 = match vmid.as_str() {
                        "100" => "virtio=BC:24:11:00:00:64,bridge=vmbr0",
                        "200" => "name=eth0,bridge=vmbr0,hwaddr=BC:24:11:00:00:C8,ip=dhcp",
                        _ => return Err(StatusCode::INTERNAL_SERVER_ERROR),
                    };
                    Ok(Json(json!({"data": {"net0": net0}})))
                }),
            )
    }

    fn client(host: String) -> HypervisorClient {
        HypervisorClient::new(&HypervisorConfig {
            host: Some(host),
            user: Some("root@pam".to_string()),
            password: Some("secret".to_string()),
            ..HypervisorConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_vm_mac_parsing() {
        assert_eq!(
            vm_mac("virtio=BC:24:11:AA:BB:CC,bridge=vmbr0,firewall=1").map(|m| m.to_string()),
            Some("bc:24:11:aa:bb:cc".to_string())
        );
        assert_eq!(
            vm_mac("e1000=52:54:00:12:34:56,bridge=vmbr1").map(|m| m.to_string()),
            Some("52:54:00:12:34:56".to_string())
        );
        assert_eq!(vm_mac("bridge=vmbr0"), None);
    }

    #[test]
    fn test_container_mac_parsing() {
        assert_eq!(
            container_mac("name=eth0,bridge=vmbr0,hwaddr=BC:24:11:00:00:02,ip=dhcp")
                .map(|m| m.to_string()),
            Some("bc:24:11:00:00:02".to_string())
        );
        assert_eq!(container_mac("name=eth0,bridge=vmbr0"), None);
    }

    #[test]
    fn test_base_url_port_handling() {
        assert_eq!(base_url("192.168.1.100"), "https://192.168.1.100:8006");
        assert_eq!(base_url("pve.lan:8443"), "https://pve.lan:8443");
        assert_eq!(base_url("http://127.0.0.1:9000/"), "http://127.0.0.1:9000");
    }

    #[tokio::test]
    async fn test_unconfigured_client() {
        let client = HypervisorClient::new(&HypervisorConfig::default()).unwrap();
        assert!(client.resources().await.unwrap().is_empty());
        assert!(matches!(
            client.reachable().await,
            Err(DiscoverError::SourceUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_inventory_from_api() {
        let client = client(serve(fake_api()).await);
        assert!(client.reachable().await.unwrap());

        let resources = client.resources().await.unwrap();
        let summary: Vec<_> = resources
            .iter()
            .map(|r| (r.kind, r.name.as_str(), r.id.as_str(), r.mac.as_ref().map(|m| m.to_string())))
            .collect();

        assert_eq!(
            summary,
            vec![
                (ResourceKind::Node, "pve", "pve", None),
                (ResourceKind::Vm, "OPNsense", "100", Some("bc:24:11:00:00:64".to_string())),
                // Config read failed: listed without a hardware address.
                (ResourceKind::Vm, "web", "101", None),
                (ResourceKind::Container, "pihole", "200", Some("bc:24:11:00:00:c8".to_string())),
            ]
        );
        assert_eq!(resources[3].parent_node.as_deref(), Some("pve"));
        assert_eq!(resources[2].status.as_deref(), Some("stopped"));
    }
}
