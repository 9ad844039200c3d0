//! ntfy push notifications for error-severity alerts.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use netmon_core::types::{Alert, Severity};
use reqwest::Client;

use crate::config::NotifyConfig;
use crate::error::{DiscoverError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const TEST_MESSAGE: &str = "This is a test notification from your Network Monitor.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    NoErrors,
    Disabled,
    CoolingDown,
}

#[derive(Debug)]
pub struct Notifier {
    http: Client,
    url: Option<String>,
    cooldown: Duration,
    last_sent: Mutex<Option<Instant>>,
}

impl Notifier {
    pub fn new(config: &NotifyConfig) -> Result<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let url = config
            .topic
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|topic| format!("{}/{topic}", config.server.trim_end_matches('/')));

        Ok(Self {
            http,
            url,
            cooldown: Duration::from_secs(config.cooldown_secs),
            last_sent: Mutex::new(None),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    /// Push a summary of the error alerts, at most once per cooldown window.
    pub async fn notify_errors(&self, alerts: &[Alert]) -> Result<NotifyOutcome> {
        let errors: Vec<&Alert> = alerts
            .iter()
            .filter(|a| a.severity == Severity::Error)
            .collect();
        if errors.is_empty() {
            return Ok(NotifyOutcome::NoErrors);
        }
        let Some(url) = &self.url else {
            return Ok(NotifyOutcome::Disabled);
        };

        // Reserve the window before sending; restore it if the send fails.
        let previous = {
            let mut last = self
                .last_sent
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let last_at: Option<Instant> = *last;
            if last_at.is_some_and(|at| at.elapsed() < self.cooldown) {
                return Ok(NotifyOutcome::CoolingDown);
            }
            last.replace(Instant::now())
        };

        let body = summary(&errors);
        let sent = self
            .http
            .post(url)
            .header("Title", "NetMonitor Critical Alert")
            .header("Priority", "high")
            .header("Tags", "rotating_light")
            .body(body)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        match sent {
            Ok(_) => {
                tracing::info!(errors = errors.len(), "Sent alert notification");
                Ok(NotifyOutcome::Sent)
            }
            Err(e) => {
                *self
                    .last_sent
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()) = previous;
                Err(e.into())
            }
        }
    }

    /// Send a fixed test message, ignoring the cooldown.
    pub async fn send_test(&self) -> Result<()> {
        let Some(url) = &self.url else {
            return Err(DiscoverError::unavailable("notifier", "notification topic not set"));
        };
        self.http
            .post(url)
            .header("Title", "NetMonitor Test")
            .header("Tags", "tada")
            .body(TEST_MESSAGE)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

fn summary(errors: &[&Alert]) -> String {
    let mut body = String::from("Errors detected:");
    for alert in errors {
        body.push_str("\n- ");
        body.push_str(&alert.message);
    }
    body
}
