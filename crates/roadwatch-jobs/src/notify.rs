//! Incident alert delivery.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

use roadwatch_core::{defaults, AlertNotifier, Error, Incident, Result};

/// Event name sent with every webhook alert.
pub const INCIDENT_CREATED_EVENT: &str = "incident.created";

/// Writes the alert to the log and always succeeds.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl AlertNotifier for LogNotifier {
    async fn notify(&self, incident: &Incident) -> Result<()> {
        info!(
            subsystem = "jobs",
            component = "alerts",
            incident_id = incident.id,
            incident_type = %incident.incident_type,
            location = incident.location.as_deref().unwrap_or(""),
            "New incident recorded"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// POSTs the incident as JSON to a fixed URL.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(defaults::ALERT_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AlertNotifier for WebhookNotifier {
    async fn notify(&self, incident: &Incident) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .header("X-Roadwatch-Event", INCIDENT_CREATED_EVENT)
            .json(incident)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Request(format!(
                "Alert webhook returned {}",
                status
            )));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

/// Webhook notifier when a URL is configured, log-only otherwise.
pub fn notifier_for(webhook_url: Option<&str>) -> Result<Arc<dyn AlertNotifier>> {
    match webhook_url {
        Some(url) => Ok(Arc::new(WebhookNotifier::new(url)?)),
        None => Ok(Arc::new(LogNotifier)),
    }
}
