//! Alert Notifiers
//!
//! Transports that hand a tamper report to a human operator.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

use crate::alerts::AlertEvent;
use crate::error::{AuditError, Result};

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, event: &AlertEvent) -> Result<()>;
}

/// Writes alerts to the service log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, event: &AlertEvent) -> Result<()> {
        warn!("{}: {}", event.subject(), event.summary());
        Ok(())
    }
}

/// POSTs the alert as JSON to an operator webhook
pub struct WebhookNotifier {
    webhook_url: String,
    http_client: Client,
}

impl WebhookNotifier {
    pub fn new(webhook_url: String, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuditError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            webhook_url,
            http_client,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn notify(&self, event: &AlertEvent) -> Result<()> {
        let payload = serde_json::json!({
            "subject": event.subject(),
            "alert": event,
        });

        let response = self
            .http_client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AuditError::AlertDeliveryFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuditError::AlertDeliveryFailed(format!(
                "webhook returned {}",
                response.status()
            )));
        }

        info!("Alert for record {} sent to webhook", event.record_id);
        Ok(())
    }
}
