//! Application wiring shared by the server and the operator tools

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::alerts::{AlertDispatcher, LogNotifier, Notifier, WebhookNotifier};
use crate::config::{AppConfig, LedgerMode};
use crate::database::Database;
use crate::error::{AuditError, Result};
use crate::ledger::{HttpLedgerClient, InMemoryLedger, Ledger};
use crate::service::{AuditService, ServiceOptions};

pub struct App {
    pub service: Arc<AuditService>,
    pub database: Database,
    /// Present while alerts are enabled; ends once the service is dropped
    pub alert_worker: Option<JoinHandle<()>>,
}

impl App {
    pub async fn build(config: &AppConfig) -> Result<Self> {
        let database = Database::new(&config.database.url, config.database.max_connections).await?;
        database.run_migrations().await?;
        info!("Database migrations completed");

        let ledger = build_ledger(config)?;

        let (alerts, alert_worker) = if config.alerts.enabled {
            let notifier = build_notifier(config)?;
            info!("Alert dispatcher started ({})", notifier.name());
            let (dispatcher, worker) = AlertDispatcher::spawn(
                notifier,
                config.alerts.queue_capacity,
                config.alerts.delivery_timeout(),
            );
            (dispatcher, Some(worker))
        } else {
            info!("Alerts disabled");
            (AlertDispatcher::disabled(), None)
        };

        let service = AuditService::new(
            Arc::new(database.clone()),
            ledger,
            alerts,
            ServiceOptions::from_config(config),
        );

        Ok(Self {
            service: Arc::new(service),
            database,
            alert_worker,
        })
    }
}

pub fn build_ledger(config: &AppConfig) -> Result<Arc<dyn Ledger>> {
    match config.ledger.mode {
        LedgerMode::Memory => {
            info!("Using in-memory ledger; anchors are lost on restart");
            Ok(Arc::new(InMemoryLedger::new()))
        }
        LedgerMode::Http => {
            let gateway_url = config.ledger.gateway_url.clone().ok_or_else(|| {
                AuditError::Config("ledger.gateway_url is required in http mode".to_string())
            })?;
            info!("Using ledger gateway at {}", gateway_url);
            let client = HttpLedgerClient::new(gateway_url, config.ledger.request_timeout())?
                .with_retry(config.ledger.max_retries, config.ledger.retry_backoff());
            Ok(Arc::new(client))
        }
    }
}

pub fn build_notifier(config: &AppConfig) -> Result<Arc<dyn Notifier>> {
    match &config.alerts.webhook_url {
        Some(url) => Ok(Arc::new(WebhookNotifier::new(
            url.clone(),
            config.alerts.delivery_timeout(),
        )?)),
        None => Ok(Arc::new(LogNotifier)),
    }
}
