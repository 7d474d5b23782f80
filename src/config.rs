pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{AuditError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub ledger: LedgerConfig,
    pub cache: CacheConfig,
    pub batch: BatchConfig,
    pub alerts: AlertsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerMode {
    /// In-process ledger, lost on restart
    #[default]
    Memory,
    /// JSON ledger gateway over HTTP
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub mode: LedgerMode,
    pub gateway_url: Option<String>,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            mode: LedgerMode::Memory,
            gateway_url: None,
            request_timeout_secs: 10,
            max_retries: 2,
            retry_backoff_ms: 250,
        }
    }
}

impl LedgerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub default_limit: usize,
    pub concurrency: usize,
    pub deadline_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            concurrency: 4,
            deadline_secs: 30,
        }
    }
}

impl BatchConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    pub enabled: bool,
    /// Operator webhook; alerts go to the log when unset
    pub webhook_url: Option<String>,
    pub queue_capacity: usize,
    pub delivery_timeout_secs: u64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            webhook_url: None,
            queue_capacity: 64,
            delivery_timeout_secs: 10,
        }
    }
}

impl AlertsConfig {
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }
}

impl AppConfig {
    /// Load from defaults, the optional config file and the environment
    pub fn load() -> Result<Self> {
        loader::ConfigLoader::from_env().load()
    }

    pub fn validate(&self) -> Result<()> {
        self.validate_ledger()?;

        if self.cache.ttl_secs == 0 {
            return Err(AuditError::Config("cache.ttl_secs must be positive".to_string()));
        }

        if self.batch.concurrency == 0 {
            return Err(AuditError::Config(
                "batch.concurrency must be positive".to_string(),
            ));
        }

        if self.alerts.enabled && self.alerts.queue_capacity == 0 {
            return Err(AuditError::Config(
                "alerts.queue_capacity must be positive".to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(AuditError::Config(
                "database.max_connections must be positive".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_ledger(&self) -> Result<()> {
        if self.ledger.mode == LedgerMode::Http {
            match self.ledger.gateway_url.as_deref() {
                Some(url) if url.starts_with("http://") || url.starts_with("https://") => {}
                Some(url) => {
                    return Err(AuditError::Config(format!(
                        "ledger.gateway_url must be an http(s) URL, got '{}'",
                        url
                    )))
                }
                None => {
                    return Err(AuditError::Config(
                        "ledger.mode = \"http\" requires ledger.gateway_url".to_string(),
                    ))
                }
            }
        }

        if self.ledger.request_timeout_secs == 0 {
            return Err(AuditError::Config(
                "ledger.request_timeout_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
