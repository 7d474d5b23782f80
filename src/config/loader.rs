//! Layered configuration loader
//!
//! Built-in defaults, then an optional `ledger-audit.{toml,yaml,json}` file,
//! then `LEDGER_AUDIT__SECTION__KEY` environment variables, then
//! `DATABASE_URL`.

use ::config::{Config, Environment, File};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::Result;

pub const DEFAULT_CONFIG_BASENAME: &str = "ledger-audit";
pub const CONFIG_PATH_VAR: &str = "LEDGER_AUDIT_CONFIG";
pub const ENV_PREFIX: &str = "LEDGER_AUDIT";

pub struct ConfigLoader {
    file: PathBuf,
    /// Environment snapshot; `None` reads the process environment
    env: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    /// Loader reading the process environment
    pub fn from_env() -> Self {
        let file = std::env::var(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_BASENAME));
        Self { file, env: None }
    }

    /// Loader over an explicit file and environment snapshot
    pub fn with_sources(file: impl Into<PathBuf>, env: HashMap<String, String>) -> Self {
        Self {
            file: file.into(),
            env: Some(env),
        }
    }

    fn env_var(&self, key: &str) -> Option<String> {
        match &self.env {
            Some(env) => env.get(key).cloned(),
            None => std::env::var(key).ok(),
        }
    }

    pub fn load(&self) -> Result<AppConfig> {
        info!("Loading configuration (file: {:?})", self.file);

        let environment = Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .source(self.env.clone());

        let settings = Config::builder()
            .add_source(File::from(self.file.clone()).required(false))
            .add_source(environment)
            .set_override_option("database.url", self.env_var("DATABASE_URL"))?
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;

        debug!(
            "Configuration: ledger={:?} cache_ttl={}s batch_limit={}",
            config.ledger.mode, config.cache.ttl_secs, config.batch.default_limit
        );
        Ok(config)
    }
}
