use thiserror::Error;

use crate::database::RecordId;

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("JSON serialization error: {}", err))
    }
}

impl From<sqlx::Error> for AuditError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(format!("Database error: {}", err))
    }
}

impl From<::config::ConfigError> for AuditError {
    fn from(err: ::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Record {0} not found")]
    NotFound(RecordId),

    #[error("Record ID {0} already exists")]
    DuplicateId(RecordId),

    #[error("Record with name '{name}' already exists (ID: {existing_id})")]
    DuplicateName { name: String, existing_id: RecordId },

    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("Ledger rejected write: {0}")]
    LedgerRejected(String),

    #[error("Alert delivery failed: {0}")]
    AlertDeliveryFailed(String),

    #[error("Malformed digest: {0}")]
    MalformedDigest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl AuditError {
    /// Only ledger unavailability is worth retrying; rejections are permanent.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuditError::LedgerUnavailable(_))
    }

    pub fn invalid_record_id(id: RecordId) -> Self {
        Self::Validation(format!("Record ID must be positive, got {}", id))
    }

    pub fn unknown_field(field: &str) -> Self {
        Self::Validation(format!(
            "Invalid field '{}'. Allowed: name, role, salary",
            field
        ))
    }
}

pub type Result<T> = std::result::Result<T, AuditError>;
