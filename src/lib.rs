pub mod alerts;
pub mod api;
pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod fingerprint;
pub mod ledger;
pub mod reconcile;
pub mod service;

pub use error::AuditError;
