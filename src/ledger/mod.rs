//! Ledger Integration Module
//!
//! Anchors record digests on an append/overwrite-style immutable ledger
//! keyed by record id, and reads them back for reconciliation.

pub mod anchorer;
pub mod http;
pub mod journal;
pub mod memory;

pub use anchorer::{ReanchorSummary, RecordAnchorer};
pub use http::HttpLedgerClient;
pub use journal::{AnchorJournal, AnchorTransaction};
pub use memory::InMemoryLedger;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::database::RecordId;
use crate::error::Result;
use crate::fingerprint::Digest;

/// Confirmation of a successful anchor write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorReceipt {
    pub receipt_id: Uuid,
    pub record_id: RecordId,
    pub digest: Digest,
    /// Ledger-native transaction reference, when the ledger reports one
    pub tx_ref: Option<String>,
    pub anchored_at: DateTime<Utc>,
}

impl AnchorReceipt {
    pub fn new(record_id: RecordId, digest: Digest, tx_ref: Option<String>) -> Self {
        Self {
            receipt_id: Uuid::new_v4(),
            record_id,
            digest,
            tx_ref,
            anchored_at: Utc::now(),
        }
    }
}

/// Client for the immutable ledger.
///
/// Writes overwrite per key, so `anchor` may be retried freely; the latest
/// successful write is the anchor.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Submit `digest` as the anchor for `id`.
    ///
    /// Transient failures are `AuditError::LedgerUnavailable`; permanent ones
    /// are `AuditError::LedgerRejected`.
    async fn anchor(&self, id: RecordId, digest: Digest) -> Result<AnchorReceipt>;

    /// Read the anchor for `id`.
    ///
    /// `Ok(Digest::SENTINEL)` means the id was never anchored. A failed read
    /// is `Err(AuditError::LedgerUnavailable)` and never a made-up digest.
    async fn fetch(&self, id: RecordId) -> Result<Digest>;
}

/// Read an anchor, degrading any failure to the sentinel digest
pub async fn fetch_or_sentinel(ledger: &dyn Ledger, id: RecordId) -> Digest {
    match ledger.fetch(id).await {
        Ok(digest) => digest,
        Err(e) => {
            warn!("Ledger read failed for record {}: {}", id, e);
            Digest::SENTINEL
        }
    }
}
