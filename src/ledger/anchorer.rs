//! Record Anchorer
//!
//! Drives anchor writes on behalf of the record service: confirmed writes
//! land in the journal and evict the cached anchor for the id.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::database::{Record, RecordId};
use crate::error::{AuditError, Result};
use crate::fingerprint::Digest;
use crate::ledger::{AnchorJournal, AnchorReceipt, Ledger};
use crate::reconcile::AnchorCache;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReanchorSummary {
    pub scanned: usize,
    pub already_anchored: usize,
    pub anchored: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct RecordAnchorer {
    ledger: Arc<dyn Ledger>,
    cache: Arc<AnchorCache>,
    journal: AnchorJournal,
}

impl RecordAnchorer {
    pub fn new(ledger: Arc<dyn Ledger>, cache: Arc<AnchorCache>, journal: AnchorJournal) -> Self {
        Self {
            ledger,
            cache,
            journal,
        }
    }

    pub fn journal(&self) -> &AnchorJournal {
        &self.journal
    }

    pub async fn anchor(&self, id: RecordId, name: &str, digest: Digest) -> Result<AnchorReceipt> {
        match self.ledger.anchor(id, digest).await {
            Ok(receipt) => {
                self.journal.record(receipt.clone(), name).await;
                self.cache.invalidate(id).await;
                info!(
                    "Anchored record {} ({}){}",
                    id,
                    digest.short(),
                    receipt
                        .tx_ref
                        .as_deref()
                        .map(|tx| format!(" in {}", tx))
                        .unwrap_or_default()
                );
                Ok(receipt)
            }
            Err(AuditError::LedgerRejected(msg)) => {
                error!("Ledger rejected anchor for record {}: {}", id, msg);
                Err(AuditError::LedgerRejected(msg))
            }
            Err(e) => {
                error!("Anchor for record {} not confirmed, ledger unavailable: {}", id, e);
                Err(e)
            }
        }
    }

    /// Fire-and-forget anchor write; the handle is only for callers that
    /// want to observe the outcome.
    pub fn spawn(
        &self,
        id: RecordId,
        name: String,
        digest: Digest,
    ) -> JoinHandle<Result<AnchorReceipt>> {
        let anchorer = self.clone();
        tokio::spawn(async move { anchorer.anchor(id, &name, digest).await })
    }

    /// Anchor every record the ledger has no digest for.
    ///
    /// Reads go straight to the ledger so a stale cache entry cannot hide a
    /// missing anchor. Records whose read fails are counted as failed and
    /// left alone.
    pub async fn reanchor_missing(&self, records: &[Record]) -> ReanchorSummary {
        let mut summary = ReanchorSummary {
            scanned: records.len(),
            ..Default::default()
        };

        for record in records {
            match self.ledger.fetch(record.id).await {
                Ok(anchor) if !anchor.is_sentinel() => {
                    summary.already_anchored += 1;
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Skipping record {}, ledger read failed: {}", record.id, e);
                    summary.failed += 1;
                    continue;
                }
            }

            let digest = match record.stored_digest() {
                Ok(digest) => digest,
                Err(e) => {
                    error!("Cannot anchor record {}: {}", record.id, e);
                    summary.failed += 1;
                    continue;
                }
            };

            match self.anchor(record.id, &record.name, digest).await {
                Ok(_) => summary.anchored += 1,
                Err(_) => summary.failed += 1,
            }
        }

        info!(
            "Re-anchor scanned {} records: {} already anchored, {} anchored, {} failed",
            summary.scanned, summary.already_anchored, summary.anchored, summary.failed
        );
        summary
    }
}
