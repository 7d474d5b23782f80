//! In-process ledger
//!
//! Overwrite-per-key anchor map used in development mode and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::database::RecordId;
use crate::error::{AuditError, Result};
use crate::fingerprint::Digest;
use crate::ledger::{AnchorReceipt, Ledger};

#[derive(Clone, Default)]
pub struct InMemoryLedger {
    anchors: Arc<RwLock<HashMap<RecordId, Digest>>>,
    writes: Arc<RwLock<u64>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of accepted writes, including overwrites
    pub async fn write_count(&self) -> u64 {
        *self.writes.read().await
    }

    pub async fn anchored_ids(&self) -> Vec<RecordId> {
        let mut ids: Vec<RecordId> = self.anchors.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn anchor(&self, id: RecordId, digest: Digest) -> Result<AnchorReceipt> {
        if digest.is_sentinel() {
            return Err(AuditError::LedgerRejected(format!(
                "refusing to anchor the sentinel digest for record {}",
                id
            )));
        }

        self.anchors.write().await.insert(id, digest);
        let tx_number = {
            let mut writes = self.writes.write().await;
            *writes += 1;
            *writes
        };

        debug!("Anchored record {} in memory (write {})", id, tx_number);
        Ok(AnchorReceipt::new(id, digest, Some(format!("mem-{}", tx_number))))
    }

    async fn fetch(&self, id: RecordId) -> Result<Digest> {
        Ok(self
            .anchors
            .read()
            .await
            .get(&id)
            .copied()
            .unwrap_or(Digest::SENTINEL))
    }
}
