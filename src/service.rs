//! Record Audit Service
//!
//! Owns the record store, the reconciliation engine, the anchor journal and
//! the batch verifier, and exposes the operations the HTTP surface and the
//! operator tools share.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::alerts::{AlertDispatcher, AlertStatsSnapshot};
use crate::config::AppConfig;
use crate::database::{NameMatch, NewRecord, Record, RecordField, RecordId, RecordStore, SearchFilter};
use crate::error::{AuditError, Result};
use crate::fingerprint::{creation_timestamp, fingerprint};
use crate::ledger::journal::DEFAULT_JOURNAL_CAPACITY;
use crate::ledger::{
    AnchorJournal, AnchorReceipt, AnchorTransaction, Ledger, ReanchorSummary, RecordAnchorer,
};
use crate::reconcile::{
    AnchorCache, BatchSummary, BatchVerifier, ReconciliationEngine, VerificationReport,
    DEFAULT_CACHE_TTL,
};

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub cache_ttl: Duration,
    pub batch_limit: usize,
    pub batch_concurrency: usize,
    pub batch_deadline: Duration,
    pub journal_capacity: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            batch_limit: 10,
            batch_concurrency: 4,
            batch_deadline: Duration::from_secs(30),
            journal_capacity: DEFAULT_JOURNAL_CAPACITY,
        }
    }
}

impl ServiceOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            cache_ttl: config.cache.ttl(),
            batch_limit: config.batch.default_limit,
            batch_concurrency: config.batch.concurrency,
            batch_deadline: config.batch.deadline(),
            journal_capacity: DEFAULT_JOURNAL_CAPACITY,
        }
    }
}

/// A persisted record whose anchor write is still in flight
#[derive(Debug)]
pub struct CreatedRecord {
    pub record: Record,
    pub anchor_task: JoinHandle<Result<AnchorReceipt>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub records: u64,
    pub cached_anchors: usize,
    pub journal_entries: usize,
    pub alerts_enabled: bool,
    pub alerts: AlertStatsSnapshot,
}

/// Record count and the newest records, read from the store only
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub total_records: u64,
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionHistory {
    /// Every confirmed anchor write since startup, including evicted ones
    pub total_transactions: u64,
    pub transactions: Vec<AnchorTransaction>,
}

pub struct AuditService {
    store: Arc<dyn RecordStore>,
    engine: Arc<ReconciliationEngine>,
    batch: BatchVerifier,
    anchorer: RecordAnchorer,
    options: ServiceOptions,
}

impl AuditService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        ledger: Arc<dyn Ledger>,
        alerts: AlertDispatcher,
        options: ServiceOptions,
    ) -> Self {
        let cache = Arc::new(AnchorCache::new(Arc::clone(&ledger), options.cache_ttl));
        let engine = Arc::new(ReconciliationEngine::new(Arc::clone(&cache), alerts));
        let anchorer = RecordAnchorer::new(
            ledger,
            cache,
            AnchorJournal::new(options.journal_capacity),
        );
        let batch = BatchVerifier::new(Arc::clone(&engine), options.batch_concurrency);

        Self {
            store,
            engine,
            batch,
            anchorer,
            options,
        }
    }

    /// Persist a new record and start anchoring its digest.
    ///
    /// Returns as soon as the row is written; the anchor confirms later.
    pub async fn create_record(&self, new: NewRecord) -> Result<CreatedRecord> {
        if new.id <= 0 {
            return Err(AuditError::invalid_record_id(new.id));
        }

        if self.store.exists(new.id).await? {
            return Err(AuditError::DuplicateId(new.id));
        }

        if !new.force_duplicate {
            if let Some(existing) = self.store.find_by_name(&new.name).await?.into_iter().next() {
                return Err(AuditError::DuplicateName {
                    name: existing.name,
                    existing_id: existing.id,
                });
            }
        }

        let created_at = creation_timestamp(chrono::Utc::now());
        let digest = fingerprint(&new.name, &new.role, &new.salary, &created_at);
        let record = Record {
            id: new.id,
            name: new.name,
            role: new.role,
            salary: new.salary,
            stored_digest: digest.to_hex(),
            created_at,
        };

        self.store.insert(&record).await?;
        info!("Created record {} ({}), digest {}", record.id, record.name, digest.short());

        let anchor_task = self.anchorer.spawn(record.id, record.name.clone(), digest);
        Ok(CreatedRecord {
            record,
            anchor_task,
        })
    }

    pub async fn check_duplicate_name(&self, name: &str) -> Result<Vec<NameMatch>> {
        self.store.find_by_name(name).await
    }

    pub async fn get_record(&self, id: RecordId) -> Result<Record> {
        self.store.get(id).await?.ok_or(AuditError::NotFound(id))
    }

    pub async fn list_records(&self) -> Result<Vec<Record>> {
        self.store.list().await
    }

    /// Newest `n` records by creation time; never touches the ledger
    pub async fn dashboard(&self, n: usize) -> Result<Dashboard> {
        Ok(Dashboard {
            total_records: self.store.count().await?,
            records: self.store.recent(n).await?,
        })
    }

    pub async fn search_records(&self, filter: &SearchFilter) -> Result<Vec<Record>> {
        self.store.search(filter).await
    }

    /// Overwrite one field in place. The stored digest is left untouched,
    /// so any change shows up as tampering on the next verification.
    pub async fn update_field(&self, id: RecordId, field: &str, value: &str) -> Result<Record> {
        let field: RecordField = field.parse()?;
        self.store.update_field(id, field, value).await?;
        warn!("Record {} field '{}' modified; stored digest not updated", id, field);
        self.get_record(id).await
    }

    pub async fn delete_record(&self, id: RecordId) -> Result<()> {
        self.store.delete(id).await?;
        info!("Deleted record {}", id);
        Ok(())
    }

    /// Delete every record and drop every cached anchor; returns the
    /// number of records removed. Ledger anchors are left in place.
    pub async fn delete_all_records(&self) -> Result<u64> {
        let deleted = self.store.delete_all().await?;
        self.engine.cache().invalidate_all().await;
        warn!("Deleted all {} records", deleted);
        Ok(deleted)
    }

    pub async fn verify_record(&self, id: RecordId) -> Result<VerificationReport> {
        let record = self.get_record(id).await?;
        Ok(self.engine.verify(&record).await)
    }

    /// Verify up to `limit` stored records (configured default when `None`)
    /// within the configured batch deadline.
    pub async fn verify_all(&self, limit: Option<usize>) -> Result<BatchSummary> {
        let limit = limit.unwrap_or(self.options.batch_limit);
        let total = self.store.count().await?;
        let selected = self.store.list_first(limit).await?;
        let deadline = Instant::now() + self.options.batch_deadline;
        Ok(self
            .batch
            .verify_selected_until(selected, total as usize, deadline)
            .await)
    }

    /// Anchor one record's stored digest and wait for the outcome
    pub async fn anchor_record(&self, id: RecordId) -> Result<AnchorReceipt> {
        let record = self.get_record(id).await?;
        let digest = record.stored_digest()?;
        self.anchorer.anchor(id, &record.name, digest).await
    }

    pub async fn reanchor_missing(&self) -> Result<ReanchorSummary> {
        let records = self.store.list().await?;
        Ok(self.anchorer.reanchor_missing(&records).await)
    }

    /// Drop every cached anchor; returns how many were held
    pub async fn clear_cache(&self) -> usize {
        let cleared = self.engine.cache().invalidate_all().await;
        info!("Anchor cache cleared ({} entries)", cleared);
        cleared
    }

    pub async fn purge_expired_anchors(&self) -> usize {
        let purged = self.engine.cache().purge_expired().await;
        if purged > 0 {
            debug!("Purged {} expired anchor cache entries", purged);
        }
        purged
    }

    pub async fn recent_transactions(&self, n: usize) -> TransactionHistory {
        let journal = self.anchorer.journal();
        TransactionHistory {
            total_transactions: journal.total_recorded().await,
            transactions: journal.recent(n).await,
        }
    }

    pub async fn status(&self) -> Result<ServiceStatus> {
        Ok(ServiceStatus {
            records: self.store.count().await?,
            cached_anchors: self.engine.cache().len().await,
            journal_entries: self.anchorer.journal().len().await,
            alerts_enabled: self.engine.alerts().is_enabled(),
            alerts: self.engine.alerts().stats(),
        })
    }
}
