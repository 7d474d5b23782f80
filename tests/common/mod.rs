#![allow(dead_code)]

use async_trait::async_trait;
use ledger_audit::alerts::{AlertDispatcher, AlertEvent, Notifier};
use ledger_audit::database::{Database, NewRecord, RecordId};
use ledger_audit::error::{AuditError, Result};
use ledger_audit::fingerprint::Digest;
use ledger_audit::ledger::{AnchorReceipt, InMemoryLedger, Ledger};
use ledger_audit::service::{AuditService, ServiceOptions};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Setup an in-memory SQLite database for testing
pub async fn setup_test_db() -> Database {
    Database::new_in_memory().await.expect("Failed to create test database")
}

pub fn new_record(id: RecordId, name: &str, role: &str, salary: &str) -> NewRecord {
    NewRecord {
        id,
        name: name.to_string(),
        role: role.to_string(),
        salary: salary.to_string(),
        force_duplicate: false,
    }
}

/// In-memory ledger with scriptable read failures and an optional gate
/// that holds anchor writes until released
#[derive(Clone, Default)]
pub struct ScriptedLedger {
    pub inner: InMemoryLedger,
    failing_reads: Arc<Mutex<HashSet<RecordId>>>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchor writes block until `release` is called
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    pub fn fail_reads_for(&self, id: RecordId) {
        self.failing_reads.lock().unwrap().insert(id);
    }

    pub fn heal_reads_for(&self, id: RecordId) {
        self.failing_reads.lock().unwrap().remove(&id);
    }

    pub fn release(&self, writes: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(writes);
        }
    }
}

#[async_trait]
impl Ledger for ScriptedLedger {
    async fn anchor(&self, id: RecordId, digest: Digest) -> Result<AnchorReceipt> {
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .expect("ledger gate closed")
                .forget();
        }
        self.inner.anchor(id, digest).await
    }

    async fn fetch(&self, id: RecordId) -> Result<Digest> {
        if self.failing_reads.lock().unwrap().contains(&id) {
            return Err(AuditError::LedgerUnavailable(format!(
                "read for {} timed out",
                id
            )));
        }
        self.inner.fetch(id).await
    }
}

/// Notifier that keeps every delivered alert
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<AlertEvent>>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<AlertEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify(&self, event: &AlertEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

pub struct TestHarness {
    pub service: AuditService,
    pub ledger: ScriptedLedger,
    pub notifier: RecordingNotifier,
    pub alert_worker: JoinHandle<()>,
}

impl TestHarness {
    pub async fn new(ledger: ScriptedLedger) -> Self {
        Self::with_options(ledger, ServiceOptions::default()).await
    }

    pub async fn with_options(ledger: ScriptedLedger, options: ServiceOptions) -> Self {
        let db = setup_test_db().await;
        let notifier = RecordingNotifier::default();
        let (alerts, alert_worker) =
            AlertDispatcher::spawn(Arc::new(notifier.clone()), 16, Duration::from_secs(1));
        let service = AuditService::new(Arc::new(db), Arc::new(ledger.clone()), alerts, options);

        Self {
            service,
            ledger,
            notifier,
            alert_worker,
        }
    }

    /// Create a record and wait for its anchor to confirm
    pub async fn create_anchored(&self, record: NewRecord) -> ledger_audit::database::Record {
        let created = self
            .service
            .create_record(record)
            .await
            .expect("create record");
        created
            .anchor_task
            .await
            .expect("anchor task panicked")
            .expect("anchor write failed");
        created.record
    }

    /// Stop the service and wait until every queued alert was delivered
    pub async fn delivered_alerts(self) -> Vec<AlertEvent> {
        let TestHarness {
            service,
            notifier,
            alert_worker,
            ..
        } = self;
        drop(service);
        alert_worker.await.expect("alert worker panicked");
        notifier.events()
    }
}
