//! Tamper Alerts
//!
//! Verification hands alert events to a bounded queue and moves on; a
//! background worker delivers them through a [`Notifier`]. Delivery is
//! best-effort: a full queue drops the event and a failed delivery is
//! logged, never retried and never reported back to the verifier.

pub mod notifier;

pub use notifier::{LogNotifier, Notifier, WebhookNotifier};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::database::RecordId;
use crate::fingerprint::Digest;
use crate::reconcile::{Verdict, VerificationReport};

/// Report of a tamper or inconsistency finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub record_id: RecordId,
    pub record_name: String,
    pub verdict: Verdict,
    /// Digest persisted with the record, exactly as stored
    pub stored_digest: String,
    pub computed_digest: Digest,
    pub anchor_digest: Digest,
    pub timestamp: DateTime<Utc>,
}

impl AlertEvent {
    pub fn from_report(report: &VerificationReport) -> Self {
        Self {
            record_id: report.record_id,
            record_name: report.name.clone(),
            verdict: report.verdict,
            stored_digest: report.stored_digest.clone(),
            computed_digest: report.computed_digest,
            anchor_digest: report.anchor_digest,
            timestamp: report.checked_at,
        }
    }

    pub fn subject(&self) -> String {
        match self.verdict {
            Verdict::Tampered => format!("DATA TAMPERING DETECTED - Record {}", self.record_name),
            _ => format!("LEDGER INCONSISTENCY - Record {}", self.record_name),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "record {} ({}): {} stored={} computed={} anchor={}",
            self.record_id,
            self.record_name,
            self.verdict,
            self.stored_digest,
            self.computed_digest,
            self.anchor_digest
        )
    }
}

#[derive(Debug, Default)]
struct AlertStats {
    queued: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlertStatsSnapshot {
    pub queued: u64,
    pub delivered: u64,
    pub failed: u64,
    pub dropped: u64,
}

#[derive(Clone)]
pub struct AlertDispatcher {
    sender: Option<mpsc::Sender<AlertEvent>>,
    stats: Arc<AlertStats>,
}

impl AlertDispatcher {
    /// Start the delivery worker. The worker exits once every dispatcher
    /// clone has been dropped and the queue is drained.
    pub fn spawn(
        notifier: Arc<dyn Notifier>,
        capacity: usize,
        delivery_timeout: Duration,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let stats = Arc::new(AlertStats::default());

        let worker = tokio::spawn(run_worker(
            receiver,
            notifier,
            delivery_timeout,
            Arc::clone(&stats),
        ));

        (
            Self {
                sender: Some(sender),
                stats,
            },
            worker,
        )
    }

    /// Dispatcher that discards every event
    pub fn disabled() -> Self {
        Self {
            sender: None,
            stats: Arc::new(AlertStats::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Queue an event without waiting; returns whether it was accepted
    pub fn dispatch(&self, event: AlertEvent) -> bool {
        let sender = match &self.sender {
            Some(sender) => sender,
            None => {
                debug!("Alerts disabled, discarding alert for record {}", event.record_id);
                return false;
            }
        };

        match sender.try_send(event) {
            Ok(()) => {
                self.stats.queued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(event)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Alert queue full, dropping alert: {}", event.summary());
                false
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Alert worker stopped, dropping alert: {}", event.summary());
                false
            }
        }
    }

    pub fn stats(&self) -> AlertStatsSnapshot {
        AlertStatsSnapshot {
            queued: self.stats.queued.load(Ordering::Relaxed),
            delivered: self.stats.delivered.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
        }
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<AlertEvent>,
    notifier: Arc<dyn Notifier>,
    delivery_timeout: Duration,
    stats: Arc<AlertStats>,
) {
    info!("Alert worker started ({})", notifier.name());

    while let Some(event) = receiver.recv().await {
        match tokio::time::timeout(delivery_timeout, notifier.notify(&event)).await {
            Ok(Ok(())) => {
                stats.delivered.fetch_add(1, Ordering::Relaxed);
                debug!("Delivered alert for record {}", event.record_id);
            }
            Ok(Err(e)) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                error!("Alert delivery failed for record {}: {}", event.record_id, e);
            }
            Err(_) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    "Alert delivery for record {} timed out after {:?}",
                    event.record_id, delivery_timeout
                );
            }
        }
    }

    info!("Alert worker stopped");
}
