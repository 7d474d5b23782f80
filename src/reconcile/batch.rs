//! Batch Verifier
//!
//! Runs the reconciliation engine over at most `limit` records with bounded
//! fan-out. A failing record is counted and skipped; a deadline stops the
//! batch but keeps every result already computed.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::database::Record;
use crate::reconcile::engine::{ReconciliationEngine, Verdict, VerificationReport};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Records offered to the batch, examined or not
    pub total: usize,
    /// Records that produced a verdict or failed
    pub examined: usize,
    pub verified: usize,
    pub tampered: usize,
    pub inconsistent: usize,
    pub pending: usize,
    pub failed: usize,
    /// The deadline elapsed before every selected record finished
    pub timed_out: bool,
    /// Reports ordered by record id
    pub results: Vec<VerificationReport>,
}

impl BatchSummary {
    fn tally(&mut self, report: VerificationReport) {
        self.examined += 1;
        match report.verdict {
            Verdict::Verified => self.verified += 1,
            Verdict::Tampered => self.tampered += 1,
            Verdict::Inconsistent => self.inconsistent += 1,
            Verdict::PendingAnchor => self.pending += 1,
        }
        self.results.push(report);
    }

    /// Any tampered or inconsistent record
    pub fn has_findings(&self) -> bool {
        self.tampered > 0 || self.inconsistent > 0
    }
}

pub struct BatchVerifier {
    engine: Arc<ReconciliationEngine>,
    concurrency: usize,
}

impl BatchVerifier {
    pub fn new(engine: Arc<ReconciliationEngine>, concurrency: usize) -> Self {
        Self {
            engine,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn verify_batch(&self, records: Vec<Record>, limit: usize) -> BatchSummary {
        let total = records.len();
        self.run(records, limit, total, None).await
    }

    /// As [`verify_batch`](Self::verify_batch), giving up on outstanding
    /// records at `deadline`
    pub async fn verify_batch_until(
        &self,
        records: Vec<Record>,
        limit: usize,
        deadline: Instant,
    ) -> BatchSummary {
        let total = records.len();
        self.run(records, limit, total, Some(deadline)).await
    }

    /// Verify an already-limited selection out of `total` stored records
    pub async fn verify_selected_until(
        &self,
        selected: Vec<Record>,
        total: usize,
        deadline: Instant,
    ) -> BatchSummary {
        let limit = selected.len();
        self.run(selected, limit, total.max(limit), Some(deadline)).await
    }

    async fn run(
        &self,
        records: Vec<Record>,
        limit: usize,
        total: usize,
        deadline: Option<Instant>,
    ) -> BatchSummary {
        let mut summary = BatchSummary {
            total,
            ..Default::default()
        };

        // Dropping the JoinSet aborts whatever is still running, so a caller
        // that cancels this future leaves no verification behind.
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        for record in records.into_iter().take(limit) {
            let engine = Arc::clone(&self.engine);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                engine.verify(&record).await
            });
        }

        loop {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        summary.timed_out = true;
                        warn!(
                            "Batch deadline reached with {} record(s) outstanding",
                            tasks.len()
                        );
                        tasks.abort_all();
                        break;
                    }
                },
                None => tasks.join_next().await,
            };

            match next {
                Some(Ok(report)) => summary.tally(report),
                Some(Err(e)) => {
                    summary.examined += 1;
                    summary.failed += 1;
                    error!("Batch verification task failed: {}", e);
                }
                None => break,
            }
        }

        summary.results.sort_by_key(|r| r.record_id);

        info!(
            "Batch verified {}/{} records: {} verified, {} tampered, {} inconsistent, {} pending, {} failed",
            summary.examined,
            summary.total,
            summary.verified,
            summary.tampered,
            summary.inconsistent,
            summary.pending,
            summary.failed
        );

        summary
    }
}
