//! Reconciliation Engine
//!
//! Three-way comparison of a record's stored digest, a digest recomputed from
//! its current fields, and the digest anchored on the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::alerts::{AlertDispatcher, AlertEvent};
use crate::database::{Record, RecordId};
use crate::fingerprint::Digest;
use crate::reconcile::cache::{AnchorCache, AnchorSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Stored, recomputed and anchored digests all agree
    Verified,
    /// Stored digest matches the anchor but the fields no longer do
    Tampered,
    /// Store and ledger disagree about the digest itself
    Inconsistent,
    /// No anchor readable yet; not evidence of anything
    PendingAnchor,
}

impl Verdict {
    /// Classify the three digests, first matching rule wins:
    ///
    /// 1. sentinel anchor → `PendingAnchor`
    /// 2. stored == computed == anchor → `Verified`
    /// 3. stored == anchor, computed differs → `Tampered`
    /// 4. otherwise → `Inconsistent`
    ///
    /// `stored` is `None` when the persisted digest does not parse; it then
    /// cannot equal any anchor.
    pub fn classify(stored: Option<Digest>, computed: Digest, anchor: Digest) -> Self {
        if anchor.is_sentinel() {
            return Verdict::PendingAnchor;
        }

        match stored {
            Some(stored) if stored == anchor && computed == stored => Verdict::Verified,
            Some(stored) if stored == anchor => Verdict::Tampered,
            _ => Verdict::Inconsistent,
        }
    }

    pub fn raises_alert(&self) -> bool {
        matches!(self, Verdict::Tampered | Verdict::Inconsistent)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Verified => "verified",
            Verdict::Tampered => "tampered",
            Verdict::Inconsistent => "inconsistent",
            Verdict::PendingAnchor => "pending_anchor",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub record_id: RecordId,
    pub name: String,
    pub role: String,
    pub salary: String,
    pub verdict: Verdict,
    /// Persisted digest exactly as stored, even if it does not parse
    pub stored_digest: String,
    pub computed_digest: Digest,
    pub anchor_digest: Digest,
    pub anchor_source: AnchorSource,
    pub created_at: DateTime<Utc>,
    pub checked_at: DateTime<Utc>,
}

impl VerificationReport {
    /// Whether the fields are known to differ from what was anchored
    pub fn is_tampered(&self) -> bool {
        self.verdict == Verdict::Tampered
    }
}

pub struct ReconciliationEngine {
    cache: Arc<AnchorCache>,
    alerts: AlertDispatcher,
}

impl ReconciliationEngine {
    pub fn new(cache: Arc<AnchorCache>, alerts: AlertDispatcher) -> Self {
        Self { cache, alerts }
    }

    pub fn cache(&self) -> &Arc<AnchorCache> {
        &self.cache
    }

    pub fn alerts(&self) -> &AlertDispatcher {
        &self.alerts
    }

    /// Verify one record snapshot.
    ///
    /// The snapshot's fields and stored digest must come from the same read.
    /// Nothing here blocks on alert delivery.
    pub async fn verify(&self, record: &Record) -> VerificationReport {
        let computed = record.fingerprint();
        let stored = match record.stored_digest() {
            Ok(digest) => Some(digest),
            Err(e) => {
                warn!("Stored digest unreadable: {}", e);
                None
            }
        };

        let anchor = self.cache.lookup(record.id).await;
        let verdict = Verdict::classify(stored, computed, anchor.digest);

        let report = VerificationReport {
            record_id: record.id,
            name: record.name.clone(),
            role: record.role.clone(),
            salary: record.salary.clone(),
            verdict,
            stored_digest: record.stored_digest.clone(),
            computed_digest: computed,
            anchor_digest: anchor.digest,
            anchor_source: anchor.source,
            created_at: record.created_at,
            checked_at: Utc::now(),
        };

        match verdict {
            Verdict::Verified => debug!("Record {} verified", record.id),
            Verdict::PendingAnchor if anchor.source == AnchorSource::Unavailable => {
                info!("Record {} pending: ledger unreachable", record.id)
            }
            Verdict::PendingAnchor => debug!("Record {} pending: not yet anchored", record.id),
            Verdict::Tampered => warn!(
                "Record {} TAMPERED: computed {} but anchored {}",
                record.id,
                computed.short(),
                anchor.digest.short()
            ),
            Verdict::Inconsistent => warn!(
                "Record {} INCONSISTENT: stored digest does not match anchor {}",
                record.id,
                anchor.digest.short()
            ),
        }

        if verdict.raises_alert() {
            self.alerts.dispatch(AlertEvent::from_report(&report));
        }

        report
    }
}
