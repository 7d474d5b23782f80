//! Anchor Cache
//!
//! Time-bounded memoization in front of the ledger read path. Entries are
//! replaced whole under the write lock, so readers never see a digest paired
//! with someone else's fetch time. Concurrent misses for the same id may each
//! hit the ledger; only the TTL bound matters for correctness.
//!
//! Invalidation bumps a generation counter. A read that started before an
//! invalidation is returned to its caller but not cached, so a value read
//! ahead of an anchor write can never outlive that write's invalidation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::database::RecordId;
use crate::fingerprint::Digest;
use crate::ledger::Ledger;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    digest: Digest,
    fetched_at: Instant,
}

/// Where an anchor value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorSource {
    Cache,
    Ledger,
    /// The ledger read failed; the digest is the sentinel stand-in
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorLookup {
    pub digest: Digest,
    pub source: AnchorSource,
}

#[derive(Default)]
struct Entries {
    map: HashMap<RecordId, CacheEntry>,
    generation: u64,
}

pub struct AnchorCache {
    ledger: Arc<dyn Ledger>,
    ttl: Duration,
    entries: RwLock<Entries>,
}

impl AnchorCache {
    pub fn new(ledger: Arc<dyn Ledger>, ttl: Duration) -> Self {
        Self {
            ledger,
            ttl,
            entries: RwLock::new(Entries::default()),
        }
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Anchor for `id`, from cache when fresh, otherwise from the ledger.
    ///
    /// Failed reads are not cached and come back as the sentinel with
    /// `AnchorSource::Unavailable`.
    pub async fn lookup(&self, id: RecordId) -> AnchorLookup {
        let generation = {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.map.get(&id) {
                if entry.fetched_at.elapsed() < self.ttl {
                    return AnchorLookup {
                        digest: entry.digest,
                        source: AnchorSource::Cache,
                    };
                }
            }
            entries.generation
        };

        // Stamp before the read so an entry can only age faster, never slower.
        let fetched_at = Instant::now();
        match self.ledger.fetch(id).await {
            Ok(digest) => {
                let mut entries = self.entries.write().await;
                if entries.generation == generation {
                    entries.map.insert(id, CacheEntry { digest, fetched_at });
                    debug!("Cached anchor for record {}", id);
                } else {
                    debug!("Cache invalidated during read of record {}, not caching", id);
                }
                AnchorLookup {
                    digest,
                    source: AnchorSource::Ledger,
                }
            }
            Err(e) => {
                warn!("Ledger read failed for record {}, anchor unknown: {}", id, e);
                AnchorLookup {
                    digest: Digest::SENTINEL,
                    source: AnchorSource::Unavailable,
                }
            }
        }
    }

    pub async fn get(&self, id: RecordId) -> Digest {
        self.lookup(id).await.digest
    }

    pub async fn invalidate(&self, id: RecordId) -> bool {
        let mut entries = self.entries.write().await;
        entries.generation += 1;
        entries.map.remove(&id).is_some()
    }

    /// Drop every entry; returns how many were held
    pub async fn invalidate_all(&self) -> usize {
        let mut entries = self.entries.write().await;
        entries.generation += 1;
        let cleared = entries.map.len();
        entries.map.clear();
        cleared
    }

    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.map.len();
        entries
            .map
            .retain(|_, entry| entry.fetched_at.elapsed() < self.ttl);
        before - entries.map.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.map.len()
    }
}
