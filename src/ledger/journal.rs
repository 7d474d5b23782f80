//! Anchor Journal
//!
//! Bounded in-memory history of confirmed anchor writes, newest last.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::ledger::AnchorReceipt;

pub const DEFAULT_JOURNAL_CAPACITY: usize = 1000;

/// A confirmed anchor write and the record it was made for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorTransaction {
    #[serde(flatten)]
    pub receipt: AnchorReceipt,
    pub record_name: String,
}

#[derive(Default)]
struct JournalState {
    transactions: VecDeque<AnchorTransaction>,
    /// Every write ever recorded, including evicted ones
    total: u64,
}

#[derive(Clone)]
pub struct AnchorJournal {
    state: Arc<Mutex<JournalState>>,
    capacity: usize,
}

impl AnchorJournal {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(JournalState::default())),
            capacity: capacity.max(1),
        }
    }

    pub async fn record(&self, receipt: AnchorReceipt, record_name: &str) {
        let mut state = self.state.lock().await;
        if state.transactions.len() == self.capacity {
            state.transactions.pop_front();
        }
        state.transactions.push_back(AnchorTransaction {
            receipt,
            record_name: record_name.to_string(),
        });
        state.total += 1;
    }

    /// Newest `n` transactions, oldest first
    pub async fn recent(&self, n: usize) -> Vec<AnchorTransaction> {
        let state = self.state.lock().await;
        let skip = state.transactions.len().saturating_sub(n);
        state.transactions.iter().skip(skip).cloned().collect()
    }

    /// Retained transactions
    pub async fn len(&self) -> usize {
        self.state.lock().await.transactions.len()
    }

    pub async fn total_recorded(&self) -> u64 {
        self.state.lock().await.total
    }
}

impl Default for AnchorJournal {
    fn default() -> Self {
        Self::new(DEFAULT_JOURNAL_CAPACITY)
    }
}
