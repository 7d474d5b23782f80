//! Integrity Reconciliation
//!
//! Compares stored, recomputed and anchored digests to classify each record,
//! singly or in bounded batches.

pub mod batch;
pub mod cache;
pub mod engine;

pub use batch::{BatchSummary, BatchVerifier};
pub use cache::{AnchorCache, AnchorLookup, AnchorSource, DEFAULT_CACHE_TTL};
pub use engine::{ReconciliationEngine, Verdict, VerificationReport};
