//! Record Store
//!
//! Boundary to the relational storage collaborator. The reconciliation
//! engine never writes through this trait; it only reads snapshots.

use async_trait::async_trait;

use crate::database::models::{NameMatch, Record, RecordField, RecordId, SearchFilter};
use crate::error::Result;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new record; an existing id is `AuditError::DuplicateId`
    async fn insert(&self, record: &Record) -> Result<()>;

    /// Point lookup. Fields and stored digest come from the same row read.
    async fn get(&self, id: RecordId) -> Result<Option<Record>>;

    async fn exists(&self, id: RecordId) -> Result<bool>;

    /// Case-insensitive exact name match
    async fn find_by_name(&self, name: &str) -> Result<Vec<NameMatch>>;

    /// All records ordered by id
    async fn list(&self) -> Result<Vec<Record>>;

    /// The first `limit` records ordered by id
    async fn list_first(&self, limit: usize) -> Result<Vec<Record>>;

    /// The `limit` most recently created records, newest first
    async fn recent(&self, limit: usize) -> Result<Vec<Record>>;

    async fn count(&self) -> Result<u64>;

    async fn search(&self, filter: &SearchFilter) -> Result<Vec<Record>>;

    /// Update one field in place; a missing id is `AuditError::NotFound`
    async fn update_field(&self, id: RecordId, field: RecordField, value: &str) -> Result<()>;

    /// Delete a record; a missing id is `AuditError::NotFound`
    async fn delete(&self, id: RecordId) -> Result<()>;

    /// Delete every record; returns how many rows were removed
    async fn delete_all(&self) -> Result<u64>;
}
