pub mod models;
pub mod queries;
pub mod schema;
pub mod store;

pub use models::{NameMatch, NewRecord, Record, RecordField, RecordId, SearchFilter};
pub use store::RecordStore;

use async_trait::async_trait;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use tracing::{debug, info};

use crate::error::{AuditError, Result};
use queries::Queries;

#[derive(Clone)]
pub struct Database {
    pool: AnyPool,
}

impl Database {
    /// Connect to PostgreSQL or SQLite depending on the URL scheme
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        sqlx::any::install_default_drivers();

        let mut options = AnyPoolOptions::new().max_connections(max_connections);

        // Every connection to an in-memory SQLite URL is its own database,
        // and it vanishes when that connection is recycled.
        if is_in_memory(database_url) {
            options = options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = options.connect(database_url).await?;

        info!("Connected to database ({} max connections)", pool.options().get_max_connections());
        Ok(Database { pool })
    }

    /// In-memory SQLite database with migrations applied
    pub async fn new_in_memory() -> Result<Self> {
        let db = Self::new("sqlite::memory:", 1).await?;
        db.run_migrations().await?;
        Ok(db)
    }

    pub async fn run_migrations(&self) -> Result<()> {
        for (i, statement) in schema::MIGRATIONS.iter().enumerate() {
            sqlx::query(statement).execute(&self.pool).await?;
            debug!("Applied migration {}", i + 1);
        }
        Ok(())
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.starts_with("sqlite") && database_url.contains(":memory:")
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db_err| db_err.is_unique_violation())
        .unwrap_or(false)
}

#[async_trait]
impl RecordStore for Database {
    async fn insert(&self, record: &Record) -> Result<()> {
        Queries::insert_record(&self.pool, record)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AuditError::DuplicateId(record.id)
                } else {
                    AuditError::from(e)
                }
            })
    }

    async fn get(&self, id: RecordId) -> Result<Option<Record>> {
        Ok(Queries::get_record(&self.pool, id).await?)
    }

    async fn exists(&self, id: RecordId) -> Result<bool> {
        Ok(Queries::record_exists(&self.pool, id).await?)
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<NameMatch>> {
        Ok(Queries::find_by_name(&self.pool, name).await?)
    }

    async fn list(&self) -> Result<Vec<Record>> {
        Ok(Queries::list_records(&self.pool).await?)
    }

    async fn list_first(&self, limit: usize) -> Result<Vec<Record>> {
        Ok(Queries::list_records_limited(&self.pool, sql_limit(limit)).await?)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Record>> {
        Ok(Queries::recent_records(&self.pool, sql_limit(limit)).await?)
    }

    async fn count(&self) -> Result<u64> {
        let total = Queries::count_records(&self.pool).await?;
        Ok(total.max(0) as u64)
    }

    async fn search(&self, filter: &SearchFilter) -> Result<Vec<Record>> {
        Ok(Queries::search_records(&self.pool, filter).await?)
    }

    async fn update_field(&self, id: RecordId, field: RecordField, value: &str) -> Result<()> {
        let touched = Queries::update_field(&self.pool, id, field, value).await?;
        if touched == 0 {
            return Err(AuditError::NotFound(id));
        }
        Ok(())
    }

    async fn delete(&self, id: RecordId) -> Result<()> {
        let touched = Queries::delete_record(&self.pool, id).await?;
        if touched == 0 {
            return Err(AuditError::NotFound(id));
        }
        Ok(())
    }

    async fn delete_all(&self) -> Result<u64> {
        Ok(Queries::delete_all_records(&self.pool).await?)
    }
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::{creation_timestamp, fingerprint};
    use chrono::Utc;

    fn record(id: RecordId, name: &str, role: &str, salary: &str) -> Record {
        let created_at = creation_timestamp(Utc::now());
        Record {
            id,
            name: name.to_string(),
            role: role.to_string(),
            salary: salary.to_string(),
            stored_digest: fingerprint(name, role, salary, &created_at).to_hex(),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_round_trip() {
        let db = Database::new_in_memory().await.unwrap();
        let alice = record(1, "Alice", "Eng", "70000");

        db.insert(&alice).await.unwrap();
        let loaded = db.get(1).await.unwrap().unwrap();

        assert_eq!(loaded, alice);
        assert_eq!(loaded.fingerprint().to_hex(), loaded.stored_digest);
        assert!(db.get(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_id_is_distinguishable() {
        let db = Database::new_in_memory().await.unwrap();
        db.insert(&record(1, "Alice", "Eng", "70000")).await.unwrap();

        let err = db.insert(&record(1, "Bob", "Ops", "50000")).await.unwrap_err();
        assert!(matches!(err, AuditError::DuplicateId(1)));
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_record() {
        let db = Database::new_in_memory().await.unwrap();

        let err = db.update_field(9, RecordField::Salary, "1").await.unwrap_err();
        assert!(matches!(err, AuditError::NotFound(9)));

        let err = db.delete(9).await.unwrap_err();
        assert!(matches!(err, AuditError::NotFound(9)));
    }

    #[tokio::test]
    async fn test_update_field_in_place() {
        let db = Database::new_in_memory().await.unwrap();
        db.insert(&record(1, "Alice", "Eng", "70000")).await.unwrap();

        db.update_field(1, RecordField::Salary, "99999").await.unwrap();
        let loaded = db.get(1).await.unwrap().unwrap();

        assert_eq!(loaded.salary, "99999");
        assert_ne!(loaded.fingerprint().to_hex(), loaded.stored_digest);
    }

    #[tokio::test]
    async fn test_search_and_name_lookup() {
        let db = Database::new_in_memory().await.unwrap();
        db.insert(&record(1, "Alice", "Engineer", "70000")).await.unwrap();
        db.insert(&record(2, "Bob", "Operations", "50000")).await.unwrap();
        db.insert(&record(3, "alice", "Manager", "90000")).await.unwrap();

        let by_name = db
            .search(&SearchFilter {
                name: Some("ALI".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_name.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 3]);

        let by_salary = db
            .search(&SearchFilter {
                min_salary: Some(60000.0),
                max_salary: Some(80000.0),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_salary.len(), 1);
        assert_eq!(by_salary[0].id, 1);

        let matches = db.find_by_name("ALICE").await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(db.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_limited_listings() {
        let db = Database::new_in_memory().await.unwrap();
        let now = Utc::now();
        for (id, minutes_ago) in [(3, 5), (1, 30), (2, 1), (4, 60)] {
            let mut r = record(id, &format!("r{}", id), "Eng", "1");
            r.created_at = creation_timestamp(now - chrono::Duration::minutes(minutes_ago));
            db.insert(&r).await.unwrap();
        }

        let first = db.list_first(2).await.unwrap();
        assert_eq!(first.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);

        let recent = db.recent(3).await.unwrap();
        assert_eq!(recent.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2, 3, 1]);

        assert_eq!(db.list_first(0).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_delete_all_reports_removed_rows() {
        let db = Database::new_in_memory().await.unwrap();
        for id in 1..=4 {
            db.insert(&record(id, &format!("r{}", id), "Eng", "1")).await.unwrap();
        }

        assert_eq!(db.delete_all().await.unwrap(), 4);
        assert_eq!(db.count().await.unwrap(), 0);
        assert_eq!(db.delete_all().await.unwrap(), 0);
    }
}
