use chrono::{DateTime, Utc};
use sqlx::any::AnyRow;
use sqlx::{AnyPool, Row};

use crate::database::models::{NameMatch, Record, RecordField, RecordId, SearchFilter};
use crate::fingerprint::canonical_timestamp;

const RECORD_COLUMNS: &str = "id, name, role, salary, record_hash, created_at";

pub struct Queries;

impl Queries {
    pub async fn insert_record(pool: &AnyPool, record: &Record) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO records (id, name, role, salary, record_hash, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id)
        .bind(&record.name)
        .bind(&record.role)
        .bind(&record.salary)
        .bind(&record.stored_digest)
        .bind(canonical_timestamp(&record.created_at))
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn get_record(pool: &AnyPool, id: RecordId) -> Result<Option<Record>, sqlx::Error> {
        let row = sqlx::query(&format!("SELECT {} FROM records WHERE id = $1", RECORD_COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await?;

        row.map(|r| record_from_row(&r)).transpose()
    }

    pub async fn record_exists(pool: &AnyPool, id: RecordId) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT id FROM records WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(row.is_some())
    }

    pub async fn find_by_name(pool: &AnyPool, name: &str) -> Result<Vec<NameMatch>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, role FROM records
            WHERE LOWER(name) = LOWER($1)
            ORDER BY id
            "#,
        )
        .bind(name)
        .fetch_all(pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<NameMatch, sqlx::Error> {
                Ok(NameMatch {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    role: row.try_get("role")?,
                })
            })
            .collect()
    }

    pub async fn list_records(pool: &AnyPool) -> Result<Vec<Record>, sqlx::Error> {
        let rows = sqlx::query(&format!("SELECT {} FROM records ORDER BY id", RECORD_COLUMNS))
            .fetch_all(pool)
            .await?;

        rows.iter().map(record_from_row).collect()
    }

    pub async fn list_records_limited(
        pool: &AnyPool,
        limit: i64,
    ) -> Result<Vec<Record>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM records ORDER BY id LIMIT $1",
            RECORD_COLUMNS
        ))
        .bind(limit)
        .fetch_all(pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    pub async fn recent_records(pool: &AnyPool, limit: i64) -> Result<Vec<Record>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM records ORDER BY created_at DESC, id DESC LIMIT $1",
            RECORD_COLUMNS
        ))
        .bind(limit)
        .fetch_all(pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    pub async fn count_records(pool: &AnyPool) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM records")
            .fetch_one(pool)
            .await?;

        row.try_get("total")
    }

    pub async fn search_records(
        pool: &AnyPool,
        filter: &SearchFilter,
    ) -> Result<Vec<Record>, sqlx::Error> {
        let mut sql = format!("SELECT {} FROM records WHERE 1=1", RECORD_COLUMNS);
        let mut params = Vec::new();

        if let Some(name) = filter.name.as_deref().filter(|n| !n.is_empty()) {
            params.push(format!("%{}%", name));
            sql.push_str(&format!(" AND LOWER(name) LIKE LOWER(${})", params.len()));
        }

        if let Some(role) = filter.role.as_deref().filter(|r| !r.is_empty()) {
            params.push(format!("%{}%", role));
            sql.push_str(&format!(" AND LOWER(role) LIKE LOWER(${})", params.len()));
        }

        sql.push_str(" ORDER BY id");

        let mut query = sqlx::query(&sql);
        for param in params {
            query = query.bind(param);
        }

        let rows = query.fetch_all(pool).await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = record_from_row(row)?;
            if filter.salary_matches(&record.salary) {
                records.push(record);
            }
        }

        Ok(records)
    }

    /// Returns the number of rows touched
    pub async fn update_field(
        pool: &AnyPool,
        id: RecordId,
        field: RecordField,
        value: &str,
    ) -> Result<u64, sqlx::Error> {
        // Column name comes from a closed enum, never from user input.
        let sql = format!("UPDATE records SET {} = $1 WHERE id = $2", field.column());
        let result = sqlx::query(&sql).bind(value).bind(id).execute(pool).await?;

        Ok(result.rows_affected())
    }

    pub async fn delete_record(pool: &AnyPool, id: RecordId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM records WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete_all_records(pool: &AnyPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM records").execute(pool).await?;

        Ok(result.rows_affected())
    }
}

fn record_from_row(row: &AnyRow) -> Result<Record, sqlx::Error> {
    let created_at: String = row.try_get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
        .with_timezone(&Utc);

    Ok(Record {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        role: row.try_get("role")?,
        salary: row.try_get("salary")?,
        stored_digest: row.try_get("record_hash")?,
        created_at,
    })
}
