use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AuditError, Result};
use crate::fingerprint::{self, Digest};

/// Externally assigned record identity, also the ledger key
pub type RecordId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub name: String,
    pub role: String,
    pub salary: String,
    /// Digest persisted alongside the record at creation time, as stored
    pub stored_digest: String,
    pub created_at: DateTime<Utc>,
}

impl Record {
    /// Recompute the fingerprint from the record's current field values
    pub fn fingerprint(&self) -> Digest {
        fingerprint::fingerprint(&self.name, &self.role, &self.salary, &self.created_at)
    }

    /// Parse the persisted digest
    pub fn stored_digest(&self) -> Result<Digest> {
        self.stored_digest.parse().map_err(|e| match e {
            AuditError::MalformedDigest(msg) => {
                AuditError::MalformedDigest(format!("record {}: {}", self.id, msg))
            }
            other => other,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecord {
    pub id: RecordId,
    pub name: String,
    pub role: String,
    pub salary: String,
    #[serde(default)]
    pub force_duplicate: bool,
}

/// Fields that may be updated in place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordField {
    Name,
    Role,
    Salary,
}

impl RecordField {
    pub fn column(&self) -> &'static str {
        match self {
            RecordField::Name => "name",
            RecordField::Role => "role",
            RecordField::Salary => "salary",
        }
    }
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for RecordField {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "name" => Ok(RecordField::Name),
            "role" => Ok(RecordField::Role),
            "salary" => Ok(RecordField::Salary),
            other => Err(AuditError::unknown_field(other)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilter {
    pub name: Option<String>,
    pub role: Option<String>,
    pub min_salary: Option<f64>,
    pub max_salary: Option<f64>,
}

impl SearchFilter {
    /// Salary is free-form text; records whose salary is not numeric never
    /// satisfy a salary bound.
    pub fn salary_matches(&self, salary: &str) -> bool {
        if self.min_salary.is_none() && self.max_salary.is_none() {
            return true;
        }

        let value = match salary.trim().parse::<f64>() {
            Ok(v) => v,
            Err(_) => return false,
        };

        self.min_salary.map_or(true, |min| value >= min)
            && self.max_salary.map_or(true, |max| value <= max)
    }
}

/// Existing record sharing a name with a creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameMatch {
    pub id: RecordId,
    pub name: String,
    pub role: String,
}
