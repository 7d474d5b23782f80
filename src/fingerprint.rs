//! Record Fingerprints
//!
//! Canonical encoding and SHA256 digest of a record's mutable fields.
//! The creation path and the verification path both go through
//! [`fingerprint`], so the byte construction can never drift between them.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::AuditError;

/// Length of a digest in raw bytes
pub const DIGEST_LEN: usize = 32;

/// Fixed-length SHA256 digest
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    /// All-zero digest meaning "no anchor present"
    pub const SENTINEL: Digest = Digest([0u8; DIGEST_LEN]);

    pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    pub fn is_sentinel(&self) -> bool {
        *self == Self::SENTINEL
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short prefix for log lines and alert subjects
    pub fn short(&self) -> String {
        self.to_hex()[..16].to_string()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if hex_part.len() != DIGEST_LEN * 2 {
            return Err(AuditError::MalformedDigest(format!(
                "expected {} hex characters, got {}",
                DIGEST_LEN * 2,
                hex_part.len()
            )));
        }

        let mut bytes = [0u8; DIGEST_LEN];
        hex::decode_to_slice(hex_part, &mut bytes)
            .map_err(|e| AuditError::MalformedDigest(format!("{}: {}", hex_part, e)))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Truncate a timestamp to the precision the canonical encoding carries.
///
/// Records are stamped through this so that a timestamp read back from
/// storage renders to exactly the same string it was hashed with.
pub fn creation_timestamp(now: DateTime<Utc>) -> DateTime<Utc> {
    now.trunc_subsecs(6)
}

/// Canonical ISO-8601 rendering: six fractional digits, `Z` suffix
pub fn canonical_timestamp(created_at: &DateTime<Utc>) -> String {
    created_at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Canonical byte string for a record: `name ‖ role ‖ salary ‖ created_at`.
/// The record id is deliberately not part of it.
pub fn canonical_string(name: &str, role: &str, salary: &str, created_at: &DateTime<Utc>) -> String {
    format!("{}{}{}{}", name, role, salary, canonical_timestamp(created_at))
}

/// Compute the fingerprint of a record's fields at its creation time
pub fn fingerprint(name: &str, role: &str, salary: &str, created_at: &DateTime<Utc>) -> Digest {
    let canonical = canonical_string(name, role, salary, created_at);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Digest(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn test_canonical_timestamp_format() {
        assert_eq!(canonical_timestamp(&t0()), "2025-01-02T03:04:05.000000Z");
    }

    #[test]
    fn test_fingerprint_matches_plain_sha256() {
        let digest = fingerprint("Alice", "Eng", "70000", &t0());

        let mut hasher = Sha256::new();
        hasher.update(b"AliceEng700002025-01-02T03:04:05.000000Z");
        let expected: [u8; 32] = hasher.finalize().into();

        assert_eq!(digest.as_bytes(), &expected);
        assert_eq!(digest.to_hex().len(), 64);
    }

    #[test]
    fn test_fingerprint_changes_with_any_field() {
        let base = fingerprint("Alice", "Eng", "70000", &t0());
        assert_ne!(base, fingerprint("Alice", "Eng", "99999", &t0()));
        assert_ne!(base, fingerprint("Alicia", "Eng", "70000", &t0()));
        assert_ne!(base, fingerprint("Alice", "Ops", "70000", &t0()));
        assert_ne!(
            base,
            fingerprint("Alice", "Eng", "70000", &(t0() + chrono::Duration::microseconds(1)))
        );
    }

    #[test]
    fn test_creation_timestamp_survives_storage_round_trip() {
        let stamped = creation_timestamp(Utc::now());
        let stored = canonical_timestamp(&stamped);
        let reloaded = DateTime::parse_from_rfc3339(&stored).unwrap().with_timezone(&Utc);
        assert_eq!(stamped, reloaded);
        assert_eq!(canonical_timestamp(&reloaded), stored);
    }

    #[test]
    fn test_digest_parsing() {
        let digest = fingerprint("Bob", "Ops", "1", &t0());
        let upper = format!("0x{}", digest.to_hex().to_uppercase());
        assert_eq!(upper.parse::<Digest>().unwrap(), digest);

        assert!("abc".parse::<Digest>().is_err());
        assert!("zz".repeat(32).parse::<Digest>().is_err());
    }

    #[test]
    fn test_sentinel() {
        let zero: Digest = "0".repeat(64).parse().unwrap();
        assert!(zero.is_sentinel());
        assert_eq!(zero, Digest::SENTINEL);
        assert!(!fingerprint("a", "b", "c", &t0()).is_sentinel());
    }

    #[test]
    fn test_digest_serde_as_hex_string() {
        let digest = fingerprint("a", "b", "c", &t0());
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{}\"", digest.to_hex()));
        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);
    }
}
