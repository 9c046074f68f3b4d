//! Cache record format and freshness rules.
//!
//! A record keeps the last successful validation response for one license
//! key together with the time it was cached and a running count of
//! successful online validations. On load, a record is usable without a
//! network call only while it is fresh:
//! 1. `now - cached_at < cache_duration`
//! 2. `now < expires_at` (when the license has an expiry)
//! 3. the cached response says `valid: true`

use crate::protocol::models::ValidationResponse;
use crate::TicketwardenError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Persisted last-known-good validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// SHA-256 hex of the license key this record belongs to.
    pub key_hash: String,

    /// The validation response as received.
    pub response: ValidationResponse,

    /// License expiry copied from the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// When this record was written.
    pub cached_at: DateTime<Utc>,

    /// Successful online validations recorded for this key.
    pub validation_count: u64,
}

impl CacheRecord {
    /// Create a cache record from a validation response.
    pub fn new(
        key_hash: impl Into<String>,
        response: ValidationResponse,
        cached_at: DateTime<Utc>,
        validation_count: u64,
    ) -> Self {
        Self {
            key_hash: key_hash.into(),
            expires_at: response.expires_at,
            response,
            cached_at,
            validation_count,
        }
    }

    /// Serialize the cache record to JSON.
    pub fn to_json(&self) -> Result<String, TicketwardenError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| TicketwardenError::CacheIO(format!("Failed to serialize cache: {}", e)))
    }

    /// Deserialize a cache record from JSON.
    pub fn from_json(json: &str) -> Result<Self, TicketwardenError> {
        serde_json::from_str(json).map_err(|e| TicketwardenError::CacheCorrupt(e.to_string()))
    }

    /// Whether the record can stand in for a live validation at `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>, cache_duration: Duration) -> bool {
        is_fresh(self, now, cache_duration)
    }

    /// Whether the cached license has passed its expiry at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| now >= expires)
    }
}

/// Cache freshness predicate.
///
/// All three checks must pass: age strictly below `cache_duration`, not
/// past `expires_at`, and a valid response.
pub fn is_fresh(record: &CacheRecord, now: DateTime<Utc>, cache_duration: Duration) -> bool {
    let age_secs = now.signed_duration_since(record.cached_at).num_seconds();
    let window_secs = i64::try_from(cache_duration.as_secs()).unwrap_or(i64::MAX);

    if age_secs >= window_secs {
        return false;
    }
    if record.is_expired(now) {
        return false;
    }
    record.response.valid
}
