//! Persistence of the last-known-good validation.
//!
//! Every backend keys records by [`hash_license_key`] so raw key material
//! never reaches disk, keeps exactly one record per key, and treats an
//! unreadable record as a miss.

use crate::protocol::models::ValidationResponse;
use crate::TicketwardenError;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

pub mod file;
pub mod format;
pub mod memory;
pub mod sqlite;

pub use format::CacheRecord;

/// Storage backend for cache records.
pub trait CacheStore: Send + Sync {
    /// Load the record for a license key.
    ///
    /// Returns `Ok(None)` both when nothing is stored and when the stored
    /// record cannot be parsed.
    fn load(&self, license_key: &str) -> Result<Option<CacheRecord>, TicketwardenError>;

    /// Upsert the record for a license key.
    ///
    /// The stored `validation_count` becomes the previous count plus one
    /// (starting from zero when absent).
    fn save(
        &self,
        license_key: &str,
        response: &ValidationResponse,
        now: DateTime<Utc>,
    ) -> Result<CacheRecord, TicketwardenError>;

    /// Remove the record for a license key.
    fn delete(&self, license_key: &str) -> Result<(), TicketwardenError>;
}

/// Compute a SHA-256 hash of the license key for use as cache key.
pub fn hash_license_key(license_key: &str) -> String {
    let hash = Sha256::digest(license_key.as_bytes());
    hex::encode(hash)
}
