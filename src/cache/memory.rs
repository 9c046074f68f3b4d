//! In-memory cache backend.
//!
//! Useful for tests and for deployments that accept re-validating on
//! every restart.

use crate::cache::format::CacheRecord;
use crate::cache::{hash_license_key, CacheStore};
use crate::protocol::models::ValidationResponse;
use crate::TicketwardenError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory cache backend.
#[derive(Debug, Default)]
pub struct MemoryCache {
    records: RwLock<HashMap<String, CacheRecord>>,
}

impl MemoryCache {
    /// Create an empty memory cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record as-is, bypassing the counter logic.
    pub fn insert(&self, record: CacheRecord) {
        let mut records = self
            .records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        records.insert(record.key_hash.clone(), record);
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Whether the cache holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCache {
    fn load(&self, license_key: &str) -> Result<Option<CacheRecord>, TicketwardenError> {
        let records = self
            .records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(records.get(&hash_license_key(license_key)).cloned())
    }

    fn save(
        &self,
        license_key: &str,
        response: &ValidationResponse,
        now: DateTime<Utc>,
    ) -> Result<CacheRecord, TicketwardenError> {
        let key_hash = hash_license_key(license_key);
        let mut records = self
            .records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let previous = records.get(&key_hash).map(|r| r.validation_count).unwrap_or(0);
        let record = CacheRecord::new(key_hash.clone(), response.clone(), now, previous + 1);
        records.insert(key_hash, record.clone());
        Ok(record)
    }

    fn delete(&self, license_key: &str) -> Result<(), TicketwardenError> {
        let mut records = self
            .records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        records.remove(&hash_license_key(license_key));
        Ok(())
    }
}
