//! File-based cache backend with atomic writes.
//!
//! Stores cache records under `dirs::data_dir()/<namespace>/`.
//! Uses temp file + rename for atomic writes, so a reader only ever sees
//! a complete record.

use crate::cache::format::CacheRecord;
use crate::cache::{hash_license_key, CacheStore};
use crate::protocol::models::ValidationResponse;
use crate::TicketwardenError;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Default namespace under the platform data directory.
pub const DEFAULT_NAMESPACE: &str = "ticketwarden";

/// File-based cache backend.
pub struct FileCache {
    /// Directory for cache files.
    cache_dir: PathBuf,
    /// Serializes read-modify-write of the validation counter.
    write_lock: Mutex<()>,
}

impl FileCache {
    /// Create a new file cache with the given namespace.
    ///
    /// Cache files are stored under `dirs::data_dir()/<namespace>/`.
    pub fn new(namespace: &str) -> Result<Self, TicketwardenError> {
        let base_dir = dirs::data_dir().ok_or_else(|| {
            TicketwardenError::CacheIO("Could not find data directory".to_string())
        })?;

        Self::with_path(base_dir.join(namespace))
    }

    /// Create a file cache at a specific directory.
    pub fn with_path(cache_dir: PathBuf) -> Result<Self, TicketwardenError> {
        fs::create_dir_all(&cache_dir).map_err(|e| {
            TicketwardenError::CacheIO(format!("Failed to create cache dir: {}", e))
        })?;
        Ok(Self {
            cache_dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Directory holding the cache files.
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get the path for a license cache file.
    fn license_path(&self, key_hash: &str) -> PathBuf {
        // Use first 16 chars of hash as filename to avoid exposing full key
        let safe_name = &key_hash[..16.min(key_hash.len())];
        self.cache_dir.join(format!("{}.json", safe_name))
    }

    fn load_hashed(&self, key_hash: &str) -> Result<Option<CacheRecord>, TicketwardenError> {
        let path = self.license_path(key_hash);

        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path).map_err(|e| {
            TicketwardenError::CacheIO(format!("Failed to read cache file: {}", e))
        })?;

        match CacheRecord::from_json(&json) {
            Ok(record) if record.key_hash == key_hash => Ok(Some(record)),
            Ok(_) => {
                warn!(path = %path.display(), "Cache file belongs to a different license key, ignoring");
                Ok(None)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable license cache");
                Ok(None)
            }
        }
    }

    fn write_atomic(&self, record: &CacheRecord) -> Result<(), TicketwardenError> {
        let target_path = self.license_path(&record.key_hash);
        let temp_path = self.cache_dir.join(format!("{}.tmp", record.key_hash));

        let json = record.to_json()?;

        fs::write(&temp_path, &json).map_err(|e| {
            TicketwardenError::CacheIO(format!("Failed to write temp file: {}", e))
        })?;

        fs::rename(&temp_path, &target_path).map_err(|e| {
            TicketwardenError::CacheIO(format!("Failed to rename cache file: {}", e))
        })?;

        Ok(())
    }
}

impl CacheStore for FileCache {
    fn load(&self, license_key: &str) -> Result<Option<CacheRecord>, TicketwardenError> {
        self.load_hashed(&hash_license_key(license_key))
    }

    fn save(
        &self,
        license_key: &str,
        response: &ValidationResponse,
        now: DateTime<Utc>,
    ) -> Result<CacheRecord, TicketwardenError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let key_hash = hash_license_key(license_key);
        let previous = match self.load_hashed(&key_hash) {
            Ok(record) => record.map(|r| r.validation_count).unwrap_or(0),
            Err(e) => {
                warn!(error = %e, "Could not read previous cache record, restarting count");
                0
            }
        };

        let record = CacheRecord::new(key_hash, response.clone(), now, previous + 1);
        self.write_atomic(&record)?;
        Ok(record)
    }

    fn delete(&self, license_key: &str) -> Result<(), TicketwardenError> {
        let path = self.license_path(&hash_license_key(license_key));

        if path.exists() {
            fs::remove_file(&path)
                .map_err(|e| TicketwardenError::CacheIO(format!("Failed to delete cache: {}", e)))?;
        }

        Ok(())
    }
}
