//! SQLite cache backend.
//!
//! Mirrors the bot's `license_cache` table. The upsert and the counter
//! increment happen in one statement, and every value, including the
//! key hash, is passed as a bound parameter.

use crate::cache::format::CacheRecord;
use crate::cache::{hash_license_key, CacheStore};
use crate::protocol::models::ValidationResponse;
use crate::TicketwardenError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::warn;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS license_cache (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        license_key TEXT UNIQUE NOT NULL,
        response TEXT NOT NULL,
        expires_at INTEGER,
        cached_at INTEGER NOT NULL,
        validation_count INTEGER NOT NULL DEFAULT 0
    )
";

const UPSERT: &str = "
    INSERT INTO license_cache (license_key, response, expires_at, cached_at, validation_count)
    VALUES (?1, ?2, ?3, ?4, 1)
    ON CONFLICT(license_key) DO UPDATE SET
        response = excluded.response,
        expires_at = excluded.expires_at,
        cached_at = excluded.cached_at,
        validation_count = license_cache.validation_count + 1
    RETURNING validation_count
";

fn db_err(e: rusqlite::Error) -> TicketwardenError {
    TicketwardenError::CacheIO(format!("SQLite error: {}", e))
}

/// SQLite-backed cache store.
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Open (or create) a cache database at `path`.
    pub fn open(path: &Path) -> Result<Self, TicketwardenError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, TicketwardenError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, TicketwardenError> {
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, TicketwardenError>,
    ) -> Result<T, TicketwardenError> {
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&conn)
    }
}

impl CacheStore for SqliteCache {
    fn load(&self, license_key: &str) -> Result<Option<CacheRecord>, TicketwardenError> {
        let key_hash = hash_license_key(license_key);

        let row: Option<(String, i64, i64)> = self.with_conn(|conn| {
            conn.query_row(
                "SELECT response, cached_at, validation_count
                 FROM license_cache WHERE license_key = ?1",
                params![&key_hash],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(db_err)
        })?;

        let Some((response_json, cached_at, validation_count)) = row else {
            return Ok(None);
        };

        let response: ValidationResponse = match serde_json::from_str(&response_json) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable license cache row");
                return Ok(None);
            }
        };
        let Some(cached_at) = DateTime::from_timestamp(cached_at, 0) else {
            warn!(cached_at, "Ignoring license cache row with invalid timestamp");
            return Ok(None);
        };

        Ok(Some(CacheRecord::new(
            key_hash,
            response,
            cached_at,
            u64::try_from(validation_count).unwrap_or(0),
        )))
    }

    fn save(
        &self,
        license_key: &str,
        response: &ValidationResponse,
        now: DateTime<Utc>,
    ) -> Result<CacheRecord, TicketwardenError> {
        let key_hash = hash_license_key(license_key);
        let response_json = serde_json::to_string(response)
            .map_err(|e| TicketwardenError::CacheIO(format!("Failed to serialize cache: {}", e)))?;
        let expires_at = response.expires_at.map(|dt| dt.timestamp());

        let count: i64 = self.with_conn(|conn| {
            conn.query_row(
                UPSERT,
                params![&key_hash, &response_json, expires_at, now.timestamp()],
                |row| row.get(0),
            )
            .map_err(db_err)
        })?;

        // Stored timestamps have second precision; report what a reload returns.
        let cached_at = DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now);

        Ok(CacheRecord::new(
            key_hash,
            response.clone(),
            cached_at,
            u64::try_from(count).unwrap_or(0),
        ))
    }

    fn delete(&self, license_key: &str) -> Result<(), TicketwardenError> {
        let key_hash = hash_license_key(license_key);
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM license_cache WHERE license_key = ?1",
                params![&key_hash],
            )
            .map_err(db_err)
        })?;
        Ok(())
    }
}
