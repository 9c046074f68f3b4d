//! License Manager - the main public API for Ticketwarden.
//!
//! The `LicenseManager` owns the entitlement state and is its only writer:
//! - Startup from a fresh cache record or a live validation
//! - Periodic revalidation with soft degrade onto the cache
//! - On-demand validation for administrative triggers
//! - Feature gating against the current snapshot

use crate::cache::file::{FileCache, DEFAULT_NAMESPACE};
use crate::cache::format::CacheRecord;
use crate::cache::CacheStore;
use crate::client::http::ValidationClient;
use crate::client::Validator;
use crate::clock::{Clock, SystemClock};
use crate::config::LicenseConfig;
use crate::notify::{LicenseIssue, LicenseNotifier, LogNotifier};
use crate::policy::access;
use crate::protocol::models::ValidationResponse;
use crate::state::{Entitlement, EntitlementState, LicenseStatus};
use crate::TicketwardenError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Result of one revalidation tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another validation was in flight; nothing done.
    Busy,
    /// Last successful validation is still within the cache window.
    Skipped,
    /// Live validation succeeded and the state was replaced.
    Validated,
    /// Live validation failed; the state was kept on a fresh cache record.
    Degraded,
    /// The license is no longer honoured.
    Revoked,
}

/// Main license manager for Ticketwarden.
///
/// Create one instance per process, share it behind an `Arc`, and hand it
/// to [`crate::revalidate::spawn_revalidation`] for periodic checks.
pub struct LicenseManager<V = ValidationClient> {
    config: LicenseConfig,
    clock: Arc<dyn Clock>,
    validator: V,
    cache: Arc<dyn CacheStore>,
    notifier: Arc<dyn LicenseNotifier>,
    state: EntitlementState,
    in_flight: Mutex<()>,
}

impl LicenseManager<ValidationClient> {
    /// Create a manager with the HTTP client, file cache, system clock and
    /// log notifier.
    ///
    /// An empty license key is not an error here; it surfaces as a
    /// `ConfigError` on the first validation and the license stays invalid.
    ///
    /// # Errors
    /// - HTTP client creation fails
    /// - Cache directory creation fails
    pub fn new(config: LicenseConfig) -> Result<Self, TicketwardenError> {
        let validator = ValidationClient::new(&config)?;
        let cache = match &config.cache_dir {
            Some(dir) => FileCache::with_path(dir.clone())?,
            None => FileCache::new(DEFAULT_NAMESPACE)?,
        };

        Ok(Self::with_parts(
            config,
            validator,
            Arc::new(cache),
            Arc::new(SystemClock),
            Arc::new(LogNotifier),
        ))
    }
}

impl<V: Validator> LicenseManager<V> {
    /// Assemble a manager from explicit collaborators.
    pub fn with_parts(
        config: LicenseConfig,
        validator: V,
        cache: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn LicenseNotifier>,
    ) -> Self {
        Self {
            config,
            clock,
            validator,
            cache,
            notifier,
            state: EntitlementState::new(),
            in_flight: Mutex::new(()),
        }
    }

    /// Establish the initial entitlement.
    ///
    /// A fresh cache record is trusted without a network call. Otherwise a
    /// live validation runs; if the license is still not valid afterwards an
    /// `expired` or `invalid` notification is raised. Never fails.
    pub async fn initialize(&self) -> LicenseStatus {
        let _guard = self.in_flight.lock().await;
        let now = self.clock.now_utc();
        let cached = self.load_cached();

        if let Some(record) = cached
            .as_ref()
            .filter(|record| record.is_fresh(now, self.config.cache_duration()))
        {
            info!(
                key = %self.config.key_preview(),
                cached_at = %record.cached_at,
                validation_count = record.validation_count,
                "Using cached license validation"
            );
            self.state
                .replace(Entitlement::from_response(&record.response, record.cached_at));
            return self.current_status();
        }

        if let Err(e) = self.validate_and_apply(now).await {
            warn!(error = %e, key = %self.config.key_preview(), "Initial license validation failed");
        }

        let status = self.current_status();
        if !status.valid {
            let issue = if cached.as_ref().is_some_and(|record| record.is_expired(now)) {
                LicenseIssue::Expired
            } else {
                LicenseIssue::Invalid
            };
            self.notifier.notify(issue, &status);
        }
        status
    }

    /// Validate now, waiting for any in-flight validation first.
    ///
    /// On success the state and cache are updated. On failure the error is
    /// returned and the state is left as it was.
    pub async fn force_validation(&self) -> Result<ValidationResponse, TicketwardenError> {
        let _guard = self.in_flight.lock().await;
        let now = self.clock.now_utc();
        self.validate_and_apply(now).await
    }

    /// One step of the periodic revalidation loop.
    ///
    /// Never fails; every outcome is logged and reported through the
    /// returned [`TickOutcome`].
    pub async fn revalidate_tick(&self) -> TickOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("License validation already in flight, skipping tick");
            return TickOutcome::Busy;
        };

        let now = self.clock.now_utc();
        let current = self.state.snapshot();

        if current.valid && current.is_expired(now) {
            warn!(expires_at = ?current.expires_at, "License expired");
            self.state.revoke();
            self.notifier
                .notify(LicenseIssue::Expired, &self.current_status());
        } else if current.valid && self.within_cache_window(current.last_validated_at, now) {
            debug!("License validated recently, skipping tick");
            return TickOutcome::Skipped;
        }

        let was_valid = self.state.snapshot().valid;
        match self.validate_and_apply(now).await {
            Ok(_) => TickOutcome::Validated,
            Err(e) => {
                warn!(
                    error = %e,
                    recoverable = e.is_recoverable(),
                    "License revalidation failed"
                );

                if e.is_recoverable() && was_valid && self.has_fresh_cache(now) {
                    warn!("Online validation failed, using cached license");
                    self.notifier
                        .notify(LicenseIssue::ValidationFailed, &self.current_status());
                    return TickOutcome::Degraded;
                }

                self.state.revoke();
                // Alert only on a valid -> invalid transition.
                if was_valid {
                    warn!("License validation failed and no valid cache available");
                    self.notifier
                        .notify(LicenseIssue::Invalid, &self.current_status());
                }
                TickOutcome::Revoked
            }
        }
    }

    /// Whether the current license grants `feature`.
    pub fn check_feature_access(&self, feature: &str) -> bool {
        access::check_feature_access(&self.state.snapshot(), feature)
    }

    /// Raw limit for `feature` (`-1` unlimited, `0` disabled).
    pub fn get_feature_limit(&self, feature: &str) -> i64 {
        access::get_feature_limit(&self.state.snapshot(), feature)
    }

    /// Require a valid license that grants `feature`.
    pub fn require_feature(&self, feature: &str) -> Result<(), TicketwardenError> {
        access::require_feature(&self.state.snapshot(), feature)
    }

    /// Require room under the monthly ticket cap.
    pub fn check_ticket_quota(&self, used_this_month: u64) -> Result<(), TicketwardenError> {
        access::require_ticket_quota(&self.state.snapshot(), used_this_month)
    }

    /// Read-only status snapshot.
    pub fn current_status(&self) -> LicenseStatus {
        self.state.snapshot().status()
    }

    /// The full current entitlement.
    pub fn entitlement(&self) -> Arc<Entitlement> {
        self.state.snapshot()
    }

    /// Get the current configuration.
    pub fn config(&self) -> &LicenseConfig {
        &self.config
    }

    /// Live validation, then state replace, then cache write.
    ///
    /// Caller must hold `in_flight`.
    async fn validate_and_apply(
        &self,
        now: DateTime<Utc>,
    ) -> Result<ValidationResponse, TicketwardenError> {
        let response = self.validator.validate(now).await?;

        let entitlement = Entitlement::from_response(&response, now);
        info!(
            tier = %entitlement.tier,
            expires_at = ?entitlement.expires_at,
            key = %self.config.key_preview(),
            "License validated"
        );
        self.state.replace(entitlement);

        match self.cache.save(self.license_key(), &response, now) {
            Ok(record) => debug!(validation_count = record.validation_count, "License cache updated"),
            Err(e) => warn!(error = %e, "Failed to write license cache"),
        }

        Ok(response)
    }

    fn load_cached(&self) -> Option<CacheRecord> {
        match self.cache.load(self.license_key()) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Failed to read license cache");
                None
            }
        }
    }

    fn has_fresh_cache(&self, now: DateTime<Utc>) -> bool {
        self.load_cached()
            .is_some_and(|record| record.is_fresh(now, self.config.cache_duration()))
    }

    fn within_cache_window(&self, last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let window = i64::try_from(self.config.cache_duration().as_secs()).unwrap_or(i64::MAX);
        last.is_some_and(|at| now.signed_duration_since(at).num_seconds() < window)
    }

    fn license_key(&self) -> &str {
        self.config.license_key.trim()
    }
}
