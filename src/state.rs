//! Process-wide entitlement state.
//!
//! The current [`Entitlement`] is an immutable snapshot behind an `Arc`.
//! Writers build a complete new snapshot and swap the pointer in one
//! step, so a reader either sees the previous entitlement or the next
//! one, never a mix. Mutation is crate-private: outside code reads
//! through snapshots and the gating facade only.

use crate::protocol::models::{FeatureValue, ValidationResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Tier reported before any validation succeeded.
pub const UNKNOWN_TIER: &str = "unknown";

/// Resolved set of features and limits the license currently grants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entitlement {
    /// Whether the license is currently honoured.
    pub valid: bool,

    /// Commercial tier name.
    pub tier: String,

    /// Feature flags and limits.
    pub features: BTreeMap<String, FeatureValue>,

    /// License expiry, if any.
    pub expires_at: Option<DateTime<Utc>>,

    /// Time of the validation this entitlement came from.
    pub last_validated_at: Option<DateTime<Utc>>,

    /// Opaque customer details from the server.
    pub customer_info: Option<serde_json::Value>,
}

impl Default for Entitlement {
    fn default() -> Self {
        Self {
            valid: false,
            tier: UNKNOWN_TIER.to_string(),
            features: BTreeMap::new(),
            expires_at: None,
            last_validated_at: None,
            customer_info: None,
        }
    }
}

impl Entitlement {
    /// Build an entitlement from a validation response.
    pub fn from_response(response: &ValidationResponse, validated_at: DateTime<Utc>) -> Self {
        Self {
            valid: response.valid,
            tier: response
                .tier
                .clone()
                .unwrap_or_else(|| UNKNOWN_TIER.to_string()),
            features: response.features.clone(),
            expires_at: response.expires_at,
            last_validated_at: Some(validated_at),
            customer_info: response.customer_info.clone(),
        }
    }

    /// Same entitlement with the license no longer honoured.
    pub fn revoked(&self) -> Self {
        Self {
            valid: false,
            ..self.clone()
        }
    }

    /// Whether the license has an expiry that has passed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| now >= expires)
    }

    /// Read-only status view.
    pub fn status(&self) -> LicenseStatus {
        LicenseStatus {
            valid: self.valid,
            tier: self.tier.clone(),
            expires_at: self.expires_at,
            last_validated_at: self.last_validated_at,
        }
    }
}

/// Snapshot for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LicenseStatus {
    /// Whether the license is currently honoured.
    pub valid: bool,
    /// Commercial tier name.
    pub tier: String,
    /// License expiry, if any.
    pub expires_at: Option<DateTime<Utc>>,
    /// Time of the last successful validation.
    pub last_validated_at: Option<DateTime<Utc>>,
}

/// Single-writer container for the current entitlement.
#[derive(Debug, Default)]
pub struct EntitlementState {
    current: RwLock<Arc<Entitlement>>,
}

impl EntitlementState {
    /// Create a state holding the default (invalid) entitlement.
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently published entitlement.
    pub fn snapshot(&self) -> Arc<Entitlement> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Publish a new entitlement.
    pub(crate) fn replace(&self, entitlement: Entitlement) {
        let next = Arc::new(entitlement);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = next;
    }

    /// Publish a copy of the current entitlement with `valid = false`.
    pub(crate) fn revoke(&self) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let next = Arc::new(guard.revoked());
        *guard = next;
    }
}
