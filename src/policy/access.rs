//! Feature gating and ticket quota enforcement.
//!
//! This module answers two questions for every gated call site:
//! - Is a feature allowed? (`check_feature_access`)
//! - What is the numeric limit for a feature? (`get_feature_limit`)
//!
//! Neither ever fails. An invalid license denies every feature and falls
//! back to the fixed default limit table. The `require_*` guards turn the
//! answers into errors for handlers that want an early return.

use crate::state::Entitlement;
use crate::TicketwardenError;

/// Features granted by any valid license regardless of the feature map.
pub const BASIC_FEATURES: [&str; 4] = ["tickets", "reports", "applications", "suggestions"];

/// Raw limit value meaning "no limit".
pub const UNLIMITED: i64 = -1;

/// Raw limit value meaning "feature disabled".
pub const DISABLED: i64 = 0;

/// Feature key of the monthly ticket cap.
pub const MAX_TICKETS: &str = "max_tickets";

/// Limits applied while no valid license is held.
pub const DEFAULT_LIMITS: [(&str, i64); 3] = [
    (MAX_TICKETS, 50),
    ("max_staff_positions", 3),
    ("api_requests_per_hour", 100),
];

/// Default limit for a feature when the license is invalid.
pub fn default_limit(feature: &str) -> i64 {
    DEFAULT_LIMITS
        .iter()
        .find(|(name, _)| *name == feature)
        .map(|(_, limit)| *limit)
        .unwrap_or(DISABLED)
}

/// Whether the entitlement grants a feature.
///
/// # Returns
/// * `false` - License invalid, or flag absent / not a boolean
/// * `true` - Basic feature on a valid license, or flag set to `true`
pub fn check_feature_access(entitlement: &Entitlement, feature: &str) -> bool {
    if !entitlement.valid {
        return false;
    }

    if BASIC_FEATURES.contains(&feature) {
        return true;
    }

    entitlement
        .features
        .get(feature)
        .and_then(|value| value.as_flag())
        .unwrap_or(false)
}

/// Raw limit for a feature.
///
/// `-1` is unlimited, `0` disabled, positive values are caps. Absent or
/// non-integer entries read as `0`.
pub fn get_feature_limit(entitlement: &Entitlement, feature: &str) -> i64 {
    if !entitlement.valid {
        return default_limit(feature);
    }

    entitlement
        .features
        .get(feature)
        .and_then(|value| value.as_limit())
        .unwrap_or(DISABLED)
}

/// Interpreted limit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// No cap.
    Unlimited,
    /// Feature switched off.
    Disabled,
    /// At most this many.
    Capped(u64),
}

impl Limit {
    /// Interpret a raw limit. Negative values other than `-1` are treated as disabled.
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            UNLIMITED => Self::Unlimited,
            n if n > 0 => Self::Capped(n.unsigned_abs()),
            _ => Self::Disabled,
        }
    }

    /// Whether `used` units still leave room for one more.
    pub fn allows(&self, used: u64) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Disabled => false,
            Self::Capped(cap) => used < *cap,
        }
    }
}

/// Require a valid license that grants `feature`.
///
/// # Errors
/// * `LicenseRequired` - License is not valid
/// * `FeatureUnavailable` - Valid license without the feature
pub fn require_feature(entitlement: &Entitlement, feature: &str) -> Result<(), TicketwardenError> {
    if !entitlement.valid {
        return Err(TicketwardenError::LicenseRequired);
    }
    if !check_feature_access(entitlement, feature) {
        return Err(TicketwardenError::FeatureUnavailable {
            feature: feature.to_string(),
        });
    }
    Ok(())
}

/// Require room under the monthly ticket cap.
///
/// Only a positive `max_tickets` cap blocks; `-1` and `0` leave ticket
/// creation to the feature check.
pub fn require_ticket_quota(
    entitlement: &Entitlement,
    used_this_month: u64,
) -> Result<(), TicketwardenError> {
    let raw = get_feature_limit(entitlement, MAX_TICKETS);
    match Limit::from_raw(raw) {
        Limit::Capped(cap) if used_this_month >= cap => {
            Err(TicketwardenError::TicketLimitReached { limit: raw })
        }
        _ => Ok(()),
    }
}

/// Ticket cap information for a gated call.
#[derive(Debug, Clone)]
pub struct UsageCaps {
    /// Monthly ticket limit (None = no cap enforced)
    pub monthly_limit: Option<u64>,

    /// Tickets already created this month
    pub current_uses: u64,
}

impl UsageCaps {
    /// Extract caps from an entitlement.
    pub fn from_entitlement(entitlement: &Entitlement, current_uses: u64) -> Self {
        let monthly_limit = match Limit::from_raw(get_feature_limit(entitlement, MAX_TICKETS)) {
            Limit::Capped(cap) => Some(cap),
            _ => None,
        };
        Self {
            monthly_limit,
            current_uses,
        }
    }

    /// Tickets left this month, `None` when uncapped.
    pub fn remaining(&self) -> Option<u64> {
        self.monthly_limit
            .map(|limit| limit.saturating_sub(self.current_uses))
    }
}

/// Combined guard: feature access, then the ticket cap for ticket-kind features.
pub fn check_access_with_usage(
    entitlement: &Entitlement,
    feature: &str,
    used_this_month: u64,
) -> Result<UsageCaps, TicketwardenError> {
    require_feature(entitlement, feature)?;

    if BASIC_FEATURES.contains(&feature) {
        require_ticket_quota(entitlement, used_this_month)?;
    }

    Ok(UsageCaps::from_entitlement(entitlement, used_this_month))
}
