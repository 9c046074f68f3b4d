//! Operator-facing license alerts.
//!
//! The manager raises a [`LicenseIssue`] whenever the license degrades.
//! Delivery (chat channel, webhook, log line) is up to the host; the
//! crate ships [`LogNotifier`], which writes a structured warning.

use crate::state::LicenseStatus;
use std::fmt;
use tracing::warn;

/// Classification of a license problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LicenseIssue {
    /// License rejected, or no usable validation at all.
    Invalid,
    /// Live check failed; running on a fresh cached validation.
    ValidationFailed,
    /// License passed its expiry.
    Expired,
}

impl LicenseIssue {
    /// Stable identifier used in logs and by host integrations.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::ValidationFailed => "validation_failed",
            Self::Expired => "expired",
        }
    }

    /// Short headline for an alert.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Invalid => "Invalid License",
            Self::ValidationFailed => "License Validation Failed",
            Self::Expired => "License Expired",
        }
    }

    /// One-sentence explanation for an alert body.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Invalid => "The license is invalid or expired. Some features may be disabled.",
            Self::ValidationFailed => {
                "Could not validate the license with the server. Running on cached validation."
            }
            Self::Expired => "The license has expired. Renew it to keep using all features.",
        }
    }
}

impl fmt::Display for LicenseIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink for license alerts.
///
/// Called synchronously from the validation path, so implementations
/// should hand slow delivery off to their own task.
pub trait LicenseNotifier: Send + Sync {
    /// Report an issue together with the status at the time it was raised.
    fn notify(&self, issue: LicenseIssue, status: &LicenseStatus);
}

/// Notifier that only writes a log event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl LicenseNotifier for LogNotifier {
    fn notify(&self, issue: LicenseIssue, status: &LicenseStatus) {
        warn!(
            issue = issue.as_str(),
            valid = status.valid,
            tier = %status.tier,
            "{}: {}",
            issue.title(),
            issue.description()
        );
    }
}
