//! Ticketwarden error types.

use thiserror::Error;

/// Errors that can occur during license validation and feature gating.
#[derive(Debug, Error)]
pub enum TicketwardenError {
    /// Configuration is missing or unusable (license key, server URL).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The license server did not answer within the configured timeout.
    #[error("License validation timed out")]
    Timeout,

    /// Transport failure talking to the license server.
    #[error("License server transport error: {0}")]
    NetworkError(String),

    /// License server answered with a non-success HTTP status.
    #[error("License server returned HTTP {status}")]
    ServerError {
        /// HTTP status code returned by the server.
        status: u16,
    },

    /// License server rejected the license.
    #[error("License invalid: {message}")]
    LicenseInvalid {
        /// Message supplied by the server.
        message: String,
    },

    /// Success response whose body is not a validation document.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Cache I/O error.
    #[error("Cache I/O error: {0}")]
    CacheIO(String),

    /// Stored cache record could not be parsed.
    #[error("Cache record corrupt: {0}")]
    CacheCorrupt(String),

    /// The operation needs a valid license.
    #[error("A valid license is required")]
    LicenseRequired,

    /// The license does not include the requested feature.
    #[error("Feature not included in license: {feature}")]
    FeatureUnavailable {
        /// The feature that was requested.
        feature: String,
    },

    /// Monthly ticket cap reached.
    #[error("Monthly ticket limit reached ({limit})")]
    TicketLimitReached {
        /// The configured cap.
        limit: i64,
    },

    /// Caller exceeded the per-user rate limit.
    #[error("Rate limited")]
    RateLimited,

    /// Usage meter I/O error.
    #[error("Meter I/O error: {0}")]
    MeterIO(String),
}

impl TicketwardenError {
    /// Whether a live validation failure may fall back to a cached record.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout
                | Self::NetworkError(_)
                | Self::ServerError { .. }
                | Self::LicenseInvalid { .. }
                | Self::ProtocolError(_)
        )
    }
}
