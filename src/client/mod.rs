//! License server client layer.

use crate::protocol::models::ValidationResponse;
use crate::TicketwardenError;
use chrono::{DateTime, Utc};
use std::future::Future;

pub mod http;

/// Performs one live entitlement check.
///
/// Implementations are stateless: they neither touch the entitlement
/// state nor the cache. [`http::ValidationClient`] is the production
/// implementation; tests plug in scripted validators.
pub trait Validator: Send + Sync {
    /// Validate the configured license as of `issued_at`.
    ///
    /// # Errors
    /// - `ConfigError` - key or server URL missing (no network call made)
    /// - `Timeout` - server did not answer in time
    /// - `NetworkError` - any other transport failure
    /// - `ServerError` - non-2xx status
    /// - `LicenseInvalid` - server answered `valid: false`
    /// - `ProtocolError` - 2xx body was not a validation document
    fn validate(
        &self,
        issued_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<ValidationResponse, TicketwardenError>> + Send;
}
