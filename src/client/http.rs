//! Reqwest-based HTTP client for the license server.
//!
//! Sends one signed JSON `POST /api/validate` per validation and maps
//! every outcome onto [`TicketwardenError`]. The client holds no state
//! besides its configuration.

use crate::client::Validator;
use crate::config::LicenseConfig;
use crate::protocol::models::{parse_validation_response, ValidationRequest, ValidationResponse};
use crate::TicketwardenError;
use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// License server HTTP client.
pub struct ValidationClient {
    client: Client,
    config: LicenseConfig,
    timeout: Duration,
}

impl ValidationClient {
    /// Create a new client from config.
    ///
    /// The configuration is not validated here; an unusable key or URL is
    /// reported by [`ValidationClient::validate_online`] without touching
    /// the network.
    pub fn new(config: &LicenseConfig) -> Result<Self, TicketwardenError> {
        let timeout = config.timeout();
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(build_user_agent(config))
            .build()
            .map_err(|e| {
                TicketwardenError::ConfigError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            config: config.clone(),
            timeout,
        })
    }

    /// Validate the configured license key against the license server.
    ///
    /// # Arguments
    /// * `issued_at` - Timestamp placed in the signed request
    pub async fn validate_online(
        &self,
        issued_at: DateTime<Utc>,
    ) -> Result<ValidationResponse, TicketwardenError> {
        // 1. Fail fast on missing configuration
        self.config.validate()?;

        // 2. Build signed request
        let request = ValidationRequest::signed(
            self.config.license_key.trim(),
            self.config.guild_id.as_str(),
            self.config.bot_version.as_str(),
            issued_at.timestamp(),
        );
        let url = self.config.validate_url();
        debug!(url = %url, timeout_secs = self.timeout.as_secs(), "Sending license validation request");

        // 3. Single POST
        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "License server returned error status");
            return Err(TicketwardenError::ServerError {
                status: status.as_u16(),
            });
        }

        // 4. Body must be read and parsed in full before anyone acts on it
        let body = response.bytes().await.map_err(classify_transport_error)?;
        let parsed = parse_validation_response(&body)?;

        if !parsed.valid {
            let message = parsed
                .message
                .clone()
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(TicketwardenError::LicenseInvalid { message });
        }

        Ok(parsed)
    }

    /// Configured request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Endpoint the client posts to.
    pub fn endpoint(&self) -> String {
        self.config.validate_url()
    }
}

impl Validator for ValidationClient {
    async fn validate(
        &self,
        issued_at: DateTime<Utc>,
    ) -> Result<ValidationResponse, TicketwardenError> {
        self.validate_online(issued_at).await
    }
}

/// Map a reqwest failure onto the error taxonomy.
fn classify_transport_error(e: reqwest::Error) -> TicketwardenError {
    if e.is_timeout() {
        TicketwardenError::Timeout
    } else {
        TicketwardenError::NetworkError(e.to_string())
    }
}

/// Build a User-Agent string from config.
///
/// Format: `ticketwarden/<crate version> bot/<bot version>`
pub fn build_user_agent(config: &LicenseConfig) -> String {
    format!(
        "ticketwarden/{} bot/{}",
        env!("CARGO_PKG_VERSION"),
        config.bot_version
    )
}
