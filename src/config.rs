//! Ticketwarden configuration.

use crate::TicketwardenError;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default license server request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default trust window for a successful validation in seconds.
pub const DEFAULT_CACHE_DURATION_SECS: u64 = 3600;

/// Default period of the background revalidation loop in seconds.
pub const DEFAULT_REVALIDATION_INTERVAL_SECS: u64 = 3600;

/// Endpoint path appended to the license server URL.
pub const VALIDATE_PATH: &str = "/api/validate";

/// Value shipped in example configs; treated as "no key configured".
pub const PLACEHOLDER_LICENSE_KEY: &str = "YOUR_LICENSE_KEY_HERE";

/// License server settings (`license_server` section).
#[derive(Debug, Clone, Deserialize)]
pub struct LicenseServerConfig {
    /// Base URL of the license server, e.g. `https://license.example.com`.
    #[serde(default)]
    pub url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// How long a successful validation is trusted without a network call, in seconds.
    #[serde(default = "default_cache_duration")]
    pub cache_duration: u64,

    /// Period of the background revalidation loop, in seconds.
    #[serde(default = "default_revalidation_interval")]
    pub revalidation_interval: u64,
}

impl Default for LicenseServerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout: DEFAULT_TIMEOUT_SECS,
            cache_duration: DEFAULT_CACHE_DURATION_SECS,
            revalidation_interval: DEFAULT_REVALIDATION_INTERVAL_SECS,
        }
    }
}

/// Configuration for license validation.
///
/// Field names follow the bot's JSON config layout so the same document
/// can be fed to both.
#[derive(Debug, Clone, Deserialize)]
pub struct LicenseConfig {
    /// License key issued to the deployment. Also the signing secret.
    #[serde(default)]
    pub license_key: String,

    /// Tenant identifier (the Discord guild in self-hosted mode).
    #[serde(default, alias = "tenant_id", deserialize_with = "string_or_integer")]
    pub guild_id: String,

    /// Version reported to the license server.
    #[serde(default = "default_bot_version")]
    pub bot_version: String,

    /// License server settings.
    #[serde(default)]
    pub license_server: LicenseServerConfig,

    /// Directory for the file cache. Defaults to `dirs::data_dir()/ticketwarden`.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Path of the ticket usage meter file.
    #[serde(default)]
    pub usage_file: Option<PathBuf>,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_cache_duration() -> u64 {
    DEFAULT_CACHE_DURATION_SECS
}

fn default_revalidation_interval() -> u64 {
    DEFAULT_REVALIDATION_INTERVAL_SECS
}

fn default_bot_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Snowflake ids are written both quoted and bare in bot configs.
fn string_or_integer<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Unsigned(u64),
        Signed(i64),
    }

    Ok(match Option::<Id>::deserialize(deserializer)? {
        Some(Id::Text(text)) => text,
        Some(Id::Unsigned(n)) => n.to_string(),
        Some(Id::Signed(n)) => n.to_string(),
        None => String::new(),
    })
}

impl LicenseConfig {
    /// Create a configuration with defaults for everything but key, server and tenant.
    pub fn new(
        license_key: impl Into<String>,
        server_url: impl Into<String>,
        guild_id: impl Into<String>,
    ) -> Self {
        Self {
            license_key: license_key.into(),
            guild_id: guild_id.into(),
            bot_version: default_bot_version(),
            license_server: LicenseServerConfig {
                url: server_url.into(),
                ..LicenseServerConfig::default()
            },
            cache_dir: None,
            usage_file: None,
        }
    }

    /// Parse a configuration from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, TicketwardenError> {
        serde_json::from_str(json)
            .map_err(|e| TicketwardenError::ConfigError(format!("Invalid config: {}", e)))
    }

    /// Load a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, TicketwardenError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            TicketwardenError::ConfigError(format!(
                "Failed to read config {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&json)
    }

    /// Apply `LICENSE_KEY`, `LICENSE_SERVER_URL` and `GUILD_ID` from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Empty values are ignored so an unset-but-exported variable does not
    /// blank out the file value.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(key) = get("LICENSE_KEY") {
            self.license_key = key;
        }
        if let Some(url) = get("LICENSE_SERVER_URL") {
            self.license_server.url = url;
        }
        if let Some(guild) = get("GUILD_ID") {
            self.guild_id = guild;
        }
        self
    }

    /// Check that a live validation can be attempted.
    pub fn validate(&self) -> Result<(), TicketwardenError> {
        if !self.has_license_key() {
            return Err(TicketwardenError::ConfigError(
                "license_key is not configured".to_string(),
            ));
        }
        if self.license_server.url.trim().is_empty() {
            return Err(TicketwardenError::ConfigError(
                "license_server.url is not configured".to_string(),
            ));
        }
        if self.license_server.timeout == 0 {
            return Err(TicketwardenError::ConfigError(
                "license_server.timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a real license key is present.
    pub fn has_license_key(&self) -> bool {
        let key = self.license_key.trim();
        !key.is_empty() && key != PLACEHOLDER_LICENSE_KEY
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.license_server.timeout)
    }

    /// Trust window for a successful validation.
    pub fn cache_duration(&self) -> Duration {
        Duration::from_secs(self.license_server.cache_duration)
    }

    /// Revalidation loop period. Never zero.
    pub fn revalidation_interval(&self) -> Duration {
        Duration::from_secs(self.license_server.revalidation_interval.max(1))
    }

    /// Full URL of the validation endpoint.
    pub fn validate_url(&self) -> String {
        format!(
            "{}{}",
            self.license_server.url.trim().trim_end_matches('/'),
            VALIDATE_PATH
        )
    }

    /// Truncated license key safe for logs and status output.
    pub fn key_preview(&self) -> String {
        let prefix: String = self.license_key.chars().take(8).collect();
        format!("{}...", prefix)
    }
}
