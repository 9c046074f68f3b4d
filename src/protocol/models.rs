//! Validation request/response wire structs.

use crate::crypto::signing::{sign, PayloadValue};
use crate::TicketwardenError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Signed body of `POST /api/validate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationRequest {
    /// License key being validated.
    pub license_key: String,

    /// Tenant identifier.
    #[serde(rename = "guild_id")]
    pub tenant_id: String,

    /// Client software version.
    #[serde(rename = "bot_version")]
    pub client_version: String,

    /// Unix seconds at which the request was built.
    #[serde(rename = "timestamp")]
    pub issued_at: i64,

    /// Hex SHA-256 over the other fields, keyed by the license key.
    pub signature: String,
}

impl ValidationRequest {
    /// Build and sign a request.
    pub fn signed(
        license_key: impl Into<String>,
        tenant_id: impl Into<String>,
        client_version: impl Into<String>,
        issued_at: i64,
    ) -> Self {
        let mut request = Self {
            license_key: license_key.into(),
            tenant_id: tenant_id.into(),
            client_version: client_version.into(),
            issued_at,
            signature: String::new(),
        };
        request.signature = sign(&request.payload_fields(), &request.license_key);
        request
    }

    /// Signed fields under their wire names.
    pub fn payload_fields(&self) -> Vec<(&'static str, PayloadValue)> {
        vec![
            ("license_key", PayloadValue::from(self.license_key.as_str())),
            ("guild_id", PayloadValue::from(self.tenant_id.as_str())),
            ("bot_version", PayloadValue::from(self.client_version.as_str())),
            ("timestamp", PayloadValue::from(self.issued_at)),
        ]
    }
}

/// A single entry of the `features` map.
///
/// Booleans are capability flags, integers are limits (`-1` unlimited,
/// `0` disabled). Anything else is preserved but reads as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    /// Capability flag.
    Flag(bool),
    /// Numeric limit.
    Limit(i64),
    /// Unrecognised value.
    Other(serde_json::Value),
}

impl FeatureValue {
    /// The flag value, if this is a flag.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            _ => None,
        }
    }

    /// The limit value, if this is a limit.
    pub fn as_limit(&self) -> Option<i64> {
        match self {
            Self::Limit(n) => Some(*n),
            _ => None,
        }
    }
}

/// Response document of the validation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResponse {
    /// Whether the license is valid.
    #[serde(default)]
    pub valid: bool,

    /// Commercial tier name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,

    /// License expiry.
    #[serde(
        default,
        deserialize_with = "deserialize_expiry",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<DateTime<Utc>>,

    /// Feature flags and limits granted by the license.
    #[serde(default)]
    pub features: BTreeMap<String, FeatureValue>,

    /// Opaque customer details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_info: Option<serde_json::Value>,

    /// Server message, mostly set on rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Parse an ISO-8601 expiry.
///
/// Accepts RFC 3339, a naive date-time (taken as UTC) or a bare date.
pub fn parse_expiry(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn deserialize_expiry<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_expiry(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid expires_at: {}", s))),
    }
}

/// Parse raw JSON body into a validation response.
pub fn parse_validation_response(body: &[u8]) -> Result<ValidationResponse, TicketwardenError> {
    serde_json::from_slice(body).map_err(|e| {
        TicketwardenError::ProtocolError(format!("Failed to parse validation response: {}", e))
    })
}
