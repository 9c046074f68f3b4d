//! Request signing for license validation calls.
//!
//! The signature is a SHA-256 digest over a canonical payload string:
//! ```text
//! bot_version=2.0.0&guild_id=123&license_key=KEY&timestamp=1736942400:KEY
//! ```
//! Keys are sorted lexicographically, any existing `signature` field is
//! skipped, and the shared secret is appended after a colon. The license
//! server recomputes the same string, so separators and scalar rendering
//! must match bit for bit.

use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;

/// Name of the payload field that carries the signature.
pub const SIGNATURE_FIELD: &str = "signature";

/// Scalar payload value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadValue {
    /// Rendered verbatim.
    Str(String),
    /// Rendered as base-10 text, no padding or grouping.
    Int(i64),
}

impl fmt::Display for PayloadValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for PayloadValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for PayloadValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// Build the canonical `key=value&...` string for a payload.
///
/// The `signature` field is excluded and keys are sorted, so the result
/// does not depend on input order.
pub fn canonical_string<K: AsRef<str>>(payload: &[(K, PayloadValue)]) -> String {
    let mut fields: Vec<(&str, &PayloadValue)> = payload
        .iter()
        .map(|(k, v)| (k.as_ref(), v))
        .filter(|(k, _)| *k != SIGNATURE_FIELD)
        .collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Sign a payload with a shared secret.
///
/// # Returns
/// Lowercase hex SHA-256 of `<canonical string>:<secret>`.
pub fn sign<K: AsRef<str>>(payload: &[(K, PayloadValue)], secret: &str) -> String {
    let signing_string = format!("{}:{}", canonical_string(payload), secret);
    hex::encode(Sha256::digest(signing_string.as_bytes()))
}

/// Verify a signature in constant time.
///
/// This is the server-side counterpart of [`sign`]; the client uses it in
/// tests to prove interoperability.
pub fn verify<K: AsRef<str>>(payload: &[(K, PayloadValue)], secret: &str, signature: &str) -> bool {
    let expected = sign(payload, secret);
    let provided = signature.trim().to_ascii_lowercase();

    if expected.len() != provided.len() {
        return false;
    }
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> Vec<(&'static str, PayloadValue)> {
        vec![
            ("license_key", "TW-TEST-KEY".into()),
            ("guild_id", "123456789".into()),
            ("bot_version", "2.0.0".into()),
            ("timestamp", 1_736_942_400i64.into()),
        ]
    }

    #[test]
    fn test_canonical_string_sorted() {
        let canonical = canonical_string(&sample_payload());
        assert_eq!(
            canonical,
            "bot_version=2.0.0&guild_id=123456789&license_key=TW-TEST-KEY&timestamp=1736942400"
        );
    }

    #[test]
    fn test_sign_known_vector() {
        let signature = sign(&sample_payload(), "TW-TEST-KEY");
        assert_eq!(
            signature,
            "6dd134b54827634347f2ed5952226024c4b09b1bcf2b0d3c384f9a6f65fa3209"
        );
    }

    #[test]
    fn test_sign_small_vector() {
        let payload = vec![("b", PayloadValue::from("two")), ("a", PayloadValue::from(1i64))];
        assert_eq!(
            sign(&payload, "secret"),
            "4185310aa61c11978817e85eb2b2339e2664d43a76f736958d09c592390551e6"
        );
    }

    #[test]
    fn test_sign_order_independent() {
        let mut reversed = sample_payload();
        reversed.reverse();
        assert_eq!(sign(&sample_payload(), "k"), sign(&reversed, "k"));
    }

    #[test]
    fn test_sign_ignores_existing_signature() {
        let mut with_sig = sample_payload();
        with_sig.push(("signature", "deadbeef".into()));
        assert_eq!(sign(&sample_payload(), "k"), sign(&with_sig, "k"));
    }

    #[test]
    fn test_sign_secret_matters() {
        assert_ne!(sign(&sample_payload(), "a"), sign(&sample_payload(), "b"));
    }

    #[test]
    fn test_integer_rendering() {
        assert_eq!(PayloadValue::Int(-7).to_string(), "-7");
        assert_eq!(PayloadValue::Int(1_000_000).to_string(), "1000000");
    }

    #[test]
    fn test_verify_roundtrip() {
        let payload = sample_payload();
        let signature = sign(&payload, "TW-TEST-KEY");
        assert!(verify(&payload, "TW-TEST-KEY", &signature));
        assert!(verify(&payload, "TW-TEST-KEY", &signature.to_uppercase()));
    }

    #[test]
    fn test_verify_rejects_tampered_payload() {
        let payload = sample_payload();
        let signature = sign(&payload, "TW-TEST-KEY");

        let mut tampered = sample_payload();
        tampered[1] = ("guild_id", "999".into());
        assert!(!verify(&tampered, "TW-TEST-KEY", &signature));
    }

    #[test]
    fn test_verify_rejects_wrong_length() {
        assert!(!verify(&sample_payload(), "k", "abc"));
    }
}
