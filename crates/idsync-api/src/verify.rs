//! Webhook signature verification for Clerk deliveries.
//!
//! Clerk signs deliveries with the Svix scheme: HMAC-SHA256 over
//! `{id}.{timestamp}.{payload}` using a `whsec_`-prefixed base64 secret,
//! with the base64 tag carried in the `svix-signature` header as a
//! space-separated list of `v{n},{base64}` entries.
//!
//! Verification is modeled as a trait with a single operation so the
//! concrete scheme stays swappable without touching dispatch logic. Every
//! failure mode, including a missing or malformed secret, surfaces as a
//! [`VerificationError`] rather than a panic.

use axum::http::HeaderMap;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use idsync_core::ClerkEvent;
use sha2::Sha256;
use thiserror::Error;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Delivery id header, verbatim from the provider.
pub const HEADER_ID: &str = "svix-id";
/// Delivery timestamp header (seconds since epoch).
pub const HEADER_TIMESTAMP: &str = "svix-timestamp";
/// Signature list header.
pub const HEADER_SIGNATURE: &str = "svix-signature";

/// Prefix carried by provider signing secrets.
const SECRET_PREFIX: &str = "whsec_";

/// Tolerated clock skew between the delivery timestamp and local time, in
/// seconds. Deliveries outside the window are rejected to blunt replay.
const TIMESTAMP_TOLERANCE_SECS: i64 = 5 * 60;

/// Signature verification failures.
///
/// All variants are terminal for the request: the dispatcher converts them
/// into a client-error response without touching the store.
#[derive(Debug, Error)]
pub enum VerificationError {
    /// A required provider header is absent or not valid ASCII.
    #[error("missing or unreadable header: {0}")]
    MissingHeader(&'static str),

    /// The timestamp header is not an integer.
    #[error("malformed delivery timestamp")]
    MalformedTimestamp,

    /// The timestamp is outside the tolerance window.
    #[error("delivery timestamp outside tolerance window")]
    TimestampOutOfTolerance,

    /// No signing secret is configured, or the configured one could not
    /// be decoded.
    #[error("signing secret unavailable")]
    SecretUnavailable,

    /// No signature entry matched the expected tag.
    #[error("signature mismatch")]
    SignatureMismatch,

    /// The signed payload is not a valid event.
    #[error("unparseable event payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Authenticates a raw delivery against its header bag.
///
/// One operation: payload plus headers in, validated typed event out.
pub trait SignatureVerifier: Send + Sync {
    /// Verifies the delivery and parses the payload into a typed event.
    ///
    /// The payload must be the exact bytes the provider signed; callers
    /// must not re-serialize the body before verification.
    ///
    /// # Errors
    ///
    /// Returns a [`VerificationError`] describing the first check that
    /// failed.
    fn verify(&self, payload: &[u8], headers: &HeaderMap)
    -> Result<ClerkEvent, VerificationError>;
}

/// Production verifier for the Svix scheme.
///
/// The secret is decoded once at construction. A missing or undecodable
/// secret produces a verifier that fails every delivery, keeping the
/// process up while verification degrades.
pub struct SvixVerifier {
    key: Option<Vec<u8>>,
}

impl SvixVerifier {
    /// Creates a verifier from the configured secret, if any.
    pub fn new(secret: Option<&str>) -> Self {
        let key = secret.and_then(|secret| {
            let Some(encoded) = secret.strip_prefix(SECRET_PREFIX) else {
                warn!("webhook secret does not carry the whsec_ prefix, verification disabled");
                return None;
            };
            match BASE64.decode(encoded) {
                Ok(key) => Some(key),
                Err(_) => {
                    warn!("webhook secret is not valid base64, verification disabled");
                    None
                },
            }
        });

        Self { key }
    }

    /// Signs a payload the way the provider would.
    ///
    /// Returns a `v1,{base64}` entry suitable for the signature header.
    /// Exists for tests and local tooling; the service itself only
    /// verifies.
    ///
    /// # Errors
    ///
    /// Returns `VerificationError::SecretUnavailable` when no usable key
    /// is configured.
    pub fn sign(
        &self,
        msg_id: &str,
        timestamp: i64,
        payload: &[u8],
    ) -> Result<String, VerificationError> {
        let tag = self.expected_tag(msg_id, timestamp, payload)?;
        Ok(format!("v1,{tag}"))
    }

    /// Computes the base64 HMAC tag for the signed content.
    fn expected_tag(
        &self,
        msg_id: &str,
        timestamp: i64,
        payload: &[u8],
    ) -> Result<String, VerificationError> {
        let key = self.key.as_deref().ok_or(VerificationError::SecretUnavailable)?;

        let mut mac = HmacSha256::new_from_slice(key)
            .map_err(|_| VerificationError::SecretUnavailable)?;
        mac.update(msg_id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);

        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }
}

impl SignatureVerifier for SvixVerifier {
    fn verify(
        &self,
        payload: &[u8],
        headers: &HeaderMap,
    ) -> Result<ClerkEvent, VerificationError> {
        let msg_id = header_str(headers, HEADER_ID)?;
        let timestamp_raw = header_str(headers, HEADER_TIMESTAMP)?;
        let signatures = header_str(headers, HEADER_SIGNATURE)?;

        let timestamp: i64 =
            timestamp_raw.parse().map_err(|_| VerificationError::MalformedTimestamp)?;
        let now = chrono::Utc::now().timestamp();
        if (now - timestamp).abs() > TIMESTAMP_TOLERANCE_SECS {
            return Err(VerificationError::TimestampOutOfTolerance);
        }

        let expected = self.expected_tag(msg_id, timestamp, payload)?;

        // The header may carry several space-separated entries when the
        // provider rotates secrets; any v1 entry may match.
        let mut matched = false;
        for entry in signatures.split_whitespace() {
            if let Some((version, tag)) = entry.split_once(',') {
                if version == "v1" && timing_safe_eq(tag.as_bytes(), expected.as_bytes()) {
                    matched = true;
                }
            }
        }

        if !matched {
            return Err(VerificationError::SignatureMismatch);
        }

        Ok(ClerkEvent::parse(payload)?)
    }
}

/// Reads a required header as a string slice.
fn header_str<'h>(
    headers: &'h HeaderMap,
    name: &'static str,
) -> Result<&'h str, VerificationError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or(VerificationError::MissingHeader(name))
}

/// Timing-safe comparison to prevent leaking the expected tag through
/// timing analysis.
fn timing_safe_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (a_byte, b_byte) in a.iter().zip(b.iter()) {
        result |= a_byte ^ b_byte;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    // base64 for "test-secret"
    const SECRET: &str = "whsec_dGVzdC1zZWNyZXQ=";

    fn signed_headers(verifier: &SvixVerifier, msg_id: &str, payload: &[u8]) -> HeaderMap {
        let timestamp = chrono::Utc::now().timestamp();
        let signature = verifier.sign(msg_id, timestamp, payload).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(HEADER_ID, msg_id.parse().unwrap());
        headers.insert(HEADER_TIMESTAMP, timestamp.to_string().parse().unwrap());
        headers.insert(HEADER_SIGNATURE, signature.parse().unwrap());
        headers
    }

    fn event_payload() -> &'static [u8] {
        br#"{"type": "user.updated", "data": {"id": "u1", "first_name": "Ann", "last_name": "Lee", "image_url": "http://img/u1", "email_addresses": [{"email_address": "ann@x.com"}]}}"#
    }

    #[test]
    fn sign_then_verify_roundtrip() {
        let verifier = SvixVerifier::new(Some(SECRET));
        let payload = event_payload();
        let headers = signed_headers(&verifier, "msg_1", payload);

        let event = verifier.verify(payload, &headers).unwrap();
        assert_eq!(event.kind(), "user.updated");
    }

    #[test]
    fn tampered_payload_rejected() {
        let verifier = SvixVerifier::new(Some(SECRET));
        let headers = signed_headers(&verifier, "msg_1", event_payload());

        let result = verifier.verify(br#"{"type": "user.updated", "data": {}}"#, &headers);
        assert!(matches!(result, Err(VerificationError::SignatureMismatch)));
    }

    #[test]
    fn wrong_secret_rejected() {
        let signer = SvixVerifier::new(Some(SECRET));
        let payload = event_payload();
        let headers = signed_headers(&signer, "msg_1", payload);

        // base64 for "other-secret"
        let verifier = SvixVerifier::new(Some("whsec_b3RoZXItc2VjcmV0"));
        let result = verifier.verify(payload, &headers);
        assert!(matches!(result, Err(VerificationError::SignatureMismatch)));
    }

    #[test]
    fn secret_rotation_entries_accepted() {
        let verifier = SvixVerifier::new(Some(SECRET));
        let payload = event_payload();
        let timestamp = chrono::Utc::now().timestamp();
        let valid = verifier.sign("msg_1", timestamp, payload).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(HEADER_ID, "msg_1".parse().unwrap());
        headers.insert(HEADER_TIMESTAMP, timestamp.to_string().parse().unwrap());
        // A stale v1 entry alongside the valid one still verifies
        headers.insert(
            HEADER_SIGNATURE,
            format!("v1,AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA= {valid}").parse().unwrap(),
        );

        assert!(verifier.verify(payload, &headers).is_ok());
    }

    #[test]
    fn unknown_version_entries_ignored() {
        let verifier = SvixVerifier::new(Some(SECRET));
        let payload = event_payload();
        let timestamp = chrono::Utc::now().timestamp();
        let valid = verifier.sign("msg_1", timestamp, payload).unwrap();
        let v2 = valid.replacen("v1,", "v2,", 1);

        let mut headers = HeaderMap::new();
        headers.insert(HEADER_ID, "msg_1".parse().unwrap());
        headers.insert(HEADER_TIMESTAMP, timestamp.to_string().parse().unwrap());
        headers.insert(HEADER_SIGNATURE, v2.parse().unwrap());

        let result = verifier.verify(payload, &headers);
        assert!(matches!(result, Err(VerificationError::SignatureMismatch)));
    }

    #[test]
    fn missing_headers_rejected() {
        let verifier = SvixVerifier::new(Some(SECRET));
        let headers = HeaderMap::new();

        let result = verifier.verify(event_payload(), &headers);
        assert!(matches!(result, Err(VerificationError::MissingHeader(HEADER_ID))));
    }

    #[test]
    fn malformed_timestamp_rejected() {
        let verifier = SvixVerifier::new(Some(SECRET));

        let mut headers = HeaderMap::new();
        headers.insert(HEADER_ID, "1".parse().unwrap());
        headers.insert(HEADER_TIMESTAMP, "t".parse().unwrap());
        headers.insert(HEADER_SIGNATURE, "s".parse().unwrap());

        let result = verifier.verify(event_payload(), &headers);
        assert!(matches!(result, Err(VerificationError::MalformedTimestamp)));
    }

    #[test]
    fn stale_timestamp_rejected() {
        let verifier = SvixVerifier::new(Some(SECRET));
        let payload = event_payload();
        let timestamp = chrono::Utc::now().timestamp() - 600;
        let signature = verifier.sign("msg_1", timestamp, payload).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(HEADER_ID, "msg_1".parse().unwrap());
        headers.insert(HEADER_TIMESTAMP, timestamp.to_string().parse().unwrap());
        headers.insert(HEADER_SIGNATURE, signature.parse().unwrap());

        let result = verifier.verify(payload, &headers);
        assert!(matches!(result, Err(VerificationError::TimestampOutOfTolerance)));
    }

    #[test]
    fn future_timestamp_rejected() {
        let verifier = SvixVerifier::new(Some(SECRET));
        let payload = event_payload();
        let timestamp = chrono::Utc::now().timestamp() + 600;
        let signature = verifier.sign("msg_1", timestamp, payload).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(HEADER_ID, "msg_1".parse().unwrap());
        headers.insert(HEADER_TIMESTAMP, timestamp.to_string().parse().unwrap());
        headers.insert(HEADER_SIGNATURE, signature.parse().unwrap());

        let result = verifier.verify(payload, &headers);
        assert!(matches!(result, Err(VerificationError::TimestampOutOfTolerance)));
    }

    #[test]
    fn missing_secret_fails_closed() {
        let signer = SvixVerifier::new(Some(SECRET));
        let payload = event_payload();
        let headers = signed_headers(&signer, "msg_1", payload);

        let verifier = SvixVerifier::new(None);
        let result = verifier.verify(payload, &headers);
        assert!(matches!(result, Err(VerificationError::SecretUnavailable)));
    }

    #[test]
    fn malformed_secret_fails_closed() {
        // "x" is not valid base64 key material
        let verifier = SvixVerifier::new(Some("whsec_x"));
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_ID, "1".parse().unwrap());
        headers
            .insert(HEADER_TIMESTAMP, chrono::Utc::now().timestamp().to_string().parse().unwrap());
        headers.insert(HEADER_SIGNATURE, "v1,abc".parse().unwrap());

        let result = verifier.verify(event_payload(), &headers);
        assert!(matches!(result, Err(VerificationError::SecretUnavailable)));
    }

    #[test]
    fn valid_signature_over_junk_payload_is_payload_error() {
        let verifier = SvixVerifier::new(Some(SECRET));
        let payload = b"not json";
        let headers = signed_headers(&verifier, "msg_1", payload);

        let result = verifier.verify(payload, &headers);
        assert!(matches!(result, Err(VerificationError::InvalidPayload(_))));
    }

    #[test]
    fn timing_safe_eq_same() {
        assert!(timing_safe_eq(b"hello", b"hello"));
    }

    #[test]
    fn timing_safe_eq_different() {
        assert!(!timing_safe_eq(b"hello", b"world"));
    }

    #[test]
    fn timing_safe_eq_different_length() {
        assert!(!timing_safe_eq(b"hello", b"hello_world"));
    }
}
