//! # Shared JWT plumbing: audiences, issuer prefixes, reserved claims, segment codecs.
//!
//! Token assembly and verification both work on raw RFC 7519 segments so that
//! signing can happen out of process (IAM `signBlob`). The helpers in here are
//! the single place the base64url dialect and the claim limits are defined.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::{AuthErrorCode, FirebaseError, Result};

/// Audience of custom tokens and of self-signed OAuth2 bearer assertions.
pub static JWT_AUDIENCE_IDENTITY: &str =
    "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit";

/// Issuer prefix of Firebase ID tokens; the project id is appended.
pub static ID_TOKEN_ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// Issuer prefix of Firebase session cookies; the project id is appended.
pub static SESSION_COOKIE_ISSUER_PREFIX: &str = "https://session.firebase.google.com/";

/// Claim names owned by the JWT and Firebase specs. Developer-provided custom
/// claims must not use any of these.
pub static RESERVED_CLAIMS: [&str; 15] = [
    "amr", "at_hash", "aud", "auth_time", "azp", "cnf", "c_hash", "exp", "iat", "iss", "jti",
    "nbf", "nonce", "sub", "firebase",
];

pub(crate) const MAX_UID_LENGTH: usize = 128;
pub(crate) const MAX_CLAIMS_PAYLOAD_BYTES: usize = 1000;
pub(crate) const TOKEN_LIFETIME_SECONDS: i64 = 3600;

pub(crate) fn b64url_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub(crate) fn b64url_decode(segment: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| FirebaseError::invalid_argument("malformed base64url segment").with_source(e))
}

/// JSON-encode a value and base64url it, producing one JWT segment.
pub(crate) fn encode_segment<T: Serialize>(value: &T) -> Result<String> {
    Ok(b64url_encode(&serde_json::to_vec(value)?))
}

/// Reject uids outside 1..=128 characters.
pub(crate) fn validate_uid(uid: &str) -> Result<()> {
    if uid.is_empty() {
        return Err(FirebaseError::invalid_argument("uid must not be empty"));
    }
    if uid.len() > MAX_UID_LENGTH {
        return Err(FirebaseError::invalid_argument(format!(
            "uid must be at most {} characters long",
            MAX_UID_LENGTH
        )));
    }
    Ok(())
}

/// Reject developer claim maps that use reserved names or exceed the
/// serialized payload budget.
pub(crate) fn validate_developer_claims(claims: &serde_json::Map<String, serde_json::Value>) -> Result<()> {
    let reserved: Vec<&str> = claims
        .keys()
        .filter_map(|k| RESERVED_CLAIMS.iter().find(|r| **r == k.as_str()).copied())
        .collect();
    if !reserved.is_empty() {
        return Err(FirebaseError::invalid_argument(format!(
            "claims {:?} are reserved and must not be set",
            reserved
        ))
        .with_code(AuthErrorCode::InvalidClaims));
    }
    let serialized = serde_json::to_string(claims)?;
    if serialized.len() > MAX_CLAIMS_PAYLOAD_BYTES {
        return Err(FirebaseError::invalid_argument(format!(
            "serialized claims must not exceed {} bytes",
            MAX_CLAIMS_PAYLOAD_BYTES
        ))
        .with_code(AuthErrorCode::ClaimsTooLarge));
    }
    Ok(())
}

/// Time source seam. Verification and minting read the clock through this so
/// tests can pin the current time.
pub(crate) trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

pub(crate) struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed clock for tests, constructed from epoch seconds.
#[cfg(test)]
pub(crate) struct FixedClock(pub i64);

#[cfg(test)]
impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(self.0, 0).expect("valid test timestamp")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map, Value};

    fn claims_of(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn base64url_round_trip() {
        let data = b"{\"alg\":\"RS256\",\"typ\":\"JWT\"}";
        assert_eq!(b64url_decode(&b64url_encode(data)).unwrap(), data);
    }

    #[test]
    fn base64url_rejects_standard_alphabet_padding() {
        assert!(b64url_decode("a+b/==").is_err());
    }

    #[test]
    fn uid_boundaries() {
        assert!(validate_uid(&"x".repeat(128)).is_ok());
        assert!(validate_uid(&"x".repeat(129)).is_err());
        assert!(validate_uid("").is_err());
    }

    #[test]
    fn reserved_claims_rejected() {
        for reserved in RESERVED_CLAIMS {
            let claims = claims_of(&[(reserved, json!("v")), ("fine", json!(1))]);
            let err = validate_developer_claims(&claims).unwrap_err();
            assert_eq!(err.code(), Some(AuthErrorCode::InvalidClaims), "claim {}", reserved);
            assert!(err.message().contains(reserved));
        }
    }

    #[test]
    fn claims_size_boundary() {
        // {"k":"aaaa…"} serializes to exactly 1000 bytes with 992 fill chars.
        let fill = "a".repeat(992);
        let claims = claims_of(&[("k", json!(fill))]);
        assert_eq!(serde_json::to_string(&claims).unwrap().len(), 1000);
        assert!(validate_developer_claims(&claims).is_ok());

        let fill = "a".repeat(993);
        let claims = claims_of(&[("k", json!(fill))]);
        let err = validate_developer_claims(&claims).unwrap_err();
        assert_eq!(err.code(), Some(AuthErrorCode::ClaimsTooLarge));
    }
}
