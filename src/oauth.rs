//! # Bearer Token Source
//!
//! All identity toolkit requests carry an OAuth2 bearer. The production
//! source mints a self-signed service-account JWT and uses it directly as the
//! bearer, re-signing once the current one is 50 minutes old. The refresh is
//! a single critical section, so concurrent requests never race multiple
//! re-signs.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::credentials::Credentials;
use crate::errors::{FirebaseError, Result};
use crate::jwt::{b64url_encode, encode_segment, JWT_AUDIENCE_IDENTITY, TOKEN_LIFETIME_SECONDS};

/// Supplies the `Authorization: Bearer` value for identity toolkit requests.
pub trait TokenSource: Send + Sync {
    fn token(&self) -> Result<String>;
}

#[derive(Serialize)]
struct BearerHeader<'a> {
    alg: &'static str,
    typ: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<&'a str>,
}

#[derive(Serialize)]
struct BearerClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'static str,
    iat: i64,
    exp: i64,
}

struct CachedBearer {
    token: String,
    issued_at: DateTime<Utc>,
}

/// Self-signed JWT bearer source backed by a service account private key.
pub struct JwtBearerSource {
    credentials: Credentials,
    cached: Mutex<Option<CachedBearer>>,
}

impl JwtBearerSource {
    /// Requires credentials with both a client email and a private key.
    pub fn new(credentials: Credentials) -> Result<Self> {
        if credentials.service_account_email().is_none() || !credentials.has_signing_key() {
            return Err(FirebaseError::invalid_argument(
                "bearer tokens require service account credentials with a private key",
            ));
        }
        Ok(JwtBearerSource {
            credentials,
            cached: Mutex::new(None),
        })
    }

    fn mint(&self, now: DateTime<Utc>) -> Result<String> {
        let email = self
            .credentials
            .service_account_email()
            .ok_or_else(|| FirebaseError::internal("credentials lost their client email"))?;
        let header = BearerHeader {
            alg: "RS256",
            typ: "JWT",
            kid: self.credentials.private_key_id.as_deref(),
        };
        let claims = BearerClaims {
            iss: email,
            sub: email,
            aud: JWT_AUDIENCE_IDENTITY,
            iat: now.timestamp(),
            exp: now.timestamp() + TOKEN_LIFETIME_SECONDS,
        };
        let signing_input = format!("{}.{}", encode_segment(&header)?, encode_segment(&claims)?);
        let signature = self.credentials.sign_with_key(signing_input.as_bytes())?;
        Ok(format!("{}.{}", signing_input, b64url_encode(&signature)))
    }
}

impl TokenSource for JwtBearerSource {
    /// Return the current bearer, re-signing when the cached one is at least
    /// 50 minutes old. The whole check-and-refresh runs under one lock.
    fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().expect("poisoned lock");
        if let Some(ref bearer) = *cached {
            if Utc::now().signed_duration_since(bearer.issued_at) < Duration::minutes(50) {
                return Ok(bearer.token.clone());
            }
        }
        let now = Utc::now();
        let token = self.mint(now)?;
        *cached = Some(CachedBearer {
            token: token.clone(),
            issued_at: now,
        });
        Ok(token)
    }
}

/// The Auth emulator accepts a fixed owner bearer and performs no validation.
pub struct EmulatorTokenSource;

impl TokenSource for EmulatorTokenSource {
    fn token(&self) -> Result<String> {
        Ok("owner".to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyless_credentials_are_rejected() {
        let creds = Credentials::from_project_id("p");
        assert!(JwtBearerSource::new(creds).is_err());
    }

    #[test]
    fn emulator_source_is_constant() {
        assert_eq!(EmulatorTokenSource.token().unwrap(), "owner");
    }
}
