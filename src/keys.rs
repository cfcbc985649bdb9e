//! # Public Key Manager
//!
//! The Firebase Auth backend signs ID tokens and session cookies with
//! rotating RSA keys and publishes the public halves as a JWK set. This
//! module fetches and caches that set, honoring the `Cache-Control: max-age`
//! the endpoint sends. A refresh is a single critical section: one thread
//! refetches while the others wait and then observe the newly installed
//! snapshot.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{AuthErrorCode, ErrorKind, FirebaseError, Result};

/// JWK set matching the certificates Firebase uses for ID tokens.
pub static ID_TOKEN_KEY_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// JWK set matching the certificates Firebase uses for session cookies.
pub static SESSION_COOKIE_KEY_URL: &str =
    "https://identitytoolkit.googleapis.com/v1/sessionCookiePublicKeys";

const DEFAULT_MAX_AGE_SECONDS: i64 = 3600;

#[derive(Serialize, Deserialize, Default, Clone)]
pub struct JWSEntry {
    #[serde(flatten)]
    pub(crate) headers: biscuit::jws::RegisteredHeader,
    #[serde(flatten)]
    pub(crate) ne: biscuit::jwk::RSAKeyParameters,
}

#[derive(Serialize, Deserialize)]
pub struct JWKSetDTO {
    pub keys: Vec<JWSEntry>,
}

/// Key id to RSA public key parameters.
pub(crate) type KeyMap = BTreeMap<String, biscuit::jwk::RSAKeyParameters>;

struct CachedKeys {
    keys: Arc<KeyMap>,
    expires_at: DateTime<Utc>,
}

/// Caching fetcher for one JWK endpoint.
pub struct KeyManager {
    url: String,
    client: reqwest::blocking::Client,
    cache: Mutex<Option<CachedKeys>>,
}

impl KeyManager {
    pub fn new(client: reqwest::blocking::Client, url: impl Into<String>) -> Self {
        KeyManager {
            url: url.into(),
            client,
            cache: Mutex::new(None),
        }
    }

    /// Preloaded manager that never fetches.
    #[cfg(test)]
    pub(crate) fn with_static_keys(keys: KeyMap) -> Self {
        KeyManager {
            url: String::new(),
            client: reqwest::blocking::Client::new(),
            cache: Mutex::new(Some(CachedKeys {
                keys: Arc::new(keys),
                expires_at: Utc::now() + chrono::Duration::days(365),
            })),
        }
    }

    /// The current key set, from cache when fresh, refetched otherwise.
    pub fn keys(&self) -> Result<Arc<KeyMap>> {
        let mut cache = self.cache.lock().expect("poisoned lock");
        if let Some(ref cached) = *cache {
            if Utc::now() < cached.expires_at {
                return Ok(cached.keys.clone());
            }
        }
        let (keys, max_age) = self.fetch().map_err(|e| {
            FirebaseError::new(
                ErrorKind::Unknown,
                format!("failed to fetch public keys from {}", self.url),
            )
            .with_code(AuthErrorCode::CertificateFetchFailed)
            .with_source(e)
        })?;
        let snapshot = Arc::new(keys);
        *cache = Some(CachedKeys {
            keys: snapshot.clone(),
            expires_at: Utc::now() + max_age,
        });
        Ok(snapshot)
    }

    fn fetch(&self) -> Result<(KeyMap, chrono::Duration)> {
        let response = self.client.get(&self.url).send()?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(FirebaseError::new(
                ErrorKind::Unknown,
                format!("key endpoint answered {}", status),
            )
            .with_response(status, body));
        }

        let max_age = response
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|value| value.to_str().ok())
            .and_then(cache_control::CacheControl::from_value)
            .and_then(|cc| cc.max_age)
            .and_then(|age| chrono::Duration::from_std(age).ok())
            .unwrap_or_else(|| chrono::Duration::seconds(DEFAULT_MAX_AGE_SECONDS));

        let dto: JWKSetDTO = response.json()?;
        let mut keys = KeyMap::new();
        for entry in dto.keys {
            if let Some(kid) = entry.headers.key_id {
                keys.insert(kid, entry.ne);
            }
        }
        Ok((keys, max_age))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    // Public JWK material in the shape the Google endpoints serve.
    const JWKS: &str = r#"{
      "keys": [
        {
          "alg": "RS256",
          "use": "sig",
          "kid": "b9826d093777ce005e43a327ff202652145e9604",
          "n": "57ATt2MoR9swEFVy6cCW_cbswo6UxQZn8knRPrkOPwm6RfopXl35osZVF2n18D2U62zeMDzgsoFMEWLYbP6kXn2OK2ABoIKz5DDVAmhXvElKy0pXLNPSyqQ4aJydorBoZJbugCCODPmdgmYp96vbZ7FHY3ZyFK00Lt8v49cbfGDZA50NoUcR3k0PbpiLVVaDxM34jTHr9U97hRyebnbbKTaoBI_crRzDL9yaWOpfBVpQv_5oXhhKUKzzJLOMMnkiMJ0VbM2iA8RbHNlmyRbY01Xhd0aEVBTDt56kFGzR3CXc1lYO0jfwYOdtfwNJ6eef-qg3i4Sog5vreMMJ2FCVyQ",
          "e": "AQAB",
          "kty": "RSA"
        },
        {
          "e": "AQAB",
          "alg": "RS256",
          "kty": "RSA",
          "n": "hsMFtQ6M-08j5LMBaCNp9FDNeNwuMNv4KwRo7BRTtUI-cjAtIJFgT57dLNsywu0IMArnhl0VlD7ChRFXs8x3vtRg10vQackII78-wD1zx8YRlNCLVLxDbDogOAMHIWhAYIcowSU8fOaMzQsJLnwu_ZT4BkJGwj01P59x2KufnDW9gxR52sp5otAfESYl7w3Ay49JZCPqpEoCv79M9lXOiEWzvcR9woxOw2L-PDDP0V4lMS3Wyw38zqNRuPVSdCWB15e_pAl3aSelV21pJBHvTPfrPJ9Ok3TBybXx_-yq4TEKYSZTmzYoKOT81T4pD4C4uejaQy_6liq2oua-N-gUlw",
          "kid": "696aa74c81be60b294855a9a5ee9b8698e2abec1",
          "use": "sig"
        }
      ]
    }"#;

    pub(crate) fn fixture_keys() -> KeyMap {
        let dto: JWKSetDTO = serde_json::from_str(JWKS).unwrap();
        let mut keys = KeyMap::new();
        for entry in dto.keys {
            keys.insert(entry.headers.key_id.clone().unwrap(), entry.ne);
        }
        keys
    }

    #[test]
    fn jwk_set_parses_with_kids() {
        let keys = fixture_keys();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains_key("b9826d093777ce005e43a327ff202652145e9604"));
        assert!(keys.contains_key("696aa74c81be60b294855a9a5ee9b8698e2abec1"));
    }

    #[test]
    fn static_manager_serves_without_fetching() {
        let manager = KeyManager::with_static_keys(fixture_keys());
        let first = manager.keys().unwrap();
        let second = manager.keys().unwrap();
        assert_eq!(first.len(), 2);
        // Same installed snapshot, not a refetch.
        assert!(Arc::ptr_eq(&first, &second));
    }
}
