//! # Crypto Signer
//!
//! Custom tokens are signed with a key bound to the project's service
//! account. Four strategies exist, resolved in a fixed order; the first
//! usable one wins and the others record why they were skipped, so a failed
//! resolution names every candidate in its error message.
//!
//! 1. In-process RSA with the configured private key.
//! 2. The IAM credentials `signBlob` endpoint, for a configured service
//!    account without key material.
//! 3. Like 2, with the account discovered from the GCE metadata server.
//! 4. The emulator signer, which emits unsigned (`alg: "none"`) tokens.
//!
//! The emulator check runs before the network-touching strategies so that an
//! emulated process never probes the metadata server.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::credentials::Credentials;
use crate::errors::{kind_for_status, AuthErrorCode, ErrorKind, FirebaseError, Result};
use crate::oauth::TokenSource;

/// GCE metadata endpoint answering the default service account email.
pub static METADATA_EMAIL_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/email";

/// Signs byte payloads on behalf of a service account.
pub trait CryptoSigner: Send + Sync {
    /// The service account email this signer signs for.
    fn account_id(&self) -> Result<String>;

    /// The key id advertised in minted token headers, when known.
    fn key_id(&self) -> Option<String> {
        None
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;

    fn algorithm(&self) -> &'static str {
        "RS256"
    }
}

/// Strategy 1: sign in process with the service account private key.
pub struct ServiceAccountSigner {
    credentials: Credentials,
}

impl ServiceAccountSigner {
    pub fn new(credentials: Credentials) -> Result<Self> {
        if !credentials.has_signing_key() || credentials.service_account_email().is_none() {
            return Err(FirebaseError::invalid_argument(
                "in-process signing requires a private key and client email",
            ));
        }
        Ok(ServiceAccountSigner { credentials })
    }
}

impl CryptoSigner for ServiceAccountSigner {
    fn account_id(&self) -> Result<String> {
        self.credentials
            .service_account_email()
            .map(str::to_owned)
            .ok_or_else(|| FirebaseError::internal("credentials lost their client email"))
    }

    fn key_id(&self) -> Option<String> {
        self.credentials.private_key_id.clone()
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        self.credentials.sign_with_key(message)
    }
}

fn sign_blob_url(service_account: &str) -> String {
    format!(
        "https://iamcredentials.googleapis.com/v1/projects/-/serviceAccounts/{}:signBlob",
        service_account
    )
}

#[derive(Serialize)]
struct SignBlobRequest<'a> {
    payload: &'a str,
}

#[derive(Deserialize)]
struct SignBlobResponse {
    #[serde(rename = "signedBlob")]
    signed_blob: String,
}

/// Strategies 2 and 3: delegate the RSA operation to the IAM credentials
/// service. The service account either comes from configuration or from the
/// metadata server.
pub struct IamSigner {
    client: reqwest::blocking::Client,
    token_source: Arc<dyn TokenSource>,
    service_account: String,
}

impl IamSigner {
    pub fn new(
        client: reqwest::blocking::Client,
        token_source: Arc<dyn TokenSource>,
        service_account: impl Into<String>,
    ) -> Self {
        IamSigner {
            client,
            token_source,
            service_account: service_account.into(),
        }
    }
}

impl CryptoSigner for IamSigner {
    fn account_id(&self) -> Result<String> {
        Ok(self.service_account.clone())
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let bearer = self.token_source.token().map_err(|e| {
            FirebaseError::new(ErrorKind::Unauthenticated, "could not obtain a bearer for signBlob")
                .with_source(e)
        })?;
        let payload = STANDARD.encode(message);
        let request = SignBlobRequest { payload: &payload };
        let response = self
            .client
            .post(sign_blob_url(&self.service_account))
            .bearer_auth(bearer)
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let error = match status.as_u16() {
                401 => FirebaseError::new(ErrorKind::Unauthenticated, "signBlob rejected the bearer"),
                403 => FirebaseError::new(
                    ErrorKind::PermissionDenied,
                    format!(
                        "signBlob denied for {}; grant the caller the Service Account Token Creator role",
                        self.service_account
                    ),
                )
                .with_code(AuthErrorCode::InsufficientPermission),
                _ => FirebaseError::new(kind_for_status(status), "signBlob request failed"),
            };
            return Err(error.with_response(status, body));
        }

        let parsed: SignBlobResponse = response.json()?;
        STANDARD
            .decode(&parsed.signed_blob)
            .map_err(|e| FirebaseError::internal("signBlob returned malformed base64").with_source(e))
    }
}

/// Strategy 4: the emulator accepts unsigned tokens.
pub struct EmulatedSigner;

pub static EMULATOR_ACCOUNT: &str = "firebase-auth-emulator@example.com";

impl CryptoSigner for EmulatedSigner {
    fn account_id(&self) -> Result<String> {
        Ok(EMULATOR_ACCOUNT.to_owned())
    }

    fn sign(&self, _message: &[u8]) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    fn algorithm(&self) -> &'static str {
        "none"
    }
}

/// Ask the metadata server for the default service account email.
fn metadata_service_account(client: &reqwest::blocking::Client) -> Result<String> {
    let response = client
        .get(METADATA_EMAIL_URL)
        .header("Metadata-Flavor", "Google")
        .timeout(std::time::Duration::from_secs(3))
        .send()?;
    if !response.status().is_success() {
        return Err(FirebaseError::new(
            ErrorKind::Unavailable,
            format!("metadata server answered {}", response.status()),
        ));
    }
    let email = response.text()?;
    if email.is_empty() {
        return Err(FirebaseError::internal("metadata server returned an empty account"));
    }
    Ok(email)
}

/// Walk the strategy chain. Every skipped strategy contributes a reason to
/// the error raised when nothing is usable.
pub(crate) fn resolve_signer(
    credentials: &Credentials,
    token_source: &Arc<dyn TokenSource>,
    client: &reqwest::blocking::Client,
    emulated: bool,
) -> Result<Arc<dyn CryptoSigner>> {
    if emulated {
        return Ok(Arc::new(EmulatedSigner));
    }

    let mut skipped: Vec<String> = Vec::new();

    match ServiceAccountSigner::new(credentials.clone()) {
        Ok(signer) => return Ok(Arc::new(signer)),
        Err(e) => skipped.push(format!("service account key: {}", e.message())),
    }

    match credentials.service_account_email() {
        Some(email) => {
            return Ok(Arc::new(IamSigner::new(
                client.clone(),
                token_source.clone(),
                email,
            )))
        }
        None => skipped.push("IAM signBlob: no service account email configured".to_owned()),
    }

    match metadata_service_account(client) {
        Ok(email) => {
            return Ok(Arc::new(IamSigner::new(
                client.clone(),
                token_source.clone(),
                email,
            )))
        }
        Err(e) => skipped.push(format!("metadata server: {}", e.message())),
    }

    skipped.push("emulator: FIREBASE_AUTH_EMULATOR_HOST not set".to_owned());

    Err(FirebaseError::internal(format!(
        "no usable signing strategy; tried: {}",
        skipped.join("; ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::EmulatorTokenSource;

    fn source() -> Arc<dyn TokenSource> {
        Arc::new(EmulatorTokenSource)
    }

    #[test]
    fn emulated_resolution_wins_when_env_probed() {
        let creds = Credentials::from_project_id("p");
        let signer =
            resolve_signer(&creds, &source(), &reqwest::blocking::Client::new(), true).unwrap();
        assert_eq!(signer.algorithm(), "none");
        assert_eq!(signer.account_id().unwrap(), EMULATOR_ACCOUNT);
        assert!(signer.sign(b"payload").unwrap().is_empty());
    }

    #[test]
    fn email_without_key_resolves_to_iam() {
        let creds: Credentials = r#"{
            "project_id": "p",
            "client_email": "svc@p.iam.gserviceaccount.com"
        }"#
        .parse()
        .unwrap();
        let signer =
            resolve_signer(&creds, &source(), &reqwest::blocking::Client::new(), false).unwrap();
        assert_eq!(signer.algorithm(), "RS256");
        assert_eq!(signer.account_id().unwrap(), "svc@p.iam.gserviceaccount.com");
        assert!(signer.key_id().is_none());
    }

    #[test]
    fn in_process_signer_requires_key_material() {
        let creds = Credentials::from_project_id("p");
        assert!(ServiceAccountSigner::new(creds).is_err());
    }
}
