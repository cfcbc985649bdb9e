//! Custom token assembly and signing.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::Result;
use crate::jwt::{
    b64url_encode, encode_segment, validate_developer_claims, validate_uid, Clock, SystemClock,
    JWT_AUDIENCE_IDENTITY, TOKEN_LIFETIME_SECONDS,
};
use crate::signer::CryptoSigner;

#[derive(Serialize)]
struct CustomTokenHeader<'a> {
    alg: &'static str,
    typ: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<&'a str>,
}

#[derive(Serialize)]
struct CustomTokenPayload<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'static str,
    uid: &'a str,
    iat: i64,
    exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    claims: Option<&'a Map<String, Value>>,
}

/// Builds custom tokens for a project, optionally scoped to one tenant.
///
/// The token is a standard three-segment JWT: `iss` and `sub` name the
/// signing service account, the audience is the fixed identity toolkit
/// audience, and the lifetime is one hour. Developer claims are carried in a
/// nested `claims` object after validation against the reserved names and the
/// serialized size budget.
pub struct TokenFactory {
    signer: Arc<dyn CryptoSigner>,
    tenant_id: Option<String>,
    clock: Arc<dyn Clock>,
}

impl TokenFactory {
    pub(crate) fn new(signer: Arc<dyn CryptoSigner>, tenant_id: Option<String>) -> Self {
        TokenFactory {
            signer,
            tenant_id,
            clock: Arc::new(SystemClock),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn create_custom_token(
        &self,
        uid: &str,
        developer_claims: Option<&Map<String, Value>>,
    ) -> Result<String> {
        validate_uid(uid)?;
        if let Some(claims) = developer_claims {
            validate_developer_claims(claims)?;
        }

        let account = self.signer.account_id()?;
        let key_id = self.signer.key_id();
        let now = self.clock.now_utc().timestamp();

        let header = CustomTokenHeader {
            alg: self.signer.algorithm(),
            typ: "JWT",
            kid: key_id.as_deref(),
        };
        let payload = CustomTokenPayload {
            iss: &account,
            sub: &account,
            aud: JWT_AUDIENCE_IDENTITY,
            uid,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECONDS,
            tenant_id: self.tenant_id.as_deref(),
            claims: developer_claims,
        };

        let signing_input = format!("{}.{}", encode_segment(&header)?, encode_segment(&payload)?);
        let signature = self.signer.sign(signing_input.as_bytes())?;
        Ok(format!("{}.{}", signing_input, b64url_encode(&signature)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AuthErrorCode;
    use crate::jwt::{b64url_decode, FixedClock};
    use crate::signer::{EmulatedSigner, EMULATOR_ACCOUNT};
    use serde_json::json;

    fn factory() -> TokenFactory {
        TokenFactory::new(Arc::new(EmulatedSigner), None).with_clock(Arc::new(FixedClock(1_000_000)))
    }

    fn decode_payload(token: &str) -> Map<String, Value> {
        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 3);
        serde_json::from_slice(&b64url_decode(segments[1]).unwrap()).unwrap()
    }

    #[test]
    fn minted_token_carries_required_claims() {
        let token = factory().create_custom_token("alice", None).unwrap();
        let payload = decode_payload(&token);
        assert_eq!(payload["iss"], json!(EMULATOR_ACCOUNT));
        assert_eq!(payload["sub"], json!(EMULATOR_ACCOUNT));
        assert_eq!(payload["aud"], json!(JWT_AUDIENCE_IDENTITY));
        assert_eq!(payload["uid"], json!("alice"));
        assert_eq!(payload["iat"], json!(1_000_000));
        assert_eq!(payload["exp"], json!(1_003_600));
        assert!(payload.get("tenant_id").is_none());
        assert!(payload.get("claims").is_none());
    }

    #[test]
    fn emulated_header_is_unsigned() {
        let token = factory().create_custom_token("alice", None).unwrap();
        let segments: Vec<&str> = token.split('.').collect();
        let header: Map<String, Value> =
            serde_json::from_slice(&b64url_decode(segments[0]).unwrap()).unwrap();
        assert_eq!(header["alg"], json!("none"));
        assert!(header.get("kid").is_none());
        assert_eq!(segments[2], "");
    }

    #[test]
    fn developer_claims_are_preserved() {
        let claims: Map<String, Value> =
            [("premium".to_owned(), json!(true)), ("tier".to_owned(), json!("gold"))]
                .into_iter()
                .collect();
        let token = factory().create_custom_token("alice", Some(&claims)).unwrap();
        let payload = decode_payload(&token);
        assert_eq!(payload["claims"]["premium"], json!(true));
        assert_eq!(payload["claims"]["tier"], json!("gold"));
    }

    #[test]
    fn tenant_scoped_factory_stamps_tenant_id() {
        let factory = TokenFactory::new(Arc::new(EmulatedSigner), Some("t-1".to_owned()))
            .with_clock(Arc::new(FixedClock(0)));
        let payload = decode_payload(&factory.create_custom_token("alice", None).unwrap());
        assert_eq!(payload["tenant_id"], json!("t-1"));
    }

    #[test]
    fn reserved_claims_fail_minting() {
        let claims: Map<String, Value> = [("aud".to_owned(), json!("x"))].into_iter().collect();
        let err = factory().create_custom_token("alice", Some(&claims)).unwrap_err();
        assert_eq!(err.code(), Some(AuthErrorCode::InvalidClaims));
    }

    #[test]
    fn uid_length_boundary() {
        assert!(factory().create_custom_token(&"u".repeat(128), None).is_ok());
        assert!(factory().create_custom_token(&"u".repeat(129), None).is_err());
    }
}
