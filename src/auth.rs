//! # Auth Facade
//!
//! [`FirebaseAuth`] is the public surface of the crate: token minting and
//! verification plus the complete identity toolkit operation set. One facade
//! exists per [`App`](crate::app::App), and one per `(project, tenant)` pair
//! through [`TenantManager::auth_for_tenant`].
//!
//! Internals (signer, verifiers, REST managers) are built lazily, at most
//! once each, under the facade mutex; a failed construction is not memoized
//! and the next call retries. `destroy` flips a one-way flag that every
//! operation checks before doing any work.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};

use crate::app::{probe_emulator_host, App};
use crate::credentials::Credentials;
use crate::errors::{ErrorKind, FirebaseError, Result};
use crate::keys::{KeyManager, ID_TOKEN_KEY_URL, SESSION_COOKIE_KEY_URL};
use crate::oauth::{EmulatorTokenSource, JwtBearerSource, TokenSource};
use crate::rest::pages::Page;
use crate::rest::providers::{
    OidcProviderConfig, OidcProviderCreateRequest, OidcProviderUpdateRequest,
    ProviderConfigManager, SamlProviderConfig, SamlProviderCreateRequest,
    SamlProviderUpdateRequest,
};
use crate::rest::tenants::{
    validate_tenant_id, Tenant, TenantApi, TenantCreateRequest, TenantUpdateRequest,
};
use crate::rest::users::{
    ActionCodeSettings, CreateUserRequest, DeleteUsersResult, EmailActionType, GetUsersResult,
    UpdateUserRequest, UserIdentifier, UserImportHash, UserImportRecord, UserImportResult,
    UserManager, UserRecord,
};
use crate::rest::ApiClient;
use crate::signer::resolve_signer;
use crate::tokens::factory::TokenFactory;
use crate::tokens::verifier::{check_revoked, FirebaseToken, TokenKind, TokenVerifier};

/// Bearer source used when neither a key file nor the emulator is available.
/// Requests fail at use time, which keeps facade construction infallible.
struct UnconfiguredTokenSource;

impl TokenSource for UnconfiguredTokenSource {
    fn token(&self) -> Result<String> {
        Err(FirebaseError::new(
            ErrorKind::Unauthenticated,
            "no bearer credential available; configure a service account key or the Auth emulator",
        ))
    }
}

#[derive(Default)]
struct Components {
    destroyed: bool,
    token_factory: Option<Arc<TokenFactory>>,
    id_token_verifier: Option<Arc<TokenVerifier>>,
    cookie_verifier: Option<Arc<TokenVerifier>>,
    user_manager: Option<Arc<UserManager>>,
    provider_manager: Option<Arc<ProviderConfigManager>>,
    tenant_api: Option<Arc<TenantApi>>,
    tenant_auth: HashMap<String, Arc<FirebaseAuth>>,
}

/// Configuration for a [`FirebaseAuth`] built outside the app registry.
pub struct FirebaseAuthBuilder {
    credentials: Credentials,
    emulator_host: Option<Option<String>>,
    timeout: Option<std::time::Duration>,
    token_source: Option<Arc<dyn TokenSource>>,
}

impl FirebaseAuthBuilder {
    /// Override the emulator probe; `None` disables emulator mode outright.
    pub fn emulator_host(mut self, host: Option<String>) -> Self {
        self.emulator_host = Some(host);
        self
    }

    /// Deadline applied to every HTTP request made through this facade.
    pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Custom OAuth2 bearer source, replacing the built-in resolution.
    pub fn token_source(mut self, source: Arc<dyn TokenSource>) -> Self {
        self.token_source = Some(source);
        self
    }

    pub fn build(self) -> Arc<FirebaseAuth> {
        let emulator_host = self.emulator_host.unwrap_or_else(probe_emulator_host);
        let token_source: Arc<dyn TokenSource> = match self.token_source {
            Some(source) => source,
            None if emulator_host.is_some() => Arc::new(EmulatorTokenSource),
            None => match JwtBearerSource::new(self.credentials.clone()) {
                Ok(source) => Arc::new(source),
                Err(_) => Arc::new(UnconfiguredTokenSource),
            },
        };
        Arc::new(FirebaseAuth {
            credentials: self.credentials,
            tenant_id: None,
            emulator_host,
            http: reqwest::blocking::Client::new(),
            token_source,
            timeout: self.timeout,
            state: Mutex::new(Components::default()),
        })
    }
}

/// Server-side Firebase Authentication operations for one project, or for one
/// tenant of a project when obtained through [`TenantManager`].
pub struct FirebaseAuth {
    credentials: Credentials,
    tenant_id: Option<String>,
    emulator_host: Option<String>,
    http: reqwest::blocking::Client,
    token_source: Arc<dyn TokenSource>,
    timeout: Option<std::time::Duration>,
    state: Mutex<Components>,
}

impl std::fmt::Debug for FirebaseAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseAuth")
            .field("credentials", &self.credentials)
            .field("tenant_id", &self.tenant_id)
            .field("emulator_host", &self.emulator_host)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl FirebaseAuth {
    /// Facade with environment-probed emulator detection.
    pub fn new(credentials: Credentials) -> Arc<FirebaseAuth> {
        Self::builder(credentials).build()
    }

    pub fn builder(credentials: Credentials) -> FirebaseAuthBuilder {
        FirebaseAuthBuilder {
            credentials,
            emulator_host: None,
            timeout: None,
            token_source: None,
        }
    }

    /// The facade of an [`App`], created on first lookup and memoized on the
    /// handle afterwards.
    pub fn for_app(app: &App) -> Arc<FirebaseAuth> {
        let mut cell = app.auth_cell().lock().expect("poisoned lock");
        if let Some(ref auth) = *cell {
            return auth.clone();
        }
        let auth = Self::builder(app.credentials().clone())
            .emulator_host(app.emulator_host().map(str::to_owned))
            .build();
        *cell = Some(auth.clone());
        auth
    }

    /// Child facade sharing this one's transport but scoped to a tenant.
    fn scoped_to_tenant(&self, tenant_id: String) -> Arc<FirebaseAuth> {
        Arc::new(FirebaseAuth {
            credentials: self.credentials.clone(),
            tenant_id: Some(tenant_id),
            emulator_host: self.emulator_host.clone(),
            http: self.http.clone(),
            token_source: self.token_source.clone(),
            timeout: self.timeout,
            state: Mutex::new(Components::default()),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.credentials.project_id
    }

    /// The tenant this facade is scoped to, if any.
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    fn emulated(&self) -> bool {
        self.emulator_host.is_some()
    }

    fn not_alive() -> FirebaseError {
        FirebaseError::internal("this auth instance is no longer alive; it was destroyed")
    }

    fn api_client(&self) -> ApiClient {
        ApiClient::new(
            self.http.clone(),
            self.token_source.clone(),
            self.credentials.project_id.clone(),
            self.tenant_id.clone(),
            self.emulator_host.clone(),
            self.timeout,
        )
    }

    /// One-way shutdown. Operations started before the flag flips complete
    /// normally; everything after fails before touching any component.
    pub fn destroy(&self) {
        let tenants: Vec<Arc<FirebaseAuth>> = {
            let mut state = self.state.lock().expect("poisoned lock");
            state.destroyed = true;
            state.tenant_auth.values().cloned().collect()
        };
        for tenant_auth in tenants {
            tenant_auth.destroy();
        }
    }

    // -- memoized components -------------------------------------------------

    fn token_factory(&self) -> Result<Arc<TokenFactory>> {
        let mut state = self.state.lock().expect("poisoned lock");
        if state.destroyed {
            return Err(Self::not_alive());
        }
        if let Some(ref factory) = state.token_factory {
            return Ok(factory.clone());
        }
        let signer = resolve_signer(&self.credentials, &self.token_source, &self.http, self.emulated())?;
        let factory = Arc::new(TokenFactory::new(signer, self.tenant_id.clone()));
        state.token_factory = Some(factory.clone());
        Ok(factory)
    }

    fn verifier(&self, kind: TokenKind) -> Result<Arc<TokenVerifier>> {
        let mut state = self.state.lock().expect("poisoned lock");
        if state.destroyed {
            return Err(Self::not_alive());
        }
        let cell = match kind {
            TokenKind::IdToken => &mut state.id_token_verifier,
            TokenKind::SessionCookie => &mut state.cookie_verifier,
        };
        if let Some(verifier) = cell.as_ref() {
            return Ok(verifier.clone());
        }
        let url = match kind {
            TokenKind::IdToken => ID_TOKEN_KEY_URL,
            TokenKind::SessionCookie => SESSION_COOKIE_KEY_URL,
        };
        let keys = Arc::new(KeyManager::new(self.http.clone(), url));
        let mut verifier =
            TokenVerifier::new(self.credentials.project_id.clone(), kind, keys, self.emulated());
        if let Some(ref tenant_id) = self.tenant_id {
            verifier = verifier.with_tenant(tenant_id.clone());
        }
        let verifier = Arc::new(verifier);
        *cell = Some(verifier.clone());
        Ok(verifier)
    }

    fn user_manager(&self) -> Result<Arc<UserManager>> {
        let mut state = self.state.lock().expect("poisoned lock");
        if state.destroyed {
            return Err(Self::not_alive());
        }
        if let Some(ref manager) = state.user_manager {
            return Ok(manager.clone());
        }
        let manager = Arc::new(UserManager::new(self.api_client()));
        state.user_manager = Some(manager.clone());
        Ok(manager)
    }

    fn provider_manager(&self) -> Result<Arc<ProviderConfigManager>> {
        let mut state = self.state.lock().expect("poisoned lock");
        if state.destroyed {
            return Err(Self::not_alive());
        }
        if let Some(ref manager) = state.provider_manager {
            return Ok(manager.clone());
        }
        let manager = Arc::new(ProviderConfigManager::new(self.api_client()));
        state.provider_manager = Some(manager.clone());
        Ok(manager)
    }

    fn tenant_api(&self) -> Result<Arc<TenantApi>> {
        if self.tenant_id.is_some() {
            return Err(FirebaseError::invalid_argument(
                "tenant management is only available on the project-level auth instance",
            ));
        }
        let mut state = self.state.lock().expect("poisoned lock");
        if state.destroyed {
            return Err(Self::not_alive());
        }
        if let Some(ref api) = state.tenant_api {
            return Ok(api.clone());
        }
        let api = Arc::new(TenantApi::new(self.api_client()));
        state.tenant_api = Some(api.clone());
        Ok(api)
    }

    // -- tokens --------------------------------------------------------------

    /// Mint a custom token for `uid` that a Firebase client SDK can exchange
    /// for an ID token.
    pub fn create_custom_token(&self, uid: &str) -> Result<String> {
        self.token_factory()?.create_custom_token(uid, None)
    }

    /// Like [`create_custom_token`](Self::create_custom_token), with extra
    /// developer claims carried into the resulting ID token.
    pub fn create_custom_token_with_claims(
        &self,
        uid: &str,
        claims: &Map<String, Value>,
    ) -> Result<String> {
        self.token_factory()?.create_custom_token(uid, Some(claims))
    }

    pub fn verify_id_token(&self, token: &str) -> Result<FirebaseToken> {
        self.verifier(TokenKind::IdToken)?.verify(token)
    }

    /// Verify and additionally check live user state for revocation and
    /// account disabling.
    pub fn verify_id_token_and_check_revoked(&self, token: &str) -> Result<FirebaseToken> {
        let decoded = self.verify_id_token(token)?;
        let user = self.user_manager()?.get_user(&decoded.uid)?;
        check_revoked(&user, &decoded, TokenKind::IdToken)?;
        Ok(decoded)
    }

    pub fn verify_session_cookie(&self, cookie: &str) -> Result<FirebaseToken> {
        self.verifier(TokenKind::SessionCookie)?.verify(cookie)
    }

    pub fn verify_session_cookie_and_check_revoked(&self, cookie: &str) -> Result<FirebaseToken> {
        let decoded = self.verify_session_cookie(cookie)?;
        let user = self.user_manager()?.get_user(&decoded.uid)?;
        check_revoked(&user, &decoded, TokenKind::SessionCookie)?;
        Ok(decoded)
    }

    /// Exchange a fresh ID token for a longer-lived session cookie.
    pub fn create_session_cookie(
        &self,
        id_token: &str,
        expires_in: chrono::Duration,
    ) -> Result<String> {
        self.user_manager()?.create_session_cookie(id_token, expires_in)
    }

    // -- users ---------------------------------------------------------------

    pub fn get_user(&self, uid: &str) -> Result<UserRecord> {
        self.user_manager()?.get_user(uid)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<UserRecord> {
        self.user_manager()?.get_user_by_email(email)
    }

    pub fn get_user_by_phone_number(&self, phone_number: &str) -> Result<UserRecord> {
        self.user_manager()?.get_user_by_phone_number(phone_number)
    }

    /// Look up at most 100 users by any mix of identifiers.
    pub fn get_users(&self, identifiers: &[UserIdentifier]) -> Result<GetUsersResult> {
        self.user_manager()?.get_users(identifiers)
    }

    /// Create the user and return its full record.
    pub fn create_user(&self, request: CreateUserRequest) -> Result<UserRecord> {
        let manager = self.user_manager()?;
        let uid = manager.create_user(&request)?;
        manager.get_user(&uid)
    }

    /// Apply the update and return the refreshed record.
    pub fn update_user(&self, request: UpdateUserRequest) -> Result<UserRecord> {
        let manager = self.user_manager()?;
        let uid = manager.update_user(request)?;
        manager.get_user(&uid)
    }

    pub fn delete_user(&self, uid: &str) -> Result<()> {
        self.user_manager()?.delete_user(uid)
    }

    /// Force-delete up to 1000 users; per-index failures are reported, not
    /// raised.
    pub fn delete_users(&self, uids: &[String]) -> Result<DeleteUsersResult> {
        self.user_manager()?.delete_users(uids)
    }

    /// One page of users; `max_results` within 1..=1000. The terminal page
    /// carries an empty `next_page_token`.
    pub fn list_users(&self, page_token: Option<&str>, max_results: u32) -> Result<Page<UserRecord>> {
        self.user_manager()?.list_users(page_token, max_results)
    }

    /// Lazily iterate every user, fetching one page at a time.
    pub fn iterate_users(&self, page_size: u32) -> Result<impl Iterator<Item = Result<UserRecord>>> {
        let manager = self.user_manager()?;
        Ok(crate::rest::pages::PagedIter::new(move |token| {
            manager.list_users(token, page_size)
        }))
    }

    /// Bulk import of up to 1000 users; a hash configuration is required
    /// exactly when password hashes are present.
    pub fn import_users(
        &self,
        records: &[UserImportRecord],
        hash: Option<&UserImportHash>,
    ) -> Result<UserImportResult> {
        self.user_manager()?.import_users(records, hash)
    }

    /// Replace the user's custom claims; `None` removes all of them. The new
    /// claims appear in tokens issued afterwards.
    pub fn set_custom_user_claims(&self, uid: &str, claims: Option<Map<String, Value>>) -> Result<()> {
        self.user_manager()?.set_custom_user_claims(uid, claims)
    }

    /// Invalidate all refresh tokens issued to the user before now. The
    /// revocation mark has whole-second resolution.
    pub fn revoke_refresh_tokens(&self, uid: &str) -> Result<()> {
        self.user_manager()?
            .revoke_refresh_tokens(uid, chrono::Utc::now().timestamp())
    }

    // -- email action links --------------------------------------------------

    pub fn generate_email_verification_link(
        &self,
        email: &str,
        settings: Option<&ActionCodeSettings>,
    ) -> Result<String> {
        self.user_manager()?
            .generate_email_action_link(EmailActionType::VerifyEmail, email, settings)
    }

    pub fn generate_password_reset_link(
        &self,
        email: &str,
        settings: Option<&ActionCodeSettings>,
    ) -> Result<String> {
        self.user_manager()?
            .generate_email_action_link(EmailActionType::PasswordReset, email, settings)
    }

    /// Sign-in links require settings with a continue URL.
    pub fn generate_sign_in_with_email_link(
        &self,
        email: &str,
        settings: &ActionCodeSettings,
    ) -> Result<String> {
        self.user_manager()?
            .generate_email_action_link(EmailActionType::EmailSignin, email, Some(settings))
    }

    // -- provider configs ----------------------------------------------------

    pub fn create_oidc_provider_config(
        &self,
        request: OidcProviderCreateRequest,
    ) -> Result<OidcProviderConfig> {
        self.provider_manager()?.create_oidc(request)
    }

    pub fn get_oidc_provider_config(&self, provider_id: &str) -> Result<OidcProviderConfig> {
        self.provider_manager()?.get_oidc(provider_id)
    }

    pub fn update_oidc_provider_config(
        &self,
        request: OidcProviderUpdateRequest,
    ) -> Result<OidcProviderConfig> {
        self.provider_manager()?.update_oidc(request)
    }

    pub fn delete_oidc_provider_config(&self, provider_id: &str) -> Result<()> {
        self.provider_manager()?.delete_oidc(provider_id)
    }

    pub fn list_oidc_provider_configs(
        &self,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<Page<OidcProviderConfig>> {
        self.provider_manager()?.list_oidc(page_token, page_size)
    }

    pub fn create_saml_provider_config(
        &self,
        request: SamlProviderCreateRequest,
    ) -> Result<SamlProviderConfig> {
        self.provider_manager()?.create_saml(request)
    }

    pub fn get_saml_provider_config(&self, provider_id: &str) -> Result<SamlProviderConfig> {
        self.provider_manager()?.get_saml(provider_id)
    }

    pub fn update_saml_provider_config(
        &self,
        request: SamlProviderUpdateRequest,
    ) -> Result<SamlProviderConfig> {
        self.provider_manager()?.update_saml(request)
    }

    pub fn delete_saml_provider_config(&self, provider_id: &str) -> Result<()> {
        self.provider_manager()?.delete_saml(provider_id)
    }

    pub fn list_saml_provider_configs(
        &self,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<Page<SamlProviderConfig>> {
        self.provider_manager()?.list_saml(page_token, page_size)
    }

    pub fn iterate_oidc_provider_configs(
        &self,
        page_size: u32,
    ) -> Result<impl Iterator<Item = Result<OidcProviderConfig>>> {
        let manager = self.provider_manager()?;
        Ok(crate::rest::pages::PagedIter::new(move |token| {
            manager.list_oidc(token, page_size)
        }))
    }

    pub fn iterate_saml_provider_configs(
        &self,
        page_size: u32,
    ) -> Result<impl Iterator<Item = Result<SamlProviderConfig>>> {
        let manager = self.provider_manager()?;
        Ok(crate::rest::pages::PagedIter::new(move |token| {
            manager.list_saml(token, page_size)
        }))
    }

    // -- tenants -------------------------------------------------------------

    /// Tenant administration and per-tenant auth routing. Only available on
    /// the project-level facade.
    pub fn tenant_manager(&self) -> Result<TenantManager<'_>> {
        // Surfaces the destroyed/tenant-scope failures eagerly.
        self.tenant_api()?;
        Ok(TenantManager { auth: self })
    }
}

/// Tenant administration plus routing to tenant-scoped auth facades.
pub struct TenantManager<'a> {
    auth: &'a FirebaseAuth,
}

impl<'a> TenantManager<'a> {
    /// The auth facade for one tenant. Its token factory, verifiers and user
    /// manager all carry the tenant id; the mapping is memoized per id.
    pub fn auth_for_tenant(&self, tenant_id: &str) -> Result<Arc<FirebaseAuth>> {
        validate_tenant_id(tenant_id)?;
        let mut state = self.auth.state.lock().expect("poisoned lock");
        if state.destroyed {
            return Err(FirebaseAuth::not_alive());
        }
        if let Some(auth) = state.tenant_auth.get(tenant_id) {
            return Ok(auth.clone());
        }
        let scoped = self.auth.scoped_to_tenant(tenant_id.to_owned());
        state.tenant_auth.insert(tenant_id.to_owned(), scoped.clone());
        Ok(scoped)
    }

    pub fn create_tenant(&self, request: TenantCreateRequest) -> Result<Tenant> {
        self.auth.tenant_api()?.create_tenant(request)
    }

    pub fn get_tenant(&self, tenant_id: &str) -> Result<Tenant> {
        self.auth.tenant_api()?.get_tenant(tenant_id)
    }

    pub fn update_tenant(&self, request: TenantUpdateRequest) -> Result<Tenant> {
        self.auth.tenant_api()?.update_tenant(request)
    }

    pub fn delete_tenant(&self, tenant_id: &str) -> Result<()> {
        self.auth.tenant_api()?.delete_tenant(tenant_id)
    }

    pub fn list_tenants(&self, page_token: Option<&str>, page_size: u32) -> Result<Page<Tenant>> {
        self.auth.tenant_api()?.list_tenants(page_token, page_size)
    }

    pub fn iterate_tenants(&self, page_size: u32) -> Result<impl Iterator<Item = Result<Tenant>>> {
        let api = self.auth.tenant_api()?;
        Ok(crate::rest::pages::PagedIter::new(move |token| {
            api.list_tenants(token, page_size)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AuthErrorCode;
    use crate::jwt::b64url_encode;
    use serde_json::json;

    fn emulated_auth() -> Arc<FirebaseAuth> {
        FirebaseAuth::builder(Credentials::from_project_id("demo-project"))
            .emulator_host(Some("localhost:9099".to_owned()))
            .build()
    }

    fn unsigned_token(claims: serde_json::Value) -> String {
        let header = json!({"alg": "RS256", "typ": "JWT", "kid": "key-1"});
        format!(
            "{}.{}.",
            b64url_encode(&serde_json::to_vec(&header).unwrap()),
            b64url_encode(&serde_json::to_vec(&claims).unwrap())
        )
    }

    fn id_claims(tenant: Option<&str>) -> serde_json::Value {
        let now = chrono::Utc::now().timestamp();
        let mut claims = json!({
            "iss": "https://securetoken.google.com/demo-project",
            "aud": "demo-project",
            "sub": "user-1",
            "iat": now - 10,
            "exp": now + 3590,
        });
        if let Some(tenant) = tenant {
            claims["firebase"] = json!({"tenant": tenant});
        }
        claims
    }

    #[test]
    fn minted_custom_token_is_rejected_by_id_token_verification() {
        let auth = emulated_auth();
        let token = auth.create_custom_token("alice").unwrap();
        assert_eq!(token.split('.').count(), 3);
        let err = auth.verify_id_token(&token).unwrap_err();
        assert!(err.message().contains("custom token"), "{}", err.message());
    }

    #[test]
    fn emulated_verification_accepts_unsigned_tokens() {
        let auth = emulated_auth();
        let decoded = auth.verify_id_token(&unsigned_token(id_claims(None))).unwrap();
        assert_eq!(decoded.uid, "user-1");
    }

    #[test]
    fn destroy_is_monotone_and_fails_fast() {
        let auth = emulated_auth();
        auth.create_custom_token("alice").unwrap();
        auth.destroy();
        auth.destroy();
        for err in [
            auth.create_custom_token("alice").unwrap_err(),
            auth.verify_id_token("x.y.z").unwrap_err(),
            auth.get_user("alice").unwrap_err(),
            auth.list_users(None, 10).unwrap_err(),
        ] {
            assert!(err.message().contains("no longer alive"), "{}", err.message());
        }
    }

    #[test]
    fn components_are_memoized() {
        let auth = emulated_auth();
        let first = auth.token_factory().unwrap();
        let second = auth.token_factory().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        let first = auth.verifier(TokenKind::IdToken).unwrap();
        let second = auth.verifier(TokenKind::IdToken).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn tenant_facades_are_memoized_and_scoped() {
        let auth = emulated_auth();
        let manager = auth.tenant_manager().unwrap();
        let t1 = manager.auth_for_tenant("t-1").unwrap();
        let again = manager.auth_for_tenant("t-1").unwrap();
        assert!(Arc::ptr_eq(&t1, &again));
        assert_eq!(t1.tenant_id(), Some("t-1"));

        // The tenant id ends up in minted custom tokens.
        let token = t1.create_custom_token("alice").unwrap();
        let payload: Map<String, Value> = serde_json::from_slice(
            &crate::jwt::b64url_decode(token.split('.').nth(1).unwrap()).unwrap(),
        )
        .unwrap();
        assert_eq!(payload["tenant_id"], json!("t-1"));
    }

    #[test]
    fn tenant_scoped_verification_enforces_the_tenant() {
        let auth = emulated_auth();
        let manager = auth.tenant_manager().unwrap();
        let t2 = manager.auth_for_tenant("T2").unwrap();

        let err = t2.verify_id_token(&unsigned_token(id_claims(Some("T1")))).unwrap_err();
        assert_eq!(err.code(), Some(AuthErrorCode::TenantIdMismatch));

        let decoded = t2.verify_id_token(&unsigned_token(id_claims(Some("T2")))).unwrap();
        assert_eq!(decoded.tenant.as_deref(), Some("T2"));
    }

    #[test]
    fn tenant_management_is_refused_on_tenant_scoped_facades() {
        let auth = emulated_auth();
        let t1 = auth.tenant_manager().unwrap().auth_for_tenant("t-1").unwrap();
        assert!(t1.tenant_manager().is_err());
    }

    #[test]
    fn destroying_the_parent_destroys_tenant_facades() {
        let auth = emulated_auth();
        let t1 = auth.tenant_manager().unwrap().auth_for_tenant("t-1").unwrap();
        auth.destroy();
        let err = t1.create_custom_token("alice").unwrap_err();
        assert!(err.message().contains("no longer alive"));
    }

    #[test]
    fn validation_failures_surface_before_any_network_use() {
        // No emulator, no credentials: any request doing I/O would fail with
        // an unauthenticated bearer error instead of the validation error.
        let auth = FirebaseAuth::builder(Credentials::from_project_id("p"))
            .emulator_host(None)
            .build();
        assert!(auth.create_session_cookie("", chrono::Duration::hours(1)).is_err());
        assert!(auth.list_users(Some(""), 10).unwrap_err().message().contains("page token"));
        assert!(auth.get_user("").is_err());
        assert!(auth
            .delete_users(&(0..1001).map(|i| i.to_string()).collect::<Vec<_>>())
            .is_err());
    }
}
