#![cfg_attr(feature = "external_doc", doc = include_str!("../readme.md"))]
//! Server-side Firebase Authentication administration.
//!
//! The crate is embedded by trusted backend services to mint custom
//! authentication tokens, verify Firebase-issued ID tokens and session
//! cookies, and administer identity data (users, OIDC/SAML provider configs,
//! tenants) through the Google Identity Toolkit REST API.
//!
//! Start from an [`App`] handle or build a [`FirebaseAuth`] facade directly:
//!
//! ```no_run
//! use firebase_auth_admin::{credentials::Credentials, App, FirebaseAuth};
//!
//! # fn main() -> firebase_auth_admin::errors::Result<()> {
//! let credentials = Credentials::from_file("firebase-service-account.json")?;
//! let app = App::initialize_default(credentials)?;
//! let auth = FirebaseAuth::for_app(&app);
//!
//! let token = auth.create_custom_token("some-uid")?;
//! let decoded = auth.verify_id_token(&token);
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod auth;
pub mod credentials;
pub mod errors;
pub mod jwt;
pub mod keys;
pub mod oauth;
pub mod rest;
pub mod signer;
pub mod tokens;

// Forward declarations
pub use app::App;
pub use auth::{FirebaseAuth, FirebaseAuthBuilder, TenantManager};
pub use credentials::Credentials;
pub use errors::{AuthErrorCode, ErrorKind, FirebaseError};
pub use oauth::TokenSource;
pub use rest::pages::Page;
pub use rest::providers::{
    OidcProviderConfig, OidcProviderCreateRequest, OidcProviderUpdateRequest, SamlProviderConfig,
    SamlProviderCreateRequest, SamlProviderUpdateRequest,
};
pub use rest::tenants::{Tenant, TenantCreateRequest, TenantUpdateRequest};
pub use rest::users::{
    ActionCodeSettings, AttributeOp, CreateUserRequest, DeleteUsersResult, EmailActionType,
    GetUsersResult, UpdateUserRequest, UserIdentifier, UserImportHash, UserImportRecord,
    UserImportResult, UserRecord,
};
pub use tokens::{FirebaseToken, TokenKind, TokenVerifier};
