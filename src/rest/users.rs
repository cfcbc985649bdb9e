//! # Firebase Auth API - User management
//!
//! Typed operations over `/v1/projects/<id>/accounts*`: lookups, create /
//! update / delete, batch variants, listing, imports, session cookies and
//! out-of-band email action links. All client-side limits are enforced here,
//! before any request leaves the process.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::pages::{validate_page_token, Page};
use super::ApiClient;
use crate::errors::{AuthErrorCode, ErrorKind, FirebaseError, Result};
use crate::jwt::{validate_developer_claims, validate_uid};

pub(crate) const MAX_LIST_USERS_RESULTS: u32 = 1000;
pub(crate) const MAX_GET_ACCOUNTS_BATCH: usize = 100;
pub(crate) const MAX_DELETE_ACCOUNTS_BATCH: usize = 1000;
pub(crate) const MAX_IMPORT_USERS: usize = 1000;

const MIN_SESSION_COOKIE_SECONDS: i64 = 300;
const MAX_SESSION_COOKIE_SECONDS: i64 = 14 * 24 * 3600;

fn validate_email(email: &str) -> Result<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    };
    if !valid {
        return Err(FirebaseError::invalid_argument(format!("malformed email address '{}'", email))
            .with_code(AuthErrorCode::InvalidEmail));
    }
    Ok(())
}

fn validate_phone_number(phone: &str) -> Result<()> {
    if !phone.starts_with('+') || phone.len() < 2 {
        return Err(FirebaseError::invalid_argument(
            "phone number must be a non-empty E.164 identifier starting with '+'",
        )
        .with_code(AuthErrorCode::InvalidPhoneNumber));
    }
    Ok(())
}

fn validate_photo_url(url: &str) -> Result<()> {
    reqwest::Url::parse(url)
        .map_err(|e| {
            FirebaseError::invalid_argument(format!("photo URL '{}' is not an absolute URL", url))
                .with_source(e)
        })
        .map(|_| ())
}

fn validate_password(password: &str) -> Result<()> {
    if password.len() < 6 {
        return Err(
            FirebaseError::invalid_argument("password must be at least 6 characters long")
                .with_code(AuthErrorCode::InvalidPassword),
        );
    }
    Ok(())
}

/// A federated identity linked to a user account.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderUserInfo {
    pub provider_id: String,
    pub raw_id: Option<String>,
    pub federated_id: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct UserDTO {
    local_id: String,
    email: Option<String>,
    email_verified: bool,
    display_name: Option<String>,
    photo_url: Option<String>,
    phone_number: Option<String>,
    disabled: bool,
    tenant_id: Option<String>,
    provider_user_info: Vec<ProviderUserInfo>,
    custom_attributes: Option<String>,
    valid_since: Option<String>,
    created_at: Option<String>,
    last_login_at: Option<String>,
    last_refresh_at: Option<String>,
}

/// Immutable snapshot of one user account. All timestamps are milliseconds
/// since the epoch; `tokens_valid_after_timestamp` is second-truncated
/// because the backend records revocations in whole seconds.
#[derive(Debug, Default, Clone)]
pub struct UserRecord {
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub phone_number: Option<String>,
    pub disabled: bool,
    pub tenant_id: Option<String>,
    pub provider_data: Vec<ProviderUserInfo>,
    pub custom_claims: Option<Map<String, Value>>,
    pub tokens_valid_after_timestamp: Option<i64>,
    pub creation_timestamp: Option<i64>,
    pub last_sign_in_timestamp: Option<i64>,
    pub last_refresh_timestamp: Option<i64>,
}

fn unexpected(detail: impl Into<String>) -> FirebaseError {
    FirebaseError::internal(detail).with_code(AuthErrorCode::UnexpectedResponse)
}

fn parse_epoch(field: &str, value: &str) -> Result<i64> {
    value
        .parse::<i64>()
        .map_err(|_| unexpected(format!("user record field '{}' is not numeric", field)))
}

impl UserRecord {
    fn from_dto(dto: UserDTO) -> Result<Self> {
        let custom_claims = match dto.custom_attributes.as_deref() {
            None | Some("") => None,
            Some(raw) => {
                let claims: Map<String, Value> = serde_json::from_str(raw)
                    .map_err(|_| unexpected("user record carries malformed custom attributes"))?;
                if claims.is_empty() {
                    None
                } else {
                    Some(claims)
                }
            }
        };
        let tokens_valid_after_timestamp = match dto.valid_since.as_deref() {
            None | Some("") => None,
            Some(seconds) => Some(parse_epoch("validSince", seconds)? * 1000),
        };
        let last_refresh_timestamp = match dto.last_refresh_at.as_deref() {
            None | Some("") => None,
            Some(iso) => Some(
                DateTime::parse_from_rfc3339(iso)
                    .map_err(|_| unexpected("user record field 'lastRefreshAt' is not a timestamp"))?
                    .timestamp_millis(),
            ),
        };
        Ok(UserRecord {
            uid: dto.local_id,
            email: dto.email,
            email_verified: dto.email_verified,
            display_name: dto.display_name,
            photo_url: dto.photo_url,
            phone_number: dto.phone_number,
            disabled: dto.disabled,
            tenant_id: dto.tenant_id,
            provider_data: dto.provider_user_info,
            custom_claims,
            tokens_valid_after_timestamp,
            creation_timestamp: dto.created_at.as_deref().map(|v| parse_epoch("createdAt", v)).transpose()?,
            last_sign_in_timestamp: dto.last_login_at.as_deref().map(|v| parse_epoch("lastLoginAt", v)).transpose()?,
            last_refresh_timestamp,
        })
    }

    pub fn has_provider(&self, provider_id: &str) -> bool {
        self.provider_data.iter().any(|p| p.provider_id == provider_id)
    }
}

/// One way of naming a user account in a batched lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIdentifier {
    Uid(String),
    Email(String),
    PhoneNumber(String),
    Provider { provider_id: String, uid: String },
}

impl UserIdentifier {
    fn validate(&self) -> Result<()> {
        match self {
            UserIdentifier::Uid(uid) => validate_uid(uid),
            UserIdentifier::Email(email) => validate_email(email),
            UserIdentifier::PhoneNumber(phone) => validate_phone_number(phone),
            UserIdentifier::Provider { provider_id, uid } => {
                if provider_id.is_empty() || uid.is_empty() {
                    return Err(FirebaseError::invalid_argument(
                        "provider identifiers need a provider id and a provider uid",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Whether `record` is the account this identifier names.
    pub fn matches(&self, record: &UserRecord) -> bool {
        match self {
            UserIdentifier::Uid(uid) => record.uid == *uid,
            UserIdentifier::Email(email) => record.email.as_deref() == Some(email.as_str()),
            UserIdentifier::PhoneNumber(phone) => {
                record.phone_number.as_deref() == Some(phone.as_str())
            }
            UserIdentifier::Provider { provider_id, uid } => record.provider_data.iter().any(|p| {
                p.provider_id == *provider_id && p.raw_id.as_deref() == Some(uid.as_str())
            }),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct FederatedUserId {
    provider_id: String,
    raw_id: String,
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct AccountsLookupRequest {
    #[serde(rename = "localId", skip_serializing_if = "Vec::is_empty")]
    local_id: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    email: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    phone_number: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    federated_user_id: Vec<FederatedUserId>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct AccountsLookupResponse {
    users: Option<Vec<UserDTO>>,
}

/// Outcome of a batched lookup: the found records plus every identifier that
/// matched none of them.
#[derive(Debug, Default)]
pub struct GetUsersResult {
    pub users: Vec<UserRecord>,
    pub not_found: Vec<UserIdentifier>,
}

/// Properties of a user account to create.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[serde(rename = "localId", skip_serializing_if = "Option::is_none")]
    uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    disabled: Option<bool>,
}

impl CreateUserRequest {
    pub fn new() -> Self {
        CreateUserRequest::default()
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_email_verified(mut self, verified: bool) -> Self {
        self.email_verified = Some(verified);
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_photo_url(mut self, url: impl Into<String>) -> Self {
        self.photo_url = Some(url.into());
        self
    }

    pub fn with_phone_number(mut self, phone: impl Into<String>) -> Self {
        self.phone_number = Some(phone.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = Some(disabled);
        self
    }

    fn validate(&self) -> Result<()> {
        if let Some(ref uid) = self.uid {
            validate_uid(uid)?;
        }
        if let Some(ref email) = self.email {
            validate_email(email)?;
        }
        if let Some(ref phone) = self.phone_number {
            validate_phone_number(phone)?;
        }
        if let Some(ref url) = self.photo_url {
            validate_photo_url(url)?;
        }
        if let Some(ref password) = self.password {
            validate_password(password)?;
        }
        Ok(())
    }
}

/// Set a new value or delete the current one.
#[derive(Debug, Clone)]
pub enum AttributeOp<T> {
    Set(T),
    Delete,
}

/// Properties of a user account to change. Absent fields stay untouched.
#[derive(Debug, Default, Clone)]
pub struct UpdateUserRequest {
    uid: String,
    email: Option<String>,
    password: Option<String>,
    email_verified: Option<bool>,
    disabled: Option<bool>,
    display_name: Option<AttributeOp<String>>,
    photo_url: Option<AttributeOp<String>>,
    phone_number: Option<AttributeOp<String>>,
    unlink_providers: Vec<String>,
    // Outer option: whether to touch claims at all. Inner: None clears them.
    custom_claims: Option<Option<Map<String, Value>>>,
    valid_since: Option<i64>,
}

impl UpdateUserRequest {
    pub fn new(uid: impl Into<String>) -> Self {
        UpdateUserRequest {
            uid: uid.into(),
            ..UpdateUserRequest::default()
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_email_verified(mut self, verified: bool) -> Self {
        self.email_verified = Some(verified);
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = Some(disabled);
        self
    }

    pub fn with_display_name(mut self, op: AttributeOp<String>) -> Self {
        self.display_name = Some(op);
        self
    }

    pub fn with_photo_url(mut self, op: AttributeOp<String>) -> Self {
        self.photo_url = Some(op);
        self
    }

    pub fn with_phone_number(mut self, op: AttributeOp<String>) -> Self {
        self.phone_number = Some(op);
        self
    }

    /// Unlink the named federated providers from the account.
    pub fn with_providers_unlinked(mut self, provider_ids: Vec<String>) -> Self {
        self.unlink_providers = provider_ids;
        self
    }

    /// Replace all custom claims; `None` removes them.
    pub fn with_custom_claims(mut self, claims: Option<Map<String, Value>>) -> Self {
        self.custom_claims = Some(claims);
        self
    }

    pub(crate) fn with_valid_since(mut self, seconds: i64) -> Self {
        self.valid_since = Some(seconds);
        self
    }

    fn into_body(self) -> Result<UpdateAccountBody> {
        validate_uid(&self.uid)?;
        if let Some(ref email) = self.email {
            validate_email(email)?;
        }
        if let Some(ref password) = self.password {
            validate_password(password)?;
        }

        let mut delete_attribute: Vec<&'static str> = Vec::new();
        let mut delete_provider: Vec<String> = Vec::new();

        let display_name = match self.display_name {
            Some(AttributeOp::Set(name)) => Some(name),
            Some(AttributeOp::Delete) => {
                delete_attribute.push("DISPLAY_NAME");
                None
            }
            None => None,
        };
        let photo_url = match self.photo_url {
            Some(AttributeOp::Set(url)) => {
                validate_photo_url(&url)?;
                Some(url)
            }
            Some(AttributeOp::Delete) => {
                delete_attribute.push("PHOTO_URL");
                None
            }
            None => None,
        };
        let phone_deleted = matches!(self.phone_number, Some(AttributeOp::Delete));
        if phone_deleted && self.unlink_providers.iter().any(|p| p == "phone") {
            // Both spellings of "unlink phone" in one request is ambiguous and
            // rejected outright.
            return Err(FirebaseError::invalid_argument(
                "the phone number was deleted and 'phone' is listed in the providers to unlink; \
                 use only one of the two",
            ));
        }
        let phone_number = match self.phone_number {
            Some(AttributeOp::Set(phone)) => {
                validate_phone_number(&phone)?;
                Some(phone)
            }
            Some(AttributeOp::Delete) => {
                delete_provider.push("phone".to_owned());
                None
            }
            None => None,
        };
        for provider in self.unlink_providers {
            if provider.is_empty() {
                return Err(FirebaseError::invalid_argument("provider ids to unlink must not be empty"));
            }
            delete_provider.push(provider);
        }

        let custom_attributes = match self.custom_claims {
            None => None,
            Some(None) => Some("{}".to_owned()),
            Some(Some(claims)) => {
                validate_developer_claims(&claims)?;
                Some(serde_json::to_string(&claims)?)
            }
        };

        Ok(UpdateAccountBody {
            local_id: self.uid,
            email: self.email,
            password: self.password,
            email_verified: self.email_verified,
            disable_user: self.disabled,
            display_name,
            photo_url,
            phone_number,
            custom_attributes,
            valid_since: self.valid_since,
            delete_attribute,
            delete_provider,
        })
    }
}

#[derive(Serialize, Default, Debug)]
#[serde(rename_all = "camelCase")]
struct UpdateAccountBody {
    #[serde(rename = "localId")]
    local_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    disable_user: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_attributes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    valid_since: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    delete_attribute: Vec<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    delete_provider: Vec<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct LocalIdResponse {
    local_id: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct ListUsersResponse {
    users: Option<Vec<UserDTO>>,
    next_page_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchDeleteRequest<'a> {
    local_ids: &'a [String],
    force: bool,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct BatchDeleteResponse {
    errors: Option<Vec<BatchErrorInfo>>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct BatchErrorInfo {
    index: usize,
    message: String,
}

/// Per-index failure of a batch operation.
#[derive(Debug, Clone)]
pub struct BatchError {
    pub index: usize,
    pub message: String,
}

/// Outcome of a batch delete.
#[derive(Debug, Default)]
pub struct DeleteUsersResult {
    pub success_count: usize,
    pub failure_count: usize,
    pub errors: Vec<BatchError>,
}

/// Outcome of a bulk import.
#[derive(Debug, Default)]
pub struct UserImportResult {
    pub success_count: usize,
    pub failure_count: usize,
    pub errors: Vec<BatchError>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct UploadAccountResponse {
    error: Option<Vec<BatchErrorInfo>>,
}

/// One account in a bulk import.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserImportRecord {
    #[serde(rename = "localId")]
    uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    salt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_attributes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_login_at: Option<i64>,
}

impl UserImportRecord {
    pub fn new(uid: impl Into<String>) -> Result<Self> {
        let uid = uid.into();
        validate_uid(&uid)?;
        Ok(UserImportRecord {
            uid,
            ..UserImportRecord::default()
        })
    }

    pub fn with_email(mut self, email: impl Into<String>, verified: bool) -> Result<Self> {
        let email = email.into();
        validate_email(&email)?;
        self.email = Some(email);
        self.email_verified = Some(verified);
        Ok(self)
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_photo_url(mut self, url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        validate_photo_url(&url)?;
        self.photo_url = Some(url);
        Ok(self)
    }

    pub fn with_phone_number(mut self, phone: impl Into<String>) -> Result<Self> {
        let phone = phone.into();
        validate_phone_number(&phone)?;
        self.phone_number = Some(phone);
        Ok(self)
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = Some(disabled);
        self
    }

    pub fn with_password_hash(mut self, hash: &[u8]) -> Self {
        self.password_hash = Some(websafe_base64(hash));
        self
    }

    pub fn with_password_salt(mut self, salt: &[u8]) -> Self {
        self.salt = Some(websafe_base64(salt));
        self
    }

    pub fn with_custom_claims(mut self, claims: &Map<String, Value>) -> Result<Self> {
        validate_developer_claims(claims)?;
        self.custom_attributes = Some(serde_json::to_string(claims)?);
        Ok(self)
    }

    pub fn with_created_at(mut self, epoch_millis: i64) -> Self {
        self.created_at = Some(epoch_millis);
        self
    }

    pub fn with_last_login_at(mut self, epoch_millis: i64) -> Self {
        self.last_login_at = Some(epoch_millis);
        self
    }

    pub fn has_password_hash(&self) -> bool {
        self.password_hash.is_some()
    }
}

fn websafe_base64(bytes: &[u8]) -> String {
    use base64::engine::general_purpose::URL_SAFE;
    use base64::Engine;
    URL_SAFE.encode(bytes)
}

/// Hashing configuration for imported password hashes, serialized into the
/// top level of the batch create request.
#[derive(Debug, Clone)]
pub enum UserImportHash {
    Bcrypt,
    StandardScrypt {
        memory_cost: i64,
        parallelization: i64,
        block_size: i64,
        derived_key_length: i64,
    },
    /// The Firebase-modified scrypt used by exported Firebase accounts.
    Scrypt {
        key: Vec<u8>,
        salt_separator: Vec<u8>,
        rounds: i64,
        memory_cost: i64,
    },
    HmacSha256 { key: Vec<u8> },
    HmacSha512 { key: Vec<u8> },
    Md5 { rounds: i64 },
    Sha1 { rounds: i64 },
    Sha256 { rounds: i64 },
    Sha512 { rounds: i64 },
    Pbkdf2Sha256 { rounds: i64 },
}

impl UserImportHash {
    /// Fields merged into the `accounts:batchCreate` request body.
    fn wire_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        let mut set = |k: &str, v: Value| {
            fields.insert(k.to_owned(), v);
        };
        match self {
            UserImportHash::Bcrypt => set("hashAlgorithm", Value::from("BCRYPT")),
            UserImportHash::StandardScrypt {
                memory_cost,
                parallelization,
                block_size,
                derived_key_length,
            } => {
                set("hashAlgorithm", Value::from("STANDARD_SCRYPT"));
                set("cpuMemCost", Value::from(*memory_cost));
                set("parallelization", Value::from(*parallelization));
                set("blockSize", Value::from(*block_size));
                set("dkLen", Value::from(*derived_key_length));
            }
            UserImportHash::Scrypt {
                key,
                salt_separator,
                rounds,
                memory_cost,
            } => {
                set("hashAlgorithm", Value::from("SCRYPT"));
                set("signerKey", Value::from(websafe_base64(key)));
                set("saltSeparator", Value::from(websafe_base64(salt_separator)));
                set("rounds", Value::from(*rounds));
                set("memoryCost", Value::from(*memory_cost));
            }
            UserImportHash::HmacSha256 { key } => {
                set("hashAlgorithm", Value::from("HMAC_SHA256"));
                set("signerKey", Value::from(websafe_base64(key)));
            }
            UserImportHash::HmacSha512 { key } => {
                set("hashAlgorithm", Value::from("HMAC_SHA512"));
                set("signerKey", Value::from(websafe_base64(key)));
            }
            UserImportHash::Md5 { rounds } => {
                set("hashAlgorithm", Value::from("MD5"));
                set("rounds", Value::from(*rounds));
            }
            UserImportHash::Sha1 { rounds } => {
                set("hashAlgorithm", Value::from("SHA1"));
                set("rounds", Value::from(*rounds));
            }
            UserImportHash::Sha256 { rounds } => {
                set("hashAlgorithm", Value::from("SHA256"));
                set("rounds", Value::from(*rounds));
            }
            UserImportHash::Sha512 { rounds } => {
                set("hashAlgorithm", Value::from("SHA512"));
                set("rounds", Value::from(*rounds));
            }
            UserImportHash::Pbkdf2Sha256 { rounds } => {
                set("hashAlgorithm", Value::from("PBKDF2_SHA256"));
                set("rounds", Value::from(*rounds));
            }
        }
        fields
    }
}

/// Email action link flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailActionType {
    VerifyEmail,
    EmailSignin,
    PasswordReset,
}

impl EmailActionType {
    fn request_type(&self) -> &'static str {
        match self {
            EmailActionType::VerifyEmail => "VERIFY_EMAIL",
            EmailActionType::EmailSignin => "EMAIL_SIGNIN",
            EmailActionType::PasswordReset => "PASSWORD_RESET",
        }
    }
}

/// Where an email action link sends the user afterwards.
#[derive(Debug, Default, Clone)]
pub struct ActionCodeSettings {
    pub url: Option<String>,
    pub handle_code_in_app: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendOobCodeRequest<'a> {
    request_type: &'static str,
    email: &'a str,
    return_oob_link: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    continue_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    can_handle_code_in_app: Option<bool>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct SendOobCodeResponse {
    oob_link: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionCookieRequest<'a> {
    id_token: &'a str,
    valid_duration: i64,
}

#[derive(Deserialize)]
struct CreateSessionCookieResponse {
    #[serde(rename = "sessionCookie")]
    session_cookie: String,
}

/// User management operations of one (optionally tenant-scoped) project.
pub(crate) struct UserManager {
    client: ApiClient,
}

impl UserManager {
    pub(crate) fn new(client: ApiClient) -> Self {
        UserManager { client }
    }

    fn lookup_one(&self, request: &AccountsLookupRequest, description: String) -> Result<UserRecord> {
        let response: AccountsLookupResponse =
            self.client
                .post_json(&self.client.v1("/accounts:lookup"), request, "lookup user")?;
        let dto = response
            .users
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| {
                FirebaseError::new(ErrorKind::NotFound, format!("no user record found for {}", description))
                    .with_code(AuthErrorCode::UserNotFound)
            })?;
        UserRecord::from_dto(dto)
    }

    pub(crate) fn get_user(&self, uid: &str) -> Result<UserRecord> {
        validate_uid(uid)?;
        let request = AccountsLookupRequest {
            local_id: vec![uid.to_owned()],
            ..AccountsLookupRequest::default()
        };
        self.lookup_one(&request, format!("uid '{}'", uid))
    }

    pub(crate) fn get_user_by_email(&self, email: &str) -> Result<UserRecord> {
        validate_email(email)?;
        let request = AccountsLookupRequest {
            email: vec![email.to_owned()],
            ..AccountsLookupRequest::default()
        };
        self.lookup_one(&request, format!("email '{}'", email))
    }

    pub(crate) fn get_user_by_phone_number(&self, phone: &str) -> Result<UserRecord> {
        validate_phone_number(phone)?;
        let request = AccountsLookupRequest {
            phone_number: vec![phone.to_owned()],
            ..AccountsLookupRequest::default()
        };
        self.lookup_one(&request, format!("phone number '{}'", phone))
    }

    /// Batched lookup; at most 100 identifiers of any mix of kinds.
    pub(crate) fn get_users(&self, identifiers: &[UserIdentifier]) -> Result<GetUsersResult> {
        if identifiers.is_empty() {
            return Ok(GetUsersResult::default());
        }
        if identifiers.len() > MAX_GET_ACCOUNTS_BATCH {
            return Err(FirebaseError::invalid_argument(format!(
                "at most {} identifiers may be looked up at once",
                MAX_GET_ACCOUNTS_BATCH
            )));
        }
        let mut request = AccountsLookupRequest::default();
        for identifier in identifiers {
            identifier.validate()?;
            match identifier {
                UserIdentifier::Uid(uid) => request.local_id.push(uid.clone()),
                UserIdentifier::Email(email) => request.email.push(email.clone()),
                UserIdentifier::PhoneNumber(phone) => request.phone_number.push(phone.clone()),
                UserIdentifier::Provider { provider_id, uid } => {
                    request.federated_user_id.push(FederatedUserId {
                        provider_id: provider_id.clone(),
                        raw_id: uid.clone(),
                    })
                }
            }
        }
        let response: AccountsLookupResponse =
            self.client
                .post_json(&self.client.v1("/accounts:lookup"), &request, "lookup users")?;
        let users = response
            .users
            .unwrap_or_default()
            .into_iter()
            .map(UserRecord::from_dto)
            .collect::<Result<Vec<_>>>()?;
        let not_found = identifiers
            .iter()
            .filter(|identifier| !users.iter().any(|user| identifier.matches(user)))
            .cloned()
            .collect();
        Ok(GetUsersResult { users, not_found })
    }

    /// Returns the uid assigned by the backend.
    pub(crate) fn create_user(&self, request: &CreateUserRequest) -> Result<String> {
        request.validate()?;
        let response: LocalIdResponse =
            self.client
                .post_json(&self.client.v1("/accounts"), request, "create user")?;
        response
            .local_id
            .ok_or_else(|| unexpected("create user returned no uid"))
    }

    pub(crate) fn update_user(&self, request: UpdateUserRequest) -> Result<String> {
        let body = request.into_body()?;
        let response: LocalIdResponse =
            self.client
                .post_json(&self.client.v1("/accounts:update"), &body, "update user")?;
        response
            .local_id
            .ok_or_else(|| unexpected("update user returned no uid"))
    }

    pub(crate) fn delete_user(&self, uid: &str) -> Result<()> {
        validate_uid(uid)?;
        let mut body = Map::new();
        body.insert("localId".to_owned(), Value::from(uid));
        let _: Value = self
            .client
            .post_json(&self.client.v1("/accounts:delete"), &body, "delete user")?;
        Ok(())
    }

    /// Force-deletes up to 1000 accounts, reporting per-index failures.
    pub(crate) fn delete_users(&self, uids: &[String]) -> Result<DeleteUsersResult> {
        if uids.is_empty() {
            return Ok(DeleteUsersResult::default());
        }
        if uids.len() > MAX_DELETE_ACCOUNTS_BATCH {
            return Err(FirebaseError::invalid_argument(format!(
                "at most {} users may be deleted at once",
                MAX_DELETE_ACCOUNTS_BATCH
            )));
        }
        for uid in uids {
            validate_uid(uid)?;
        }
        let request = BatchDeleteRequest {
            local_ids: uids,
            force: true,
        };
        let response: BatchDeleteResponse = self.client.post_json(
            &self.client.v1("/accounts:batchDelete"),
            &request,
            "batch delete users",
        )?;
        let errors: Vec<BatchError> = response
            .errors
            .unwrap_or_default()
            .into_iter()
            .map(|e| BatchError {
                index: e.index,
                message: e.message,
            })
            .collect();
        Ok(DeleteUsersResult {
            success_count: uids.len() - errors.len(),
            failure_count: errors.len(),
            errors,
        })
    }

    pub(crate) fn list_users(
        &self,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<Page<UserRecord>> {
        validate_page_token(page_token)?;
        if max_results == 0 || max_results > MAX_LIST_USERS_RESULTS {
            return Err(FirebaseError::invalid_argument(format!(
                "max results must be between 1 and {}",
                MAX_LIST_USERS_RESULTS
            )));
        }
        let mut query = vec![("maxResults", max_results.to_string())];
        if let Some(token) = page_token {
            query.push(("nextPageToken", token.to_owned()));
        }
        let response: ListUsersResponse = self.client.get_json(
            &self.client.v1("/accounts:batchGet"),
            &query,
            "list users",
        )?;
        let users = response
            .users
            .unwrap_or_default()
            .into_iter()
            .map(UserRecord::from_dto)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(users, response.next_page_token))
    }

    /// Bulk import; the hash configuration is required exactly when some
    /// record carries a password hash.
    pub(crate) fn import_users(
        &self,
        records: &[UserImportRecord],
        hash: Option<&UserImportHash>,
    ) -> Result<UserImportResult> {
        if records.is_empty() || records.len() > MAX_IMPORT_USERS {
            return Err(FirebaseError::invalid_argument(format!(
                "between 1 and {} users can be imported at once",
                MAX_IMPORT_USERS
            )));
        }
        let any_hashed = records.iter().any(UserImportRecord::has_password_hash);
        match (any_hashed, hash) {
            (true, None) => {
                return Err(FirebaseError::invalid_argument(
                    "a hash algorithm is required when importing users with password hashes",
                ))
            }
            (false, Some(_)) => {
                return Err(FirebaseError::invalid_argument(
                    "a hash algorithm was given but no imported user has a password hash",
                ))
            }
            _ => {}
        }
        let mut body = Map::new();
        body.insert("users".to_owned(), serde_json::to_value(records)?);
        if let Some(hash) = hash {
            body.extend(hash.wire_fields());
        }
        let response: UploadAccountResponse = self.client.post_json(
            &self.client.v1("/accounts:batchCreate"),
            &body,
            "import users",
        )?;
        let errors: Vec<BatchError> = response
            .error
            .unwrap_or_default()
            .into_iter()
            .map(|e| BatchError {
                index: e.index,
                message: e.message,
            })
            .collect();
        Ok(UserImportResult {
            success_count: records.len() - errors.len(),
            failure_count: errors.len(),
            errors,
        })
    }

    /// Exchange an ID token for a session cookie. The duration must lie
    /// strictly between five minutes and fourteen days.
    pub(crate) fn create_session_cookie(
        &self,
        id_token: &str,
        expires_in: chrono::Duration,
    ) -> Result<String> {
        if id_token.is_empty() {
            return Err(FirebaseError::invalid_argument("id token must not be empty"));
        }
        let seconds = expires_in.num_seconds();
        if seconds <= MIN_SESSION_COOKIE_SECONDS || seconds >= MAX_SESSION_COOKIE_SECONDS {
            return Err(FirebaseError::invalid_argument(
                "session cookie duration must be strictly between 5 minutes and 14 days",
            ));
        }
        let request = CreateSessionCookieRequest {
            id_token,
            valid_duration: seconds,
        };
        let response: CreateSessionCookieResponse = self.client.post_json(
            &self.client.v1(":createSessionCookie"),
            &request,
            "create session cookie",
        )?;
        Ok(response.session_cookie)
    }

    pub(crate) fn generate_email_action_link(
        &self,
        action: EmailActionType,
        email: &str,
        settings: Option<&ActionCodeSettings>,
    ) -> Result<String> {
        validate_email(email)?;
        if action == EmailActionType::EmailSignin
            && settings.and_then(|s| s.url.as_deref()).is_none()
        {
            return Err(FirebaseError::invalid_argument(
                "sign-in links require action code settings with a continue URL",
            ));
        }
        if let Some(url) = settings.and_then(|s| s.url.as_deref()) {
            reqwest::Url::parse(url).map_err(|e| {
                FirebaseError::invalid_argument(format!("continue URL '{}' is not an absolute URL", url))
                    .with_source(e)
            })?;
        }
        let request = SendOobCodeRequest {
            request_type: action.request_type(),
            email,
            return_oob_link: true,
            continue_url: settings.and_then(|s| s.url.as_deref()),
            can_handle_code_in_app: settings.and_then(|s| s.handle_code_in_app),
        };
        let response: SendOobCodeResponse = self.client.post_json(
            &self.client.v1("/accounts:sendOobCode"),
            &request,
            "generate email action link",
        )?;
        response
            .oob_link
            .ok_or_else(|| unexpected("no action link in the server response"))
    }

    /// Replace all custom claims of the user; `None` removes them.
    pub(crate) fn set_custom_user_claims(
        &self,
        uid: &str,
        claims: Option<Map<String, Value>>,
    ) -> Result<()> {
        let request = UpdateUserRequest::new(uid).with_custom_claims(claims);
        self.update_user(request)?;
        Ok(())
    }

    /// Record `now` (whole seconds) as the revocation mark for the user.
    pub(crate) fn revoke_refresh_tokens(&self, uid: &str, now_seconds: i64) -> Result<()> {
        let request = UpdateUserRequest::new(uid).with_valid_since(now_seconds);
        self.update_user(request)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::EmulatorTokenSource;
    use serde_json::json;
    use std::sync::Arc;

    fn manager() -> UserManager {
        UserManager::new(ApiClient::new(
            reqwest::blocking::Client::new(),
            Arc::new(EmulatorTokenSource),
            "demo-project",
            None,
            None,
            None,
        ))
    }

    fn dto(extra: Value) -> UserDTO {
        let mut base = json!({"localId": "user-1"});
        base.as_object_mut()
            .unwrap()
            .extend(extra.as_object().unwrap().clone());
        serde_json::from_value(base).unwrap()
    }

    #[test]
    fn record_conversion_parses_timestamps_and_claims() {
        let record = UserRecord::from_dto(dto(json!({
            "email": "a@b",
            "emailVerified": true,
            "validSince": "1000",
            "createdAt": "1600000000000",
            "lastLoginAt": "1600000001000",
            "lastRefreshAt": "2020-09-13T12:26:40Z",
            "customAttributes": "{\"admin\":true}",
            "providerUserInfo": [{"providerId": "phone", "rawId": "+15551234567"}]
        })))
        .unwrap();
        assert_eq!(record.uid, "user-1");
        assert!(record.email_verified);
        assert_eq!(record.tokens_valid_after_timestamp, Some(1_000_000));
        assert_eq!(record.creation_timestamp, Some(1_600_000_000_000));
        assert_eq!(record.last_sign_in_timestamp, Some(1_600_000_001_000));
        assert_eq!(record.last_refresh_timestamp, Some(1_600_000_000_000));
        assert_eq!(record.custom_claims.as_ref().unwrap()["admin"], json!(true));
        assert!(record.has_provider("phone"));
        assert!(!record.has_provider("google.com"));
    }

    #[test]
    fn empty_custom_attributes_become_none() {
        let record = UserRecord::from_dto(dto(json!({"customAttributes": "{}"}))).unwrap();
        assert!(record.custom_claims.is_none());
    }

    #[test]
    fn malformed_custom_attributes_are_an_unexpected_response() {
        let err = UserRecord::from_dto(dto(json!({"customAttributes": "not json"}))).unwrap_err();
        assert_eq!(err.code(), Some(AuthErrorCode::UnexpectedResponse));
    }

    #[test]
    fn identifier_matching() {
        let record = UserRecord::from_dto(dto(json!({
            "email": "a@b",
            "phoneNumber": "+15551234567",
            "providerUserInfo": [{"providerId": "google.com", "rawId": "g-1"}]
        })))
        .unwrap();
        assert!(UserIdentifier::Uid("user-1".into()).matches(&record));
        assert!(UserIdentifier::Email("a@b".into()).matches(&record));
        assert!(UserIdentifier::PhoneNumber("+15551234567".into()).matches(&record));
        assert!(UserIdentifier::Provider {
            provider_id: "google.com".into(),
            uid: "g-1".into()
        }
        .matches(&record));
        assert!(!UserIdentifier::Uid("other".into()).matches(&record));
    }

    #[test]
    fn email_validation() {
        assert!(validate_email("a@b").is_ok());
        for bad in ["", "a", "@b", "a@", "a@b@c"] {
            assert!(validate_email(bad).is_err(), "{:?}", bad);
        }
    }

    #[test]
    fn create_request_validation() {
        assert!(CreateUserRequest::new().with_email("nope").validate().is_err());
        assert!(CreateUserRequest::new().with_password("short").validate().is_err());
        assert!(CreateUserRequest::new().with_phone_number("12345").validate().is_err());
        assert!(CreateUserRequest::new().with_photo_url("relative/path").validate().is_err());
        assert!(CreateUserRequest::new()
            .with_uid("alice")
            .with_email("alice@example.com")
            .with_password("secret1")
            .with_photo_url("https://example.com/a.png")
            .validate()
            .is_ok());
    }

    #[test]
    fn update_body_serialization() {
        let body = UpdateUserRequest::new("user-1")
            .with_display_name(AttributeOp::Delete)
            .with_photo_url(AttributeOp::Delete)
            .with_phone_number(AttributeOp::Set("+15551234567".into()))
            .with_email_verified(true)
            .into_body()
            .unwrap();
        let wire = serde_json::to_value(&body).unwrap();
        assert_eq!(wire["localId"], json!("user-1"));
        assert_eq!(wire["deleteAttribute"], json!(["DISPLAY_NAME", "PHOTO_URL"]));
        assert_eq!(wire["phoneNumber"], json!("+15551234567"));
        assert_eq!(wire["emailVerified"], json!(true));
        assert!(wire.get("deleteProvider").is_none());
    }

    #[test]
    fn deleting_phone_populates_delete_provider() {
        let body = UpdateUserRequest::new("user-1")
            .with_phone_number(AttributeOp::Delete)
            .into_body()
            .unwrap();
        let wire = serde_json::to_value(&body).unwrap();
        assert_eq!(wire["deleteProvider"], json!(["phone"]));
        assert!(wire.get("phoneNumber").is_none());
    }

    #[test]
    fn phone_delete_conflicts_with_unlink_list() {
        let err = UpdateUserRequest::new("user-1")
            .with_phone_number(AttributeOp::Delete)
            .with_providers_unlinked(vec!["phone".into()])
            .into_body()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn clearing_claims_sends_the_empty_object() {
        let body = UpdateUserRequest::new("user-1")
            .with_custom_claims(None)
            .into_body()
            .unwrap();
        assert_eq!(body.custom_attributes.as_deref(), Some("{}"));
    }

    #[test]
    fn claims_are_serialized_and_validated() {
        let claims: Map<String, Value> = [("admin".to_owned(), json!(true))].into_iter().collect();
        let body = UpdateUserRequest::new("user-1")
            .with_custom_claims(Some(claims))
            .into_body()
            .unwrap();
        assert_eq!(body.custom_attributes.as_deref(), Some("{\"admin\":true}"));

        let reserved: Map<String, Value> = [("iss".to_owned(), json!("x"))].into_iter().collect();
        let err = UpdateUserRequest::new("user-1")
            .with_custom_claims(Some(reserved))
            .into_body()
            .unwrap_err();
        assert_eq!(err.code(), Some(AuthErrorCode::InvalidClaims));
    }

    #[test]
    fn batch_lookup_limits() {
        let too_many: Vec<UserIdentifier> =
            (0..101).map(|i| UserIdentifier::Uid(format!("u{}", i))).collect();
        assert!(manager().get_users(&too_many).is_err());

        let result = manager().get_users(&[]).unwrap();
        assert!(result.users.is_empty() && result.not_found.is_empty());
    }

    #[test]
    fn batch_delete_limits() {
        let too_many: Vec<String> = (0..1001).map(|i| format!("u{}", i)).collect();
        assert!(manager().delete_users(&too_many).is_err());
        let empty = manager().delete_users(&[]).unwrap();
        assert_eq!(empty.success_count, 0);
    }

    #[test]
    fn list_users_bounds() {
        let m = manager();
        assert!(m.list_users(None, 0).is_err());
        assert!(m.list_users(None, 1001).is_err());
        let err = m.list_users(Some(""), 10).unwrap_err();
        assert_eq!(err.code(), Some(AuthErrorCode::InvalidPageToken));
    }

    #[test]
    fn session_cookie_bounds_are_exclusive() {
        let m = manager();
        for minutes in [5, 14 * 24 * 60] {
            assert!(
                m.create_session_cookie("token", chrono::Duration::minutes(minutes)).is_err(),
                "{} minutes must be rejected",
                minutes
            );
        }
        assert!(m.create_session_cookie("", chrono::Duration::hours(1)).is_err());
    }

    #[test]
    fn import_validation() {
        let m = manager();
        assert!(m.import_users(&[], None).is_err());

        let hashed = UserImportRecord::new("u1").unwrap().with_password_hash(b"hash");
        assert!(m.import_users(std::slice::from_ref(&hashed), None).is_err());

        let plain = UserImportRecord::new("u2").unwrap();
        assert!(m
            .import_users(std::slice::from_ref(&plain), Some(&UserImportHash::Bcrypt))
            .is_err());
    }

    #[test]
    fn import_hash_wire_fields() {
        let fields = UserImportHash::Scrypt {
            key: b"key".to_vec(),
            salt_separator: b"sep".to_vec(),
            rounds: 8,
            memory_cost: 14,
        }
        .wire_fields();
        assert_eq!(fields["hashAlgorithm"], json!("SCRYPT"));
        assert_eq!(fields["rounds"], json!(8));
        assert_eq!(fields["memoryCost"], json!(14));
        assert_eq!(fields["signerKey"], json!(websafe_base64(b"key")));

        let fields = UserImportHash::Bcrypt.wire_fields();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["hashAlgorithm"], json!("BCRYPT"));
    }

    #[test]
    fn sign_in_links_require_a_continue_url() {
        let err = manager()
            .generate_email_action_link(EmailActionType::EmailSignin, "a@b", None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn import_record_builders_validate() {
        assert!(UserImportRecord::new("").is_err());
        assert!(UserImportRecord::new("u").unwrap().with_email("bad", true).is_err());
        assert!(UserImportRecord::new("u").unwrap().with_phone_number("123").is_err());
        let record = UserImportRecord::new("u")
            .unwrap()
            .with_email("a@b", true)
            .unwrap()
            .with_password_hash(b"h")
            .with_password_salt(b"s");
        assert!(record.has_password_hash());
    }
}
