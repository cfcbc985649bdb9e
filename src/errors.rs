//! # Error and Result Type
//!
//! Every fallible operation in this crate returns [`FirebaseError`]. An error
//! carries a coarse [`ErrorKind`] (the canonical Google API error class), an
//! optional auth-specific [`AuthErrorCode`], a human readable message, the
//! causing error if any, and the raw HTTP response when the failure
//! originated on the server side.

use std::error;
use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;

/// A result type that uses [`FirebaseError`] as an error type
pub type Result<T> = std::result::Result<T, FirebaseError>;

/// Coarse error classification, aligned with the canonical Google API error
/// space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    Unauthenticated,
    PermissionDenied,
    NotFound,
    Conflict,
    Aborted,
    ResourceExhausted,
    Unavailable,
    DeadlineExceeded,
    Cancelled,
    Internal,
    Unknown,
}

/// Auth-layer error codes, refining [`ErrorKind`] for failures specific to
/// token handling and identity management.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorCode {
    InvalidIdToken,
    ExpiredIdToken,
    RevokedIdToken,
    InvalidSessionCookie,
    ExpiredSessionCookie,
    RevokedSessionCookie,
    CertificateFetchFailed,
    TenantIdMismatch,
    UserNotFound,
    UserDisabled,
    EmailAlreadyExists,
    UidAlreadyExists,
    PhoneNumberAlreadyExists,
    InvalidClaims,
    ClaimsTooLarge,
    InvalidEmail,
    InvalidPhoneNumber,
    InvalidPassword,
    InvalidPageToken,
    ConfigurationNotFound,
    InsufficientPermission,
    UnexpectedResponse,
}

impl AuthErrorCode {
    /// The stable wire name of this code.
    pub fn as_str(&self) -> &'static str {
        use AuthErrorCode::*;
        match self {
            InvalidIdToken => "INVALID_ID_TOKEN",
            ExpiredIdToken => "EXPIRED_ID_TOKEN",
            RevokedIdToken => "REVOKED_ID_TOKEN",
            InvalidSessionCookie => "INVALID_SESSION_COOKIE",
            ExpiredSessionCookie => "EXPIRED_SESSION_COOKIE",
            RevokedSessionCookie => "REVOKED_SESSION_COOKIE",
            CertificateFetchFailed => "CERTIFICATE_FETCH_FAILED",
            TenantIdMismatch => "TENANT_ID_MISMATCH",
            UserNotFound => "USER_NOT_FOUND",
            UserDisabled => "USER_DISABLED",
            EmailAlreadyExists => "EMAIL_ALREADY_EXISTS",
            UidAlreadyExists => "UID_ALREADY_EXISTS",
            PhoneNumberAlreadyExists => "PHONE_NUMBER_ALREADY_EXISTS",
            InvalidClaims => "INVALID_CLAIMS",
            ClaimsTooLarge => "CLAIMS_TOO_LARGE",
            InvalidEmail => "INVALID_EMAIL",
            InvalidPhoneNumber => "INVALID_PHONE_NUMBER",
            InvalidPassword => "INVALID_PASSWORD",
            InvalidPageToken => "INVALID_PAGE_TOKEN",
            ConfigurationNotFound => "CONFIGURATION_NOT_FOUND",
            InsufficientPermission => "INSUFFICIENT_PERMISSION",
            UnexpectedResponse => "UNEXPECTED_RESPONSE",
        }
    }
}

impl fmt::Display for AuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status and body of a non-2xx identity toolkit response, kept verbatim so
/// callers can log the server's diagnostics. Bearer material travels in
/// request headers only and never ends up in here.
#[derive(Debug, Clone)]
pub struct HttpErrorResponse {
    pub status: StatusCode,
    pub body: String,
}

/// The main error type used throughout this crate. It wraps / converts from a
/// few other error types and implements [`error::Error`] so that you can use
/// it in any situation where the standard error type is expected.
#[derive(Debug)]
pub struct FirebaseError {
    kind: ErrorKind,
    code: Option<AuthErrorCode>,
    message: String,
    source: Option<Box<dyn error::Error + Send + Sync + 'static>>,
    response: Option<HttpErrorResponse>,
}

impl FirebaseError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        FirebaseError {
            kind,
            code: None,
            message: message.into(),
            source: None,
            response: None,
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn with_code(mut self, code: AuthErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn error::Error + Send + Sync + 'static>>,
    ) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_response(mut self, status: StatusCode, body: impl Into<String>) -> Self {
        self.response = Some(HttpErrorResponse {
            status,
            body: body.into(),
        });
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> Option<AuthErrorCode> {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The captured HTTP response, present when the error was produced from a
    /// non-2xx identity toolkit reply.
    pub fn http_response(&self) -> Option<&HttpErrorResponse> {
        self.response.as_ref()
    }
}

impl fmt::Display for FirebaseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{:?} ({}): {}", self.kind, code, self.message)?,
            None => write!(f, "{:?}: {}", self.kind, self.message)?,
        }
        if let Some(ref response) = self.response {
            write!(f, "\nHTTP {}\n{}", response.status, response.body)?;
        }
        Ok(())
    }
}

impl error::Error for FirebaseError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn error::Error + 'static))
    }
}

impl From<std::io::Error> for FirebaseError {
    fn from(error: std::io::Error) -> Self {
        FirebaseError::new(ErrorKind::Unknown, "I/O error").with_source(error)
    }
}

impl From<serde_json::Error> for FirebaseError {
    fn from(error: serde_json::Error) -> Self {
        FirebaseError::new(ErrorKind::Internal, "JSON serialization failed").with_source(error)
    }
}

impl From<biscuit::errors::Error> for FirebaseError {
    fn from(error: biscuit::errors::Error) -> Self {
        FirebaseError::new(ErrorKind::Unknown, "JWT handling failed").with_source(error)
    }
}

impl From<ring::error::KeyRejected> for FirebaseError {
    fn from(error: ring::error::KeyRejected) -> Self {
        FirebaseError::new(ErrorKind::InvalidArgument, "RSA private key rejected").with_source(error)
    }
}

impl From<ring::error::Unspecified> for FirebaseError {
    fn from(_: ring::error::Unspecified) -> Self {
        FirebaseError::new(ErrorKind::Internal, "cryptographic operation failed")
    }
}

impl From<reqwest::Error> for FirebaseError {
    fn from(error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            ErrorKind::DeadlineExceeded
        } else if error.is_connect() {
            ErrorKind::Unavailable
        } else {
            ErrorKind::Unknown
        };
        FirebaseError::new(kind, "HTTP transport error").with_source(error)
    }
}

/// Fixed mapping from identity toolkit server code strings to the taxonomy.
/// Unlisted codes fall back to the HTTP status mapping.
const SERVER_ERROR_CODES: &[(&str, ErrorKind, Option<AuthErrorCode>)] = &[
    ("CLAIMS_TOO_LARGE", ErrorKind::InvalidArgument, Some(AuthErrorCode::ClaimsTooLarge)),
    ("CONFIGURATION_NOT_FOUND", ErrorKind::NotFound, Some(AuthErrorCode::ConfigurationNotFound)),
    ("DUPLICATE_EMAIL", ErrorKind::Conflict, Some(AuthErrorCode::EmailAlreadyExists)),
    ("DUPLICATE_LOCAL_ID", ErrorKind::Conflict, Some(AuthErrorCode::UidAlreadyExists)),
    ("EMAIL_EXISTS", ErrorKind::Conflict, Some(AuthErrorCode::EmailAlreadyExists)),
    ("EMAIL_NOT_FOUND", ErrorKind::NotFound, Some(AuthErrorCode::UserNotFound)),
    ("INSUFFICIENT_PERMISSION", ErrorKind::PermissionDenied, Some(AuthErrorCode::InsufficientPermission)),
    ("INVALID_EMAIL", ErrorKind::InvalidArgument, Some(AuthErrorCode::InvalidEmail)),
    ("INVALID_ID_TOKEN", ErrorKind::InvalidArgument, Some(AuthErrorCode::InvalidIdToken)),
    ("INVALID_PAGE_SELECTION", ErrorKind::InvalidArgument, Some(AuthErrorCode::InvalidPageToken)),
    ("INVALID_PHONE_NUMBER", ErrorKind::InvalidArgument, Some(AuthErrorCode::InvalidPhoneNumber)),
    ("PERMISSION_DENIED", ErrorKind::PermissionDenied, Some(AuthErrorCode::InsufficientPermission)),
    ("PHONE_NUMBER_EXISTS", ErrorKind::Conflict, Some(AuthErrorCode::PhoneNumberAlreadyExists)),
    ("PROJECT_NOT_FOUND", ErrorKind::NotFound, None),
    ("QUOTA_EXCEEDED", ErrorKind::ResourceExhausted, None),
    ("TENANT_NOT_FOUND", ErrorKind::NotFound, None),
    ("TOKEN_EXPIRED", ErrorKind::Unauthenticated, None),
    ("UNAUTHORIZED_DOMAIN", ErrorKind::InvalidArgument, None),
    ("USER_DISABLED", ErrorKind::InvalidArgument, Some(AuthErrorCode::UserDisabled)),
    ("USER_NOT_FOUND", ErrorKind::NotFound, Some(AuthErrorCode::UserNotFound)),
    ("WEAK_PASSWORD", ErrorKind::InvalidArgument, Some(AuthErrorCode::InvalidPassword)),
    ("INVALID_PASSWORD", ErrorKind::InvalidArgument, Some(AuthErrorCode::InvalidPassword)),
];

/// Infer a coarse kind from a bare HTTP status.
pub(crate) fn kind_for_status(status: StatusCode) -> ErrorKind {
    match status.as_u16() {
        400 => ErrorKind::InvalidArgument,
        401 => ErrorKind::Unauthenticated,
        403 => ErrorKind::PermissionDenied,
        404 => ErrorKind::NotFound,
        409 => ErrorKind::Conflict,
        429 => ErrorKind::ResourceExhausted,
        500 => ErrorKind::Internal,
        503 => ErrorKind::Unavailable,
        _ => ErrorKind::Unknown,
    }
}

#[derive(Deserialize)]
struct GoogleErrorResponse {
    error: GoogleErrorBody,
}

#[derive(Deserialize)]
struct GoogleErrorBody {
    message: Option<String>,
}

/// Build a [`FirebaseError`] from a non-2xx identity toolkit response body.
///
/// The server reports `{"error": {"message": "CODE: detail"}}`; the portion
/// before the first colon selects the entry in the fixed code table. An
/// unparseable body or an unknown code falls back to the HTTP status mapping.
pub(crate) fn error_from_response(status: StatusCode, body: String, context: &str) -> FirebaseError {
    let server_message = serde_json::from_str::<GoogleErrorResponse>(&body)
        .ok()
        .and_then(|r| r.error.message);

    let (kind, code, detail) = match server_message {
        Some(message) => {
            let server_code = message.split(':').next().unwrap_or("").trim().to_owned();
            match SERVER_ERROR_CODES.iter().find(|(c, _, _)| *c == server_code) {
                Some((_, kind, code)) => (*kind, *code, message),
                None => (kind_for_status(status), None, message),
            }
        }
        None => (kind_for_status(status), None, format!("HTTP status {}", status)),
    };

    let error = FirebaseError::new(kind, format!("{}: {}", context, detail)).with_response(status, body);
    match code {
        Some(code) => error.with_code(code),
        None => error,
    }
}

/// Check a blocking response for success, turning error replies into the
/// structured taxonomy. The `context` closure names the operation for the
/// error message and is only invoked on failure.
pub(crate) fn extract_google_api_error(
    response: reqwest::blocking::Response,
    context: impl FnOnce() -> String,
) -> Result<reqwest::blocking::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().unwrap_or_default();
    Err(error_from_response(status, body, &context()))
}
