//! Identity gateway error types.
//!
//! Three domain taxonomies live here:
//!
//! - [`AuthError`] - bearer-token verification failures (query path)
//! - [`FetchError`] - key-set retrieval failures
//! - [`MigrationError`] - token-exchange failures (migration path)
//!
//! [`GatewayError`] is the HTTP-facing error for the query path and the
//! operational routes. It maps to status codes via `IntoResponse`. Messages
//! returned to clients on the query path are intentionally generic; the
//! specific reason is logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::jwt::JwtHeaderError;
use serde::Serialize;
use thiserror::Error;

/// Generic client-facing message for every authentication failure.
pub const INVALID_TOKEN_MESSAGE: &str = "The access token is invalid or expired";

// =============================================================================
// AuthError
// =============================================================================

/// Bearer-token verification failure.
///
/// Every variant displays the same generic message so callers cannot learn
/// which check failed. Use [`AuthError::reason`] for logs and metrics.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("The access token is invalid or expired")]
    Malformed,

    #[error("The access token is invalid or expired")]
    UnsupportedAlgorithm,

    #[error("The access token is invalid or expired")]
    MissingKeyId,

    #[error("The access token is invalid or expired")]
    KeySetUnavailable,

    #[error("The access token is invalid or expired")]
    KeyNotFound,

    #[error("The access token is invalid or expired")]
    InvalidSignature,

    #[error("The access token is invalid or expired")]
    InvalidAudience,

    #[error("The access token is invalid or expired")]
    InvalidIssuer,

    #[error("The access token is invalid or expired")]
    Expired,

    #[error("The access token is invalid or expired")]
    MissingExpiry,

    #[error("The access token is invalid or expired")]
    MissingSubject,
}

impl AuthError {
    /// Stable, bounded label for operator logs and metric labels.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::Malformed => "malformed",
            AuthError::UnsupportedAlgorithm => "unsupported_algorithm",
            AuthError::MissingKeyId => "missing_key_id",
            AuthError::KeySetUnavailable => "key_set_unavailable",
            AuthError::KeyNotFound => "key_not_found",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::InvalidAudience => "invalid_audience",
            AuthError::InvalidIssuer => "invalid_issuer",
            AuthError::Expired => "expired",
            AuthError::MissingExpiry => "missing_expiry",
            AuthError::MissingSubject => "missing_subject",
        }
    }
}

impl From<JwtHeaderError> for AuthError {
    fn from(err: JwtHeaderError) -> Self {
        match err {
            JwtHeaderError::TokenTooLarge | JwtHeaderError::MalformedToken => AuthError::Malformed,
            JwtHeaderError::UnsupportedAlgorithm => AuthError::UnsupportedAlgorithm,
            JwtHeaderError::MissingKid => AuthError::MissingKeyId,
        }
    }
}

// =============================================================================
// FetchError
// =============================================================================

/// Key-set retrieval failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Connect failure, timeout, TLS error.
    #[error("key set request failed: {0}")]
    Transport(String),

    /// Endpoint answered with a non-2xx status.
    #[error("key set endpoint returned status {0}")]
    Status(u16),

    /// Body was not a key set.
    #[error("key set response could not be parsed: {0}")]
    Decode(String),
}

impl FetchError {
    /// Bounded label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "transport",
            FetchError::Status(_) => "status",
            FetchError::Decode(_) => "decode",
        }
    }
}

// =============================================================================
// MigrationError
// =============================================================================

/// Token-exchange failure.
///
/// Display text includes the underlying provider cause; it is returned to
/// the caller of the exchange endpoint as-is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MigrationError {
    #[error("passage user has no email or phone")]
    NoIdentifier,

    #[error("invalid passage token: {0}")]
    LegacyValidationFailed(String),

    #[error("failed to get auth0 management token: {0}")]
    ManagementAuthFailed(String),

    #[error("failed to create/find auth0 user: {0}")]
    AccountCreationFailed(String),

    #[error("invalid request body: {0}")]
    InvalidRequestBody(String),
}

impl MigrationError {
    /// Bounded label for metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            MigrationError::NoIdentifier => "no_identifier",
            MigrationError::LegacyValidationFailed(_) => "legacy_validation_failed",
            MigrationError::ManagementAuthFailed(_) => "management_auth_failed",
            MigrationError::AccountCreationFailed(_) => "account_creation_failed",
            MigrationError::InvalidRequestBody(_) => "invalid_request_body",
        }
    }
}

// =============================================================================
// GatewayError
// =============================================================================

/// HTTP-facing error for the bearer-token boundary.
///
/// `InvalidToken` maps to 401 Unauthorized with `WWW-Authenticate`.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

impl From<AuthError> for GatewayError {
    fn from(err: AuthError) -> Self {
        GatewayError::InvalidToken(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            GatewayError::InvalidToken(reason) => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", reason.clone())
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) =
                "Bearer realm=\"identity-gateway\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
