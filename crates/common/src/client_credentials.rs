//! OAuth 2.0 client-credentials exchange.
//!
//! Performs a single token request and returns the access token. There is no
//! background refresh and no retry: callers that need a management token ask
//! for one per operation and surface any failure directly.
//!
//! # Example
//!
//! ```rust,ignore
//! use common::client_credentials::{request_access_token, ClientCredentials};
//! use common::secret::SecretString;
//!
//! let creds = ClientCredentials::new(
//!     "https://tenant.example.com/oauth/token".to_string(),
//!     "mgmt-client".to_string(),
//!     SecretString::from("secret"),
//! )
//! .with_audience("https://tenant.example.com/api/v2/".to_string());
//!
//! let token = request_access_token(&http_client, &creds).await?;
//! let header = format!("Bearer {}", token.access_token.expose_secret());
//! ```
//!
//! # Security
//!
//! - Client secret and access token are `SecretString` (never logged)
//! - Rejection bodies are logged at trace level only

use crate::secret::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, trace, warn};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during a client-credentials exchange.
#[derive(Error, Debug, Clone)]
pub enum TokenError {
    /// Transport-level failure (connect, timeout, TLS) or unexpected status.
    #[error("HTTP client error: {0}")]
    HttpError(String),

    /// The token endpoint rejected the credentials (400, 401, 403).
    #[error("Authentication rejected: {0}")]
    AuthenticationRejected(String),

    /// Token response could not be parsed.
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),
}

// =============================================================================
// Configuration
// =============================================================================

/// Credentials and target for a client-credentials grant.
#[derive(Clone)]
pub struct ClientCredentials {
    /// Full URL of the token endpoint.
    pub token_url: String,

    /// OAuth client ID.
    pub client_id: String,

    /// OAuth client secret.
    pub client_secret: SecretString,

    /// Optional `audience` parameter (API identifier) for the grant.
    pub audience: Option<String>,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("audience", &self.audience)
            .finish()
    }
}

impl ClientCredentials {
    /// Create credentials without an audience.
    #[must_use]
    pub fn new(token_url: String, client_id: String, client_secret: SecretString) -> Self {
        Self {
            token_url,
            client_id,
            client_secret,
            audience: None,
        }
    }

    /// Set the `audience` sent with the grant.
    #[must_use]
    pub fn with_audience(mut self, audience: String) -> Self {
        self.audience = Some(audience);
        self
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Serialize)]
struct ClientCredentialsGrant<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    audience: Option<&'a str>,
}

#[derive(Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Access token returned by a successful exchange.
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// The bearer token.
    pub access_token: SecretString,

    /// Token type reported by the server (usually `Bearer`).
    pub token_type: Option<String>,

    /// Lifetime in seconds, when reported.
    pub expires_in: Option<u64>,
}

// =============================================================================
// Exchange
// =============================================================================

/// Request an access token with the client-credentials grant.
///
/// Sends a JSON body (`grant_type`, `client_id`, `client_secret`, optional
/// `audience`) to `credentials.token_url`. The HTTP client's own timeout
/// bounds the call.
///
/// # Errors
///
/// - `TokenError::HttpError` - transport failure, 5xx, or unexpected status
/// - `TokenError::AuthenticationRejected` - 400/401/403 from the token endpoint
/// - `TokenError::InvalidResponse` - body is not a token response
#[instrument(skip_all, fields(client_id = %credentials.client_id))]
pub async fn request_access_token(
    http_client: &reqwest::Client,
    credentials: &ClientCredentials,
) -> Result<AccessToken, TokenError> {
    debug!(
        target: "common.client_credentials",
        url = %credentials.token_url,
        "Requesting access token"
    );

    let grant = ClientCredentialsGrant {
        grant_type: "client_credentials",
        client_id: &credentials.client_id,
        client_secret: credentials.client_secret.expose_secret(),
        audience: credentials.audience.as_deref(),
    };

    let response = http_client
        .post(&credentials.token_url)
        .json(&grant)
        .send()
        .await
        .map_err(|e| {
            debug!(target: "common.client_credentials", error = %e, "HTTP request failed");
            TokenError::HttpError(e.to_string())
        })?;

    let status = response.status();

    if status.is_success() {
        let token_response: OAuthTokenResponse = response.json().await.map_err(|e| {
            warn!(target: "common.client_credentials", error = %e, "Failed to parse token response");
            TokenError::InvalidResponse(e.to_string())
        })?;

        if token_response.access_token.is_empty() {
            return Err(TokenError::InvalidResponse(
                "access_token is empty".to_string(),
            ));
        }

        debug!(
            target: "common.client_credentials",
            expires_in_secs = ?token_response.expires_in,
            "Access token acquired"
        );

        Ok(AccessToken {
            access_token: SecretString::from(token_response.access_token),
            token_type: token_response.token_type,
            expires_in: token_response.expires_in,
        })
    } else if matches!(status.as_u16(), 400 | 401 | 403) {
        let body = response.text().await.unwrap_or_else(|e| {
            trace!(target: "common.client_credentials", error = %e, "Failed to read error response body");
            "<failed to read body>".to_string()
        });
        warn!(
            target: "common.client_credentials",
            status = %status,
            "Client credentials rejected"
        );
        trace!(
            target: "common.client_credentials",
            body = %body,
            "Rejection response body"
        );
        Err(TokenError::AuthenticationRejected(format!("Status {status}")))
    } else if status.is_server_error() {
        warn!(
            target: "common.client_credentials",
            status = %status,
            "Token endpoint returned server error"
        );
        Err(TokenError::HttpError(format!("Server error: {status}")))
    } else {
        warn!(
            target: "common.client_credentials",
            status = %status,
            "Unexpected response from token endpoint"
        );
        Err(TokenError::HttpError(format!("Unexpected status: {status}")))
    }
}

// =============================================================================
// Tests
// =============================================================================
