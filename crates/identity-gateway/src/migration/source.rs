//! Legacy (Passage) token validation.
//!
//! A legacy token is verified against the app's published key set with the
//! same header, allow-list, key lookup, and signature rules as bearer tokens.
//! The subject's profile is then fetched from the management API. Nothing is
//! cached.

use crate::auth::jwt::{validate_claims, ClaimExpectations, TokenVerifier};
use crate::auth::KeySetFetcher;
use crate::config::MigrationConfig;
use crate::errors::{AuthError, MigrationError};
use crate::observability::metrics;
use common::secret::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// Snapshot of a legacy user's identity attributes.
#[derive(Clone, PartialEq, Eq)]
pub struct LegacyIdentity {
    /// Legacy provider user id.
    pub id: String,

    /// Email address, empty when unset.
    pub email: String,

    /// Phone number, empty when unset.
    pub phone: String,

    pub email_verified: bool,

    pub phone_verified: bool,
}

impl LegacyIdentity {
    /// Identifier for the target account: email if present, else phone.
    ///
    /// Returns the identifier and the verification flag that belongs to it.
    pub fn preferred_identifier(&self) -> Option<(&str, bool)> {
        if !self.email.is_empty() {
            Some((&self.email, self.email_verified))
        } else if !self.phone.is_empty() {
            Some((&self.phone, self.phone_verified))
        } else {
            None
        }
    }
}

impl fmt::Debug for LegacyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacyIdentity")
            .field("id", &"[REDACTED]")
            .field("email", &"[REDACTED]")
            .field("phone", &"[REDACTED]")
            .field("email_verified", &self.email_verified)
            .field("phone_verified", &self.phone_verified)
            .finish()
    }
}

/// Validates a legacy-provider token and returns the user's attributes.
#[async_trait::async_trait]
pub trait SourceTokenValidator: Send + Sync {
    /// # Errors
    ///
    /// `MigrationError::LegacyValidationFailed` with the cause when the token
    /// is rejected or the profile cannot be fetched.
    async fn validate(&self, token: &str) -> Result<LegacyIdentity, MigrationError>;
}

#[derive(Deserialize)]
struct PassageUserResponse {
    user: PassageUser,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct PassageUser {
    id: String,
    email: String,
    phone: String,
    email_verified: bool,
    phone_verified: bool,
}

/// Passage adapter.
pub struct PassageValidator {
    verifier: TokenVerifier,
    http_client: reqwest::Client,
    key_set_domain: String,
    issuer: String,
    audience: Option<String>,
    api_url: String,
    app_id: String,
    api_key: SecretString,
}

impl PassageValidator {
    /// Create a validator.
    ///
    /// `key_fetcher` is asked for `{passage_auth_domain}/v1/apps/{app_id}`, so
    /// the key set is read from
    /// `{scheme}://{passage_auth_domain}/v1/apps/{app_id}/.well-known/jwks.json`.
    /// Tokens must carry `iss = https://{passage_auth_domain}/v1/apps/{app_id}`.
    pub fn new(
        http_client: reqwest::Client,
        key_fetcher: Arc<dyn KeySetFetcher>,
        config: &MigrationConfig,
    ) -> Self {
        Self {
            verifier: TokenVerifier::new(key_fetcher),
            http_client,
            key_set_domain: format!(
                "{}/v1/apps/{}",
                config.passage_auth_domain, config.passage_app_id
            ),
            issuer: format!(
                "https://{}/v1/apps/{}",
                config.passage_auth_domain, config.passage_app_id
            ),
            audience: config.passage_audience.clone(),
            api_url: config.passage_api_url.clone(),
            app_id: config.passage_app_id.clone(),
            api_key: config.passage_api_key.clone(),
        }
    }

    async fn validate_token(&self, token: &str) -> Result<String, AuthError> {
        let claims = self
            .verifier
            .verify_signed(token, &self.key_set_domain)
            .await?;

        let expectations = ClaimExpectations {
            audience: self.audience.as_deref(),
            issuer: Some(&self.issuer),
        };
        let subject = validate_claims(&claims, &expectations, chrono::Utc::now().timestamp())?;
        if subject.is_empty() {
            return Err(AuthError::MissingSubject);
        }
        Ok(subject)
    }

    fn user_url(&self, user_id: &str) -> Result<reqwest::Url, MigrationError> {
        let invalid = |reason: String| {
            MigrationError::LegacyValidationFailed(format!("invalid passage API URL: {}", reason))
        };

        let mut url = reqwest::Url::parse(&self.api_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["v1", "apps", &self.app_id, "users", user_id]);
        Ok(url)
    }

    async fn fetch_user(&self, user_id: &str) -> Result<PassageUser, MigrationError> {
        let url = self.user_url(user_id)?;

        let response = self
            .http_client
            .get(url)
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| {
                metrics::record_provider_request("passage", "get_user", "error");
                MigrationError::LegacyValidationFailed(format!(
                    "failed to get user details: {}",
                    e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            metrics::record_provider_request("passage", "get_user", "error");
            let body = response.text().await.unwrap_or_default();
            tracing::trace!(target: "gateway.migration.source", body = %body, "Profile lookup rejected");
            return Err(MigrationError::LegacyValidationFailed(format!(
                "failed to get user details: {}",
                status
            )));
        }

        let parsed: PassageUserResponse = response.json().await.map_err(|e| {
            metrics::record_provider_request("passage", "get_user", "error");
            MigrationError::LegacyValidationFailed(format!(
                "failed to get user details: {}",
                e
            ))
        })?;

        metrics::record_provider_request("passage", "get_user", "success");
        Ok(parsed.user)
    }
}

#[async_trait::async_trait]
impl SourceTokenValidator for PassageValidator {
    #[instrument(skip_all, name = "gateway.migration.validate_legacy")]
    async fn validate(&self, token: &str) -> Result<LegacyIdentity, MigrationError> {
        let subject = self.validate_token(token).await.map_err(|e| {
            tracing::debug!(
                target: "gateway.migration.source",
                reason = e.reason(),
                "Legacy token rejected"
            );
            MigrationError::LegacyValidationFailed(e.reason().to_string())
        })?;

        let user = self.fetch_user(&subject).await?;
        tracing::debug!(target: "gateway.migration.source", "Legacy user resolved");

        Ok(LegacyIdentity {
            id: if user.id.is_empty() { subject } else { user.id },
            email: user.email,
            phone: user.phone,
            email_verified: user.email_verified,
            phone_verified: user.phone_verified,
        })
    }
}

/// Mock source validator for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed identity or a fixed error.
    pub struct MockSourceValidator {
        result: Result<LegacyIdentity, MigrationError>,
        call_count: AtomicUsize,
    }

    impl MockSourceValidator {
        /// Always return `identity`.
        pub fn returning(identity: LegacyIdentity) -> Self {
            Self {
                result: Ok(identity),
                call_count: AtomicUsize::new(0),
            }
        }

        /// Always fail with `error`.
        pub fn failing(error: MigrationError) -> Self {
            Self {
                result: Err(error),
                call_count: AtomicUsize::new(0),
            }
        }

        /// Number of validations made.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl SourceTokenValidator for MockSourceValidator {
        async fn validate(&self, _token: &str) -> Result<LegacyIdentity, MigrationError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }
}
