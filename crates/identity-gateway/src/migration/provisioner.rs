//! Target-provider (Auth0) account provisioning.
//!
//! Find-or-create by identifier using the management API:
//!
//! 1. Client-credentials exchange for a management token
//! 2. `GET /api/v2/users-by-email` (a failed search counts as "not found")
//! 3. `POST /api/v2/users` when nothing was found
//!
//! Steps 2 and 3 are not atomic. Two concurrent calls for the same unseen
//! identifier can both attempt creation; the provider's conflict response is
//! surfaced as `AccountCreationFailed` and never retried.
//!
//! # Security
//!
//! - The management token and client secret are `SecretString`
//! - Created accounts get a random placeholder password that is never
//!   logged, returned, or used to authenticate

use crate::errors::MigrationError;
use crate::observability::metrics;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use common::client_credentials::{request_access_token, ClientCredentials};
use common::secret::{ExposeSecret, SecretString};
use ring::rand::{SecureRandom, SystemRandom};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

/// Random bytes in a placeholder password.
const PLACEHOLDER_PASSWORD_BYTES: usize = 32;

/// Appended so the placeholder satisfies common password-strength policies.
const PLACEHOLDER_PASSWORD_SUFFIX: &str = "Aa1!";

/// Account on the target provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedAccount {
    /// Target provider user id.
    pub user_id: String,

    /// Identifier the account was found or created by.
    pub identifier: String,

    /// Whether the provider considers the identifier verified.
    pub verified: bool,
}

/// Finds or creates target-provider accounts.
#[async_trait::async_trait]
pub trait TargetAccountProvisioner: Send + Sync {
    /// Return the account for `identifier`, creating it when absent.
    ///
    /// `verified` is recorded on newly created accounts.
    async fn find_or_create(
        &self,
        identifier: &str,
        verified: bool,
    ) -> Result<ProvisionedAccount, MigrationError>;
}

#[derive(Debug, Deserialize)]
struct Auth0User {
    user_id: String,
    #[serde(default)]
    email_verified: Option<bool>,
}

/// Auth0 management API adapter.
pub struct Auth0Provisioner {
    http_client: reqwest::Client,
    base_url: String,
    credentials: ClientCredentials,
    connection: String,
}

impl Auth0Provisioner {
    /// Create a provisioner.
    ///
    /// # Arguments
    ///
    /// * `base_url` - `{scheme}://{domain}` of the tenant
    /// * `domain` - tenant domain; the management audience is `https://{domain}/api/v2/`
    /// * `connection` - database connection for created accounts
    pub fn new(
        http_client: reqwest::Client,
        base_url: String,
        domain: &str,
        client_id: String,
        client_secret: SecretString,
        connection: String,
    ) -> Self {
        let credentials = ClientCredentials::new(
            format!("{}/oauth/token", base_url),
            client_id,
            client_secret,
        )
        .with_audience(format!("https://{}/api/v2/", domain));

        Self {
            http_client,
            base_url,
            credentials,
            connection,
        }
    }

    async fn management_token(&self) -> Result<SecretString, MigrationError> {
        match request_access_token(&self.http_client, &self.credentials).await {
            Ok(token) => {
                metrics::record_provider_request("auth0", "management_token", "success");
                Ok(token.access_token)
            }
            Err(e) => {
                metrics::record_provider_request("auth0", "management_token", "error");
                tracing::warn!(target: "gateway.migration.provisioner", error = %e, "Management token request failed");
                Err(MigrationError::ManagementAuthFailed(e.to_string()))
            }
        }
    }

    /// Search by identifier. Any failure is logged and reported as `None`.
    async fn find_user(&self, token: &SecretString, identifier: &str) -> Option<Auth0User> {
        let result = self
            .http_client
            .get(format!("{}/api/v2/users-by-email", self.base_url))
            .query(&[("email", identifier)])
            .bearer_auth(token.expose_secret())
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                metrics::record_provider_request("auth0", "search_user", "error");
                tracing::warn!(target: "gateway.migration.provisioner", error = %e, "User search failed");
                return None;
            }
        };

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            metrics::record_provider_request("auth0", "search_user", "error");
            tracing::warn!(target: "gateway.migration.provisioner", status = %status, "User search rejected");
            return None;
        }

        match response.json::<Vec<Auth0User>>().await {
            Ok(users) => {
                metrics::record_provider_request("auth0", "search_user", "success");
                users.into_iter().next()
            }
            Err(e) => {
                metrics::record_provider_request("auth0", "search_user", "error");
                tracing::warn!(target: "gateway.migration.provisioner", error = %e, "User search response unparseable");
                None
            }
        }
    }

    async fn create_user(
        &self,
        token: &SecretString,
        identifier: &str,
        verified: bool,
    ) -> Result<Auth0User, MigrationError> {
        let password = generate_placeholder_password()?;

        let response = self
            .http_client
            .post(format!("{}/api/v2/users", self.base_url))
            .bearer_auth(token.expose_secret())
            .json(&json!({
                "email": identifier,
                "email_verified": verified,
                "password": password.expose_secret(),
                "connection": self.connection,
                "verify_email": false,
            }))
            .send()
            .await
            .map_err(|e| {
                metrics::record_provider_request("auth0", "create_user", "error");
                MigrationError::AccountCreationFailed(e.to_string())
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status != reqwest::StatusCode::CREATED {
            metrics::record_provider_request("auth0", "create_user", "error");
            tracing::warn!(target: "gateway.migration.provisioner", status = %status, "User creation rejected");
            return Err(MigrationError::AccountCreationFailed(format!(
                "{} - {}",
                status, body
            )));
        }

        metrics::record_provider_request("auth0", "create_user", "success");
        serde_json::from_str(&body)
            .map_err(|e| MigrationError::AccountCreationFailed(format!("invalid response: {}", e)))
    }
}

#[async_trait::async_trait]
impl TargetAccountProvisioner for Auth0Provisioner {
    #[instrument(skip_all, name = "gateway.migration.find_or_create")]
    async fn find_or_create(
        &self,
        identifier: &str,
        verified: bool,
    ) -> Result<ProvisionedAccount, MigrationError> {
        let token = self.management_token().await?;

        if let Some(user) = self.find_user(&token, identifier).await {
            tracing::debug!(target: "gateway.migration.provisioner", "Existing account found");
            return Ok(ProvisionedAccount {
                user_id: user.user_id,
                identifier: identifier.to_string(),
                verified: user.email_verified.unwrap_or(verified),
            });
        }

        let user = self.create_user(&token, identifier, verified).await?;
        tracing::info!(target: "gateway.migration.provisioner", "Account created");

        Ok(ProvisionedAccount {
            user_id: user.user_id,
            identifier: identifier.to_string(),
            verified: user.email_verified.unwrap_or(verified),
        })
    }
}

/// Placeholder password: CSPRNG bytes, base64url, plus a policy suffix.
fn generate_placeholder_password() -> Result<SecretString, MigrationError> {
    let mut bytes = [0u8; PLACEHOLDER_PASSWORD_BYTES];
    SystemRandom::new().fill(&mut bytes).map_err(|_| {
        tracing::error!(target: "gateway.migration.provisioner", "Random generation failed");
        MigrationError::AccountCreationFailed("failed to generate placeholder secret".to_string())
    })?;

    Ok(SecretString::from(format!(
        "{}{}",
        URL_SAFE_NO_PAD.encode(bytes),
        PLACEHOLDER_PASSWORD_SUFFIX
    )))
}

/// Mock provisioner for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Returns a fixed account id (echoing the identifier) or a fixed error,
    /// and records each call's arguments.
    pub struct MockProvisioner {
        result: Result<String, MigrationError>,
        call_count: AtomicUsize,
        calls: Mutex<Vec<(String, bool)>>,
    }

    impl MockProvisioner {
        /// Always succeed with `user_id`.
        pub fn returning(user_id: &str) -> Self {
            Self {
                result: Ok(user_id.to_string()),
                call_count: AtomicUsize::new(0),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Always fail with `error`.
        pub fn failing(error: MigrationError) -> Self {
            Self {
                result: Err(error),
                call_count: AtomicUsize::new(0),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Number of calls made.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// `(identifier, verified)` for each call, in order.
        pub fn calls(&self) -> Vec<(String, bool)> {
            self.calls
                .lock()
                .map(|calls| calls.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait::async_trait]
    impl TargetAccountProvisioner for MockProvisioner {
        async fn find_or_create(
            &self,
            identifier: &str,
            verified: bool,
        ) -> Result<ProvisionedAccount, MigrationError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut calls) = self.calls.lock() {
                calls.push((identifier.to_string(), verified));
            }

            self.result.clone().map(|user_id| ProvisionedAccount {
                user_id,
                identifier: identifier.to_string(),
                verified,
            })
        }
    }
}
