//! Mock identity providers backed by wiremock
//!
//! `MockAuth0` serves the tenant key set and the management endpoints used
//! for provisioning. `MockPassage` serves an app key set and the user
//! profile API. Both listen on plain HTTP on loopback, so the gateway must be
//! configured with `PROVIDER_URL_SCHEME=http`.

use crate::crypto_fixtures::{jwks_json, TestSigningKey};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Management token issued by [`MockAuth0::mount_management_token`].
pub const TEST_MANAGEMENT_TOKEN: &str = "test-management-token";

/// Management client id expected by the mock token endpoint.
pub const TEST_MANAGEMENT_CLIENT_ID: &str = "test-mgmt-client";

/// Management client secret expected by the mock token endpoint.
pub const TEST_MANAGEMENT_CLIENT_SECRET: &str = "test-mgmt-secret";

/// Passage app id served by [`MockPassage`].
pub const TEST_PASSAGE_APP_ID: &str = "test-passage-app";

/// Passage API key expected by the mock profile endpoint.
pub const TEST_PASSAGE_API_KEY: &str = "test-passage-api-key";

// ============================================================================
// Auth0
// ============================================================================

/// Mock Auth0 tenant.
pub struct MockAuth0 {
    server: MockServer,
}

impl MockAuth0 {
    /// Start an empty mock tenant.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Tenant "domain" (`127.0.0.1:{port}`), as placed in `AUTH0_DOMAIN`.
    pub fn domain(&self) -> String {
        self.server.address().to_string()
    }

    /// Base URL (`http://127.0.0.1:{port}`).
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Underlying server, for custom mocks and request inspection.
    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Serve a key set containing `keys`.
    pub async fn mount_jwks(&self, keys: &[&TestSigningKey]) {
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json(keys)))
            .mount(&self.server)
            .await;
    }

    /// Serve the key-set endpoint with an error status.
    pub async fn mount_jwks_failure(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Issue [`TEST_MANAGEMENT_TOKEN`] for the test management client.
    pub async fn mount_management_token(&self) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_partial_json(json!({
                "grant_type": "client_credentials",
                "client_id": TEST_MANAGEMENT_CLIENT_ID,
                "client_secret": TEST_MANAGEMENT_CLIENT_SECRET,
                "audience": format!("https://{}/api/v2/", self.domain()),
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": TEST_MANAGEMENT_TOKEN,
                "token_type": "Bearer",
                "expires_in": 86400
            })))
            .mount(&self.server)
            .await;
    }

    /// Reject every management token request with `status`.
    pub async fn mount_management_token_failure(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(
                ResponseTemplate::new(status).set_body_json(json!({
                    "error": "access_denied",
                    "error_description": "Unauthorized"
                })),
            )
            .mount(&self.server)
            .await;
    }

    /// Return an existing account when searching for `email`.
    pub async fn mount_existing_user(&self, email: &str, user_id: &str) {
        Mock::given(method("GET"))
            .and(path("/api/v2/users-by-email"))
            .and(query_param("email", email))
            .and(header(
                "authorization",
                format!("Bearer {}", TEST_MANAGEMENT_TOKEN).as_str(),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "user_id": user_id,
                "email": email,
                "email_verified": true
            }])))
            .mount(&self.server)
            .await;
    }

    /// Return no accounts for any search.
    pub async fn mount_no_users(&self) {
        Mock::given(method("GET"))
            .and(path("/api/v2/users-by-email"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&self.server)
            .await;
    }

    /// Fail every search with `status`.
    pub async fn mount_search_failure(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path("/api/v2/users-by-email"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Accept account creation, answering `201` with `user_id`.
    pub async fn mount_create_user(&self, user_id: &str) {
        Mock::given(method("POST"))
            .and(path("/api/v2/users"))
            .and(body_partial_json(json!({"verify_email": false})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "user_id": user_id,
                "email_verified": false
            })))
            .mount(&self.server)
            .await;
    }

    /// Reject account creation with `409 Conflict`.
    pub async fn mount_create_user_conflict(&self) {
        Mock::given(method("POST"))
            .and(path("/api/v2/users"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "statusCode": 409,
                "error": "Conflict",
                "message": "The user already exists."
            })))
            .mount(&self.server)
            .await;
    }

    /// Number of requests received for `path` so far.
    pub async fn request_count(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == request_path)
            .count()
    }
}

// ============================================================================
// Passage
// ============================================================================

/// Mock Passage app.
pub struct MockPassage {
    server: MockServer,
}

impl MockPassage {
    /// Start an empty mock app.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Key-set host (`127.0.0.1:{port}`), as placed in `PASSAGE_AUTH_DOMAIN`.
    pub fn auth_domain(&self) -> String {
        self.server.address().to_string()
    }

    /// `iss` claim the gateway expects on tokens from this app.
    pub fn issuer(&self) -> String {
        format!(
            "https://{}/v1/apps/{}",
            self.auth_domain(),
            TEST_PASSAGE_APP_ID
        )
    }

    /// API base URL, as placed in `PASSAGE_API_URL`.
    pub fn api_url(&self) -> String {
        self.server.uri()
    }

    /// Underlying server.
    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Serve the app key set containing `keys`.
    pub async fn mount_jwks(&self, keys: &[&TestSigningKey]) {
        Mock::given(method("GET"))
            .and(path(format!(
                "/v1/apps/{}/.well-known/jwks.json",
                TEST_PASSAGE_APP_ID
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json(keys)))
            .mount(&self.server)
            .await;
    }

    /// Serve a user profile.
    pub async fn mount_user(
        &self,
        user_id: &str,
        email: &str,
        phone: &str,
        email_verified: bool,
        phone_verified: bool,
    ) {
        Mock::given(method("GET"))
            .and(path(format!(
                "/v1/apps/{}/users/{}",
                TEST_PASSAGE_APP_ID, user_id
            )))
            .and(header(
                "authorization",
                format!("Bearer {}", TEST_PASSAGE_API_KEY).as_str(),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user": {
                    "id": user_id,
                    "email": email,
                    "phone": phone,
                    "email_verified": email_verified,
                    "phone_verified": phone_verified,
                    "status": "active"
                }
            })))
            .mount(&self.server)
            .await;
    }

    /// Answer the profile lookup for `user_id` with `status`.
    pub async fn mount_user_failure(&self, user_id: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(format!(
                "/v1/apps/{}/users/{}",
                TEST_PASSAGE_APP_ID, user_id
            )))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }
}
