//! Authentication middleware for protected routes.
//!
//! Extracts the bearer token from the Authorization header, verifies it with
//! the [`TokenVerifier`], and inserts the resulting [`AuthenticatedIdentity`]
//! into the request extensions. Handlers take it as
//! `Extension<AuthenticatedIdentity>`.
//!
//! [`AuthenticatedIdentity`]: crate::auth::AuthenticatedIdentity

use crate::auth::TokenVerifier;
use crate::errors::GatewayError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Token verifier backed by the tenant key set.
    pub verifier: Arc<TokenVerifier>,

    /// Expected `aud` claim.
    pub audience: String,

    /// Tenant domain; selects the key set and the expected issuer.
    pub domain: String,
}

/// Extract the bearer token from the Authorization header.
///
/// The value must split on single spaces into exactly `Bearer` and a token.
fn extract_bearer_token(req: &Request) -> Result<&str, GatewayError> {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "gateway.middleware.auth", "Missing Authorization header");
            GatewayError::InvalidToken("Authorization header required".to_string())
        })?;

    let parts: Vec<&str> = auth_header.split(' ').collect();
    match parts.as_slice() {
        ["Bearer", token] => Ok(token),
        _ => {
            tracing::debug!(target: "gateway.middleware.auth", "Invalid Authorization header format");
            Err(GatewayError::InvalidToken(
                "Invalid authorization header format".to_string(),
            ))
        }
    }
}

/// Authentication middleware.
///
/// # Response
///
/// - 401 Unauthorized if the header is missing or malformed (no verification attempted)
/// - 401 Unauthorized with a generic message if verification fails
/// - Otherwise continues with the identity in the request extensions
#[instrument(skip_all, name = "gateway.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, GatewayError> {
    let token = extract_bearer_token(&req)?;

    let identity = state
        .verifier
        .verify(token, &state.audience, &state.domain)
        .await?;

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::jwks::mock::MockKeySetFetcher;
    use crate::auth::{AuthenticatedIdentity, KeySet};
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Extension, Router,
    };
    use gateway_test_utils::{TestSigningKey, TestTokenBuilder, TEST_AUDIENCE, TEST_KID};
    use tower::ServiceExt;

    const DOMAIN: &str = "tenant.auth0.test";

    async fn whoami(Extension(identity): Extension<AuthenticatedIdentity>) -> String {
        identity.subject
    }

    fn app(key: &TestSigningKey) -> (Router, Arc<MockKeySetFetcher>) {
        let key_set: KeySet =
            serde_json::from_value(gateway_test_utils::jwks_json(&[key])).unwrap();
        let fetcher = Arc::new(MockKeySetFetcher::with_key_set(key_set));
        let state = Arc::new(AuthState {
            verifier: Arc::new(TokenVerifier::new(fetcher.clone())),
            audience: TEST_AUDIENCE.to_string(),
            domain: DOMAIN.to_string(),
        });

        let router = Router::new()
            .route("/whoami", get(whoami))
            .route_layer(middleware::from_fn_with_state(state, require_auth));
        (router, fetcher)
    }

    fn request(authorization: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().uri("/whoami");
        if let Some(value) = authorization {
            builder = builder.header("authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_auth_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AuthState>();
    }

    #[tokio::test]
    async fn test_valid_token_reaches_handler() {
        let key = TestSigningKey::primary(TEST_KID);
        let (router, fetcher) = app(&key);
        let token = key.sign(
            &TestTokenBuilder::new()
                .for_user("auth0|bob")
                .issued_by_domain(DOMAIN)
                .build(),
        );

        let response = router
            .oneshot(request(Some(&format!("Bearer {}", token))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_header_problems_skip_verification() {
        let key = TestSigningKey::primary(TEST_KID);
        let token = key.sign(&TestTokenBuilder::new().issued_by_domain(DOMAIN).build());

        let bad_headers = [
            None,
            Some(token.clone()),
            Some(format!("Basic {}", token)),
            Some(format!("bearer {}", token)),
            Some(format!("Bearer  {}", token)),
            Some(format!("Bearer {} extra", token)),
            Some("Bearer".to_string()),
        ];

        for header in bad_headers {
            let (router, fetcher) = app(&key);
            let response = router.oneshot(request(header.as_deref())).await.unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert!(response.headers().contains_key("WWW-Authenticate"));
            assert_eq!(fetcher.call_count(), 0, "verifier must not run for {:?}", header);
        }
    }

    #[tokio::test]
    async fn test_invalid_token_rejected_once() {
        let key = TestSigningKey::primary(TEST_KID);
        let (router, fetcher) = app(&key);
        let token = key.sign(
            &TestTokenBuilder::new()
                .issued_by_domain(DOMAIN)
                .expires_in(-60)
                .build(),
        );

        let response = router
            .oneshot(request(Some(&format!("Bearer {}", token))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(fetcher.call_count(), 1);
    }
}
