//! Current identity handler.
//!
//! Stands in for the query-serving layer: it only echoes the identity the
//! auth middleware attached to the request.

use crate::auth::AuthenticatedIdentity;
use axum::{Extension, Json};
use serde::Serialize;
use tracing::instrument;

/// Response for `/api/v1/me`.
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    pub sub: String,

    /// Empty when the token carried no email.
    pub email: String,
}

/// Handler for GET /api/v1/me
///
/// ```json
/// { "sub": "auth0|abc123", "email": "alice@example.com" }
/// ```
#[instrument(skip_all, name = "gateway.handlers.me")]
pub async fn get_me(Extension(identity): Extension<AuthenticatedIdentity>) -> Json<MeResponse> {
    tracing::debug!(target: "gateway.handlers.me", "Returning identity");

    Json(MeResponse {
        sub: identity.subject,
        email: identity.email,
    })
}
