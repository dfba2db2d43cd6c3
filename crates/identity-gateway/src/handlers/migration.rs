//! Migration endpoint handlers.
//!
//! Mounted only when migration is configured. No bearer authentication: the
//! legacy token in the body proves the caller's identity.

use crate::errors::MigrationError;
use crate::migration::{MigrationOrchestrator, MigrationStats};
use crate::observability::metrics;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

/// Returned on success. Final sign-in happens with the target provider.
pub const MIGRATION_SUCCESS_MESSAGE: &str =
    "User migrated successfully. Use passwordless authentication to get Auth0 token.";

/// Request body for `POST /migrate/exchange-token`.
#[derive(Debug, Deserialize)]
pub struct ExchangeTokenRequest {
    #[serde(default)]
    pub passage_token: Option<String>,
}

/// Response body for `POST /migrate/exchange-token`.
#[derive(Debug, Serialize)]
pub struct ExchangeTokenResponse {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth0_user_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub is_new_migration: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ExchangeTokenResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            auth0_user_id: None,
            email: None,
            is_new_migration: false,
            message: Some(message.into()),
        }
    }
}

fn bad_request(
    err: &MigrationError,
    message: &str,
) -> (StatusCode, Json<ExchangeTokenResponse>) {
    tracing::debug!(target: "gateway.handlers.migration", error = %err, "Rejected exchange request");
    metrics::record_migration_rejection(err.outcome());
    (
        StatusCode::BAD_REQUEST,
        Json(ExchangeTokenResponse::failure(message)),
    )
}

/// Handler for POST /migrate/exchange-token
///
/// # Response
///
/// - 200 with the target account id, identifier, and `is_new_migration`
/// - 400 when the body is unparseable or `passage_token` is missing/empty
///
/// The body is parsed as JSON whatever the `Content-Type` header says.
/// - 401 with the failure text when validation or provisioning fails
#[instrument(skip_all, name = "gateway.handlers.exchange_token")]
pub async fn exchange_token(
    State(orchestrator): State<Arc<MigrationOrchestrator>>,
    body: Bytes,
) -> (StatusCode, Json<ExchangeTokenResponse>) {
    let request = match serde_json::from_slice::<ExchangeTokenRequest>(&body) {
        Ok(request) => request,
        Err(e) => {
            return bad_request(
                &MigrationError::InvalidRequestBody(e.to_string()),
                "Invalid request body",
            );
        }
    };

    let token = match request.passage_token.as_deref() {
        Some(token) if !token.is_empty() => token,
        _ => {
            return bad_request(
                &MigrationError::InvalidRequestBody("passage_token missing".to_string()),
                "passage_token is required",
            );
        }
    };

    let token = token.strip_prefix("Bearer ").unwrap_or(token);

    match orchestrator.exchange(token).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(ExchangeTokenResponse {
                success: true,
                auth0_user_id: Some(outcome.target_account_id),
                email: Some(outcome.identifier),
                is_new_migration: outcome.is_new_migration,
                message: Some(MIGRATION_SUCCESS_MESSAGE.to_string()),
            }),
        ),
        Err(e) => (
            StatusCode::UNAUTHORIZED,
            Json(ExchangeTokenResponse::failure(e.to_string())),
        ),
    }
}

/// Handler for GET /migrate/stats
pub async fn migration_stats(
    State(orchestrator): State<Arc<MigrationOrchestrator>>,
) -> Json<MigrationStats> {
    Json(orchestrator.stats().await)
}
