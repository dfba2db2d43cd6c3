//! Metrics definitions for the identity gateway.
//!
//! All metrics follow Prometheus naming conventions:
//! - `gateway_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 7 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS)
//! - `endpoint`: 6 values (known paths plus `/other`)
//! - `status`: success, error, timeout (or a fetch error kind)
//! - `error_type` / `outcome`: bounded by error variants
//! - `provider` / `operation`: bounded by code

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return the handle served at `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("gateway_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // One key-set round trip per verification when uncached
        .set_buckets_for_metric(
            Matcher::Prefix("gateway_token_validation".to_string()),
            &[
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500,
            ],
        )
        .map_err(|e| format!("Failed to set token validation buckets: {e}"))?
        // Up to five provider calls per exchange
        .set_buckets_for_metric(
            Matcher::Prefix("gateway_migration_exchange".to_string()),
            &[0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000, 30.000],
        )
        .map_err(|e| format!("Failed to set migration exchange buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `gateway_http_requests_total`, `gateway_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
///
/// Captures ALL HTTP responses, including framework-level 400/404/405/415.
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("gateway_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("gateway_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path; unknown paths collapse to `/other`.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/api/v1/me" => "/api/v1/me",
        "/migrate/exchange-token" => "/migrate/exchange-token",
        "/migrate/stats" => "/migrate/stats",
        _ => "/other",
    }
}

// ============================================================================
// Token Validation Metrics
// ============================================================================

/// Record a bearer-token verification
///
/// Metric: `gateway_token_validations_total`, `gateway_token_validation_duration_seconds`
/// Labels: `status`, `error_type`
pub fn record_token_validation(status: &str, error_type: Option<&'static str>, duration: Duration) {
    histogram!("gateway_token_validation_duration_seconds",
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("gateway_token_validations_total",
        "status" => status.to_string(),
        "error_type" => error_type.unwrap_or("none")
    )
    .increment(1);
}

/// Record a key-set fetch
///
/// Metric: `gateway_jwks_fetches_total`
/// Labels: `status` ("success" or a fetch error kind)
pub fn record_jwks_fetch(status: &'static str) {
    counter!("gateway_jwks_fetches_total", "status" => status).increment(1);
}

// ============================================================================
// Migration Metrics
// ============================================================================

/// Record a token exchange
///
/// Metric: `gateway_migration_exchanges_total`, `gateway_migration_exchange_duration_seconds`
/// Labels: `status`, `outcome` ("new", "repeat", or a failure label)
pub fn record_migration_exchange(status: &str, outcome: &'static str, duration: Duration) {
    histogram!("gateway_migration_exchange_duration_seconds",
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("gateway_migration_exchanges_total",
        "status" => status.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record an exchange request rejected before the workflow ran
///
/// Counter only; no duration is recorded for requests that never started.
///
/// Metric: `gateway_migration_exchanges_total`
/// Labels: `status` ("error"), `outcome`
pub fn record_migration_rejection(outcome: &'static str) {
    counter!("gateway_migration_exchanges_total",
        "status" => "error",
        "outcome" => outcome
    )
    .increment(1);
}

/// Record an outbound call to an identity provider
///
/// Metric: `gateway_provider_requests_total`
/// Labels: `provider`, `operation`, `status`
pub fn record_provider_request(provider: &'static str, operation: &'static str, status: &str) {
    counter!("gateway_provider_requests_total",
        "provider" => provider,
        "operation" => operation,
        "status" => status.to_string()
    )
    .increment(1);
}

/// Set the current number of migration ledger records
///
/// Metric: `gateway_migration_ledger_records`
#[allow(clippy::cast_precision_loss)]
pub fn set_ledger_records(count: usize) {
    gauge!("gateway_migration_ledger_records").set(count as f64);
}

// ============================================================================
// Tests
// ============================================================================
