//! HTTP routes for the identity gateway.
//!
//! Defines the Axum router and application state.

use crate::auth::{CachedKeySetFetcher, HttpKeySetFetcher, KeySetFetcher, TokenVerifier};
use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth, AuthState};
use crate::migration::{Auth0Provisioner, InMemoryLedger, MigrationOrchestrator, PassageValidator};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub use crate::observability::metrics::init_metrics_recorder;

/// Connect timeout for every outbound provider call.
const OUTBOUND_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Server-side request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Bearer-token boundary state for protected routes.
    pub auth: Arc<AuthState>,

    /// Exchange workflow, `None` when migration is disabled.
    pub migration: Option<Arc<MigrationOrchestrator>>,
}

impl AppState {
    /// Wire the verifier and, when configured, the migration path.
    ///
    /// One HTTP client (request timeout from config, 5s connect timeout) is
    /// shared by every outbound call.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built (e.g., TLS backend
    /// initialisation failure).
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.outbound_timeout_seconds))
            .connect_timeout(OUTBOUND_CONNECT_TIMEOUT)
            .build()?;

        let auth = Arc::new(AuthState {
            verifier: Arc::new(TokenVerifier::new(key_set_fetcher(
                http_client.clone(),
                config,
            ))),
            audience: config.auth0_audience.clone(),
            domain: config.auth0_domain.clone(),
        });

        let migration = config.migration.as_ref().map(|settings| {
            let source = PassageValidator::new(
                http_client.clone(),
                key_set_fetcher(http_client.clone(), config),
                settings,
            );
            let provisioner = Auth0Provisioner::new(
                http_client.clone(),
                config.provider_base_url(&config.auth0_domain),
                &config.auth0_domain,
                settings.auth0_client_id.clone(),
                settings.auth0_client_secret.clone(),
                settings.auth0_connection.clone(),
            );

            Arc::new(MigrationOrchestrator::new(
                Arc::new(source),
                Arc::new(provisioner),
                Arc::new(InMemoryLedger::new()),
            ))
        });

        Ok(Self { auth, migration })
    }
}

/// Uncached fetcher, wrapped in the TTL cache when `JWKS_CACHE_TTL_SECONDS > 0`.
fn key_set_fetcher(http_client: reqwest::Client, config: &Config) -> Arc<dyn KeySetFetcher> {
    let fetcher: Arc<dyn KeySetFetcher> = Arc::new(HttpKeySetFetcher::new(
        http_client,
        config.provider_url_scheme.clone(),
    ));

    if config.jwks_cache_ttl_seconds > 0 {
        Arc::new(CachedKeySetFetcher::new(
            fetcher,
            Duration::from_secs(config.jwks_cache_ttl_seconds),
        ))
    } else {
        fetcher
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/api/v1/me` - Current identity - requires a bearer token
/// - `/migrate/exchange-token`, `/migrate/stats` - only when migration is enabled
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let protected_routes = Router::new()
        .route("/api/v1/me", get(handlers::get_me))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            require_auth,
        ));

    let mut app = public_routes.merge(metrics_routes).merge(protected_routes);

    if let Some(orchestrator) = &state.migration {
        let migration_routes = Router::new()
            .route("/migrate/exchange-token", post(handlers::exchange_token))
            .route("/migrate/stats", get(handlers::migration_stats))
            .with_state(orchestrator.clone());
        app = app.merge(migration_routes);
    }

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    app.layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(middleware::from_fn(http_metrics_middleware))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(extra: &[(&str, &str)]) -> Config {
        let mut vars = HashMap::from([
            ("AUTH0_DOMAIN".to_string(), "tenant.auth0.test".to_string()),
            (
                "AUTH0_AUDIENCE".to_string(),
                "https://api.example.test".to_string(),
            ),
        ]);
        for (k, v) in extra {
            vars.insert((*k).to_string(), (*v).to_string());
        }
        Config::from_vars(&vars).unwrap()
    }

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn test_state_without_migration() {
        let state = AppState::from_config(&config(&[])).unwrap();

        assert!(state.migration.is_none());
        assert_eq!(state.auth.domain, "tenant.auth0.test");
        assert_eq!(state.auth.audience, "https://api.example.test");
    }

    #[test]
    fn test_state_with_migration_and_cache() {
        let state = AppState::from_config(&config(&[
            ("PASSAGE_APP_ID", "app"),
            ("PASSAGE_API_KEY", "key"),
            ("AUTH0_CLIENT_ID", "client"),
            ("AUTH0_CLIENT_SECRET", "secret"),
            ("JWKS_CACHE_TTL_SECONDS", "60"),
        ]))
        .unwrap();

        assert!(state.migration.is_some());
    }
}
