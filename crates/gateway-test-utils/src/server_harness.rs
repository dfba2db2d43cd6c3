//! Test server harness for E2E testing
//!
//! Provides `TestGatewayServer` for spawning real gateway instances on a
//! random loopback port, wired to mock providers.

use crate::mock_providers::{
    MockAuth0, MockPassage, TEST_MANAGEMENT_CLIENT_ID, TEST_MANAGEMENT_CLIENT_SECRET,
    TEST_PASSAGE_API_KEY, TEST_PASSAGE_APP_ID,
};
use crate::token_builders::TEST_AUDIENCE;
use identity_gateway::config::Config;
use identity_gateway::routes::{self, AppState};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;

/// One Prometheus recorder per test process.
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            routes::init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Environment for a gateway that trusts `auth0` and has migration disabled.
pub fn gateway_vars(auth0: &MockAuth0) -> HashMap<String, String> {
    HashMap::from([
        ("AUTH0_DOMAIN".to_string(), auth0.domain()),
        ("AUTH0_AUDIENCE".to_string(), TEST_AUDIENCE.to_string()),
        ("PROVIDER_URL_SCHEME".to_string(), "http".to_string()),
        ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
    ])
}

/// Environment for a gateway with migration enabled against both mocks.
pub fn migration_vars(auth0: &MockAuth0, passage: &MockPassage) -> HashMap<String, String> {
    let mut vars = gateway_vars(auth0);
    vars.extend([
        ("PASSAGE_APP_ID".to_string(), TEST_PASSAGE_APP_ID.to_string()),
        ("PASSAGE_API_KEY".to_string(), TEST_PASSAGE_API_KEY.to_string()),
        ("PASSAGE_AUTH_DOMAIN".to_string(), passage.auth_domain()),
        ("PASSAGE_API_URL".to_string(), passage.api_url()),
        (
            "AUTH0_CLIENT_ID".to_string(),
            TEST_MANAGEMENT_CLIENT_ID.to_string(),
        ),
        (
            "AUTH0_CLIENT_SECRET".to_string(),
            TEST_MANAGEMENT_CLIENT_SECRET.to_string(),
        ),
    ]);
    vars
}

/// Test harness for spawning the identity gateway in E2E tests.
///
/// # Example
/// ```rust,ignore
/// let auth0 = MockAuth0::start().await;
/// auth0.mount_jwks(&[&key]).await;
/// let server = TestGatewayServer::spawn(gateway_vars(&auth0)).await?;
///
/// let response = reqwest::Client::new()
///     .get(format!("{}/api/v1/me", server.url()))
///     .bearer_auth(token)
///     .send()
///     .await?;
/// ```
pub struct TestGatewayServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    _handle: JoinHandle<()>,
}

impl TestGatewayServer {
    /// Spawn a server configured from `vars`.
    ///
    /// The server binds to 127.0.0.1:0 and runs until dropped.
    pub async fn spawn(vars: HashMap<String, String>) -> Result<Self, anyhow::Error> {
        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let state = Arc::new(
            AppState::from_config(&config)
                .map_err(|e| anyhow::anyhow!("Failed to build app state: {}", e))?,
        );

        let app = routes::build_routes(state.clone(), test_metrics_handle());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            state,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the application state the server was built with.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }
}

impl Drop for TestGatewayServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_spawns_with_migration_disabled() -> Result<(), anyhow::Error> {
        let auth0 = MockAuth0::start().await;
        let server = TestGatewayServer::spawn(gateway_vars(&auth0)).await?;

        assert!(server.url().starts_with("http://127.0.0.1:"));
        assert!(server.addr().ip().is_loopback());
        assert!(server.state().migration.is_none());

        let body: serde_json::Value = reqwest::get(format!("{}/health", server.url()))
            .await?
            .json()
            .await?;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["migration_enabled"], false);

        Ok(())
    }

    #[tokio::test]
    async fn test_server_spawns_with_migration_enabled() -> Result<(), anyhow::Error> {
        let auth0 = MockAuth0::start().await;
        let passage = MockPassage::start().await;
        let server = TestGatewayServer::spawn(migration_vars(&auth0, &passage)).await?;

        assert!(server.state().migration.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_spawn_rejects_incomplete_config() {
        let result = TestGatewayServer::spawn(HashMap::new()).await;
        assert!(result.is_err());
    }
}
