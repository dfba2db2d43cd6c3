//! # Gateway Test Utilities
//!
//! Shared test utilities for the identity gateway.
//!
//! This crate provides:
//! - Fixed RSA signing keys and JWK renderings (`crypto_fixtures`)
//! - Claim builders (`token_builders`)
//! - wiremock-backed Auth0 and Passage mocks (`mock_providers`)
//! - Server test harness (`TestGatewayServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gateway_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_me() -> anyhow::Result<()> {
//!     let key = TestSigningKey::primary(TEST_KID);
//!     let auth0 = MockAuth0::start().await;
//!     auth0.mount_jwks(&[&key]).await;
//!
//!     let server = TestGatewayServer::spawn(gateway_vars(&auth0)).await?;
//!     let token = key.sign(
//!         &TestTokenBuilder::new()
//!             .for_user("auth0|alice")
//!             .issued_by_domain(&auth0.domain())
//!             .build(),
//!     );
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/api/v1/me", server.url()))
//!         .bearer_auth(token)
//!         .send()
//!         .await?;
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_providers;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use mock_providers::*;
pub use server_harness::*;
pub use token_builders::*;
