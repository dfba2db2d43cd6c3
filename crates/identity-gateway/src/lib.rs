//! Identity Gateway Library
//!
//! Authenticates requests against an Auth0 tenant's published signing keys
//! and migrates Passage users to Auth0 accounts without handling passwords.
//!
//! # Architecture
//!
//! Two independent entry points share the authentication domain:
//!
//! ```text
//! query path:     middleware::auth -> auth::jwt -> auth::jwks
//! migration path: handlers::migration -> migration::orchestrator
//!                   -> migration::source, migration::provisioner, migration::ledger
//! ```
//!
//! # Modules
//!
//! - `auth` - Key sets, token verification, authenticated identity
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Bearer-token boundary and HTTP metrics
//! - `migration` - Token exchange workflow and its collaborators
//! - `observability` - Metrics
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod migration;
pub mod observability;
pub mod routes;
