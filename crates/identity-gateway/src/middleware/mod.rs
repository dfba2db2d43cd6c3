//! HTTP middleware for the identity gateway.
//!
//! - `auth` - bearer-token boundary for protected routes
//! - `http_metrics` - request metrics for every response

pub mod auth;
pub mod http_metrics;

pub use auth::{require_auth, AuthState};
pub use http_metrics::http_metrics_middleware;
