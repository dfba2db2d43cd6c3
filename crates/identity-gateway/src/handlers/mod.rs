//! HTTP request handlers for the identity gateway.

pub mod health;
pub mod me;
pub mod metrics;
pub mod migration;

pub use health::health_check;
pub use me::get_me;
pub use metrics::metrics_handler;
pub use migration::{exchange_token, migration_stats};
