//! Observability for the identity gateway.
//!
//! Provides metrics definitions and recording helpers.

pub mod metrics;
