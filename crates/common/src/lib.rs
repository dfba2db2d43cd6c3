//! Common utilities shared across the identity gateway crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT header parsing and the signing-algorithm allow-list
pub mod jwt;

/// Module for the OAuth 2.0 client-credentials exchange
pub mod client_credentials;
