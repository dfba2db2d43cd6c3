//! Bearer-token authentication.
//!
//! - `jwks` - signing-key sets and fetchers (optionally TTL-cached)
//! - `jwt` - token verification and claim checks
//! - `identity` - the per-request authenticated identity

pub mod identity;
pub mod jwks;
pub mod jwt;

pub use identity::AuthenticatedIdentity;
pub use jwks::{CachedKeySetFetcher, HttpKeySetFetcher, KeySet, KeySetFetcher, SigningKey};
pub use jwt::{expected_issuer, validate_claims, ClaimExpectations, TokenClaims, TokenVerifier};
