//! JWT header utilities shared by the gateway's token checks.
//!
//! This module provides:
//! - Size limits for DoS prevention
//! - The signing-algorithm allow-list
//! - Header parsing (`alg` + `kid`) without signature verification
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing
//! - Only RSA PKCS#1 v1.5 algorithms are accepted. Symmetric (`HS*`) and
//!   `none` algorithms are rejected before any key is looked up, so a token
//!   cannot pick the verification method for itself.
//! - Error messages are intentionally generic; details go to debug logs.
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::parse_token_header;
//!
//! let header = parse_token_header(token)?;
//! // header.kid selects the key, header.alg drives verification
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::Algorithm;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Typical access tokens are well under 2KB. JWTs larger than this are
/// rejected BEFORE any base64 decoding or cryptographic work.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Signing algorithms accepted for bearer and legacy tokens.
///
/// Every entry is asymmetric and verifiable from an RSA `n`/`e` pair.
pub const ALLOWED_ALGORITHMS: [Algorithm; 3] =
    [Algorithm::RS256, Algorithm::RS384, Algorithm::RS512];

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while reading a JWT header.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtHeaderError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Header declares an algorithm outside [`ALLOWED_ALGORITHMS`].
    #[error("The access token is invalid or expired")]
    UnsupportedAlgorithm,

    /// Token is missing the `kid` header, or it is empty / not a string.
    #[error("The access token is invalid or expired")]
    MissingKid,
}

// =============================================================================
// Header
// =============================================================================

/// The parts of a JWT header the verifiers act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    /// Declared signing algorithm, guaranteed to be in the allow-list.
    pub alg: Algorithm,

    /// Key identifier used to select the verification key.
    pub kid: String,
}

/// Map a header `alg` value onto the allow-list.
///
/// Returns `None` for anything not in [`ALLOWED_ALGORITHMS`], including
/// `none`, `HS256` and the EC/PSS families.
#[must_use]
pub fn allowed_algorithm(alg: &str) -> Option<Algorithm> {
    match alg {
        "RS256" => Some(Algorithm::RS256),
        "RS384" => Some(Algorithm::RS384),
        "RS512" => Some(Algorithm::RS512),
        _ => None,
    }
}

/// Parse and check a JWT header without verifying the signature.
///
/// Checks are applied in order: size, structure, algorithm, key id. The
/// returned header MUST still be followed by signature verification with a
/// key from a trusted key set.
///
/// # Errors
///
/// - `TokenTooLarge` - token exceeds [`MAX_JWT_SIZE_BYTES`]
/// - `MalformedToken` - wrong segment count, bad base64, invalid JSON, or no `alg`
/// - `UnsupportedAlgorithm` - `alg` is not in the allow-list
/// - `MissingKid` - `kid` absent, empty, or not a string
pub fn parse_token_header(token: &str) -> Result<TokenHeader, JwtHeaderError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtHeaderError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        tracing::debug!(
            target: "common.jwt",
            parts = parts.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(JwtHeaderError::MalformedToken);
    }

    let header_part = parts.first().ok_or(JwtHeaderError::MalformedToken)?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtHeaderError::MalformedToken
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtHeaderError::MalformedToken
    })?;

    let alg_name = header
        .get("alg")
        .and_then(|v| v.as_str())
        .ok_or(JwtHeaderError::MalformedToken)?;

    let alg = allowed_algorithm(alg_name).ok_or_else(|| {
        tracing::debug!(target: "common.jwt", alg = %alg_name, "Token rejected: algorithm not allowed");
        JwtHeaderError::UnsupportedAlgorithm
    })?;

    let kid = header
        .get("kid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtHeaderError::MissingKid)?;

    Ok(TokenHeader { alg, kid })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn token_with_header(header: &str) -> String {
        let header_b64 = URL_SAFE_NO_PAD.encode(header);
        format!("{header_b64}.payload.signature")
    }

    #[test]
    fn test_max_jwt_size_is_8kb() {
        assert_eq!(MAX_JWT_SIZE_BYTES, 8192);
    }

    #[test]
    fn test_parse_header_valid_rs256() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT","kid":"key-01"}"#);

        let header = parse_token_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.kid, "key-01");
    }

    #[test]
    fn test_parse_header_accepts_rs384_and_rs512() {
        let token = token_with_header(r#"{"alg":"RS384","kid":"k"}"#);
        assert_eq!(parse_token_header(&token).unwrap().alg, Algorithm::RS384);

        let token = token_with_header(r#"{"alg":"RS512","kid":"k"}"#);
        assert_eq!(parse_token_header(&token).unwrap().alg, Algorithm::RS512);
    }

    #[test]
    fn test_parse_header_rejects_symmetric_and_none() {
        for alg in ["HS256", "HS512", "none", "ES256", "PS256", "EdDSA"] {
            let token = token_with_header(&format!(r#"{{"alg":"{alg}","kid":"k"}}"#));
            assert_eq!(
                parse_token_header(&token),
                Err(JwtHeaderError::UnsupportedAlgorithm),
                "alg {alg} must be rejected"
            );
        }
    }

    #[test]
    fn test_algorithm_checked_before_kid() {
        let token = token_with_header(r#"{"alg":"HS256"}"#);
        assert_eq!(
            parse_token_header(&token),
            Err(JwtHeaderError::UnsupportedAlgorithm)
        );
    }

    #[test]
    fn test_parse_header_missing_kid() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT"}"#);
        assert_eq!(parse_token_header(&token), Err(JwtHeaderError::MissingKid));
    }

    #[test]
    fn test_parse_header_empty_or_non_string_kid() {
        let token = token_with_header(r#"{"alg":"RS256","kid":""}"#);
        assert_eq!(parse_token_header(&token), Err(JwtHeaderError::MissingKid));

        let token = token_with_header(r#"{"alg":"RS256","kid":12345}"#);
        assert_eq!(parse_token_header(&token), Err(JwtHeaderError::MissingKid));
    }

    #[test]
    fn test_parse_header_missing_alg_is_malformed() {
        let token = token_with_header(r#"{"kid":"k"}"#);
        assert_eq!(
            parse_token_header(&token),
            Err(JwtHeaderError::MalformedToken)
        );
    }

    #[test]
    fn test_parse_header_malformed_structure() {
        for token in ["", "single", "only.two", "a.b.c.d", ".payload.signature", "h..s"] {
            assert_eq!(
                parse_token_header(token),
                Err(JwtHeaderError::MalformedToken),
                "token {token:?} must be malformed"
            );
        }
    }

    #[test]
    fn test_parse_header_invalid_base64_and_json() {
        assert_eq!(
            parse_token_header("!!!invalid!!!.payload.signature"),
            Err(JwtHeaderError::MalformedToken)
        );

        let token = token_with_header("not-json");
        assert_eq!(
            parse_token_header(&token),
            Err(JwtHeaderError::MalformedToken)
        );
    }

    #[test]
    fn test_parse_header_oversized_token() {
        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(
            parse_token_header(&oversized),
            Err(JwtHeaderError::TokenTooLarge)
        );
    }

    #[test]
    fn test_parse_header_at_size_limit() {
        let header_b64 = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","kid":"key"}"#);
        let remaining = MAX_JWT_SIZE_BYTES - header_b64.len() - 2;
        let payload_len = remaining / 2;
        let token = format!(
            "{}.{}.{}",
            header_b64,
            "a".repeat(payload_len),
            "b".repeat(remaining - payload_len)
        );
        assert_eq!(token.len(), MAX_JWT_SIZE_BYTES);

        assert_eq!(parse_token_header(&token).unwrap().kid, "key");
    }

    #[test]
    fn test_error_messages_are_generic() {
        for err in [
            JwtHeaderError::TokenTooLarge,
            JwtHeaderError::MalformedToken,
            JwtHeaderError::UnsupportedAlgorithm,
            JwtHeaderError::MissingKid,
        ] {
            assert_eq!(err.to_string(), "The access token is invalid or expired");
        }
    }
}
