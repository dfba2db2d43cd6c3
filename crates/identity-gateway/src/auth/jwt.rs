//! Bearer-token verification against a remote signing-key set.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only RS256/RS384/RS512 are accepted; the check happens before any key
//!   lookup so a token cannot choose a symmetric or `none` algorithm
//! - Only the key whose `kid` matches is tried
//! - Every failure maps to the same generic client message; the reason is
//!   logged at debug level and recorded as a bounded metric label

use crate::auth::identity::AuthenticatedIdentity;
use crate::auth::jwks::{KeySet, KeySetFetcher, SigningKey};
use crate::errors::AuthError;
use crate::observability::metrics;
use common::jwt::{parse_token_header, TokenHeader};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Claims read from a verified token.
///
/// Every field is kept as raw JSON so that type mismatches surface as the
/// matching [`AuthError`] instead of a decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<Value>,

    #[serde(default)]
    pub email: Option<Value>,

    #[serde(default)]
    pub aud: Option<Value>,

    #[serde(default)]
    pub iss: Option<Value>,

    #[serde(default)]
    pub exp: Option<Value>,
}

impl TokenClaims {
    /// `email` claim when it is a string.
    pub fn email(&self) -> Option<&str> {
        self.email.as_ref().and_then(Value::as_str)
    }
}

/// Which claim values a token must carry.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaimExpectations<'a> {
    /// Required audience; `None` skips the audience check.
    pub audience: Option<&'a str>,

    /// Required issuer; `None` skips the issuer check.
    pub issuer: Option<&'a str>,
}

/// Issuer expected for tokens minted by `domain`.
pub fn expected_issuer(domain: &str) -> String {
    format!("https://{}/", domain)
}

/// Check claims in order: audience, issuer, expiry, subject.
///
/// `now` is Unix seconds. A token is expired iff `now > exp`, with a
/// fractional `exp` truncated, so `exp == now` is still accepted.
///
/// Returns the subject on success.
pub fn validate_claims(
    claims: &TokenClaims,
    expectations: &ClaimExpectations<'_>,
    now: i64,
) -> Result<String, AuthError> {
    if let Some(audience) = expectations.audience {
        if !audience_matches(claims.aud.as_ref(), audience) {
            return Err(AuthError::InvalidAudience);
        }
    }

    if let Some(issuer) = expectations.issuer {
        if claims.iss.as_ref().and_then(Value::as_str) != Some(issuer) {
            return Err(AuthError::InvalidIssuer);
        }
    }

    let exp = claims
        .exp
        .as_ref()
        .and_then(Value::as_f64)
        .ok_or(AuthError::MissingExpiry)?;
    #[allow(clippy::cast_possible_truncation)]
    let exp = exp.trunc() as i64;
    if now > exp {
        return Err(AuthError::Expired);
    }

    match &claims.sub {
        Some(Value::String(sub)) => Ok(sub.clone()),
        _ => Err(AuthError::MissingSubject),
    }
}

fn audience_matches(aud: Option<&Value>, expected: &str) -> bool {
    match aud {
        Some(Value::String(aud)) => aud == expected,
        Some(Value::Array(values)) => values.iter().any(|v| v.as_str() == Some(expected)),
        _ => false,
    }
}

/// Verify a token's signature against a key set.
///
/// The header must already have passed [`parse_token_header`]. Only the key
/// matching `header.kid` is tried.
pub fn verify_with_key_set(
    token: &str,
    header: &TokenHeader,
    key_set: &KeySet,
) -> Result<TokenClaims, AuthError> {
    let key = key_set.find(&header.kid).ok_or_else(|| {
        tracing::debug!(target: "gateway.auth.jwt", kid = %header.kid, "Key not found in key set");
        AuthError::KeyNotFound
    })?;

    verify_with_key(token, header, key)
}

fn verify_with_key(
    token: &str,
    header: &TokenHeader,
    key: &SigningKey,
) -> Result<TokenClaims, AuthError> {
    if key.kty != "RSA" {
        tracing::warn!(target: "gateway.auth.jwt", kty = %key.kty, kid = %key.kid, "Unexpected key type");
        return Err(AuthError::InvalidSignature);
    }

    let (Some(n), Some(e)) = (key.n.as_deref(), key.e.as_deref()) else {
        tracing::warn!(target: "gateway.auth.jwt", kid = %key.kid, "Key is missing RSA components");
        return Err(AuthError::InvalidSignature);
    };

    let decoding_key = DecodingKey::from_rsa_components(n, e).map_err(|e| {
        tracing::warn!(target: "gateway.auth.jwt", error = %e, "Invalid RSA key material");
        AuthError::InvalidSignature
    })?;

    // Claim checks run separately so their order and boundaries are ours.
    let mut validation = Validation::new(header.alg);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let token_data = decode::<TokenClaims>(token, &decoding_key, &validation).map_err(|e| {
        tracing::debug!(target: "gateway.auth.jwt", error = %e, "Token verification failed");
        match e.kind() {
            ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) | ErrorKind::InvalidToken => {
                AuthError::Malformed
            }
            _ => AuthError::InvalidSignature,
        }
    })?;

    Ok(token_data.claims)
}

/// Verifies bearer tokens using keys fetched per call.
pub struct TokenVerifier {
    fetcher: Arc<dyn KeySetFetcher>,
}

impl TokenVerifier {
    pub fn new(fetcher: Arc<dyn KeySetFetcher>) -> Self {
        Self { fetcher }
    }

    /// Verify a bearer token and return the authenticated identity.
    ///
    /// # Checks
    ///
    /// 1. Structure and size
    /// 2. Algorithm allow-list
    /// 3. Key id present
    /// 4. Key set fetched for `domain`
    /// 5. Matching key present
    /// 6. Signature
    /// 7. Audience, issuer (`https://{domain}/`), expiry, subject
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] of the first failed check.
    #[instrument(skip_all, name = "gateway.auth.verify")]
    pub async fn verify(
        &self,
        token: &str,
        expected_audience: &str,
        domain: &str,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        let start = Instant::now();
        let result = self.verify_inner(token, expected_audience, domain).await;

        match &result {
            Ok(_) => {
                metrics::record_token_validation("success", None, start.elapsed());
                tracing::debug!(target: "gateway.auth.jwt", "Token validated successfully");
            }
            Err(e) => {
                metrics::record_token_validation("error", Some(e.reason()), start.elapsed());
                tracing::debug!(target: "gateway.auth.jwt", reason = e.reason(), "Token rejected");
            }
        }

        result
    }

    async fn verify_inner(
        &self,
        token: &str,
        expected_audience: &str,
        domain: &str,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        let claims = self.verify_signed(token, domain).await?;

        let issuer = expected_issuer(domain);
        let expectations = ClaimExpectations {
            audience: Some(expected_audience),
            issuer: Some(&issuer),
        };
        let subject = validate_claims(&claims, &expectations, chrono::Utc::now().timestamp())?;

        Ok(AuthenticatedIdentity {
            subject,
            email: claims.email().unwrap_or_default().to_string(),
        })
    }

    /// Header, key lookup, and signature checks without claim validation.
    ///
    /// `domain` selects the key set (`{scheme}://{domain}/.well-known/jwks.json`).
    pub async fn verify_signed(&self, token: &str, domain: &str) -> Result<TokenClaims, AuthError> {
        let header = parse_token_header(token).map_err(|e| {
            tracing::debug!(target: "gateway.auth.jwt", error = ?e, "Token header rejected");
            AuthError::from(e)
        })?;

        let key_set = self.fetcher.fetch(domain).await.map_err(|e| {
            tracing::warn!(target: "gateway.auth.jwt", error = %e, "Key set unavailable");
            AuthError::KeySetUnavailable
        })?;

        verify_with_key_set(token, &header, &key_set)
    }
}
