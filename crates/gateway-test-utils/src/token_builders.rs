//! Builder patterns for test token claims
//!
//! Provides a fluent API for creating bearer and legacy token claims.

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

/// Audience used by test bearer tokens.
pub const TEST_AUDIENCE: &str = "https://api.identity-gateway.test";

/// Builder for test JWT claims
///
/// # Example
/// ```rust,ignore
/// let claims = TestTokenBuilder::new()
///     .for_user("auth0|alice")
///     .with_email("alice@example.com")
///     .issued_by_domain(&auth0.domain())
///     .build();
/// let token = TestSigningKey::primary(TEST_KID).sign(&claims);
/// ```
pub struct TestTokenBuilder {
    sub: Option<String>,
    email: Option<String>,
    aud: Option<Value>,
    iss: Option<String>,
    exp: Option<Value>,
}

impl TestTokenBuilder {
    /// Create a new builder: subject `test-subject`, the test audience,
    /// no issuer, expiring in one hour.
    pub fn new() -> Self {
        Self {
            sub: Some("test-subject".to_string()),
            email: None,
            aud: Some(Value::String(TEST_AUDIENCE.to_string())),
            iss: None,
            exp: Some(json!((Utc::now() + Duration::seconds(3600)).timestamp())),
        }
    }

    /// Set the subject
    pub fn for_user(mut self, subject: &str) -> Self {
        self.sub = Some(subject.to_string());
        self
    }

    /// Drop the `sub` claim
    pub fn without_subject(mut self) -> Self {
        self.sub = None;
        self
    }

    /// Set the `email` claim
    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    /// Set a single-string audience
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.aud = Some(Value::String(audience.to_string()));
        self
    }

    /// Set an array audience
    pub fn with_audiences(mut self, audiences: &[&str]) -> Self {
        self.aud = Some(json!(audiences));
        self
    }

    /// Set a raw `aud` value (e.g. a number, for type checks)
    pub fn with_raw_audience(mut self, aud: Value) -> Self {
        self.aud = Some(aud);
        self
    }

    /// Drop the `aud` claim
    pub fn without_audience(mut self) -> Self {
        self.aud = None;
        self
    }

    /// Set the issuer to `https://{domain}/`
    pub fn issued_by_domain(mut self, domain: &str) -> Self {
        self.iss = Some(format!("https://{}/", domain));
        self
    }

    /// Set the issuer verbatim
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.iss = Some(issuer.to_string());
        self
    }

    /// Set expiration in seconds from now (negative for past)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = Some(json!((Utc::now() + Duration::seconds(seconds)).timestamp()));
        self
    }

    /// Set an absolute expiration timestamp
    pub fn expires_at(mut self, timestamp: i64) -> Self {
        self.exp = Some(json!(timestamp));
        self
    }

    /// Set a raw `exp` value (e.g. a string, for type checks)
    pub fn with_raw_expiry(mut self, exp: Value) -> Self {
        self.exp = Some(exp);
        self
    }

    /// Drop the `exp` claim
    pub fn without_expiry(mut self) -> Self {
        self.exp = None;
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        let mut claims = Map::new();
        if let Some(sub) = self.sub {
            claims.insert("sub".to_string(), Value::String(sub));
        }
        if let Some(email) = self.email {
            claims.insert("email".to_string(), Value::String(email));
        }
        if let Some(aud) = self.aud {
            claims.insert("aud".to_string(), aud);
        }
        if let Some(iss) = self.iss {
            claims.insert("iss".to_string(), Value::String(iss));
        }
        if let Some(exp) = self.exp {
            claims.insert("exp".to_string(), exp);
        }
        claims.insert("iat".to_string(), json!(Utc::now().timestamp()));
        Value::Object(claims)
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let claims = TestTokenBuilder::default().build();

        assert_eq!(claims["sub"], "test-subject");
        assert_eq!(claims["aud"], TEST_AUDIENCE);
        assert!(claims["exp"].as_i64().unwrap() > Utc::now().timestamp());
        assert!(claims.get("iss").is_none());
        assert!(claims.get("email").is_none());
    }

    #[test]
    fn test_builder_sets_claims() {
        let claims = TestTokenBuilder::new()
            .for_user("auth0|alice")
            .with_email("alice@example.com")
            .with_audiences(&["a", "b"])
            .issued_by_domain("tenant.test")
            .expires_at(1_700_000_000)
            .build();

        assert_eq!(claims["sub"], "auth0|alice");
        assert_eq!(claims["email"], "alice@example.com");
        assert_eq!(claims["aud"], json!(["a", "b"]));
        assert_eq!(claims["iss"], "https://tenant.test/");
        assert_eq!(claims["exp"], 1_700_000_000);
    }

    #[test]
    fn test_builder_drops_claims() {
        let claims = TestTokenBuilder::new()
            .without_subject()
            .without_audience()
            .without_expiry()
            .build();

        assert!(claims.get("sub").is_none());
        assert!(claims.get("aud").is_none());
        assert!(claims.get("exp").is_none());
    }
}
