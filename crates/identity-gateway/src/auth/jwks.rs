//! Signing-key sets and the fetchers that retrieve them.
//!
//! [`HttpKeySetFetcher`] performs exactly one `GET {scheme}://{domain}/.well-known/jwks.json`
//! per call: no cache, no retry, no background refresh. Key rotation is
//! therefore observed on the very next verification.
//!
//! [`CachedKeySetFetcher`] is an optional decorator that serves a key set
//! for at most `ttl` per domain. Rotation latency is bounded by the TTL.
//!
//! # Security
//!
//! - A fetch failure is surfaced to the verifier, which fails closed
//! - HTTPS is used in production (`PROVIDER_URL_SCHEME`)

use crate::errors::FetchError;
use crate::observability::metrics;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::instrument;

/// Public signing key as published in a JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct SigningKey {
    /// Key type ("RSA" for every key this gateway can use).
    pub kty: String,

    /// Key ID - selects the key for a token's `kid` header.
    #[serde(default)]
    pub kid: String,

    /// Key use (expected "sig").
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// Algorithm hint published with the key.
    #[serde(default)]
    pub alg: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// Certificate chain (base64 DER), unused for verification.
    #[serde(default)]
    pub x5c: Vec<String>,
}

/// Key set keyed by `kid`.
///
/// Uniqueness of `kid` is not enforced; [`KeySet::find`] returns the first
/// match.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeySet {
    keys: Vec<SigningKey>,
}

impl KeySet {
    /// Build a key set from keys in publication order.
    pub fn new(keys: Vec<SigningKey>) -> Self {
        Self { keys }
    }

    /// First key whose `kid` matches.
    pub fn find(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.iter().find(|key| key.kid == kid)
    }

    /// Number of published keys.
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }
}

/// Retrieves the current key set for a domain.
#[async_trait::async_trait]
pub trait KeySetFetcher: Send + Sync {
    /// Fetch the key set published by `domain`.
    async fn fetch(&self, domain: &str) -> Result<KeySet, FetchError>;
}

// =============================================================================
// HTTP fetcher
// =============================================================================

/// Fetches `/.well-known/jwks.json` over HTTP on every call.
pub struct HttpKeySetFetcher {
    http_client: reqwest::Client,
    scheme: String,
}

impl HttpKeySetFetcher {
    /// Create a fetcher.
    ///
    /// # Arguments
    ///
    /// * `http_client` - Client carrying the outbound timeouts
    /// * `scheme` - `https` in production, `http` for local testing
    pub fn new(http_client: reqwest::Client, scheme: String) -> Self {
        Self {
            http_client,
            scheme,
        }
    }

    /// Key-set URL for a domain.
    pub fn jwks_url(&self, domain: &str) -> String {
        format!("{}://{}/.well-known/jwks.json", self.scheme, domain)
    }
}

#[async_trait::async_trait]
impl KeySetFetcher for HttpKeySetFetcher {
    #[instrument(skip_all, name = "gateway.auth.jwks.fetch", fields(domain = %domain))]
    async fn fetch(&self, domain: &str) -> Result<KeySet, FetchError> {
        let url = self.jwks_url(domain);
        tracing::debug!(target: "gateway.auth.jwks", url = %url, "Fetching JWKS");

        let result = fetch_key_set(&self.http_client, &url).await;
        match &result {
            Ok(key_set) => {
                metrics::record_jwks_fetch("success");
                tracing::debug!(
                    target: "gateway.auth.jwks",
                    key_count = key_set.key_count(),
                    "JWKS fetched"
                );
            }
            Err(e) => {
                metrics::record_jwks_fetch(e.kind());
                tracing::error!(target: "gateway.auth.jwks", error = %e, "Failed to fetch JWKS");
            }
        }
        result
    }
}

async fn fetch_key_set(http_client: &reqwest::Client, url: &str) -> Result<KeySet, FetchError> {
    let response = http_client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    response
        .json::<KeySet>()
        .await
        .map_err(|e| FetchError::Decode(e.to_string()))
}

// =============================================================================
// TTL cache decorator
// =============================================================================

/// Cached key set with expiry time.
struct CachedKeySet {
    key_set: KeySet,
    expires_at: Instant,
}

/// Serves key sets from a per-domain cache for at most `ttl`.
pub struct CachedKeySetFetcher {
    inner: Arc<dyn KeySetFetcher>,
    ttl: Duration,
    cache: RwLock<HashMap<String, CachedKeySet>>,
}

impl CachedKeySetFetcher {
    pub fn new(inner: Arc<dyn KeySetFetcher>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait::async_trait]
impl KeySetFetcher for CachedKeySetFetcher {
    async fn fetch(&self, domain: &str) -> Result<KeySet, FetchError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(domain) {
                if cached.expires_at > Instant::now() {
                    tracing::debug!(target: "gateway.auth.jwks", domain = %domain, "JWKS cache hit");
                    return Ok(cached.key_set.clone());
                }
            }
        }

        // Miss or expired. Failures are not cached.
        let key_set = self.inner.fetch(domain).await?;

        let mut cache = self.cache.write().await;
        cache.insert(
            domain.to_string(),
            CachedKeySet {
                key_set: key_set.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        tracing::info!(
            target: "gateway.auth.jwks",
            domain = %domain,
            key_count = key_set.key_count(),
            "JWKS cache refreshed"
        );

        Ok(key_set)
    }
}

/// Mock key-set fetcher module for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock fetcher returning a fixed key set or a fixed error.
    pub struct MockKeySetFetcher {
        result: Result<KeySet, FetchError>,
        call_count: AtomicUsize,
    }

    impl MockKeySetFetcher {
        /// Always return `key_set`.
        pub fn with_key_set(key_set: KeySet) -> Self {
            Self {
                result: Ok(key_set),
                call_count: AtomicUsize::new(0),
            }
        }

        /// Always fail with a 503 status error.
        pub fn failing() -> Self {
            Self {
                result: Err(FetchError::Status(503)),
                call_count: AtomicUsize::new(0),
            }
        }

        /// Number of fetches made.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl KeySetFetcher for MockKeySetFetcher {
        async fn fetch(&self, _domain: &str) -> Result<KeySet, FetchError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }
}
