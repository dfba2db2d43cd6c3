//! Identity gateway configuration.
//!
//! Configuration is loaded from environment variables. Secrets are held as
//! `SecretString` and redacted in Debug output.
//!
//! The Auth0 domain and audience are required. Migration is optional: it is
//! enabled only when the Passage app id and API key and the Auth0 management
//! client id and secret are all present.

use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default scheme for outbound provider URLs.
pub const DEFAULT_PROVIDER_URL_SCHEME: &str = "https";

/// Maximum key-set cache TTL in seconds (1 hour).
pub const MAX_JWKS_CACHE_TTL_SECONDS: u64 = 3600;

/// Default outbound HTTP request timeout in seconds.
pub const DEFAULT_OUTBOUND_TIMEOUT_SECONDS: u64 = 10;

/// Maximum outbound HTTP request timeout in seconds.
pub const MAX_OUTBOUND_TIMEOUT_SECONDS: u64 = 60;

/// Default Auth0 database connection for provisioned accounts.
pub const DEFAULT_AUTH0_CONNECTION: &str = "Username-Password-Authentication";

/// Default Passage key-set host.
pub const DEFAULT_PASSAGE_AUTH_DOMAIN: &str = "auth.passage.id";

/// Default Passage management API base URL.
pub const DEFAULT_PASSAGE_API_URL: &str = "https://api.passage.id";

/// Variables that must all be set for migration to be enabled.
pub const MIGRATION_ENV_VARS: [&str; 4] = [
    "PASSAGE_APP_ID",
    "PASSAGE_API_KEY",
    "AUTH0_CLIENT_ID",
    "AUTH0_CLIENT_SECRET",
];

/// Identity gateway configuration.
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Auth0 tenant domain, e.g. `tenant.us.auth0.com`.
    pub auth0_domain: String,

    /// Expected `aud` claim of bearer tokens.
    pub auth0_audience: String,

    /// Scheme for outbound provider URLs (`https` unless testing locally).
    pub provider_url_scheme: String,

    /// Key-set cache TTL in seconds; 0 disables caching.
    pub jwks_cache_ttl_seconds: u64,

    /// Outbound HTTP request timeout in seconds.
    pub outbound_timeout_seconds: u64,

    /// Graceful shutdown drain period in seconds.
    pub drain_seconds: u64,

    /// Migration settings, `None` when migration is disabled.
    pub migration: Option<MigrationConfig>,

    /// Migration variables that were absent (empty when migration is enabled).
    pub missing_migration_vars: Vec<&'static str>,
}

/// Settings for the Passage to Auth0 migration path.
pub struct MigrationConfig {
    /// Passage application id.
    pub passage_app_id: String,

    /// Passage management API key.
    pub passage_api_key: SecretString,

    /// Passage key-set host (default: "auth.passage.id").
    pub passage_auth_domain: String,

    /// Passage management API base URL.
    pub passage_api_url: String,

    /// Required `aud` for Passage tokens, when set.
    pub passage_audience: Option<String>,

    /// Auth0 management client id.
    pub auth0_client_id: String,

    /// Auth0 management client secret.
    pub auth0_client_secret: SecretString,

    /// Auth0 database connection for created accounts.
    pub auth0_connection: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("auth0_domain", &self.auth0_domain)
            .field("auth0_audience", &self.auth0_audience)
            .field("provider_url_scheme", &self.provider_url_scheme)
            .field("jwks_cache_ttl_seconds", &self.jwks_cache_ttl_seconds)
            .field("outbound_timeout_seconds", &self.outbound_timeout_seconds)
            .field("drain_seconds", &self.drain_seconds)
            .field("migration", &self.migration)
            .finish()
    }
}

impl fmt::Debug for MigrationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationConfig")
            .field("passage_app_id", &self.passage_app_id)
            .field("passage_api_key", &"[REDACTED]")
            .field("passage_auth_domain", &self.passage_auth_domain)
            .field("passage_api_url", &self.passage_api_url)
            .field("passage_audience", &self.passage_audience)
            .field("auth0_client_id", &self.auth0_client_id)
            .field("auth0_client_secret", &"[REDACTED]")
            .field("auth0_connection", &self.auth0_connection)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid provider URL scheme: {0}")]
    InvalidProviderScheme(String),

    #[error("Invalid JWKS cache TTL configuration: {0}")]
    InvalidJwksCacheTtl(String),

    #[error("Invalid outbound timeout configuration: {0}")]
    InvalidOutboundTimeout(String),

    #[error("Invalid drain period configuration: {0}")]
    InvalidDrainSeconds(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let auth0_domain = required(vars, "AUTH0_DOMAIN")?;
        let auth0_audience = required(vars, "AUTH0_AUDIENCE")?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let provider_url_scheme = vars
            .get("PROVIDER_URL_SCHEME")
            .cloned()
            .unwrap_or_else(|| DEFAULT_PROVIDER_URL_SCHEME.to_string());
        if provider_url_scheme != "https" && provider_url_scheme != "http" {
            return Err(ConfigError::InvalidProviderScheme(format!(
                "PROVIDER_URL_SCHEME must be 'https' or 'http', got '{}'",
                provider_url_scheme
            )));
        }

        let jwks_cache_ttl_seconds = if let Some(value_str) = vars.get("JWKS_CACHE_TTL_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwksCacheTtl(format!(
                    "JWKS_CACHE_TTL_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value > MAX_JWKS_CACHE_TTL_SECONDS {
                return Err(ConfigError::InvalidJwksCacheTtl(format!(
                    "JWKS_CACHE_TTL_SECONDS must not exceed {} seconds, got {}",
                    MAX_JWKS_CACHE_TTL_SECONDS, value
                )));
            }

            value
        } else {
            0
        };

        let outbound_timeout_seconds =
            if let Some(value_str) = vars.get("OUTBOUND_TIMEOUT_SECONDS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidOutboundTimeout(format!(
                        "OUTBOUND_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value == 0 || value > MAX_OUTBOUND_TIMEOUT_SECONDS {
                    return Err(ConfigError::InvalidOutboundTimeout(format!(
                        "OUTBOUND_TIMEOUT_SECONDS must be between 1 and {}, got {}",
                        MAX_OUTBOUND_TIMEOUT_SECONDS, value
                    )));
                }

                value
            } else {
                DEFAULT_OUTBOUND_TIMEOUT_SECONDS
            };

        let drain_seconds = if let Some(value_str) = vars.get("DRAIN_SECONDS") {
            value_str.parse().map_err(|e| {
                ConfigError::InvalidDrainSeconds(format!(
                    "DRAIN_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?
        } else {
            0
        };

        let missing_migration_vars: Vec<&'static str> = MIGRATION_ENV_VARS
            .iter()
            .copied()
            .filter(|name| non_empty(vars, name).is_none())
            .collect();

        let migration = match (
            non_empty(vars, "PASSAGE_APP_ID"),
            non_empty(vars, "PASSAGE_API_KEY"),
            non_empty(vars, "AUTH0_CLIENT_ID"),
            non_empty(vars, "AUTH0_CLIENT_SECRET"),
        ) {
            (Some(app_id), Some(api_key), Some(client_id), Some(client_secret)) => {
                Some(MigrationConfig {
                    passage_app_id: app_id,
                    passage_api_key: SecretString::from(api_key),
                    passage_auth_domain: vars
                        .get("PASSAGE_AUTH_DOMAIN")
                        .cloned()
                        .unwrap_or_else(|| DEFAULT_PASSAGE_AUTH_DOMAIN.to_string()),
                    passage_api_url: vars
                        .get("PASSAGE_API_URL")
                        .map(|url| url.trim_end_matches('/').to_string())
                        .unwrap_or_else(|| DEFAULT_PASSAGE_API_URL.to_string()),
                    passage_audience: non_empty(vars, "PASSAGE_AUDIENCE"),
                    auth0_client_id: client_id,
                    auth0_client_secret: SecretString::from(client_secret),
                    auth0_connection: vars
                        .get("AUTH0_CONNECTION")
                        .cloned()
                        .unwrap_or_else(|| DEFAULT_AUTH0_CONNECTION.to_string()),
                })
            }
            _ => None,
        };

        Ok(Config {
            bind_address,
            auth0_domain,
            auth0_audience,
            provider_url_scheme,
            jwks_cache_ttl_seconds,
            outbound_timeout_seconds,
            drain_seconds,
            migration,
            missing_migration_vars,
        })
    }

    /// Base URL for a provider host, e.g. `https://tenant.auth0.com`.
    pub fn provider_base_url(&self, host: &str) -> String {
        format!("{}://{}", self.provider_url_scheme, host)
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    non_empty(vars, name).ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn non_empty(vars: &HashMap<String, String>, name: &str) -> Option<String> {
    vars.get(name).filter(|v| !v.is_empty()).cloned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::secret::ExposeSecret;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            ("AUTH0_DOMAIN".to_string(), "tenant.auth0.test".to_string()),
            (
                "AUTH0_AUDIENCE".to_string(),
                "https://api.example.test".to_string(),
            ),
        ])
    }

    fn migration_vars() -> HashMap<String, String> {
        let mut vars = base_vars();
        vars.insert("PASSAGE_APP_ID".to_string(), "app123".to_string());
        vars.insert("PASSAGE_API_KEY".to_string(), "passage-key".to_string());
        vars.insert("AUTH0_CLIENT_ID".to_string(), "mgmt-client".to_string());
        vars.insert(
            "AUTH0_CLIENT_SECRET".to_string(),
            "mgmt-secret".to_string(),
        );
        vars
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(config.auth0_domain, "tenant.auth0.test");
        assert_eq!(config.auth0_audience, "https://api.example.test");
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.provider_url_scheme, "https");
        assert_eq!(config.jwks_cache_ttl_seconds, 0);
        assert_eq!(config.outbound_timeout_seconds, DEFAULT_OUTBOUND_TIMEOUT_SECONDS);
        assert_eq!(config.drain_seconds, 0);
        assert!(config.migration.is_none());
        assert_eq!(config.missing_migration_vars, MIGRATION_ENV_VARS.to_vec());
    }

    #[test]
    fn test_missing_domain_fails() {
        let mut vars = base_vars();
        vars.remove("AUTH0_DOMAIN");

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::MissingEnvVar(ref v)) if v == "AUTH0_DOMAIN"),
            "Expected MissingEnvVar(AUTH0_DOMAIN), got {:?}",
            result
        );
    }

    #[test]
    fn test_missing_audience_fails() {
        let mut vars = base_vars();
        vars.remove("AUTH0_AUDIENCE");

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(ref v)) if v == "AUTH0_AUDIENCE"));
    }

    #[test]
    fn test_empty_domain_counts_as_missing() {
        let mut vars = base_vars();
        vars.insert("AUTH0_DOMAIN".to_string(), String::new());

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::MissingEnvVar(_))
        ));
    }

    #[test]
    fn test_migration_enabled_with_defaults() {
        let config = Config::from_vars(&migration_vars()).unwrap();
        let migration = config.migration.expect("migration should be enabled");

        assert_eq!(migration.passage_app_id, "app123");
        assert_eq!(migration.passage_api_key.expose_secret(), "passage-key");
        assert_eq!(migration.auth0_client_id, "mgmt-client");
        assert_eq!(migration.auth0_client_secret.expose_secret(), "mgmt-secret");
        assert_eq!(migration.auth0_connection, DEFAULT_AUTH0_CONNECTION);
        assert_eq!(migration.passage_auth_domain, DEFAULT_PASSAGE_AUTH_DOMAIN);
        assert_eq!(migration.passage_api_url, DEFAULT_PASSAGE_API_URL);
        assert!(migration.passage_audience.is_none());
        assert!(config.missing_migration_vars.is_empty());
    }

    #[test]
    fn test_partial_migration_settings_disable_migration() {
        let mut vars = migration_vars();
        vars.remove("AUTH0_CLIENT_SECRET");

        let config = Config::from_vars(&vars).unwrap();
        assert!(config.migration.is_none());
        assert_eq!(config.missing_migration_vars, vec!["AUTH0_CLIENT_SECRET"]);
    }

    #[test]
    fn test_migration_custom_values() {
        let mut vars = migration_vars();
        vars.insert("AUTH0_CONNECTION".to_string(), "legacy-users".to_string());
        vars.insert("PASSAGE_AUTH_DOMAIN".to_string(), "127.0.0.1:9999".to_string());
        vars.insert(
            "PASSAGE_API_URL".to_string(),
            "http://127.0.0.1:9998/".to_string(),
        );
        vars.insert("PASSAGE_AUDIENCE".to_string(), "app123".to_string());

        let migration = Config::from_vars(&vars).unwrap().migration.unwrap();
        assert_eq!(migration.auth0_connection, "legacy-users");
        assert_eq!(migration.passage_auth_domain, "127.0.0.1:9999");
        assert_eq!(migration.passage_api_url, "http://127.0.0.1:9998");
        assert_eq!(migration.passage_audience.as_deref(), Some("app123"));
    }

    #[test]
    fn test_provider_scheme_validation() {
        let mut vars = base_vars();
        vars.insert("PROVIDER_URL_SCHEME".to_string(), "http".to_string());
        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(
            config.provider_base_url("127.0.0.1:8080"),
            "http://127.0.0.1:8080"
        );

        vars.insert("PROVIDER_URL_SCHEME".to_string(), "ftp".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidProviderScheme(_))
        ));
    }

    #[test]
    fn test_jwks_cache_ttl_bounds() {
        let mut vars = base_vars();
        vars.insert("JWKS_CACHE_TTL_SECONDS".to_string(), "3600".to_string());
        assert_eq!(Config::from_vars(&vars).unwrap().jwks_cache_ttl_seconds, 3600);

        vars.insert("JWKS_CACHE_TTL_SECONDS".to_string(), "3601".to_string());
        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwksCacheTtl(ref msg)) if msg.contains("must not exceed")),
            "Expected InvalidJwksCacheTtl, got {:?}",
            result
        );

        vars.insert("JWKS_CACHE_TTL_SECONDS".to_string(), "soon".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidJwksCacheTtl(_))
        ));
    }

    #[test]
    fn test_outbound_timeout_bounds() {
        let mut vars = base_vars();
        vars.insert("OUTBOUND_TIMEOUT_SECONDS".to_string(), "0".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidOutboundTimeout(_))
        ));

        vars.insert("OUTBOUND_TIMEOUT_SECONDS".to_string(), "61".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidOutboundTimeout(_))
        ));

        vars.insert("OUTBOUND_TIMEOUT_SECONDS".to_string(), "3".to_string());
        assert_eq!(Config::from_vars(&vars).unwrap().outbound_timeout_seconds, 3);
    }

    #[test]
    fn test_invalid_drain_seconds() {
        let mut vars = base_vars();
        vars.insert("DRAIN_SECONDS".to_string(), "-5".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidDrainSeconds(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config::from_vars(&migration_vars()).unwrap();
        let debug_output = format!("{:?}", config);

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("passage-key"));
        assert!(!debug_output.contains("mgmt-secret"));
        assert!(debug_output.contains("mgmt-client"));
    }
}
