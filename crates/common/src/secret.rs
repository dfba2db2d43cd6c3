//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used for every credential the gateway
//! handles: provider API keys, management client secrets, management access
//! tokens and the placeholder password generated for provisioned accounts.
//!
//! `SecretString` implements `Debug` with redaction, so any struct deriving
//! `Debug` that holds one is safe to log with `{:?}` or as a tracing field.
//! Values are zeroized on drop. Reading the value requires an explicit
//! `expose_secret()` call, which keeps every use site greppable.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct ManagementCredentials {
//!     client_id: String,
//!     client_secret: SecretString,
//! }
//!
//! let creds = ManagementCredentials {
//!     client_id: "mgmt-client".to_string(),
//!     client_secret: SecretString::from("s3cr3t"),
//! };
//!
//! assert!(!format!("{creds:?}").contains("s3cr3t"));
//! assert_eq!(creds.client_secret.expose_secret(), "s3cr3t");
//! ```

pub use secrecy::{ExposeSecret, SecretString};

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("passage-api-key");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("passage-api-key"));
    }

    #[test]
    fn test_expose_secret_returns_inner_value() {
        let secret = SecretString::from("client-secret-123");
        assert_eq!(secret.expose_secret(), "client-secret-123");
    }

    #[test]
    fn test_deserialize_keeps_value_hidden() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct Credentials {
            client_id: String,
            client_secret: SecretString,
        }

        let json = r#"{"client_id": "mgmt", "client_secret": "my-secret-value"}"#;
        let creds: Credentials = serde_json::from_str(json).expect("deserialize");

        assert_eq!(creds.client_secret.expose_secret(), "my-secret-value");

        let debug = format!("{creds:?}");
        assert!(debug.contains("mgmt"));
        assert!(!debug.contains("my-secret-value"));
    }
}
