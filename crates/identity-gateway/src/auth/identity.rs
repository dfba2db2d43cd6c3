//! Authenticated identity attached to requests on the query path.
//!
//! The subject and email identify a person and are redacted in Debug output.

use std::fmt;

/// Identity produced by a successful bearer-token verification.
///
/// Lives in the request's extensions for the duration of one request.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    /// Subject (`sub` claim) - redacted in Debug output.
    pub subject: String,

    /// `email` claim, empty when absent - redacted in Debug output.
    pub email: String,
}

impl fmt::Debug for AuthenticatedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedIdentity")
            .field("subject", &"[REDACTED]")
            .field("email", &"[REDACTED]")
            .finish()
    }
}
