//! The credential pair a client authenticates with.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A username/password credential pair.
///
/// Two `User`s are equal only when BOTH fields match. This matters for the
/// registry's connection-theft check: presenting a known username with a
/// different password must compare as a *different* user, not the same one.
///
/// # Logging
///
/// `Display` prints the username only. The password never appears in log
/// output — `tracing::info!(user = %user, ...)` is always safe. `Debug` is
/// deliberately NOT derived for the same reason; there is a manual impl
/// below that redacts the password.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    username: String,
    password: String,
}

impl User {
    /// Creates a credential pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The secret. Only the registry's credential comparison and the
    /// embedder's own authentication backend should look at this.
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.username)
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Redact the secret so `{:?}` in error messages and test output
        // can't leak it.
        f.debug_struct("User")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
