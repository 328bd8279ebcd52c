//! The connection request: what a client sends when it asks to connect.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::User;

// ---------------------------------------------------------------------------
// ClientId
// ---------------------------------------------------------------------------

/// A globally unique identifier for one logical client session.
///
/// The CLIENT supplies this (not the server), and keeps it stable across
/// reconnects — so the registry can tell "the same client coming back"
/// apart from "a new client". 128 bits of UUID make accidental collisions
/// a non-concern; *deliberate* reuse by an attacker is exactly what the
/// registry's theft check exists to catch.
///
/// This is a newtype wrapper over [`Uuid`]: you can't accidentally pass
/// some other UUID (a token, say) where a client id is expected.
///
/// `#[serde(transparent)]` serializes this as the bare UUID string, not as
/// a one-field struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub Uuid);

impl ClientId {
    /// Generates a fresh random client id.
    ///
    /// Real clients generate their id once and persist it; this is mostly
    /// a convenience for tests and demos.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ConnectionRequest
// ---------------------------------------------------------------------------

/// An immutable description of one connection attempt.
///
/// Built by the transport layer from whatever arrived on the wire and handed
/// to the registry's `connect`. The three required fields (`user`,
/// `client_id`, `client_type_id`) are plain non-optional types — a request
/// without them cannot be constructed, so the registry never has to check.
///
/// # Equality
///
/// Equality and hashing are defined by `client_id` ALONE. A request "is" a
/// session: two requests with the same client id are the same logical
/// client, even if every other field differs. (Whether the *credentials*
/// also match is a separate question, answered by the registry, not by
/// `==`.)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRequest {
    user: User,
    client_id: ClientId,
    client_type_id: String,
    client_version: Option<String>,
    parameters: HashMap<String, String>,
}

impl ConnectionRequest {
    /// Creates a request with the three required fields.
    pub fn new(user: User, client_id: ClientId, client_type_id: impl Into<String>) -> Self {
        Self {
            user,
            client_id,
            client_type_id: client_type_id.into(),
            client_version: None,
            parameters: HashMap::new(),
        }
    }

    /// Sets the client's self-reported version string.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.client_version = Some(version.into());
        self
    }

    /// Adds one opaque key/value parameter.
    ///
    /// The registry ignores these; they exist for validators, login proxies
    /// and connection factories that need extra per-request context.
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// The credentials this request presents.
    pub fn user(&self) -> &User {
        &self.user
    }

    /// The session identity.
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// The client-type tag selecting which login proxy / validator applies.
    pub fn client_type_id(&self) -> &str {
        &self.client_type_id
    }

    /// The client's self-reported version, if it sent one.
    pub fn client_version(&self) -> Option<&str> {
        self.client_version.as_deref()
    }

    /// The opaque parameter bag.
    pub fn parameters(&self) -> &HashMap<String, String> {
        &self.parameters
    }
}

/// Equality by `client_id` only — see the type-level docs.
impl PartialEq for ConnectionRequest {
    fn eq(&self, other: &Self) -> bool {
        self.client_id == other.client_id
    }
}

impl Eq for ConnectionRequest {}

/// Hash must agree with `PartialEq`: client id only.
impl Hash for ConnectionRequest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.client_id.hash(state);
    }
}

impl fmt::Display for ConnectionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{} [{}]",
            self.user, self.client_type_id, self.client_id
        )
    }
}
