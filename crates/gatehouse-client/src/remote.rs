//! The server-side view of a connected client.

use std::fmt;
use std::net::IpAddr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::{ClientId, ConnectionRequest, User};

/// A client as the SERVER sees it: the original request plus everything the
/// server observed or decided about it.
///
/// Two identities live here, and the distinction is load-bearing:
///
/// - [`request()`](Self::request)`.user()` — the credentials the client
///   actually presented. The registry's theft check always compares against
///   these.
/// - [`user()`](Self::user) — the *effective* identity. A login proxy may
///   substitute this (e.g. resolve a directory account from the presented
///   credentials); everything downstream of login — the connection factory,
///   introspection queries, logout — sees the substituted identity.
///
/// The registry builds one of these per new session; it is never
/// client-supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteClient {
    request: ConnectionRequest,
    user: User,
    client_host: Option<IpAddr>,
    connected_at: SystemTime,
    framework_version: String,
}

impl RemoteClient {
    /// Builds the server-side identity for a request.
    ///
    /// The effective user starts out as the request's user; a login proxy
    /// may later replace it via [`with_user`](Self::with_user).
    /// `framework_version` is stamped by the registry so that admin
    /// tooling can tell which server build accepted the session.
    pub fn new(
        request: ConnectionRequest,
        client_host: Option<IpAddr>,
        framework_version: impl Into<String>,
    ) -> Self {
        Self {
            user: request.user().clone(),
            request,
            client_host,
            connected_at: SystemTime::now(),
            framework_version: framework_version.into(),
        }
    }

    /// Returns a copy of this identity with a substituted effective user.
    ///
    /// Login proxies use this. The originating request — and with it the
    /// originally presented credentials — is preserved unchanged.
    pub fn with_user(mut self, user: User) -> Self {
        self.user = user;
        self
    }

    /// The request that established this session.
    pub fn request(&self) -> &ConnectionRequest {
        &self.request
    }

    /// The effective identity (possibly rewritten by a login proxy).
    pub fn user(&self) -> &User {
        &self.user
    }

    /// The session identity, straight from the request.
    pub fn client_id(&self) -> ClientId {
        self.request.client_id()
    }

    /// The client-type tag, straight from the request.
    pub fn client_type_id(&self) -> &str {
        self.request.client_type_id()
    }

    /// The address the connection originated from, when the transport
    /// layer knew it.
    pub fn client_host(&self) -> Option<IpAddr> {
        self.client_host
    }

    /// When the server accepted this session.
    pub fn connected_at(&self) -> SystemTime {
        self.connected_at
    }

    /// The server framework version that accepted this session.
    pub fn framework_version(&self) -> &str {
        &self.framework_version
    }
}

impl fmt::Display for RemoteClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{} [{}]",
            self.user,
            self.client_type_id(),
            self.client_id()
        )?;
        if let Some(host) = self.client_host {
            write!(f, " from {host}")?;
        }
        Ok(())
    }
}
