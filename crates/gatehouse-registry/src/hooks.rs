//! The pluggable seams of the registry.
//!
//! Gatehouse doesn't know how to authenticate your users or build your
//! business connections — that's your job (or your directory server's).
//! Instead it defines three traits and calls them at fixed points in the
//! connection lifecycle:
//!
//! ```text
//! connect():    ConnectionValidator::validate
//!                   → LoginProxy::login
//!                       → ConnectionFactory::establish
//! disconnect(): ConnectionFactory::teardown
//!                   → LoginProxy::logout
//! shutdown():   (disconnect all) → LoginProxy::close, once per proxy
//! ```
//!
//! [`LoginProxy`] and [`ConnectionValidator`] are registered per client
//! type and are optional — no registration means no hook, which is the
//! common case. The [`ConnectionFactory`] is mandatory and registry-wide:
//! without it there is nothing to hand to an authenticated client.
//!
//! All hooks are invoked synchronously on whatever thread called
//! `connect`/`disconnect`; implementations must not assume they run on any
//! particular thread across calls.

use gatehouse_client::{ConnectionRequest, RemoteClient};

use crate::{BoxError, RegistryError};

/// Builds and tears down the opaque business connection object.
///
/// Supplied by the embedder when the registry is constructed. The registry
/// decides WHEN these run; the factory decides WHAT a connection is — a
/// database handle, an RMI stub, an in-memory service, anything.
///
/// # The `Connection` type
///
/// `Clone` is required because the registry keeps one copy in its session
/// map and hands copies to callers (and the *same* session's connection is
/// handed out again on an idempotent reconnect). In practice this means
/// `Connection` is usually an `Arc<...>` — cloning shares, it doesn't
/// duplicate.
pub trait ConnectionFactory: Send + Sync + 'static {
    /// The business connection handed to authenticated clients.
    type Connection: Clone + Send + 'static;

    /// Establishes a connection for an authenticated client.
    ///
    /// Called once per NEW session, after validation and login have
    /// passed, with the effective (possibly proxy-substituted) identity.
    ///
    /// # Errors
    /// Errors propagate to the `connect` caller as
    /// [`RegistryError::Factory`]; no session is registered.
    fn establish(&self, client: &RemoteClient) -> Result<Self::Connection, BoxError>;

    /// Tears down a connection that is leaving the registry.
    ///
    /// Called exactly once per session, on disconnect or during the
    /// shutdown sweep. The registry logs and swallows errors from this
    /// hook — teardown must never block capacity from being released.
    fn teardown(&self, connection: Self::Connection) -> Result<(), BoxError>;
}

/// Rewrites the authenticated identity at login and cleans up at logout.
///
/// One may be registered per client type. The classic use is directory
/// resolution: the client presents service credentials, and the proxy
/// substitutes the actual account the session should run as. Whatever
/// `login` returns is what gets stored, handed to the factory, and
/// reported by identity queries — not the original.
pub trait LoginProxy: Send + Sync {
    /// The client type this proxy serves. Informational — the registry
    /// dispatches on the type the proxy was *registered* under.
    fn client_type_id(&self) -> &str;

    /// Performs the login step for a new session.
    ///
    /// Takes the candidate identity and returns the identity the session
    /// should run as — the same one, or a substitute built with
    /// [`RemoteClient::with_user`].
    ///
    /// # Errors
    /// Returning an error (typically [`RegistryError::Authentication`])
    /// aborts the connect; no session is created.
    fn login(&self, client: RemoteClient) -> Result<RemoteClient, RegistryError>;

    /// Performs the logout step when a session of this type disconnects.
    ///
    /// Errors are logged and swallowed by the registry — logout must not
    /// prevent the disconnect from completing.
    fn logout(&self, client: &RemoteClient) -> Result<(), RegistryError>;

    /// Releases any resources this proxy holds.
    ///
    /// Called exactly once, during registry shutdown.
    fn close(&self);
}

/// Inspects a connection request before any connection work happens.
///
/// One may be registered per client type. Runs before login and before the
/// factory — a rejected request costs nothing but the validation itself.
/// Typical uses: client version floors, request-parameter sanity checks,
/// IP allowlists.
pub trait ConnectionValidator: Send + Sync {
    /// The client type this validator serves. Informational, as with
    /// [`LoginProxy::client_type_id`].
    fn client_type_id(&self) -> &str;

    /// Validates the request.
    ///
    /// # Errors
    /// Returning an error (typically [`RegistryError::Validation`]) aborts
    /// the connect; no session is created.
    fn validate(&self, request: &ConnectionRequest) -> Result<(), RegistryError>;
}
