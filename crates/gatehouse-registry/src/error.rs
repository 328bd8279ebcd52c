//! Error types for the connection registry.

/// The error type connection factories report their own failures with.
///
/// Factory errors are the embedder's, not the registry's — the registry
/// doesn't enumerate them, it just carries them (see
/// [`RegistryError::Factory`]).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while connecting, disconnecting, or administering
/// the registry.
///
/// These are the registry's *terminal outcomes* — there is no retry logic
/// behind any of them. A transport layer would typically map
/// `Authentication` → unauthorized, `ServerFull` → service unavailable,
/// and `Validation` → forbidden/bad request, surfacing the message as-is.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Credential check failed. Raised by the registry itself when a known
    /// client id reconnects with different credentials (connection theft),
    /// or by a [`LoginProxy`](crate::LoginProxy) whose login step rejects
    /// the client.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The connection limit has been reached. Carries the limit that was
    /// in force so the caller can report it.
    #[error("server full: connection limit {limit} reached")]
    ServerFull {
        /// The limit in force when the request was rejected.
        limit: usize,
    },

    /// A [`ConnectionValidator`](crate::ConnectionValidator) rejected the
    /// request before a connection was attempted.
    #[error("connection rejected: {0}")]
    Validation(String),

    /// The registry is shutting down (or already shut down) and accepts
    /// no new connections.
    #[error("registry is shutting down")]
    ShuttingDown,

    /// A login proxy is already registered for this client type.
    /// Clear the existing one explicitly first — hooks are security
    /// relevant, so silent replacement is not allowed.
    #[error("login proxy already set for client type '{0}'")]
    LoginProxyAlreadySet(String),

    /// A connection validator is already registered for this client type.
    /// Same one-shot discipline as [`Self::LoginProxyAlreadySet`].
    #[error("connection validator already set for client type '{0}'")]
    ValidatorAlreadySet(String),

    /// The embedder's connection factory failed to establish a connection.
    /// No session was created.
    #[error("connection factory failed: {0}")]
    Factory(#[source] BoxError),
}
