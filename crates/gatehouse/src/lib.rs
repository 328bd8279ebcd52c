//! # Gatehouse
//!
//! Server-side connection lifecycle and authentication framework.
//!
//! Gatehouse sits between your transport layer (RMI, sockets, HTTP — your
//! choice, not ours) and your business connections. You implement a
//! [`ConnectionFactory`](gatehouse_registry::ConnectionFactory) that builds
//! whatever a "connection" means to you, and the framework handles
//! admission, capacity, connection-theft detection, pluggable per-type
//! login hooks, and deterministic shutdown.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use gatehouse::prelude::*;
//!
//! // Implement ConnectionFactory for your backend, then:
//! // let registry = ConnectionRegistry::new("my-server", my_factory);
//! // registry.set_connection_limit(Some(64));
//! // let connection = registry.connect(request, Some(peer_addr.ip()))?;
//! ```
//!
//! For out-of-band authentication handoff (launcher flows), see
//! [`CredentialTokenStore`](gatehouse_token::CredentialTokenStore).

mod error;

pub use error::GatehouseError;

pub use gatehouse_client as client;
pub use gatehouse_registry as registry;
pub use gatehouse_token as token;

/// The working set, importable in one line.
pub mod prelude {
    pub use gatehouse_client::{ClientId, ConnectionRequest, RemoteClient, User};
    pub use gatehouse_registry::{
        BoxError, ConnectionFactory, ConnectionRegistry, ConnectionValidator, LoginProxy,
        RegistryError, RegistryInfo,
    };
    pub use gatehouse_token::{AuthToken, CredentialTokenStore, TokenConfig, TokenError};

    pub use crate::GatehouseError;
}
