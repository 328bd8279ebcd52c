//! Connection lifecycle management for Gatehouse.
//!
//! This crate is the core of the framework: the [`ConnectionRegistry`] that
//! stands between a transport layer (RMI, sockets, HTTP — not this crate's
//! concern) and the business connections it hands out. It handles:
//!
//! 1. **Admission** — capacity ceiling, per-client-type validation
//!    ([`ConnectionValidator`] trait)
//! 2. **Authentication** — connection-theft detection, pluggable identity
//!    rewriting at login ([`LoginProxy`] trait)
//! 3. **Session tracking** — one live session per client id, idempotent
//!    reconnect, deterministic teardown
//! 4. **Shutdown** — best-effort disconnect sweep, hooks closed exactly once
//!
//! # How it fits in the stack
//!
//! ```text
//! Transport Layer (above, out of scope)  ← parses requests off the wire
//!     ↕
//! Registry Layer (this crate)  ← decides who gets a connection, and when
//!     ↕
//! Embedder's connection factory (below)  ← builds the business connection
//! ```
//!
//! The registry never opens a socket and never touches the database — the
//! embedder supplies a [`ConnectionFactory`] for that. What the registry
//! owns is the *decision*: which requests become sessions, which identities
//! those sessions run as, and when the factory's teardown runs.

mod error;
mod hooks;
mod info;
mod registry;

pub use error::{BoxError, RegistryError};
pub use hooks::{ConnectionFactory, ConnectionValidator, LoginProxy};
pub use info::RegistryInfo;
pub use registry::ConnectionRegistry;
