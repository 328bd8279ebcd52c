//! Client identity types for Gatehouse.
//!
//! This crate defines the value types that describe WHO is connecting:
//!
//! 1. **Credentials** — a username/password pair ([`User`])
//! 2. **Session identity** — a client-supplied UUID that names one logical
//!    session across reconnects ([`ClientId`])
//! 3. **The connection attempt** — everything a client sends when it asks
//!    for a connection ([`ConnectionRequest`])
//! 4. **The server-side view** — the request plus what the server observed
//!    about it ([`RemoteClient`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Registry Layer (above)  ← decides whether a request becomes a session
//!     ↕
//! Client Layer (this crate)  ← describes requests and identities
//! ```
//!
//! These types have no behavior of their own — they are plain data that the
//! registry and the transport layer pass around. They derive `Serialize` /
//! `Deserialize` because connection requests typically cross a process
//! boundary before they reach the registry.

mod remote;
mod request;
mod user;

pub use remote::RemoteClient;
pub use request::{ClientId, ConnectionRequest};
pub use user::User;
