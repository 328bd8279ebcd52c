//! Single-use credential tokens for Gatehouse.
//!
//! Some launch flows authenticate a user once and then need to pass proof
//! of that authentication through an untrusted intermediary — a launcher
//! spawning the real application, a redirect across processes — without
//! re-transmitting the password. The [`CredentialTokenStore`] covers this:
//!
//! 1. The authenticated side calls [`CredentialTokenStore::add_token`] and
//!    passes the returned token (an unguessable UUID) along out-of-band.
//! 2. The receiving side redeems it with
//!    [`CredentialTokenStore::consume`] and gets the user identity back.
//! 3. The token is now gone. A second redemption — or one after the TTL —
//!    finds nothing. **At-most-once**, enforced by an atomic
//!    check-and-remove.
//!
//! Abandoned tokens (issued but never redeemed) are purged by a background
//! sweep task, so the store's memory use stays bounded.
//!
//! The store is independent of the connection registry: it is a small
//! standalone service a transport-layer authenticator consults.

mod store;

pub use store::{AuthToken, CredentialTokenStore, TokenConfig, TokenError};
