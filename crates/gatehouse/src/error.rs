//! Unified error type for the Gatehouse framework.

use gatehouse_registry::RegistryError;
use gatehouse_token::TokenError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `gatehouse` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum GatehouseError {
    /// A registry-level error (authentication, capacity, validation,
    /// hook registration, shutdown).
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A token-store error (closed store, malformed token).
    #[error(transparent)]
    Token(#[from] TokenError),
}
