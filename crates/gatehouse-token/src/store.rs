//! The token store: issue, redeem once, expire.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use gatehouse_client::User;
// Tokio's Instant, not std's: it follows the runtime's (pausable) clock,
// so expiry and the sweep agree with `tokio::time` — including in tests
// that run the clock forward artificially.
use tokio::time::Instant;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// AuthToken
// ---------------------------------------------------------------------------

/// An unguessable, single-use handle redeemable for a user identity.
///
/// A random v4 UUID: 122 bits of entropy, which makes guessing a live
/// token computationally infeasible. Collisions between issued tokens are
/// cryptographically negligible and not handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AuthToken(Uuid);

impl AuthToken {
    fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a token from its string form (as received out-of-band).
    pub fn parse(s: &str) -> Result<Self, TokenError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| TokenError::Malformed(s.to_owned()))
    }
}

/// Prints the full token. The token IS the secret — this is how it gets
/// handed to the client — so unlike passwords it is meant to be rendered.
/// Don't log it on the issuing side.
impl fmt::Display for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the token store.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// How long an issued token stays redeemable.
    ///
    /// Default: 30 seconds — long enough to spawn a process and have it
    /// phone home, short enough that a leaked token is stale almost
    /// immediately.
    pub ttl: Duration,

    /// How often the background sweep purges expired entries.
    ///
    /// Must be strictly smaller than `ttl`, so an abandoned token never
    /// lingers long past its expiry. Default: 10 seconds.
    pub sweep_interval: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(10),
        }
    }
}

impl TokenConfig {
    /// Clamps out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`CredentialTokenStore::new`]. Rules:
    /// - `sweep_interval` forced below `ttl` (half the TTL) when it isn't.
    /// - `sweep_interval` floored at 1 ms — a zero interval would spin.
    pub fn validated(mut self) -> Self {
        if self.sweep_interval >= self.ttl {
            tracing::warn!(
                sweep_interval = ?self.sweep_interval,
                ttl = ?self.ttl,
                "sweep_interval must be below ttl — clamping to ttl/2"
            );
            self.sweep_interval = self.ttl / 2;
        }
        self.sweep_interval = self.sweep_interval.max(Duration::from_millis(1));
        self
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from the token store.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The store has been closed; no new tokens are issued.
    #[error("token store is closed")]
    Closed,

    /// The string form of a token didn't parse as a UUID.
    #[error("malformed token '{0}'")]
    Malformed(String),
}

// ---------------------------------------------------------------------------
// CredentialTokenStore
// ---------------------------------------------------------------------------

struct TokenEntry {
    user: User,
    expires_at: Instant,
}

/// Maps single-use tokens to user identities, with a TTL.
///
/// # Concurrency note
///
/// [`consume`](Self::consume) is a single atomic check-and-remove under
/// one lock — not a contains-then-remove pair — so two concurrent
/// redemptions of the same token can never both succeed. The sweep task
/// shares the same lock; there is exactly one synchronization domain.
///
/// # Lifecycle
///
/// `new` spawns the sweep task (a Tokio runtime must be current);
/// [`close`](Self::close) stops it and clears all entries. Dropping the
/// store aborts the sweep too.
pub struct CredentialTokenStore {
    tokens: Arc<Mutex<HashMap<AuthToken, TokenEntry>>>,
    ttl: Duration,
    closed: AtomicBool,
    sweeper: tokio::task::JoinHandle<()>,
}

/// Locks the token map, recovering from poisoning — nothing under this
/// lock can panic.
fn lock(
    tokens: &Mutex<HashMap<AuthToken, TokenEntry>>,
) -> MutexGuard<'_, HashMap<AuthToken, TokenEntry>> {
    tokens.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CredentialTokenStore {
    /// Creates a store and starts its background expiry sweep.
    ///
    /// The config is [`validated`](TokenConfig::validated) first.
    pub fn new(config: TokenConfig) -> Self {
        let config = config.validated();
        let tokens: Arc<Mutex<HashMap<AuthToken, TokenEntry>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let sweeper = tokio::spawn(sweep_loop(Arc::clone(&tokens), config.sweep_interval));

        Self {
            tokens,
            ttl: config.ttl,
            closed: AtomicBool::new(false),
            sweeper,
        }
    }

    /// Issues a fresh single-use token for a user.
    ///
    /// The token expires `ttl` from now whether or not it is ever
    /// redeemed.
    ///
    /// # Errors
    /// [`TokenError::Closed`] after [`close`](Self::close).
    pub fn add_token(&self, user: User) -> Result<AuthToken, TokenError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TokenError::Closed);
        }
        let token = AuthToken::random();
        let entry = TokenEntry {
            user,
            expires_at: Instant::now() + self.ttl,
        };
        lock(&self.tokens).insert(token, entry);
        tracing::debug!("credential token issued");
        Ok(token)
    }

    /// Redeems a token, returning the user it was issued for.
    ///
    /// The first successful call removes the entry; any later call with
    /// the same token returns `None`. Expired entries also return `None` —
    /// the lookup itself discards them, so redemption honors the TTL even
    /// between sweeps.
    pub fn consume(&self, token: AuthToken) -> Option<User> {
        // remove() is the whole check: whatever happens next, nobody else
        // can redeem this token anymore.
        let entry = lock(&self.tokens).remove(&token)?;
        if entry.expires_at <= Instant::now() {
            tracing::debug!("credential token expired before redemption");
            return None;
        }
        Some(entry.user)
    }

    /// The number of entries currently held (live and not-yet-swept
    /// expired ones).
    pub fn token_count(&self) -> usize {
        lock(&self.tokens).len()
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stops the sweep and clears all entries. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.sweeper.abort();
        lock(&self.tokens).clear();
        tracing::info!("credential token store closed");
    }
}

impl Drop for CredentialTokenStore {
    fn drop(&mut self) {
        // The sweep task holds its own Arc to the map; without this it
        // would keep running after the store is gone.
        self.sweeper.abort();
    }
}

/// The background sweep: periodically drops entries past their expiry,
/// bounding memory growth from tokens that were issued but never redeemed.
async fn sweep_loop(
    tokens: Arc<Mutex<HashMap<AuthToken, TokenEntry>>>,
    sweep_interval: Duration,
) {
    let mut interval = tokio::time::interval(sweep_interval);
    // The first tick fires immediately; skip it so a sweep never runs
    // before the store has existed for one interval.
    interval.tick().await;
    loop {
        interval.tick().await;
        let now = Instant::now();
        let mut map = lock(&tokens);
        let before = map.len();
        map.retain(|_, entry| entry.expires_at > now);
        let swept = before - map.len();
        drop(map);
        if swept > 0 {
            tracing::debug!(swept, "expired credential tokens purged");
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
