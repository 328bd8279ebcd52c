//! The connection registry: tracks all live client sessions.
//!
//! This is the central piece of the framework. It's responsible for:
//! - Admitting connection requests (capacity ceiling, per-type validation)
//! - Detecting connection theft (a known client id presented with
//!   different credentials)
//! - Running the login/logout hooks and the embedder's connection factory
//!   at the right points
//! - Handing the same connection back on an idempotent reconnect
//! - Shutting down with a deterministic sweep
//!
//! # Concurrency note
//!
//! Unlike most of the state in this workspace, `ConnectionRegistry` IS
//! thread-safe by itself: every inbound connect/disconnect is a separate
//! concurrent call from some transport handler, and the capacity ceiling
//! is a property of the whole registry — so the check-then-insert sequence
//! has to be serialized here, not one level up. A single `Mutex` guards
//! the session map and the limit together.
//!
//! The lock is deliberately NOT held across the validator, login proxy, or
//! factory calls — those may do real I/O. The price is a small window where
//! two first-connects for the same brand-new client id (or the last two
//! slots under the limit) both pass the pre-check; the insert step
//! re-checks both conditions under the lock, and the loser's
//! freshly-established connection is torn down again. Capacity is never
//! exceeded.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gatehouse_client::{ClientId, ConnectionRequest, RemoteClient};

use crate::{
    ConnectionFactory, ConnectionValidator, LoginProxy, RegistryError, RegistryInfo,
};

/// One live session: the identity it runs as plus the connection the
/// factory built for it. Creation time lives on the `RemoteClient`.
struct Session<C> {
    remote_client: RemoteClient,
    connection: C,
}

/// The state guarded by the registry's single mutual-exclusion domain.
///
/// The limit lives under the same lock as the map because the capacity
/// check and the insert must be atomic with respect to each other.
struct Inner<C> {
    sessions: HashMap<ClientId, Session<C>>,
    limit: Option<usize>,
}

/// What the post-factory re-check found. `None` from the insert block
/// means "we inserted, connect succeeded".
enum Raced<C> {
    Reuse(C),
    Theft,
    Full(usize),
    ShuttingDown,
}

/// Locks a mutex, recovering from poisoning.
///
/// Nothing that runs under these locks can panic (plain map operations and
/// credential comparisons — hooks run outside), so a poisoned lock carries
/// no torn state worth dying over.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The registry: `ClientId → Session`, under a capacity ceiling, with
/// theft protection and per-client-type extension points.
///
/// ## Lifecycle (per client id)
///
/// ```text
///            connect()                    disconnect()
/// [Absent] ──(validate→login→establish)──→ [Active] ──(teardown→logout)──→ [Absent]
///                                            │  ↑
///                                            └──┘ connect() again with
///                                                 matching credentials:
///                                                 same connection returned
/// ```
///
/// A failed connect never leaves a partial session behind, and a reconnect
/// with the wrong credentials never touches the existing session.
///
/// ## Construction
///
/// The embedder supplies the [`ConnectionFactory`] up front; hooks are
/// registered afterwards, before the transport starts feeding requests in:
///
/// ```rust,ignore
/// let registry = ConnectionRegistry::new("entity-server", factory);
/// registry.set_connection_limit(Some(64));
/// registry.set_login_proxy("web-client", my_proxy)?;
/// // hand `Arc<ConnectionRegistry<_>>` to the transport layer
/// ```
pub struct ConnectionRegistry<F: ConnectionFactory> {
    factory: F,
    info: RegistryInfo,
    inner: Mutex<Inner<F::Connection>>,
    login_proxies: Mutex<HashMap<String, Arc<dyn LoginProxy>>>,
    validators: Mutex<HashMap<String, Arc<dyn ConnectionValidator>>>,
    shutting_down: AtomicBool,
}

impl<F: ConnectionFactory> ConnectionRegistry<F> {
    /// Creates a registry with no connection limit.
    ///
    /// `name` identifies this instance in logs and [`RegistryInfo`].
    pub fn new(name: impl Into<String>, factory: F) -> Self {
        Self {
            factory,
            info: RegistryInfo::new(name),
            inner: Mutex::new(Inner {
                sessions: HashMap::new(),
                limit: None,
            }),
            login_proxies: Mutex::new(HashMap::new()),
            validators: Mutex::new(HashMap::new()),
            shutting_down: AtomicBool::new(false),
        }
    }

    // -- Connect / disconnect ---------------------------------------------

    /// Connects a client, returning the business connection it should use.
    ///
    /// `client_host` is the origination address as observed by the
    /// transport layer, if known — it is attached to the session's
    /// [`RemoteClient`], never trusted from the request itself.
    ///
    /// Behavior per case:
    /// - **Known client id, matching credentials** — returns the session's
    ///   existing connection. Nothing new is created; this is connection
    ///   reuse, not reference counting.
    /// - **Known client id, different credentials** — connection theft;
    ///   fails with [`RegistryError::Authentication`] and leaves the
    ///   existing session untouched.
    /// - **New client id** — runs the client type's validator and login
    ///   proxy (if registered), then the factory, then registers the
    ///   session, subject to the connection limit.
    ///
    /// # Errors
    /// [`RegistryError::ShuttingDown`], [`RegistryError::Authentication`],
    /// [`RegistryError::ServerFull`], [`RegistryError::Validation`], or
    /// [`RegistryError::Factory`]. On any error, no session was created
    /// and no prior state was changed.
    pub fn connect(
        &self,
        request: ConnectionRequest,
        client_host: Option<IpAddr>,
    ) -> Result<F::Connection, RegistryError> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(RegistryError::ShuttingDown);
        }

        // Pre-check under the lock: existing session (reuse or theft) and
        // capacity. Released before any hook runs.
        {
            let inner = lock(&self.inner);
            if let Some(session) = inner.sessions.get(&request.client_id()) {
                return if session.remote_client.request().user() == request.user() {
                    tracing::debug!(client = %request, "active session exists, reusing connection");
                    Ok(session.connection.clone())
                } else {
                    tracing::warn!(
                        client_id = %request.client_id(),
                        user = %request.user(),
                        "credential mismatch for known client id, rejecting"
                    );
                    Err(RegistryError::Authentication(
                        "credentials do not match the active session".into(),
                    ))
                };
            }
            if let Some(limit) = at_capacity(&inner) {
                return Err(RegistryError::ServerFull { limit });
            }
        }

        // Hooks run on the caller's thread, outside the lock. Any failure
        // here aborts the connect with nothing registered.
        if let Some(validator) = self.validator_for(request.client_type_id()) {
            validator.validate(&request)?;
        }

        let mut client =
            RemoteClient::new(request, client_host, self.info.framework_version());
        if let Some(proxy) = self.login_proxy_for(client.client_type_id()) {
            client = proxy.login(client)?;
        }

        let connection = self
            .factory
            .establish(&client)
            .map_err(RegistryError::Factory)?;

        // Re-check and insert atomically. Another connect (or a shutdown)
        // may have won the race while the hooks ran.
        let client_id = client.client_id();
        let raced: Option<Raced<F::Connection>> = {
            let mut guard = lock(&self.inner);
            let inner = &mut *guard;
            if self.shutting_down.load(Ordering::SeqCst) {
                Some(Raced::ShuttingDown)
            } else if let Some(existing) = inner.sessions.get(&client_id) {
                if existing.remote_client.request().user() == client.request().user() {
                    Some(Raced::Reuse(existing.connection.clone()))
                } else {
                    Some(Raced::Theft)
                }
            } else if let Some(limit) = at_capacity(inner) {
                Some(Raced::Full(limit))
            } else {
                inner.sessions.insert(
                    client_id,
                    Session {
                        remote_client: client.clone(),
                        connection: connection.clone(),
                    },
                );
                None
            }
        };

        match raced {
            None => {
                tracing::info!(client = %client, "connection established");
                Ok(connection)
            }
            Some(outcome) => {
                // We built a connection but lost the race to register it —
                // unwind it the same way a disconnect would.
                self.discard_unregistered(&client, connection);
                match outcome {
                    Raced::Reuse(existing) => {
                        tracing::debug!(%client_id, "lost first-connect race, reusing winner's connection");
                        Ok(existing)
                    }
                    Raced::Theft => Err(RegistryError::Authentication(
                        "credentials do not match the active session".into(),
                    )),
                    Raced::Full(limit) => Err(RegistryError::ServerFull { limit }),
                    Raced::ShuttingDown => Err(RegistryError::ShuttingDown),
                }
            }
        }
    }

    /// Disconnects a client and releases its capacity slot.
    ///
    /// A no-op for unknown client ids — double disconnects and
    /// disconnects after a crash-and-expire are normal, not errors. The
    /// remove is atomic, so two concurrent disconnects for the same id
    /// run the teardown hook at most once.
    ///
    /// Teardown and logout failures are logged and swallowed: disconnect
    /// always completes.
    pub fn disconnect(&self, client_id: ClientId) {
        let removed = lock(&self.inner).sessions.remove(&client_id);
        let Some(session) = removed else {
            return;
        };

        if let Err(error) = self.factory.teardown(session.connection) {
            tracing::warn!(%client_id, %error, "connection teardown failed");
        }
        if let Some(proxy) = self.login_proxy_for(session.remote_client.client_type_id()) {
            if let Err(error) = proxy.logout(&session.remote_client) {
                tracing::warn!(%client_id, %error, "login proxy logout failed");
            }
        }
        tracing::info!(client = %session.remote_client, "client disconnected");
    }

    /// Shuts the registry down.
    ///
    /// Disconnects every live session best-effort (one broken teardown or
    /// logout doesn't stop the sweep — see [`disconnect`](Self::disconnect)),
    /// then closes every registered login proxy exactly once. Idempotent:
    /// the second and later calls return immediately.
    ///
    /// After shutdown, `connect` fails with [`RegistryError::ShuttingDown`]
    /// and `disconnect` remains a tolerant no-op.
    pub fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(registry = %self.info.name(), "shutting down");

        let client_ids: Vec<ClientId> =
            lock(&self.inner).sessions.keys().copied().collect();
        for client_id in client_ids {
            self.disconnect(client_id);
        }

        // Draining the map is what makes "exactly once" hold: a proxy that
        // has been closed is no longer registered anywhere.
        let proxies: Vec<Arc<dyn LoginProxy>> =
            lock(&self.login_proxies).drain().map(|(_, p)| p).collect();
        for proxy in proxies {
            proxy.close();
        }
    }

    // -- Hook registration -------------------------------------------------

    /// Registers a login proxy for a client type.
    ///
    /// One-shot: if the type already has a proxy, this fails with
    /// [`RegistryError::LoginProxyAlreadySet`] — call
    /// [`clear_login_proxy`](Self::clear_login_proxy) first. The explicit
    /// two-step replacement keeps a buggy or compromised component from
    /// silently swapping out a security hook mid-run.
    pub fn set_login_proxy(
        &self,
        client_type_id: &str,
        proxy: Arc<dyn LoginProxy>,
    ) -> Result<(), RegistryError> {
        match lock(&self.login_proxies).entry(client_type_id.to_owned()) {
            Entry::Occupied(_) => Err(RegistryError::LoginProxyAlreadySet(
                client_type_id.to_owned(),
            )),
            Entry::Vacant(slot) => {
                slot.insert(proxy);
                Ok(())
            }
        }
    }

    /// Removes the login proxy for a client type, if any.
    ///
    /// The proxy is NOT closed — it may be re-registered. Close happens
    /// only at [`shutdown`](Self::shutdown), for proxies still registered.
    pub fn clear_login_proxy(&self, client_type_id: &str) {
        lock(&self.login_proxies).remove(client_type_id);
    }

    /// Registers a connection validator for a client type.
    ///
    /// Same one-shot discipline as [`set_login_proxy`](Self::set_login_proxy).
    pub fn set_connection_validator(
        &self,
        client_type_id: &str,
        validator: Arc<dyn ConnectionValidator>,
    ) -> Result<(), RegistryError> {
        match lock(&self.validators).entry(client_type_id.to_owned()) {
            Entry::Occupied(_) => Err(RegistryError::ValidatorAlreadySet(
                client_type_id.to_owned(),
            )),
            Entry::Vacant(slot) => {
                slot.insert(validator);
                Ok(())
            }
        }
    }

    /// Removes the connection validator for a client type, if any.
    pub fn clear_connection_validator(&self, client_type_id: &str) {
        lock(&self.validators).remove(client_type_id);
    }

    // -- Introspection -----------------------------------------------------

    /// The current number of live sessions.
    pub fn connection_count(&self) -> usize {
        lock(&self.inner).sessions.len()
    }

    /// Whether a session exists for the given client id.
    pub fn contains_connection(&self, client_id: ClientId) -> bool {
        lock(&self.inner).sessions.contains_key(&client_id)
    }

    /// The connection for a client id, if a session exists.
    pub fn connection(&self, client_id: ClientId) -> Option<F::Connection> {
        lock(&self.inner)
            .sessions
            .get(&client_id)
            .map(|session| session.connection.clone())
    }

    /// The effective identity a session runs as, if a session exists.
    ///
    /// This reports the identity AFTER any login-proxy substitution — the
    /// one the factory saw — not the raw request identity.
    pub fn remote_client(&self, client_id: ClientId) -> Option<RemoteClient> {
        lock(&self.inner)
            .sessions
            .get(&client_id)
            .map(|session| session.remote_client.clone())
    }

    /// A point-in-time snapshot of every live session.
    ///
    /// An owned copy, never a live view: connects and disconnects that
    /// happen while the caller iterates don't affect it.
    pub fn connections(&self) -> Vec<(RemoteClient, F::Connection)> {
        lock(&self.inner)
            .sessions
            .values()
            .map(|session| (session.remote_client.clone(), session.connection.clone()))
            .collect()
    }

    /// The connection limit. `None` means unbounded.
    pub fn connection_limit(&self) -> Option<usize> {
        lock(&self.inner).limit
    }

    /// Sets the connection limit, effective for subsequent connects.
    ///
    /// `None` means unbounded (the default); `Some(0)` admits no new
    /// connections. Lowering the limit below the current session count
    /// does not disconnect anyone — it only blocks new sessions.
    pub fn set_connection_limit(&self, limit: Option<usize>) {
        lock(&self.inner).limit = limit;
    }

    /// Whether a new first-time connect would currently pass the capacity
    /// check.
    pub fn connections_available(&self) -> bool {
        at_capacity(&lock(&self.inner)).is_none()
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Static metadata about this registry instance.
    pub fn info(&self) -> &RegistryInfo {
        &self.info
    }

    /// The embedder's connection factory.
    pub fn factory(&self) -> &F {
        &self.factory
    }

    // -- Internals ---------------------------------------------------------

    fn login_proxy_for(&self, client_type_id: &str) -> Option<Arc<dyn LoginProxy>> {
        // Cloned out so no hook ever runs under the registration lock.
        lock(&self.login_proxies).get(client_type_id).cloned()
    }

    fn validator_for(&self, client_type_id: &str) -> Option<Arc<dyn ConnectionValidator>> {
        lock(&self.validators).get(client_type_id).cloned()
    }

    /// Unwinds a connection that was established but never registered
    /// (lost the insert race). Failures are logged like any teardown.
    fn discard_unregistered(&self, client: &RemoteClient, connection: F::Connection) {
        if let Err(error) = self.factory.teardown(connection) {
            tracing::warn!(client_id = %client.client_id(), %error, "teardown of unregistered connection failed");
        }
        if let Some(proxy) = self.login_proxy_for(client.client_type_id()) {
            if let Err(error) = proxy.logout(client) {
                tracing::warn!(client_id = %client.client_id(), %error, "logout of unregistered connection failed");
            }
        }
    }
}

/// Returns the limit if the registry is at (or over) it.
fn at_capacity<C>(inner: &Inner<C>) -> Option<usize> {
    match inner.limit {
        Some(limit) if inner.sessions.len() >= limit => Some(limit),
        _ => None,
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `ConnectionRegistry`.
    //!
    //! Naming convention: `test_{function}_{scenario}_{expected}`.
    //!
    //! The test factory's connections are `Arc`s, so "the same connection"
    //! is checkable with `Arc::ptr_eq` — exactly what "idempotent reconnect
    //! returns the same object" means. Counters are shared `Arc<AtomicUsize>`
    //! handles so tests can observe factory/hook activity after handing the
    //! factory to the registry.

    use std::sync::atomic::AtomicUsize;

    use gatehouse_client::User;

    use super::*;
    use crate::BoxError;

    // -- Test fixtures ----------------------------------------------------

    /// The business connection: just the identity it was built for.
    type TestConnection = Arc<RemoteClient>;

    #[derive(Default)]
    struct TestFactory {
        established: Arc<AtomicUsize>,
        torn_down: Arc<AtomicUsize>,
        fail_establish: bool,
        fail_teardown: bool,
    }

    impl ConnectionFactory for TestFactory {
        type Connection = TestConnection;

        fn establish(&self, client: &RemoteClient) -> Result<TestConnection, BoxError> {
            if self.fail_establish {
                return Err("backend unavailable".into());
            }
            self.established.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(client.clone()))
        }

        fn teardown(&self, _connection: TestConnection) -> Result<(), BoxError> {
            self.torn_down.fetch_add(1, Ordering::SeqCst);
            if self.fail_teardown {
                return Err("teardown exploded".into());
            }
            Ok(())
        }
    }

    /// A login proxy that counts its calls and optionally substitutes the
    /// effective identity or rejects logins outright.
    #[derive(Default)]
    struct TestProxy {
        substitute: Option<User>,
        reject: bool,
        logouts: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
    }

    impl LoginProxy for TestProxy {
        fn client_type_id(&self) -> &str {
            "test-client"
        }

        fn login(&self, client: RemoteClient) -> Result<RemoteClient, RegistryError> {
            if self.reject {
                return Err(RegistryError::Authentication("directory says no".into()));
            }
            match &self.substitute {
                Some(user) => Ok(client.with_user(user.clone())),
                None => Ok(client),
            }
        }

        fn logout(&self, _client: &RemoteClient) -> Result<(), RegistryError> {
            self.logouts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct RejectingValidator;

    impl ConnectionValidator for RejectingValidator {
        fn client_type_id(&self) -> &str {
            "test-client"
        }

        fn validate(&self, request: &ConnectionRequest) -> Result<(), RegistryError> {
            Err(RegistryError::Validation(format!(
                "client type '{}' is not welcome here",
                request.client_type_id()
            )))
        }
    }

    fn registry() -> ConnectionRegistry<TestFactory> {
        ConnectionRegistry::new("test-registry", TestFactory::default())
    }

    fn request(client_id: ClientId, username: &str, password: &str) -> ConnectionRequest {
        ConnectionRequest::new(User::new(username, password), client_id, "test-client")
    }

    fn scott(client_id: ClientId) -> ConnectionRequest {
        request(client_id, "scott", "tiger")
    }

    // =====================================================================
    // connect()
    // =====================================================================

    #[test]
    fn test_connect_new_client_registers_session() {
        let registry = registry();
        let id = ClientId::random();

        let connection = registry.connect(scott(id), None).expect("should connect");

        assert_eq!(registry.connection_count(), 1);
        assert!(registry.contains_connection(id));
        assert_eq!(connection.client_id(), id);
    }

    #[test]
    fn test_connect_reconnect_matching_credentials_returns_same_connection() {
        // Idempotent reconnect: same client id, same credentials — the
        // existing connection comes back, nothing new is created.
        let registry = registry();
        let established = Arc::clone(&registry.factory.established);
        let id = ClientId::random();

        let first = registry.connect(scott(id), None).unwrap();
        let second = registry.connect(scott(id), None).unwrap();

        assert!(Arc::ptr_eq(&first, &second), "must be the same connection");
        assert_eq!(registry.connection_count(), 1);
        assert_eq!(established.load(Ordering::SeqCst), 1, "factory ran once");
    }

    #[test]
    fn test_connect_known_id_different_password_rejected_as_theft() {
        let registry = registry();
        let id = ClientId::random();
        let original = registry.connect(scott(id), None).unwrap();

        let result = registry.connect(request(id, "scott", "lion"), None);

        assert!(matches!(result, Err(RegistryError::Authentication(_))));
        // The existing session is untouched.
        assert_eq!(registry.connection_count(), 1);
        let still_there = registry.connection(id).expect("session must survive");
        assert!(Arc::ptr_eq(&original, &still_there));
    }

    #[test]
    fn test_connect_known_id_different_username_rejected_as_theft() {
        let registry = registry();
        let id = ClientId::random();
        registry.connect(scott(id), None).unwrap();

        let result = registry.connect(request(id, "mallory", "tiger"), None);

        assert!(matches!(result, Err(RegistryError::Authentication(_))));
        assert_eq!(registry.connection_count(), 1);
    }

    #[test]
    fn test_connect_at_limit_rejected_with_server_full() {
        let registry = registry();
        registry.set_connection_limit(Some(1));
        registry.connect(scott(ClientId::random()), None).unwrap();

        let result = registry.connect(scott(ClientId::random()), None);

        assert!(matches!(result, Err(RegistryError::ServerFull { limit: 1 })));
        assert_eq!(registry.connection_count(), 1);
    }

    #[test]
    fn test_connect_zero_limit_admits_nobody() {
        let registry = registry();
        registry.set_connection_limit(Some(0));

        let result = registry.connect(scott(ClientId::random()), None);

        assert!(matches!(result, Err(RegistryError::ServerFull { limit: 0 })));
    }

    #[test]
    fn test_connect_limit_raised_at_runtime_admits_again() {
        let registry = registry();
        registry.set_connection_limit(Some(1));
        registry.connect(scott(ClientId::random()), None).unwrap();
        assert!(!registry.connections_available());

        registry.set_connection_limit(Some(2));

        assert!(registry.connections_available());
        registry
            .connect(scott(ClientId::random()), None)
            .expect("raised limit should admit");
        assert_eq!(registry.connection_count(), 2);
    }

    #[test]
    fn test_connect_reconnect_at_limit_still_succeeds() {
        // A reconnect doesn't consume a new slot, so it must work even
        // when the registry is full.
        let registry = registry();
        registry.set_connection_limit(Some(1));
        let id = ClientId::random();
        let first = registry.connect(scott(id), None).unwrap();

        let second = registry
            .connect(scott(id), None)
            .expect("reconnect must not be blocked by the limit");

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_connect_factory_failure_propagates_and_registers_nothing() {
        let registry = ConnectionRegistry::new(
            "test-registry",
            TestFactory {
                fail_establish: true,
                ..TestFactory::default()
            },
        );

        let result = registry.connect(scott(ClientId::random()), None);

        assert!(matches!(result, Err(RegistryError::Factory(_))));
        assert_eq!(registry.connection_count(), 0);
    }

    #[test]
    fn test_connect_attaches_client_host_and_framework_version() {
        let registry = registry();
        let id = ClientId::random();
        let host: IpAddr = "203.0.113.7".parse().unwrap();

        registry.connect(scott(id), Some(host)).unwrap();

        let client = registry.remote_client(id).unwrap();
        assert_eq!(client.client_host(), Some(host));
        assert_eq!(client.framework_version(), env!("CARGO_PKG_VERSION"));
    }

    // =====================================================================
    // Validators
    // =====================================================================

    #[test]
    fn test_connect_validator_rejection_aborts_with_no_session() {
        let registry = registry();
        let established = Arc::clone(&registry.factory.established);
        registry
            .set_connection_validator("test-client", Arc::new(RejectingValidator))
            .unwrap();

        let result = registry.connect(scott(ClientId::random()), None);

        assert!(matches!(result, Err(RegistryError::Validation(_))));
        assert_eq!(registry.connection_count(), 0);
        assert_eq!(
            established.load(Ordering::SeqCst),
            0,
            "factory must not run for a rejected request"
        );
    }

    #[test]
    fn test_connect_validator_scoped_to_its_client_type() {
        // A validator registered for one type must not see other types.
        let registry = registry();
        registry
            .set_connection_validator("other-client", Arc::new(RejectingValidator))
            .unwrap();

        registry
            .connect(scott(ClientId::random()), None)
            .expect("validator for a different type must not apply");
    }

    // =====================================================================
    // Login proxies
    // =====================================================================

    #[test]
    fn test_connect_login_proxy_substitutes_reported_identity() {
        let registry = registry();
        registry
            .set_login_proxy(
                "test-client",
                Arc::new(TestProxy {
                    substitute: Some(User::new("directory-scott", "resolved")),
                    ..TestProxy::default()
                }),
            )
            .unwrap();
        let id = ClientId::random();

        let connection = registry.connect(scott(id), None).unwrap();

        // The factory saw the substituted identity…
        assert_eq!(connection.user().username(), "directory-scott");
        // …and identity queries report it too.
        let client = registry.remote_client(id).unwrap();
        assert_eq!(client.user().username(), "directory-scott");
        // The originally presented credentials are still on record.
        assert_eq!(client.request().user().username(), "scott");
    }

    #[test]
    fn test_connect_substituted_identity_reconnects_with_original_credentials() {
        // After substitution, the client still reconnects with what it
        // originally presented — the theft check compares request
        // credentials, not the proxy's substitute.
        let registry = registry();
        registry
            .set_login_proxy(
                "test-client",
                Arc::new(TestProxy {
                    substitute: Some(User::new("directory-scott", "resolved")),
                    ..TestProxy::default()
                }),
            )
            .unwrap();
        let id = ClientId::random();
        let first = registry.connect(scott(id), None).unwrap();

        let second = registry
            .connect(scott(id), None)
            .expect("original credentials must still match");

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_connect_login_proxy_rejection_aborts_with_no_session() {
        let registry = registry();
        registry
            .set_login_proxy(
                "test-client",
                Arc::new(TestProxy {
                    reject: true,
                    ..TestProxy::default()
                }),
            )
            .unwrap();

        let result = registry.connect(scott(ClientId::random()), None);

        assert!(matches!(result, Err(RegistryError::Authentication(_))));
        assert_eq!(registry.connection_count(), 0);
    }

    // =====================================================================
    // Hook registration discipline
    // =====================================================================

    #[test]
    fn test_set_login_proxy_twice_rejected() {
        let registry = registry();
        registry
            .set_login_proxy("test-client", Arc::new(TestProxy::default()))
            .unwrap();

        let result = registry.set_login_proxy("test-client", Arc::new(TestProxy::default()));

        assert!(matches!(
            result,
            Err(RegistryError::LoginProxyAlreadySet(t)) if t == "test-client"
        ));
    }

    #[test]
    fn test_set_login_proxy_after_clear_succeeds() {
        let registry = registry();
        registry
            .set_login_proxy("test-client", Arc::new(TestProxy::default()))
            .unwrap();

        registry.clear_login_proxy("test-client");

        registry
            .set_login_proxy("test-client", Arc::new(TestProxy::default()))
            .expect("cleared slot should accept a new proxy");
    }

    #[test]
    fn test_set_connection_validator_twice_rejected() {
        let registry = registry();
        registry
            .set_connection_validator("test-client", Arc::new(RejectingValidator))
            .unwrap();

        let result =
            registry.set_connection_validator("test-client", Arc::new(RejectingValidator));

        assert!(matches!(
            result,
            Err(RegistryError::ValidatorAlreadySet(t)) if t == "test-client"
        ));
    }

    #[test]
    fn test_set_connection_validator_after_clear_succeeds() {
        let registry = registry();
        registry
            .set_connection_validator("test-client", Arc::new(RejectingValidator))
            .unwrap();

        registry.clear_connection_validator("test-client");

        registry
            .set_connection_validator("test-client", Arc::new(RejectingValidator))
            .expect("cleared slot should accept a new validator");
    }

    // =====================================================================
    // disconnect()
    // =====================================================================

    #[test]
    fn test_disconnect_removes_session_and_runs_hooks() {
        let registry = registry();
        let torn_down = Arc::clone(&registry.factory.torn_down);
        let logouts = Arc::new(AtomicUsize::new(0));
        registry
            .set_login_proxy(
                "test-client",
                Arc::new(TestProxy {
                    logouts: Arc::clone(&logouts),
                    ..TestProxy::default()
                }),
            )
            .unwrap();
        let id = ClientId::random();
        registry.connect(scott(id), None).unwrap();

        registry.disconnect(id);

        assert_eq!(registry.connection_count(), 0);
        assert_eq!(torn_down.load(Ordering::SeqCst), 1);
        assert_eq!(logouts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disconnect_unknown_client_is_noop() {
        let registry = registry();
        let torn_down = Arc::clone(&registry.factory.torn_down);

        registry.disconnect(ClientId::random());

        assert_eq!(torn_down.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_disconnect_twice_runs_teardown_once() {
        let registry = registry();
        let torn_down = Arc::clone(&registry.factory.torn_down);
        let id = ClientId::random();
        registry.connect(scott(id), None).unwrap();

        registry.disconnect(id);
        registry.disconnect(id);

        assert_eq!(torn_down.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disconnect_teardown_failure_swallowed_and_capacity_released() {
        let registry = ConnectionRegistry::new(
            "test-registry",
            TestFactory {
                fail_teardown: true,
                ..TestFactory::default()
            },
        );
        registry.set_connection_limit(Some(1));
        let id = ClientId::random();
        registry.connect(scott(id), None).unwrap();

        registry.disconnect(id);

        // The broken teardown must not leak the slot.
        assert_eq!(registry.connection_count(), 0);
        registry
            .connect(scott(ClientId::random()), None)
            .expect("slot must be free again");
    }

    #[test]
    fn test_disconnect_frees_slot_for_waiting_client() {
        // The example scenario: limit 1, U2 waits for U1's slot.
        let registry = registry();
        registry.set_connection_limit(Some(1));
        let u1 = ClientId::random();
        let u2 = ClientId::random();

        registry.connect(scott(u1), None).expect("U1 connects");
        assert!(matches!(
            registry.connect(scott(u2), None),
            Err(RegistryError::ServerFull { limit: 1 })
        ));

        registry.disconnect(u1);

        registry.connect(scott(u2), None).expect("U2 connects now");
        assert_eq!(registry.connection_count(), 1);
    }

    // =====================================================================
    // shutdown()
    // =====================================================================

    #[test]
    fn test_shutdown_disconnects_all_sessions() {
        let registry = registry();
        let torn_down = Arc::clone(&registry.factory.torn_down);
        registry.connect(scott(ClientId::random()), None).unwrap();
        registry.connect(scott(ClientId::random()), None).unwrap();

        registry.shutdown();

        assert_eq!(registry.connection_count(), 0);
        assert_eq!(torn_down.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_shutdown_closes_each_proxy_exactly_once() {
        // Two sessions of the same type must not close the proxy twice.
        let registry = registry();
        let closes = Arc::new(AtomicUsize::new(0));
        registry
            .set_login_proxy(
                "test-client",
                Arc::new(TestProxy {
                    closes: Arc::clone(&closes),
                    ..TestProxy::default()
                }),
            )
            .unwrap();
        registry.connect(scott(ClientId::random()), None).unwrap();
        registry.connect(scott(ClientId::random()), None).unwrap();

        registry.shutdown();

        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shutdown_twice_closes_proxies_once() {
        let registry = registry();
        let closes = Arc::new(AtomicUsize::new(0));
        registry
            .set_login_proxy(
                "test-client",
                Arc::new(TestProxy {
                    closes: Arc::clone(&closes),
                    ..TestProxy::default()
                }),
            )
            .unwrap();

        registry.shutdown();
        registry.shutdown();

        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shutdown_teardown_failure_does_not_halt_sweep() {
        // One broken connection must not keep the others connected.
        let registry = ConnectionRegistry::new(
            "test-registry",
            TestFactory {
                fail_teardown: true,
                ..TestFactory::default()
            },
        );
        let torn_down = Arc::clone(&registry.factory.torn_down);
        registry.connect(scott(ClientId::random()), None).unwrap();
        registry.connect(scott(ClientId::random()), None).unwrap();

        registry.shutdown();

        assert_eq!(registry.connection_count(), 0);
        assert_eq!(torn_down.load(Ordering::SeqCst), 2, "sweep visited both");
    }

    #[test]
    fn test_connect_after_shutdown_rejected() {
        let registry = registry();
        registry.shutdown();

        let result = registry.connect(scott(ClientId::random()), None);

        assert!(matches!(result, Err(RegistryError::ShuttingDown)));
    }

    #[test]
    fn test_disconnect_after_shutdown_is_noop() {
        let registry = registry();
        registry.shutdown();

        // Must not panic or error — tolerant like any unknown-id disconnect.
        registry.disconnect(ClientId::random());
    }

    // =====================================================================
    // Introspection
    // =====================================================================

    #[test]
    fn test_connection_count_tracks_connects_minus_disconnects() {
        let registry = registry();
        let a = ClientId::random();
        let b = ClientId::random();

        assert_eq!(registry.connection_count(), 0);
        registry.connect(scott(a), None).unwrap();
        registry.connect(scott(b), None).unwrap();
        assert_eq!(registry.connection_count(), 2);

        registry.disconnect(a);
        assert_eq!(registry.connection_count(), 1);
        assert!(!registry.contains_connection(a));
        assert!(registry.contains_connection(b));
    }

    #[test]
    fn test_connections_snapshot_is_not_a_live_view() {
        let registry = registry();
        let id = ClientId::random();
        registry.connect(scott(id), None).unwrap();

        let snapshot = registry.connections();
        registry.disconnect(id);

        // The registry moved on; the snapshot didn't.
        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.connection_count(), 0);
        assert_eq!(snapshot[0].0.client_id(), id);
    }

    #[test]
    fn test_connection_lookup_by_client_id() {
        let registry = registry();
        let id = ClientId::random();
        let connection = registry.connect(scott(id), None).unwrap();

        let looked_up = registry.connection(id).expect("must exist");
        assert!(Arc::ptr_eq(&connection, &looked_up));
        assert!(registry.connection(ClientId::random()).is_none());
    }

    #[test]
    fn test_info_reports_name_and_version() {
        let registry = registry();

        assert_eq!(registry.info().name(), "test-registry");
        assert_eq!(registry.info().framework_version(), env!("CARGO_PKG_VERSION"));
    }
}
