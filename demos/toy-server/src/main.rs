//! A toy embedding of Gatehouse: no real transport, just the registry and
//! token store driven from `main` the way a transport handler would drive
//! them. Run with `RUST_LOG=debug cargo run -p toy-server` to watch the
//! lifecycle in the logs.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use gatehouse::prelude::*;

// ---------------------------------------------------------------------------
// The business connection
// ---------------------------------------------------------------------------

/// What this toy server hands to authenticated clients: a greeter that
/// knows who it belongs to.
struct EchoConnection {
    serial: u64,
    client: RemoteClient,
}

impl EchoConnection {
    fn greet(&self) -> String {
        format!(
            "hello {}, you are connection #{}",
            self.client.user(),
            self.serial
        )
    }
}

/// Builds `EchoConnection`s. `Connection = Arc<...>` so the registry's
/// clone-on-reconnect shares the one object.
#[derive(Default)]
struct EchoFactory {
    serial: AtomicU64,
}

impl ConnectionFactory for EchoFactory {
    type Connection = Arc<EchoConnection>;

    fn establish(&self, client: &RemoteClient) -> Result<Self::Connection, BoxError> {
        Ok(Arc::new(EchoConnection {
            serial: self.serial.fetch_add(1, Ordering::SeqCst) + 1,
            client: client.clone(),
        }))
    }

    fn teardown(&self, connection: Self::Connection) -> Result<(), BoxError> {
        tracing::debug!(serial = connection.serial, "echo connection torn down");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

/// Rejects clients that didn't report a version.
struct VersionFloor;

impl ConnectionValidator for VersionFloor {
    fn client_type_id(&self) -> &str {
        "toy-client"
    }

    fn validate(&self, request: &ConnectionRequest) -> Result<(), RegistryError> {
        match request.client_version() {
            Some(_) => Ok(()),
            None => Err(RegistryError::Validation(
                "client version is required".into(),
            )),
        }
    }
}

/// Pretends to resolve the presented account against a directory and makes
/// the session run as the resolved identity.
struct DirectoryProxy;

impl LoginProxy for DirectoryProxy {
    fn client_type_id(&self) -> &str {
        "toy-client"
    }

    fn login(&self, client: RemoteClient) -> Result<RemoteClient, RegistryError> {
        let resolved = User::new(
            format!("dir:{}", client.user().username()),
            client.user().password(),
        );
        tracing::info!(resolved = %resolved, "directory resolved login identity");
        Ok(client.with_user(resolved))
    }

    fn logout(&self, client: &RemoteClient) -> Result<(), RegistryError> {
        tracing::info!(client = %client, "directory logout");
        Ok(())
    }

    fn close(&self) {
        tracing::info!("directory proxy closed");
    }
}

// ---------------------------------------------------------------------------
// Main: play a transport layer for a while
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), GatehouseError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let registry = ConnectionRegistry::new("toy-server", EchoFactory::default());
    registry.set_connection_limit(Some(2));
    registry.set_login_proxy("toy-client", Arc::new(DirectoryProxy))?;
    registry.set_connection_validator("toy-client", Arc::new(VersionFloor))?;

    // A client connects, reconnects (same connection comes back), and a
    // thief fails to steal the session.
    let scott = User::new("scott", "tiger");
    let client_id = ClientId::random();
    let request = ConnectionRequest::new(scott.clone(), client_id, "toy-client")
        .with_version("1.0.0");

    let connection = registry.connect(request.clone(), None)?;
    println!("{}", connection.greet());

    let again = registry.connect(request, None)?;
    assert!(Arc::ptr_eq(&connection, &again));
    println!("reconnect handed back connection #{}", again.serial);

    let theft = ConnectionRequest::new(User::new("scott", "guessed"), client_id, "toy-client")
        .with_version("1.0.0");
    match registry.connect(theft, None) {
        Err(RegistryError::Authentication(reason)) => {
            println!("theft attempt rejected: {reason}");
        }
        Ok(_) => unreachable!("theft must never succeed"),
        Err(other) => unreachable!("unexpected rejection: {other}"),
    }

    // Out-of-band handoff: issue a token for scott, redeem it once.
    let tokens = CredentialTokenStore::new(TokenConfig::default());
    let token = tokens.add_token(scott)?;
    println!("issued handoff token {token}");
    let redeemed = tokens.consume(token).expect("first redemption succeeds");
    println!("token redeemed for {redeemed}");
    assert!(tokens.consume(token).is_none(), "tokens are single-use");

    tokens.close();
    registry.shutdown();
    println!(
        "shut down after serving {} connections",
        registry.factory().serial.load(Ordering::SeqCst)
    );
    Ok(())
}
