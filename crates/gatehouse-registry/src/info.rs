//! Static metadata about a running registry.

use std::time::SystemTime;

use uuid::Uuid;

/// Identity and startup metadata for one registry instance.
///
/// Fixed at construction time. Admin and monitoring tooling uses this to
/// tell registry instances apart (the id is fresh per process — a restart
/// is a new registry, and all prior sessions and tokens are gone with the
/// old one).
#[derive(Debug, Clone)]
pub struct RegistryInfo {
    registry_id: Uuid,
    name: String,
    started_at: SystemTime,
    framework_version: &'static str,
}

impl RegistryInfo {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            registry_id: Uuid::new_v4(),
            name: name.into(),
            started_at: SystemTime::now(),
            framework_version: env!("CARGO_PKG_VERSION"),
        }
    }

    /// A unique id for this registry instance (fresh per construction).
    pub fn registry_id(&self) -> Uuid {
        self.registry_id
    }

    /// The name the embedder gave this registry.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// When this registry was constructed.
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    /// The Gatehouse version this registry was built with. Also stamped
    /// onto every session's [`RemoteClient`](gatehouse_client::RemoteClient).
    pub fn framework_version(&self) -> &'static str {
        self.framework_version
    }
}
