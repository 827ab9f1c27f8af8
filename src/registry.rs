//! Single-writer store of resolved GraphQL backends
//!
//! All mutation flows through an mpsc channel drained by exactly one task,
//! so updates are applied in FIFO order. Readers take cloned snapshots and
//! never observe a partially written entry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Unique key for a watched Service: its namespace and name
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct Identity {
    pub namespace: String,
    pub name: String,
}

impl Identity {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Everything the gateway needs to reach one backend GraphQL service
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub partial_name: String,
    pub endpoint: String,
    pub port: i32,
    pub path: String,
    pub protocol: String,
    /// Absent until an introspection fetch has succeeded
    pub schema: Option<String>,
}

impl BackendConfig {
    /// Render the backend's GraphQL endpoint URL
    pub fn endpoint_url(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.protocol, self.endpoint, self.port, self.path
        )
    }

    /// True when both configs carry the same resolved endpoint metadata,
    /// ignoring the schema
    pub fn same_resolution(&self, other: &BackendConfig) -> bool {
        self.partial_name == other.partial_name
            && self.endpoint == other.endpoint
            && self.port == other.port
            && self.path == other.path
            && self.protocol == other.protocol
    }
}

/// One mutation of the registry
#[derive(Debug, Clone)]
pub enum UpdateMessage {
    /// Insert or replace an entry
    Upsert(Identity, BackendConfig),
    /// Replace an entry only if the current one still carries the same
    /// resolved metadata; dropped otherwise. Used by background schema
    /// retries so a stale fetch can never resurrect a removed entry or
    /// clobber a newer resolution.
    Refresh(Identity, BackendConfig),
    /// Remove an entry; removing an absent entry is a no-op
    Remove(Identity),
}

/// Identity-keyed map of backend configs behind a read/write lock
///
/// At runtime only the listener task spawned from [`listen`] calls
/// [`Registry::apply`]; everything else reads.
#[derive(Clone, Default)]
pub struct Registry {
    entries: Arc<RwLock<HashMap<Identity, BackendConfig>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Apply one update message to a single entry
    ///
    /// The conditional `Refresh` check runs here, under the write lock,
    /// so it is ordered with every other mutation.
    pub async fn apply(&self, msg: UpdateMessage) {
        let mut entries = self.entries.write().await;
        match msg {
            UpdateMessage::Upsert(identity, config) => {
                info!("Updating {} in registry", identity);
                entries.insert(identity, config);
            }
            UpdateMessage::Refresh(identity, config) => match entries.get(&identity) {
                Some(current) if current.same_resolution(&config) => {
                    info!("Refreshing {} in registry", identity);
                    entries.insert(identity, config);
                }
                _ => {
                    debug!("Dropping refresh for {}, entry changed", identity);
                }
            },
            UpdateMessage::Remove(identity) => {
                if entries.remove(&identity).is_some() {
                    info!("Removing {} from registry", identity);
                }
            }
        }
    }

    /// Clone the current mapping for rendering responses
    pub async fn snapshot(&self) -> HashMap<Identity, BackendConfig> {
        self.entries.read().await.clone()
    }

    /// Single-entry lookup
    pub async fn get(&self, identity: &Identity) -> Option<BackendConfig> {
        self.entries.read().await.get(identity).cloned()
    }

    pub async fn contains(&self, identity: &Identity) -> bool {
        self.entries.read().await.contains_key(identity)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Drain update messages into the registry until all senders are dropped
///
/// Spawn exactly one of these per registry; it is the registry's single
/// writer and applies messages strictly in arrival order.
pub async fn listen(registry: Registry, mut rx: UnboundedReceiver<UpdateMessage>) {
    while let Some(msg) = rx.recv().await {
        registry.apply(msg).await;
    }
    info!("Registry update channel closed");
}
