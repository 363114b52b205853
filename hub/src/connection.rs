use crate::error::{registry_error, Error, RegistryErrorKind};
use crate::source::Update;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::*;
use std::sync::Arc;

// Type alias for user IDs (the acceptor converts its identity type to String)
pub type UserId = String;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An already-established, bidirectional channel to one client.
///
/// The hub writes from the dispatch loop and waits for closure from the
/// liveness detector at the same time, so every method takes `&self`.
#[async_trait]
pub trait Connection: Send + Sync {
    fn id(&self) -> &ConnectionId;

    /// Write one update to the client.
    async fn send(&self, update: &Update) -> Result<(), Error>;

    /// Resolve once the connection is no longer usable. The hub expects no
    /// inbound messages, so a read, an error or a peer close all count.
    ///
    /// A local `close()` counts as well: any pending or later call must
    /// resolve once `close()` has been called, or the liveness task for the
    /// connection never exits.
    async fn wait_closed(&self);

    /// Close the underlying transport and wake every `wait_closed()` waiter.
    /// Must be idempotent.
    async fn close(&self);
}

/// Connection information (no redundant connection_id)
#[derive(Clone)]
pub struct ConnectionInfo {
    pub user_id: UserId,
    pub connection: Arc<dyn Connection>,
}

/// A point-in-time copy of one registry entry.
#[derive(Clone)]
pub struct RegisteredConnection {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub connection: Arc<dyn Connection>,
}

/// Concurrent connection registry, sharded so unrelated handles never contend
/// on a single lock.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, ConnectionInfo>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a connection for `user_id`.
    ///
    /// A connection id may only be registered once, and the user id must not be
    /// empty. Both are caller bugs and are returned as errors rather than ignored.
    pub fn insert(&self, connection: Arc<dyn Connection>, user_id: UserId) -> Result<(), Error> {
        if user_id.trim().is_empty() {
            return Err(registry_error(RegistryErrorKind::InvalidUser));
        }

        match self.connections.entry(connection.id().clone()) {
            Entry::Occupied(entry) => {
                warn!(
                    "Rejected duplicate registration of connection {}",
                    entry.key()
                );
                Err(registry_error(RegistryErrorKind::DuplicateConnection))
            }
            Entry::Vacant(entry) => {
                entry.insert(ConnectionInfo {
                    user_id,
                    connection,
                });
                Ok(())
            }
        }
    }

    /// Remove a connection. Removing an id that is not registered is a no-op;
    /// the return value only reports whether this call removed it.
    pub fn remove(&self, connection_id: &ConnectionId) -> bool {
        self.connections.remove(connection_id).is_some()
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.connections.contains_key(connection_id)
    }

    /// Visit every registered entry. Entries inserted or removed while the scan
    /// runs may or may not be visited.
    ///
    /// `f` runs while a shard read lock is held, so it must not call back into
    /// the registry's mutating methods.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&ConnectionId, &UserId, &Arc<dyn Connection>),
    {
        for entry in self.connections.iter() {
            f(entry.key(), &entry.value().user_id, &entry.value().connection);
        }
    }

    /// Snapshot of all entries, safe to hold across `.await` points.
    pub fn entries(&self) -> Vec<RegisteredConnection> {
        let mut entries = Vec::with_capacity(self.connections.len());
        self.for_each(|connection_id, user_id, connection| {
            entries.push(RegisteredConnection {
                connection_id: connection_id.clone(),
                user_id: user_id.clone(),
                connection: Arc::clone(connection),
            })
        });
        entries
    }

    pub fn connections_for_user(&self, user_id: &UserId) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|entry| &entry.value().user_id == user_id)
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
