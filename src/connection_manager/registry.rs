use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::types::{ConnectionHandle, ServerMessage};

/// Default per-connection outbound buffer
pub const DEFAULT_BUFFER: usize = 64;

/// Manages all live socket connections
pub struct ConnectionManager {
    /// connection_id -> ConnectionHandle
    connections: DashMap<Uuid, Arc<ConnectionHandle>>,
    /// user_id -> Set<connection_id> (supports multiple devices)
    user_index: DashMap<String, HashSet<Uuid>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            user_index: DashMap::new(),
        }
    }

    /// Register a new connection using an existing sender
    pub fn register(
        &self,
        user_id: String,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Arc<ConnectionHandle> {
        let handle = Arc::new(ConnectionHandle::new(user_id.clone(), sender));
        let conn_id = handle.id;

        self.connections.insert(conn_id, handle.clone());
        self.user_index.entry(user_id).or_default().insert(conn_id);

        tracing::info!(connection_id = %conn_id, user_id = %handle.user_id, "Connection registered");

        handle
    }

    /// Register a new connection and get the receiving side of its buffer
    pub fn connect(
        &self,
        user_id: impl Into<String>,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(DEFAULT_BUFFER);
        (self.register(user_id.into(), tx), rx)
    }

    /// Unregister a connection
    pub fn unregister(&self, connection_id: Uuid) {
        if let Some((_, handle)) = self.connections.remove(&connection_id) {
            if let Some(mut user_conns) = self.user_index.get_mut(&handle.user_id) {
                user_conns.remove(&connection_id);
                if user_conns.is_empty() {
                    drop(user_conns);
                    self.user_index.remove(&handle.user_id);
                }
            }

            tracing::info!(connection_id = %connection_id, user_id = %handle.user_id, "Connection unregistered");
        }
    }

    /// Get all connections for a user
    pub fn get_user_connections(&self, user_id: &str) -> Vec<Arc<ConnectionHandle>> {
        self.user_index
            .get(user_id)
            .map(|conn_ids| {
                conn_ids
                    .iter()
                    .filter_map(|id| self.connections.get(id).map(|h| h.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether the user has at least one live connection
    pub fn is_connected(&self, user_id: &str) -> bool {
        self.user_index
            .get(user_id)
            .map(|conn_ids| !conn_ids.is_empty())
            .unwrap_or(false)
    }

    /// Drop connections whose receiver has gone away, returning how many were removed
    pub fn prune_closed(&self) -> usize {
        let closed: Vec<Uuid> = self
            .connections
            .iter()
            .filter(|entry| entry.value().is_closed())
            .map(|entry| *entry.key())
            .collect();

        let count = closed.len();
        for conn_id in closed {
            self.unregister(conn_id);
        }
        count
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            total_connections: self.connections.len(),
            unique_users: self.user_index.len(),
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ConnectionStats {
    pub total_connections: usize,
    pub unique_users: usize,
}
