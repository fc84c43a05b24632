//! Connection registry — single source of truth for "is client X reachable,
//! and through which handle."
//!
//! Two tables with different lifetimes: the connection table holds the send
//! handle of each live socket (exactly one per client id, last writer wins),
//! while the record table is durable identity — a [`ClientRecord`] is created
//! on first contact and never deleted, only flipped between statuses.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use fleet_core::ClientId;

use crate::connection::ConnectionHandle;

/// Derived connection status of a client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Online,
    Offline,
    Error,
}

/// Durable per-client record, independent of any one physical connection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: ClientId,
    pub status: ClientStatus,
    pub last_seen: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_addr: Option<String>,
    /// Last settings snapshot the device reported, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<HashMap<String, String>>,
}

/// Tracks live connections and durable client records.
pub struct ConnectionRegistry {
    connections: DashMap<ClientId, Arc<ConnectionHandle>>,
    records: RwLock<HashMap<ClientId, ClientRecord>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Store a new active connection and upsert the client's record to
    /// Online. Registering an id that already has a connection supersedes it;
    /// the record keeps its continuity.
    pub fn register(
        &self,
        id: &ClientId,
        handle: Arc<ConnectionHandle>,
        source_addr: Option<String>,
    ) {
        let _ = self.connections.insert(id.clone(), handle);

        let mut records = self.records.write();
        match records.get_mut(id) {
            Some(record) => {
                record.status = ClientStatus::Online;
                record.last_seen = Utc::now();
                record.source_addr = source_addr.clone();
            }
            None => {
                let _ = records.insert(
                    id.clone(),
                    ClientRecord {
                        id: id.clone(),
                        status: ClientStatus::Online,
                        last_seen: Utc::now(),
                        source_addr: source_addr.clone(),
                        settings: None,
                    },
                );
            }
        }
        info!(client_id = %id, source = source_addr.as_deref().unwrap_or("unknown"), "client connected");
    }

    /// Drop the active connection (if any) and stamp the record with a
    /// terminal status. Never errors; unknown ids are a no-op.
    pub fn unregister(&self, id: &ClientId, status: ClientStatus) {
        let _ = self.connections.remove(id);

        let mut records = self.records.write();
        if let Some(record) = records.get_mut(id) {
            record.status = status;
            record.last_seen = Utc::now();
        }
        info!(client_id = %id, status = ?status, "client disconnected");
    }

    /// Refresh `last_seen` without changing status. Heartbeats land here.
    pub fn touch(&self, id: &ClientId) {
        if let Some(record) = self.records.write().get_mut(id) {
            record.last_seen = Utc::now();
        }
    }

    /// Replace the client's last-known settings snapshot.
    pub fn update_settings(&self, id: &ClientId, settings: HashMap<String, String>) {
        if let Some(record) = self.records.write().get_mut(id) {
            record.settings = Some(settings);
            record.last_seen = Utc::now();
        }
    }

    /// Send handle of the client's live connection, if online.
    pub fn lookup(&self, id: &ClientId) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(id).map(|entry| Arc::clone(&entry))
    }

    /// Snapshot of one client's record.
    pub fn record(&self, id: &ClientId) -> Option<ClientRecord> {
        self.records.read().get(id).cloned()
    }

    /// Snapshot of every known client.
    pub fn all_records(&self) -> HashMap<ClientId, ClientRecord> {
        self.records.read().clone()
    }

    /// Snapshot of clients currently marked Online.
    pub fn online_records(&self) -> HashMap<ClientId, ClientRecord> {
        self.records
            .read()
            .iter()
            .filter(|(_, r)| r.status == ClientStatus::Online)
            .map(|(id, r)| (id.clone(), r.clone()))
            .collect()
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
