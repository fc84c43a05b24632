//! `CommandHub` — the facade tying registry, correlator, and relay to the
//! live connections.
//!
//! One hub instance is constructed at startup and shared via `Arc`; there is
//! no global singleton. Connection tasks feed `handle_message`, callers use
//! `send_command`, and the outward accessor surface backs whatever HTTP or
//! persistence layer sits on top.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use fleet_core::{ClientId, ClientMessage, CommandResponse, HubMessage, ViewerId};

use crate::config::ServerConfig;
use crate::connection::ConnectionHandle;
use crate::correlator::RequestCorrelator;
use crate::registry::{ClientRecord, ClientStatus, ConnectionRegistry};
use crate::relay::BroadcastRelay;

/// How a client connection's listen loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Peer closed, or the receive loop ran out of messages without error.
    Clean,
    /// The transport errored while reading or writing.
    TransportError,
}

/// Central hub for device connections, command correlation, and frame relay.
pub struct CommandHub {
    registry: Arc<ConnectionRegistry>,
    correlator: RequestCorrelator,
    relay: BroadcastRelay,
    default_timeout: Duration,
}

impl CommandHub {
    pub fn new(config: &ServerConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        Self {
            correlator: RequestCorrelator::new(Arc::clone(&registry)),
            relay: BroadcastRelay::new(),
            registry,
            default_timeout: config.command_timeout(),
        }
    }

    /// A device connection finished its handshake: record it as Online.
    pub fn register_client(
        &self,
        id: &ClientId,
        handle: Arc<ConnectionHandle>,
        source_addr: Option<String>,
    ) {
        self.registry.register(id, handle, source_addr);
    }

    /// A device connection's listen loop ended.
    pub fn client_disconnected(&self, id: &ClientId, reason: DisconnectReason) {
        let status = match reason {
            DisconnectReason::Clean => ClientStatus::Offline,
            DisconnectReason::TransportError => ClientStatus::Error,
        };
        self.registry.unregister(id, status);
    }

    /// Dispatch one inbound message from a device by its `type` field.
    ///
    /// Unparseable payloads and unrecognized types are logged and ignored —
    /// neither is fatal to the connection.
    pub fn handle_message(&self, client_id: &ClientId, raw: &str) {
        let message: ClientMessage = match serde_json::from_str(raw) {
            Ok(m) => m,
            Err(e) => {
                warn!(client_id = %client_id, error = %e, "unparseable message, ignoring");
                return;
            }
        };

        match message {
            ClientMessage::Response {
                request_id,
                success,
                data,
                error,
            } => {
                let _ = self.correlator.resolve(
                    &request_id,
                    CommandResponse {
                        success,
                        data,
                        error,
                    },
                );
            }
            ClientMessage::Heartbeat => {
                debug!(client_id = %client_id, "heartbeat");
                self.registry.touch(client_id);
            }
            ClientMessage::StateUpdate { data } => {
                self.registry.update_settings(client_id, data.settings);
            }
            ClientMessage::CameraFrame {
                camera_index,
                frame,
            } => {
                self.relay.fanout(client_id, camera_index, frame);
            }
            ClientMessage::Unknown => {
                warn!(client_id = %client_id, "unrecognized message type, ignoring");
            }
        }
    }

    /// Send a command to a device and await its reply.
    ///
    /// `timeout` falls back to the configured default (30 s). The command
    /// name is opaque here; unknown commands are forwarded and the device is
    /// responsible for replying with an error.
    pub async fn send_command(
        &self,
        id: &ClientId,
        command: &str,
        params: Value,
        timeout: Option<Duration>,
    ) -> CommandResponse {
        self.correlator
            .issue(id, command, params, timeout.unwrap_or(self.default_timeout))
            .await
    }

    /// Best-effort raw send to a device. A failed send unregisters the
    /// client — a duplex transport that rejects a send is not coming back.
    pub fn send_message(&self, id: &ClientId, message: &HubMessage) -> bool {
        match self.registry.lookup(id) {
            Some(conn) if conn.send_json(message) => true,
            Some(_) => {
                warn!(client_id = %id, "send failed, unregistering client");
                self.registry.unregister(id, ClientStatus::Offline);
                false
            }
            None => false,
        }
    }

    /// Attach a viewer to a device's frame stream.
    pub fn add_viewer(&self, viewer_id: ViewerId, watching: ClientId, handle: Arc<ConnectionHandle>) {
        self.relay.subscribe(viewer_id, watching, handle);
    }

    /// Detach a viewer. Idempotent.
    pub fn remove_viewer(&self, viewer_id: &ViewerId) {
        self.relay.unsubscribe(viewer_id);
    }

    // ── Accessor surface for outward-facing layers ──────────────────

    pub fn all_clients(&self) -> HashMap<ClientId, ClientRecord> {
        self.registry.all_records()
    }

    pub fn online_clients(&self) -> HashMap<ClientId, ClientRecord> {
        self.registry.online_records()
    }

    pub fn client_info(&self, id: &ClientId) -> Option<ClientRecord> {
        self.registry.record(id)
    }

    pub fn connection_count(&self) -> usize {
        self.registry.connection_count()
    }

    pub fn viewer_count(&self) -> usize {
        self.relay.viewer_count()
    }

    pub fn pending_count(&self) -> usize {
        self.correlator.pending_count()
    }
}
