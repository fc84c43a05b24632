//! Broadcast relay — one-to-many fan-out of camera frames to viewers.
//!
//! Independent of the command channel. Delivery is fire-and-forget over each
//! viewer's bounded send queue: a slow or broken viewer never blocks the
//! others or back-pressures the source device.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use fleet_core::{ClientId, HubMessage, ViewerId};

use crate::connection::ConnectionHandle;

/// One viewer's subscription to a source client's frame stream.
pub struct ViewerSubscription {
    pub watching: ClientId,
    pub handle: Arc<ConnectionHandle>,
}

/// Fans frames from source clients out to their subscribed viewers.
pub struct BroadcastRelay {
    viewers: DashMap<ViewerId, ViewerSubscription>,
}

impl BroadcastRelay {
    pub fn new() -> Self {
        Self {
            viewers: DashMap::new(),
        }
    }

    /// Attach a viewer to a source client's stream. The source does not have
    /// to be online yet; frames start flowing when it is.
    pub fn subscribe(&self, viewer_id: ViewerId, watching: ClientId, handle: Arc<ConnectionHandle>) {
        info!(viewer_id = %viewer_id, client_id = %watching, "viewer subscribed");
        let _ = self.viewers.insert(viewer_id, ViewerSubscription { watching, handle });
    }

    /// Detach a viewer. Idempotent.
    pub fn unsubscribe(&self, viewer_id: &ViewerId) {
        if self.viewers.remove(viewer_id).is_some() {
            info!(viewer_id = %viewer_id, "viewer unsubscribed");
        }
    }

    /// Forward one frame from `source` to every viewer watching it.
    ///
    /// The envelope is serialized once. Viewers whose send fails are
    /// collected during the iteration and removed after it completes, so the
    /// subscription set is never mutated mid-iteration and the remaining
    /// viewers still get the frame.
    pub fn fanout(&self, source: &ClientId, camera_index: i64, frame: String) {
        let envelope = HubMessage::CameraFrame {
            client_uuid: source.clone(),
            camera_index,
            frame,
        };
        let json = match serde_json::to_string(&envelope) {
            Ok(j) => j,
            Err(e) => {
                warn!(client_id = %source, error = %e, "failed to serialize frame envelope");
                return;
            }
        };

        let mut failed = Vec::new();
        for entry in self.viewers.iter() {
            if entry.watching != *source {
                continue;
            }
            if !entry.handle.send(json.clone()) {
                failed.push(entry.key().clone());
            }
        }

        for viewer_id in failed {
            debug!(viewer_id = %viewer_id, client_id = %source, "dropping viewer after failed delivery");
            self.unsubscribe(&viewer_id);
        }
    }

    /// Number of attached viewers.
    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    /// Ids of the viewers watching `client`.
    pub fn viewers_watching(&self, client: &ClientId) -> Vec<ViewerId> {
        self.viewers
            .iter()
            .filter(|entry| entry.watching == *client)
            .map(|entry| entry.key().clone())
            .collect()
    }
}

impl Default for BroadcastRelay {
    fn default() -> Self {
        Self::new()
    }
}
