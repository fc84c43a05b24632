//! JSON wire format spoken over the duplex channel.
//!
//! Every payload is a JSON object with a `type` discriminator. Command
//! parameters and response data stay as opaque [`Value`]s at this layer —
//! per-command schemas belong to the remote executor, not the hub.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::ids::{ClientId, RequestId};

/// Messages a connected device sends to the hub.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Reply to a previously issued command.
    Response {
        /// Echo of the command's correlation id.
        request_id: RequestId,
        #[serde(default)]
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Liveness beacon; updates `last_seen` only.
    Heartbeat,
    /// Periodic snapshot of the device's local settings.
    StateUpdate { data: StateUpdateData },
    /// One encoded camera frame to be fanned out to viewers.
    CameraFrame { camera_index: i64, frame: String },
    /// Any unrecognized `type` — logged and ignored, never fatal.
    #[serde(other)]
    Unknown,
}

/// Payload of a `state_update` message.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StateUpdateData {
    #[serde(default)]
    pub settings: HashMap<String, String>,
}

/// Messages the hub sends to a peer.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubMessage {
    /// Command for a device to execute.
    Command {
        request_id: RequestId,
        command: String,
        params: Value,
    },
    /// Frame envelope forwarded to a viewer, stamped with its source.
    CameraFrame {
        client_uuid: ClientId,
        camera_index: i64,
        frame: String,
    },
}

/// Outcome of an issued command, as seen by the caller.
///
/// Either produced by the device or synthesized locally (not connected,
/// send failure, timeout). Callers always get a value, never a fault.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResponse {
    /// Successful response with a payload.
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failed response with a human-readable reason.
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}
