//! # fleet-core
//!
//! Wire types shared between the hub and its peers:
//!
//! - Branded string ids (`ClientId`, `ViewerId`, `RequestId`)
//! - The JSON message envelopes spoken over the duplex channel
//! - `CommandResponse` values and the command failure taxonomy

pub mod errors;
pub mod ids;
pub mod messages;

pub use errors::CommandError;
pub use ids::{ClientId, RequestId, ViewerId};
pub use messages::{ClientMessage, CommandResponse, HubMessage};
