//! # fleet-server
//!
//! The connection and command-correlation hub:
//!
//! - `WebSocket` gateway for device and viewer connections (axum)
//! - Connection registry: per-client status, last-seen, settings snapshot
//! - Request correlator: send a command, await the matching reply or time out
//! - Broadcast relay: fan camera frames out to subscribed viewers
//! - Graceful shutdown via `tokio::signal` + `CancellationToken`

pub mod config;
pub mod connection;
pub mod correlator;
pub mod health;
pub mod hub;
pub mod registry;
pub mod relay;
pub mod server;
pub mod shutdown;

pub use config::ServerConfig;
pub use hub::{CommandHub, DisconnectReason};
pub use server::{start, ServerHandle};
