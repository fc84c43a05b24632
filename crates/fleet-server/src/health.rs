//! `/health` endpoint payload.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Devices currently connected.
    pub clients_online: usize,
    /// Viewers currently attached.
    pub viewers: usize,
    /// Commands awaiting a reply.
    pub pending_requests: usize,
}

/// Build a health response from live counters.
pub fn health_check(
    start_time: Instant,
    clients_online: usize,
    viewers: usize,
    pending_requests: usize,
) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        clients_online,
        viewers,
        pending_requests,
    }
}
