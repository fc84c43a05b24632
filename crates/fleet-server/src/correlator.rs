//! Request correlator — turns a fire-and-forget duplex send into a
//! request/response call with a deadline.
//!
//! Each issued command parks a `oneshot` sender in the pending table keyed by
//! request id; the dispatch path resolves it when a matching reply arrives.
//! `DashMap::remove` is the single atomic step that decides ownership of the
//! sender, so exactly one of {resolve, timeout cleanup, cancellation cleanup}
//! ever completes a given request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use fleet_core::{ClientId, CommandError, CommandResponse, HubMessage, RequestId};

use crate::registry::{ClientStatus, ConnectionRegistry};

/// Correlates outgoing commands with their eventual replies.
pub struct RequestCorrelator {
    registry: Arc<ConnectionRegistry>,
    pending: DashMap<RequestId, oneshot::Sender<CommandResponse>>,
    counter: AtomicU64,
}

impl RequestCorrelator {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            pending: DashMap::new(),
            counter: AtomicU64::new(0),
        }
    }

    /// Send `command` to `target` and wait for the matching reply.
    ///
    /// Fails immediately (no pending entry) when the target has no live
    /// connection. A send failure unregisters the target — a duplex channel
    /// that rejects a send is treated as dead. Otherwise the caller suspends
    /// until the reply arrives or `timeout` elapses; there is no retry.
    ///
    /// Always returns a [`CommandResponse`]; local failures surface as
    /// `success == false` with a readable `error`.
    pub async fn issue(
        &self,
        target: &ClientId,
        command: &str,
        params: Value,
        timeout: Duration,
    ) -> CommandResponse {
        let Some(conn) = self.registry.lookup(target) else {
            debug!(client_id = %target, command, "command to unconnected client");
            return CommandError::NotConnected.into();
        };

        let request_id = RequestId::compose(self.counter.fetch_add(1, Ordering::Relaxed) + 1);
        let (tx, rx) = oneshot::channel();
        let _ = self.pending.insert(request_id.clone(), tx);

        let envelope = HubMessage::Command {
            request_id: request_id.clone(),
            command: command.to_owned(),
            params,
        };
        if !conn.send_json(&envelope) {
            let _ = self.pending.remove(&request_id);
            warn!(client_id = %target, command, "send failed, unregistering client");
            self.registry.unregister(target, ClientStatus::Offline);
            return CommandError::SendFailed.into();
        }

        // Removes the pending entry when this future exits by any path,
        // including cancellation. The resolve path has already removed the
        // entry by the time a reply completes the wait, so this is a no-op
        // there.
        let _guard = PendingGuard {
            correlator: self,
            request_id: request_id.clone(),
        };

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) | Err(_) => {
                debug!(client_id = %target, request_id = %request_id, command, "command timed out");
                CommandError::Timeout.into()
            }
        }
    }

    /// Complete the pending request for `request_id` with `response`.
    ///
    /// Returns whether a waiter received it. Unknown ids — already resolved,
    /// timed out, or never issued — are logged and dropped.
    pub fn resolve(&self, request_id: &RequestId, response: CommandResponse) -> bool {
        match self.pending.remove(request_id) {
            Some((_, tx)) => tx.send(response).is_ok(),
            None => {
                warn!(request_id = %request_id, "unmatched response, dropping");
                false
            }
        }
    }

    /// Number of requests currently awaiting a reply.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

struct PendingGuard<'a> {
    correlator: &'a RequestCorrelator,
    request_id: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let _ = self.correlator.pending.remove(&self.request_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    use crate::connection::ConnectionHandle;

    fn id(s: &str) -> ClientId {
        ClientId::from_raw(s)
    }

    fn setup() -> (Arc<ConnectionRegistry>, Arc<RequestCorrelator>) {
        let registry = Arc::new(ConnectionRegistry::new());
        let correlator = Arc::new(RequestCorrelator::new(Arc::clone(&registry)));
        (registry, correlator)
    }

    fn connect(registry: &ConnectionRegistry, client: &ClientId) -> mpsc::Receiver<String> {
        let (handle, rx) = ConnectionHandle::new(client.as_str(), 32);
        registry.register(client, Arc::new(handle), None);
        rx
    }

    fn request_id_of(raw: &str) -> RequestId {
        let v: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(v["type"], "command");
        RequestId::from_raw(v["request_id"].as_str().unwrap())
    }

    #[tokio::test]
    async fn not_connected_fails_without_pending_entry() {
        let (_registry, correlator) = setup();
        let resp = correlator
            .issue(&id("ghost"), "refresh_state", json!({}), Duration::from_secs(1))
            .await;
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("client not connected"));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn roundtrip_resolves_with_client_reply() {
        let (registry, correlator) = setup();
        let client = id("dev_1");
        let mut rx = connect(&registry, &client);

        let responder = Arc::clone(&correlator);
        let echo = tokio::spawn(async move {
            let raw = rx.recv().await.unwrap();
            let request_id = request_id_of(&raw);
            responder.resolve(&request_id, CommandResponse::ok(json!({"fps": 30})));
        });

        let resp = correlator
            .issue(&client, "camera_status", json!({"camera_index": 0}), Duration::from_secs(5))
            .await;
        echo.await.unwrap();

        assert!(resp.success);
        assert_eq!(resp.data.unwrap()["fps"], 30);
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_client_times_out_and_cleans_up() {
        let (registry, correlator) = setup();
        let client = id("dev_1");
        let _rx = connect(&registry, &client);

        let resp = correlator
            .issue(&client, "refresh_state", json!({}), Duration::from_secs(30))
            .await;

        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("command timed out"));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_after_timeout_is_unmatched() {
        let (registry, correlator) = setup();
        let client = id("dev_1");
        let mut rx = connect(&registry, &client);

        let resp = correlator
            .issue(&client, "refresh_state", json!({}), Duration::from_secs(1))
            .await;
        assert!(!resp.success);

        let raw = rx.recv().await.unwrap();
        let request_id = request_id_of(&raw);
        let matched = correlator.resolve(&request_id, CommandResponse::ok(json!(null)));
        assert!(!matched);
    }

    #[tokio::test]
    async fn duplicate_response_resolves_once() {
        let (registry, correlator) = setup();
        let client = id("dev_1");
        let mut rx = connect(&registry, &client);

        let responder = Arc::clone(&correlator);
        let echo = tokio::spawn(async move {
            let raw = rx.recv().await.unwrap();
            let request_id = request_id_of(&raw);
            let first = responder.resolve(&request_id, CommandResponse::ok(json!(1)));
            let second = responder.resolve(&request_id, CommandResponse::ok(json!(2)));
            (first, second)
        });

        let resp = correlator
            .issue(&client, "get_settings", json!({}), Duration::from_secs(5))
            .await;
        let (first, second) = echo.await.unwrap();

        assert!(resp.success);
        assert_eq!(resp.data.unwrap(), json!(1));
        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn send_failure_unregisters_and_fails() {
        let (registry, correlator) = setup();
        let client = id("dev_1");
        let (handle, rx) = ConnectionHandle::new(client.as_str(), 32);
        registry.register(&client, Arc::new(handle), None);
        drop(rx); // writer gone, every send now fails

        let resp = correlator
            .issue(&client, "refresh_state", json!({}), Duration::from_secs(1))
            .await;

        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("failed to send command"));
        assert_eq!(correlator.pending_count(), 0);
        assert!(registry.lookup(&client).is_none());
        assert_eq!(registry.record(&client).unwrap().status, ClientStatus::Offline);
    }

    #[tokio::test]
    async fn cancelled_caller_leaves_no_pending_entry() {
        let (registry, correlator) = setup();
        let client = id("dev_1");
        let _rx = connect(&registry, &client);

        let issuer = Arc::clone(&correlator);
        let target = client.clone();
        let task = tokio::spawn(async move {
            issuer
                .issue(&target, "refresh_state", json!({}), Duration::from_secs(60))
                .await
        });

        // Let the issue land in the pending table, then cancel the caller.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(correlator.pending_count(), 1);
        task.abort();
        assert!(task.await.is_err());

        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn request_ids_are_unique_across_issues() {
        let (registry, correlator) = setup();
        let client = id("dev_1");
        let mut rx = connect(&registry, &client);

        let mut seen = Vec::new();
        for _ in 0..3 {
            let raw_rx = &mut rx;
            let issue = correlator.issue(&client, "refresh_state", json!({}), Duration::from_secs(5));
            tokio::pin!(issue);

            // Drive the issue and the echo together.
            let raw = tokio::select! {
                raw = raw_rx.recv() => raw.unwrap(),
                _ = &mut issue => panic!("issue completed before command was read"),
            };
            let request_id = request_id_of(&raw);
            assert!(!seen.contains(&request_id));
            seen.push(request_id.clone());
            assert!(correlator.resolve(&request_id, CommandResponse::ok(json!(null))));
            let resp = issue.await;
            assert!(resp.success);
        }
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn resolve_unknown_id_returns_false() {
        let (_registry, correlator) = setup();
        let matched = correlator.resolve(
            &RequestId::from_raw("req_999_bogus"),
            CommandResponse::ok(json!(null)),
        );
        assert!(!matched);
    }
}
