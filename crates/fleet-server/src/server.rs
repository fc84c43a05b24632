//! Axum HTTP + `WebSocket` server.
//!
//! Two upgrade endpoints: `/ws/client/{client_id}` for devices and
//! `/ws/viewer/{client_id}` for frame subscribers, plus `/health`. Each
//! accepted socket is split into a writer task (drains the connection's send
//! queue, pings periodically) and a reader loop feeding the hub.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use tracing::{info, warn};

use fleet_core::{ClientId, ViewerId};

use crate::config::ServerConfig;
use crate::connection::ConnectionHandle;
use crate::health;
use crate::hub::{CommandHub, DisconnectReason};
use crate::shutdown::ShutdownCoordinator;

/// Shared state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<CommandHub>,
    pub config: Arc<ServerConfig>,
    pub shutdown: Arc<ShutdownCoordinator>,
    pub start_time: Instant,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws/client/{client_id}", get(client_ws_handler))
        .route("/ws/viewer/{client_id}", get(viewer_ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(tower_http::cors::CorsLayer::permissive())
}

/// Handle returned by [`start`] — exposes the hub and the shutdown
/// coordinator (which tracks the accept-loop task) to the embedding process.
pub struct ServerHandle {
    pub port: u16,
    pub hub: Arc<CommandHub>,
    pub shutdown: Arc<ShutdownCoordinator>,
}

/// Bind and serve. Port `0` auto-assigns (used by tests).
pub async fn start(config: ServerConfig) -> Result<ServerHandle, std::io::Error> {
    let hub = Arc::new(CommandHub::new(&config));
    let shutdown = Arc::new(ShutdownCoordinator::new());

    let state = AppState {
        hub: Arc::clone(&hub),
        config: Arc::new(config.clone()),
        shutdown: Arc::clone(&shutdown),
        start_time: Instant::now(),
    };

    let router = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    info!(port = local_addr.port(), "fleet hub started");

    let token = shutdown.token();
    let server = tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(token.cancelled_owned())
        .await
        .ok();
    });
    shutdown.track(server);

    Ok(ServerHandle {
        port: local_addr.port(),
        hub,
        shutdown,
    })
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<health::HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.hub.connection_count(),
        state.hub.viewer_count(),
        state.hub.pending_count(),
    ))
}

/// GET /ws/client/{client_id} — device connection upgrade.
async fn client_ws_handler(
    ws: WebSocketUpgrade,
    Path(client_id): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        handle_client_socket(socket, ClientId::from_raw(client_id), addr, state)
    })
}

/// GET /ws/viewer/{client_id} — viewer connection upgrade. The path names
/// the client being watched; the viewer itself gets a generated id.
async fn viewer_ws_handler(
    ws: WebSocketUpgrade,
    Path(client_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_viewer_socket(socket, ClientId::from_raw(client_id), state))
}

/// Run one device connection: register, pump messages, unregister.
async fn handle_client_socket(socket: WebSocket, client_id: ClientId, addr: SocketAddr, state: AppState) {
    let (handle, rx) = ConnectionHandle::new(client_id.as_str(), state.config.max_send_queue);
    state
        .hub
        .register_client(&client_id, Arc::new(handle), Some(addr.to_string()));

    let (ws_tx, mut ws_rx) = socket.split();
    let writer = spawn_writer(ws_tx, rx, state.config.ping_interval_secs);
    let token = state.shutdown.token();

    let reason = loop {
        tokio::select! {
            msg = ws_rx.next() => match msg {
                Some(Ok(WsMessage::Text(text))) => state.hub.handle_message(&client_id, text.as_str()),
                Some(Ok(WsMessage::Close(_))) | None => break DisconnectReason::Clean,
                Some(Ok(_)) => {} // ping/pong/binary: nothing to dispatch
                Some(Err(e)) => {
                    warn!(client_id = %client_id, error = %e, "read error on client socket");
                    break DisconnectReason::TransportError;
                }
            },
            () = token.cancelled() => break DisconnectReason::Clean,
        }
    };

    state.hub.client_disconnected(&client_id, reason);
    writer.abort();
}

/// Run one viewer connection: subscribe, forward frames until it goes away.
async fn handle_viewer_socket(socket: WebSocket, watching: ClientId, state: AppState) {
    let viewer_id = ViewerId::new();
    let (handle, rx) = ConnectionHandle::new(viewer_id.as_str(), state.config.max_send_queue);
    state
        .hub
        .add_viewer(viewer_id.clone(), watching, Arc::new(handle));

    let (ws_tx, mut ws_rx) = socket.split();
    let writer = spawn_writer(ws_tx, rx, state.config.ping_interval_secs);
    let token = state.shutdown.token();

    // Viewers are consume-only; drain the read side until it ends.
    loop {
        tokio::select! {
            msg = ws_rx.next() => match msg {
                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            () = token.cancelled() => break,
        }
    }

    state.hub.remove_viewer(&viewer_id);
    writer.abort();
}

/// Writer task: forward queued text to the socket, ping periodically.
fn spawn_writer(
    mut ws_tx: futures::stream::SplitSink<WebSocket, WsMessage>,
    mut rx: tokio::sync::mpsc::Receiver<String>,
    ping_interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ping_interval =
            tokio::time::interval(Duration::from_secs(ping_interval_secs.max(1)));
        ping_interval.tick().await; // consume the immediate first tick

        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(text) => {
                        if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    })
}
