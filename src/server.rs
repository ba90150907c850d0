//! Demo WebSocket endpoint.
//!
//! Every upgraded connection becomes a `Peer` that answers `echo` with
//! `echo-ack`, silently absorbs inbound heartbeats, and runs its own
//! liveness task until the connection dies.

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::PeerConfig;
use crate::packet::{HEARTBEAT, Packet};
use crate::peer::Peer;

pub const ECHO: &str = "echo";
pub const ECHO_ACK: &str = "echo-ack";

pub fn app(config: PeerConfig) -> Router {
    Router::new()
        .route("/ws", get(handle_ws))
        .layer(TraceLayer::new_for_http())
        .with_state(config)
}

async fn handle_ws(State(config): State<PeerConfig>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_peer(socket, config))
}

async fn run_peer(socket: WebSocket, config: PeerConfig) {
    let peer = Peer::with_config(socket, config);
    peer.register_handler(ECHO, |packet: Packet| async move { Some(Packet::new(ECHO_ACK, packet.data)) });
    peer.register_handler(HEARTBEAT, |_packet: Packet| async { None });

    let Ok(dispatch) = peer.listen() else {
        return;
    };
    let heartbeat = peer.spawn_heartbeat();
    info!(peer_id = %peer.id(), "ws: peer connected");

    let _ = dispatch.await;
    let _ = heartbeat.await;
    info!(peer_id = %peer.id(), "ws: peer disconnected");
}

#[cfg(test)]
#[path = "server_test.rs"]
mod tests;
