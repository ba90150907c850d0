//! In-memory WebSocket pairs and frame helpers shared by unit tests.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::DuplexStream;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::Role;

use crate::config::PeerConfig;
use crate::packet::{Packet, decode_packet, encode_packet};

pub(crate) type RawSocket = WebSocketStream<DuplexStream>;

/// Two connected WebSocket endpoints over an in-memory pipe.
pub(crate) async fn socket_pair() -> (RawSocket, RawSocket) {
    let (a, b) = tokio::io::duplex(64 * 1024);
    let client = WebSocketStream::from_raw_socket(a, Role::Client, None).await;
    let server = WebSocketStream::from_raw_socket(b, Role::Server, None).await;
    (client, server)
}

/// Short bounds so teardown paths finish quickly in tests.
pub(crate) fn fast_config() -> PeerConfig {
    PeerConfig {
        read_timeout: Duration::from_secs(2),
        write_timeout: Duration::from_secs(1),
        heartbeat_interval: Duration::from_millis(20),
    }
}

pub(crate) async fn send_text(socket: &mut RawSocket, text: impl Into<String>) {
    let text: String = text.into();
    socket
        .send(Message::Text(text.into()))
        .await
        .expect("raw send should succeed");
}

pub(crate) async fn send_packet(socket: &mut RawSocket, packet: &Packet) {
    send_text(socket, encode_packet(packet).expect("encode")).await;
}

/// Next text message, skipping control frames.
pub(crate) async fn recv_text(socket: &mut RawSocket) -> String {
    let next = async {
        loop {
            let msg = socket
                .next()
                .await
                .expect("socket ended")
                .expect("socket read failed");
            if let Message::Text(text) = msg {
                return text.as_str().to_owned();
            }
        }
    };
    timeout(Duration::from_secs(1), next)
        .await
        .expect("timed out waiting for frame")
}

pub(crate) async fn recv_packet(socket: &mut RawSocket) -> Packet {
    let text = recv_text(socket).await;
    decode_packet(text.as_bytes()).expect("frame should decode as a packet")
}

pub(crate) async fn assert_silent(socket: &mut RawSocket, window: Duration) {
    let next = timeout(window, socket.next()).await;
    assert!(next.is_err(), "expected no frame, got {next:?}");
}
