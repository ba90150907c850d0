use super::*;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;

async fn spawn_server(config: PeerConfig) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app(config)).await.expect("server failed");
    });
    addr
}

async fn connect_peer(addr: SocketAddr, config: PeerConfig) -> Peer {
    let (stream, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("websocket connect");
    Peer::with_config(stream, config)
}

fn test_config() -> PeerConfig {
    PeerConfig {
        read_timeout: Duration::from_secs(2),
        write_timeout: Duration::from_secs(1),
        heartbeat_interval: Duration::from_millis(50),
    }
}

#[tokio::test]
async fn echo_call_over_real_socket() {
    let addr = spawn_server(test_config()).await;
    let client = connect_peer(addr, test_config()).await;
    let _loop = client.listen().expect("listen");

    let reply = timeout(
        Duration::from_secs(2),
        client.call(Packet::new(ECHO, "hi").with_session_id("s1")),
    )
    .await
    .expect("echo timed out")
    .expect("echo call");

    assert_eq!(reply.kind, ECHO_ACK);
    assert_eq!(reply.data, "hi");
    assert_eq!(reply.session_id, "s1");
}

#[tokio::test]
async fn server_peer_emits_heartbeats() {
    let addr = spawn_server(test_config()).await;
    let client = connect_peer(addr, test_config()).await;
    let (beat_tx, mut beat_rx) = mpsc::unbounded_channel();
    client.register_handler(HEARTBEAT, move |packet: Packet| {
        let beat_tx = beat_tx.clone();
        async move {
            let _ = beat_tx.send(packet.correlation_id);
            None
        }
    });
    let _loop = client.listen().expect("listen");

    let correlation_id = timeout(Duration::from_secs(2), beat_rx.recv())
        .await
        .expect("no heartbeat from server")
        .expect("heartbeat channel closed");
    assert!(!correlation_id.is_empty());
}

#[tokio::test]
async fn client_close_tears_down_both_sides() {
    let addr = spawn_server(test_config()).await;
    let client = connect_peer(addr, test_config()).await;
    let _loop = client.listen().expect("listen");

    client.close().await;
    timeout(Duration::from_secs(2), client.closed())
        .await
        .expect("client peer never observed close");
}
