use peerwire::{PeerConfig, server};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .expect("invalid PORT");

    let config = PeerConfig::from_env();
    tracing::info!(
        read_timeout = ?config.read_timeout,
        write_timeout = ?config.write_timeout,
        heartbeat_interval = ?config.heartbeat_interval,
        "peer config loaded"
    );

    let app = server::app(config);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "peerwire listening");
    axum::serve(listener, app).await.expect("server failed");
}
