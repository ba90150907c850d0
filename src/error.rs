use std::time::Duration;

use crate::packet::CodecError;

/// Boxed transport error. Both tungstenite and axum socket errors fit.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error returned by [`crate::Peer`] operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// The packet could not be encoded; nothing was written or registered.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The underlying channel rejected the write.
    #[error("transport write failed: {0}")]
    Write(#[source] BoxError),
    /// The write did not complete within the configured bound.
    #[error("transport write timed out after {0:?}")]
    WriteTimeout(Duration),
    /// The peer has been torn down; no reply will ever arrive.
    #[error("peer closed")]
    Closed,
    /// `call_timeout` gave up waiting for the reply.
    #[error("no reply within {0:?}")]
    ReplyTimeout(Duration),
    /// The dispatch loop was already started for this peer.
    #[error("peer is already listening")]
    AlreadyListening,
}
