//! Transport seam — adapts any WebSocket-like duplex channel to text frames.
//!
//! A channel is anything that is both a `Stream` of inbound messages and a
//! `Sink` for outbound ones. The peer only needs to write text frames and
//! to classify what it reads, so the concrete message type is erased here
//! and `Peer` stays non-generic.

use std::pin::Pin;

use futures::future;
use futures::{Sink, SinkExt, Stream, StreamExt};

use crate::error::BoxError;

/// What the dispatch loop sees for each inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A complete text or binary frame.
    Frame(Vec<u8>),
    /// Ping/pong or other control traffic. Counts as a successful read.
    Control,
    /// The remote end sent a close frame.
    Close,
}

/// Message type of a duplex channel that can carry packet frames.
pub trait WireMessage: Send + 'static {
    fn text(text: String) -> Self;
    fn into_inbound(self) -> Inbound;
}

impl WireMessage for tokio_tungstenite::tungstenite::Message {
    fn text(text: String) -> Self {
        Self::Text(text.into())
    }

    fn into_inbound(self) -> Inbound {
        match self {
            Self::Text(text) => Inbound::Frame(text.as_str().as_bytes().to_vec()),
            Self::Binary(bytes) => Inbound::Frame(bytes.to_vec()),
            Self::Close(_) => Inbound::Close,
            Self::Ping(_) | Self::Pong(_) | Self::Frame(_) => Inbound::Control,
        }
    }
}

impl WireMessage for axum::extract::ws::Message {
    fn text(text: String) -> Self {
        Self::Text(text.into())
    }

    fn into_inbound(self) -> Inbound {
        match self {
            Self::Text(text) => Inbound::Frame(text.as_str().as_bytes().to_vec()),
            Self::Binary(bytes) => Inbound::Frame(bytes.to_vec()),
            Self::Close(_) => Inbound::Close,
            Self::Ping(_) | Self::Pong(_) => Inbound::Control,
        }
    }
}

pub(crate) type FrameSink = Pin<Box<dyn Sink<String, Error = BoxError> + Send>>;
pub(crate) type FrameStream = Pin<Box<dyn Stream<Item = Result<Inbound, BoxError>> + Send>>;

/// Split a channel into a text-frame writer and a classified reader.
pub(crate) fn split<S, M, E>(channel: S) -> (FrameSink, FrameStream)
where
    S: Stream<Item = Result<M, E>> + Sink<M, Error = E> + Send + 'static,
    M: WireMessage,
    E: std::error::Error + Send + Sync + 'static,
{
    let (sink, stream) = StreamExt::split::<M>(channel);
    let sink = sink.with(|text: String| future::ready(Ok::<M, BoxError>(M::text(text))));
    let stream = stream.map(|item| item.map(M::into_inbound).map_err(|e| Box::new(e) as BoxError));
    (Box::pin(sink), Box::pin(stream))
}
