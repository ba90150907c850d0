//! One-way notice sender — the uncorrelated variant of the protocol.
//!
//! Writes two-field `{type, data}` frames straight to the channel: no
//! correlation, no reply, no timeout, no write lock. It takes the channel
//! by value, so a single owner is the only writer. Do not hand it one half
//! of a channel that a `Peer` also writes to.

use std::marker::PhantomData;

use futures::{Sink, SinkExt};

use crate::error::PeerError;
use crate::packet::{Notice, encode_notice};
use crate::transport::WireMessage;

pub struct NoticeSender<S, M> {
    channel: S,
    _message: PhantomData<fn(M)>,
}

impl<S, M> NoticeSender<S, M>
where
    S: Sink<M> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
    M: WireMessage,
{
    pub fn new(channel: S) -> Self {
        Self { channel, _message: PhantomData }
    }

    /// Encode and write one notice.
    ///
    /// # Errors
    ///
    /// Returns [`PeerError::Codec`] or [`PeerError::Write`].
    pub async fn send(&mut self, notice: &Notice) -> Result<(), PeerError> {
        let text = encode_notice(notice)?;
        self.channel
            .send(M::text(text))
            .await
            .map_err(|e| PeerError::Write(Box::new(e)))
    }

    /// Give the channel back, e.g. to close it.
    pub fn into_inner(self) -> S {
        self.channel
    }
}

#[cfg(test)]
#[path = "notice_test.rs"]
mod tests;
