//! Correlated request/response messaging over a WebSocket-style duplex
//! channel.
//!
//! ARCHITECTURE
//! ============
//! A [`Peer`] wraps one already-open channel and turns its unlabeled frame
//! stream into three kinds of traffic:
//! - one-way typed notifications (`Peer::send`)
//! - correlated request/response (`Peer::send_with`, `Peer::call`)
//! - periodic `heartbeat` packets (`Peer::spawn_heartbeat`)
//!
//! Inbound packets are routed by `packet_id` to the pending reply that
//! issued it, or else by `type` to a registered handler. [`NoticeSender`]
//! is the stripped-down, uncorrelated writer for single-owner channels.

pub mod config;
pub mod error;
pub mod notice;
pub mod packet;
pub mod peer;
mod registry;
pub mod server;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::PeerConfig;
pub use error::{BoxError, PeerError};
pub use notice::NoticeSender;
pub use packet::{CodecError, HEARTBEAT, Notice, Packet, decode_packet, encode_notice, encode_packet};
pub use peer::Peer;
pub use registry::{Handler, ReplyCallback};
pub use transport::{Inbound, WireMessage};
