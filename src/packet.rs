//! Packet — the wire envelope for correlated peer traffic.
//!
//! DESIGN
//! ======
//! A packet is a flat JSON object with four string fields:
//! `type`, `data`, `packet_id` (the correlation id) and `session_id`.
//! `data` is opaque to this crate; callers usually nest another JSON
//! document inside it, which `with_json` / `json` help with.
//!
//! `Notice` is the reduced two-field envelope (`type`, `data`) used by the
//! uncorrelated one-way sender.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Packet type emitted by the liveness task.
pub const HEARTBEAT: &str = "heartbeat";

/// Error returned by the packet codec.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The frame carried no bytes at all.
    #[error("empty frame")]
    Empty,
    /// The frame is not a valid JSON packet.
    #[error("failed to decode packet: {0}")]
    Decode(#[source] serde_json::Error),
    /// The packet (or a nested payload) could not be serialized.
    #[error("failed to encode packet: {0}")]
    Encode(#[source] serde_json::Error),
}

// =============================================================================
// TYPES
// =============================================================================

/// A typed, correlatable unit of data.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Packet {
    /// Logical operation or notification kind, e.g. `"heartbeat"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Opaque caller-defined payload.
    pub data: String,
    /// Assigned by the sender of a request and echoed by the responder.
    /// Empty for one-way notifications.
    #[serde(rename = "packet_id")]
    pub correlation_id: String,
    /// Caller-defined context token, echoed the same way.
    pub session_id: String,
}

/// Two-field envelope for uncorrelated one-way notifications.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Notice {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: String,
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

impl Packet {
    /// Create a packet with no correlation or session context.
    pub fn new(kind: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            data: data.into(),
            correlation_id: String::new(),
            session_id: String::new(),
        }
    }

    /// The one-way liveness packet.
    #[must_use]
    pub fn heartbeat() -> Self {
        Self::new(HEARTBEAT, "")
    }

    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Serialize `value` as JSON into `data`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if `value` cannot be serialized.
    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self, CodecError> {
        self.data = serde_json::to_string(value).map_err(CodecError::Encode)?;
        Ok(self)
    }

    /// Parse `data` as a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] if `data` does not hold a `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        serde_json::from_str(&self.data).map_err(CodecError::Decode)
    }

    /// Copy the correlation and session context from `request` onto `self`.
    pub(crate) fn stamp(&mut self, correlation_id: &str, session_id: &str) {
        correlation_id.clone_into(&mut self.correlation_id);
        session_id.clone_into(&mut self.session_id);
    }
}

impl Notice {
    pub fn new(kind: impl Into<String>, data: impl Into<String>) -> Self {
        Self { kind: kind.into(), data: data.into() }
    }
}

// =============================================================================
// CODEC
// =============================================================================

/// Encode a packet as a JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Encode`]; not expected for plain string fields.
pub fn encode_packet(packet: &Packet) -> Result<String, CodecError> {
    serde_json::to_string(packet).map_err(CodecError::Encode)
}

/// Decode one inbound frame. Missing fields default to empty strings.
///
/// # Errors
///
/// Returns [`CodecError::Empty`] for a zero-length frame and
/// [`CodecError::Decode`] for anything that is not a JSON packet object.
pub fn decode_packet(bytes: &[u8]) -> Result<Packet, CodecError> {
    if bytes.is_empty() {
        return Err(CodecError::Empty);
    }
    serde_json::from_slice(bytes).map_err(CodecError::Decode)
}

/// Encode a notice as a JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Encode`]; not expected for plain string fields.
pub fn encode_notice(notice: &Notice) -> Result<String, CodecError> {
    serde_json::to_string(notice).map_err(CodecError::Encode)
}

#[cfg(test)]
#[path = "packet_test.rs"]
mod tests;
