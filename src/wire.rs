//! JSON wire payloads exchanged with the agent backend.
//!
//! Both directions are single-line JSON objects sent as WebSocket text
//! frames. Inbound decoding is the only place a payload can be rejected;
//! everything downstream works with typed [`InboundEvent`] values.

use serde::{Deserialize, Serialize};

use crate::error::ChatError;

#[cfg(test)]
#[path = "wire_test.rs"]
mod tests;

/// A decoded event pushed by the backend.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct InboundEvent {
    pub sender: String,
    pub text: String,
    /// Set when the agent is asking the user for input. Older backends omit it.
    #[serde(default)]
    pub requires_input: bool,
}

/// A user turn sent to the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutboundMessage<'a> {
    pub text: &'a str,
}

/// Decode a raw text frame into an [`InboundEvent`].
///
/// # Errors
///
/// Returns [`ChatError::MalformedPayload`] when the frame is not JSON or is
/// missing `sender`/`text`.
pub fn decode_inbound(raw: &str) -> Result<InboundEvent, ChatError> {
    serde_json::from_str(raw).map_err(|e| ChatError::MalformedPayload(e.to_string()))
}

/// Encode a user turn as `{"text": ...}`.
#[must_use]
pub fn encode_outbound(text: &str) -> String {
    // Serializing a struct with a single `&str` field cannot fail.
    serde_json::to_string(&OutboundMessage { text }).unwrap_or_default()
}
