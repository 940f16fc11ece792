//! Error taxonomy for the chat core.
//!
//! ERROR HANDLING
//! ==============
//! None of these are fatal. Each variant ends in a status entry, a dropped
//! event, a scheduled retry, or a value returned to the presentation layer.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// Send attempted while no session is open.
    #[error("transport unavailable: not connected")]
    TransportUnavailable,
    /// Inbound payload failed to decode.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    /// The upload collaborator reported a failure.
    #[error("upload failed: {0}")]
    UploadFailed(String),
    /// The active session closed or errored.
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    /// The client runtime task is no longer running.
    #[error("chat client stopped")]
    ClientStopped,
}
