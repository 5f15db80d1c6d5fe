//! Error types for the protocol layer.
//!
//! Each crate in the workspace defines its own error enum. A
//! `ProtocolError` always means the bytes or the payload shape were wrong,
//! never that a room or a socket misbehaved.

/// Errors that can occur while encoding, decoding or validating frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, a missing field, or an
    /// unknown `type` tag.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame parsed, but its payload doesn't match its declared kind.
    /// For example a chat message without text, or a seek without a
    /// numeric position.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
