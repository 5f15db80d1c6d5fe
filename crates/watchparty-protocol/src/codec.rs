//! Codec trait and the JSON implementation.
//!
//! The connection adapter never calls `serde_json` directly. It holds
//! something that implements [`Codec`], so a binary format can be slotted
//! in later without touching the adapter.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to bytes and decodes bytes back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task on the runtime.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the value can't be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed or
    /// don't match the expected shape.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// Browsers speak JSON natively, so this is what the server uses for
/// every frame.
///
/// ```rust
/// use watchparty_protocol::{ClientMessage, Codec, JsonCodec, MessageKind};
///
/// let codec = JsonCodec;
/// let raw = br#"{"type":"video_seek_broadcast","data":{"position":42.5}}"#;
///
/// let msg: ClientMessage = codec.decode(raw).unwrap();
/// assert_eq!(msg.kind, MessageKind::VideoSeek);
/// assert!(msg.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
