//! Codec trait and the JSON implementation.
//!
//! A codec converts between [`Envelope`] values and the serialized text the
//! transport actually carries. The endpoint engine only depends on the
//! [`Codec`] trait, so the serialization strategy can be swapped without
//! touching routing or handshake logic.

use crate::{Envelope, ProtocolError};

/// Encodes envelopes to wire text and decodes wire text back.
///
/// `Send + Sync + 'static` because a codec is moved into the endpoint's
/// long-lived task and may be shared across threads by the runtime.
pub trait Codec: Send + Sync + 'static {
    /// Serializes an envelope into one wire record.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode(&self, envelope: &Envelope) -> Result<String, ProtocolError>;

    /// Parses one wire record back into an envelope.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the text is malformed or does
    /// not have the envelope shape.
    fn decode(&self, raw: &str) -> Result<Envelope, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] producing one JSON object per record, as the wire format
/// specifies. Human-readable, which makes captured traffic easy to inspect.
///
/// ## Example
///
/// ```rust
/// use interframe_protocol::{Codec, Envelope, JsonCodec};
///
/// let codec = JsonCodec;
/// let raw = codec.encode(&Envelope::handshake()).unwrap();
/// let decoded = codec.decode(&raw).unwrap();
/// assert!(decoded.handshake);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode(&self, envelope: &Envelope) -> Result<String, ProtocolError> {
        serde_json::to_string(envelope).map_err(ProtocolError::Encode)
    }

    fn decode(&self, raw: &str) -> Result<Envelope, ProtocolError> {
        serde_json::from_str(raw).map_err(ProtocolError::Decode)
    }
}
