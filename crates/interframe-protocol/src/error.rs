//! Error types for the protocol layer.

/// Errors that can occur while encoding, decoding, or validating envelopes.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization of an outbound envelope failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// An inbound record could not be parsed as an envelope. At the
    /// endpoint this is not surfaced to callers; the record is treated as
    /// noise and dropped.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The record parsed but violates the envelope rules, e.g. a data frame
    /// without an id or namespace.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),
}
