//! Unified error type for interframe endpoints.

use interframe_protocol::ProtocolError;
use interframe_transport::TransportError;

/// Errors surfaced by the public endpoint API.
///
/// Deliberately small: the protocol treats inbound noise (undecodable
/// records, foreign tags, origin mismatches) as silence, not as errors, and
/// a request that goes unanswered resolves empty rather than failing. What
/// remains are caller mistakes and construction-time failures.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    /// `send` was called without a usable namespace. Raised synchronously,
    /// before anything reaches the wire.
    #[error("parameter 'namespace' is missing")]
    EmptyNamespace,

    /// A protocol-level error (encoding the initial handshake frame).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A transport-level error (transmitting the initial handshake frame).
    #[error(transparent)]
    Transport(#[from] TransportError),
}
