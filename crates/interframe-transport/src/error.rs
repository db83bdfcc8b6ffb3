//! Error types for the transport layer.

/// Errors that can occur in the transport layer.
///
/// Inbound problems never show up here: a transport reports a broken
/// inbound side by ending its record stream, and undecodable records are a
/// protocol-layer concern.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer context is gone; nothing can be delivered anymore.
    #[error("transport closed")]
    Closed,

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Establishing an outbound connection failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),
}
