//! Transport abstraction for interframe endpoints.
//!
//! Provides the [`Transport`] trait — the post-message-style primitive the
//! protocol engine is built on — plus two implementations:
//!
//! - [`ChannelTransport`] — an in-process linked pair, the two-contexts
//!   analog used in tests and single-process compositions.
//! - `WebSocketTransport` — cross-process delivery via `tokio-tungstenite`
//!   (feature `websocket`, enabled by default).
//!
//! The primitive is deliberately weak: it delivers serialized text to one
//! peer context, best-effort, subject to an origin restriction. Everything
//! stronger (readiness, correlation, routing) is layered on top by the
//! endpoint.

mod channel;
mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use channel::ChannelTransport;
pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketListener, WebSocketTransport};

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter backing [`ContextId::next`]; shared by all transport kinds so
/// context ids never collide within a process.
static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for an execution context reachable over a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    /// Creates a `ContextId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }

    /// Allocates a process-unique id for a newly created context.
    pub(crate) fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// OriginFilter
// ---------------------------------------------------------------------------

/// Origin restriction applied when transmitting (which peer may receive)
/// and when screening inbound records (which sender is accepted).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OriginFilter {
    /// The `"*"` wildcard: every origin passes.
    #[default]
    Any,
    /// Exact string match against the peer's origin.
    Exact(String),
}

impl OriginFilter {
    /// Builds an exact-match filter.
    pub fn exact(origin: impl Into<String>) -> Self {
        Self::Exact(origin.into())
    }

    /// Whether `origin` passes this filter.
    pub fn matches(&self, origin: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => expected == origin,
        }
    }
}

impl From<&str> for OriginFilter {
    /// `"*"` becomes the wildcard; anything else is an exact match.
    fn from(raw: &str) -> Self {
        if raw == "*" {
            Self::Any
        } else {
            Self::Exact(raw.to_string())
        }
    }
}

impl fmt::Display for OriginFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Exact(origin) => write!(f, "{origin}"),
        }
    }
}

// ---------------------------------------------------------------------------
// InboundRecord + Transport
// ---------------------------------------------------------------------------

/// One raw record delivered by a transport: who sent it, from which origin,
/// and the serialized text itself. No decoding has happened yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRecord {
    /// The context that transmitted the record.
    pub source: ContextId,
    /// The sender's declared origin.
    pub origin: String,
    /// The serialized text as it arrived.
    pub raw: String,
}

/// A one-directional-at-a-time text channel to exactly one peer context.
pub trait Transport: Send + 'static {
    /// Delivers serialized text to the peer context. Never blocks.
    ///
    /// Delivery is best-effort: when the peer's origin does not match
    /// `target`, the record is silently suppressed, mirroring the underlying
    /// primitive's delivery restriction.
    ///
    /// # Errors
    /// Returns [`TransportError::Closed`] when the peer context is gone.
    fn transmit(
        &self,
        raw: &str,
        target: &OriginFilter,
    ) -> Result<(), TransportError>;

    /// Receives the next inbound record.
    ///
    /// Returns `None` once the transport is closed and no further records
    /// will arrive. The future must be `Send`: the endpoint polls it from a
    /// spawned task.
    fn recv(
        &mut self,
    ) -> impl Future<Output = Option<InboundRecord>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_id_new_and_into_inner() {
        let id = ContextId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_context_id_display() {
        assert_eq!(ContextId::new(7).to_string(), "ctx-7");
    }

    #[test]
    fn test_context_id_next_is_unique() {
        let a = ContextId::next();
        let b = ContextId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_origin_filter_any_matches_everything() {
        assert!(OriginFilter::Any.matches("https://example.test"));
        assert!(OriginFilter::Any.matches(""));
    }

    #[test]
    fn test_origin_filter_exact_matches_only_itself() {
        let filter = OriginFilter::exact("https://example.test");
        assert!(filter.matches("https://example.test"));
        assert!(!filter.matches("https://evil.test"));
        assert!(!filter.matches(""));
    }

    #[test]
    fn test_origin_filter_from_str_wildcard() {
        assert_eq!(OriginFilter::from("*"), OriginFilter::Any);
        assert_eq!(
            OriginFilter::from("https://a.test"),
            OriginFilter::exact("https://a.test")
        );
    }

    #[test]
    fn test_origin_filter_default_is_wildcard() {
        assert_eq!(OriginFilter::default(), OriginFilter::Any);
    }
}
