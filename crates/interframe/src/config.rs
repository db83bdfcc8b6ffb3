//! Endpoint configuration.

use std::time::Duration;

use interframe_transport::OriginFilter;

/// How long a sent request waits for a correlated reply before resolving
/// empty. The wire protocol's fixed window is 3000 ms.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(3000);

/// Default per-namespace cap on messages buffered while no listener is
/// registered for that namespace.
pub const DEFAULT_BACKLOG_CAPACITY: usize = 64;

/// Tunables for one endpoint.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Origin restriction, applied both outbound (which peer may receive
    /// our records) and inbound (which sender origins are accepted).
    /// Default: the wildcard.
    pub origin: OriginFilter,

    /// Reply window per request. After this, the caller's future resolves
    /// with `None` — indistinguishable from a peer that answered with
    /// nothing.
    pub response_timeout: Duration,

    /// Per-namespace backlog bound. When a message arrives for a namespace
    /// with no listener and the backlog is full, the oldest buffered
    /// message is evicted. `0` disables buffering entirely.
    pub backlog_capacity: usize,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            origin: OriginFilter::Any,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            backlog_capacity: DEFAULT_BACKLOG_CAPACITY,
        }
    }
}
