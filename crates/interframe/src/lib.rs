//! # interframe
//!
//! Duplex, namespace-routed request/response messaging between two isolated
//! execution contexts that can only exchange serialized text through an
//! unreliable, asynchronous post-message-style primitive.
//!
//! An [`Endpoint`] on each side takes care of:
//!
//! - **Readiness** — a symmetric two-frame handshake establishes that both
//!   peers can exchange data; traffic sent earlier is queued and replayed.
//! - **Correlation** — [`Endpoint::send`] returns a future resolved by the
//!   peer's reply to exactly that request, or by a timeout.
//! - **Routing** — inbound messages reach listeners by namespace; messages
//!   for a namespace nobody listens on yet are buffered for the first
//!   listener that registers.
//! - **Screening** — records from unexpected contexts, foreign origins, or
//!   other protocols are dropped silently.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use interframe::{ChannelTransport, Endpoint};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), interframe::EndpointError> {
//!     let (left, right) = ChannelTransport::pair(
//!         "https://shell.test",
//!         "https://widget.test",
//!     );
//!     let (to_right, to_left) = (left.peer_context(), right.peer_context());
//!
//!     let shell = Endpoint::new(left, to_right)?;
//!     let widget = Endpoint::new(right, to_left)?;
//!
//!     widget.register_listener("greet", |message| {
//!         let name = message.data()["name"].as_str().unwrap_or("stranger");
//!         let hello = format!("Hi {name}");
//!         message.open().response(json!({ "hello": hello }));
//!     });
//!
//!     let reply = shell
//!         .send("greet", json!({ "name": "Sebastian" }))?
//!         .await
//!         .expect("widget answers within the response window");
//!     assert_eq!(reply.data["hello"], "Hi Sebastian");
//!     Ok(())
//! }
//! ```

mod config;
mod correlation;
mod endpoint;
mod error;
mod handshake;
mod message;
mod router;

pub use config::{
    DEFAULT_BACKLOG_CAPACITY, DEFAULT_RESPONSE_TIMEOUT, EndpointConfig,
};
pub use endpoint::{Endpoint, PendingReply};
pub use error::EndpointError;
pub use message::{Message, OpenedMessage, Reply};
pub use router::ListenerId;

// Re-export the layers an endpoint is wired from, so `use interframe::*`
// callers need no direct dependency on the sub-crates.
pub use interframe_protocol::{
    Codec, Envelope, FrameKind, IdGenerator, JsonCodec, MessageId,
    PROTOCOL_TAG, ProtocolError,
};
pub use interframe_transport::{
    ChannelTransport, ContextId, InboundRecord, OriginFilter, Transport,
    TransportError,
};
#[cfg(feature = "websocket")]
pub use interframe_transport::{WebSocketListener, WebSocketTransport};
