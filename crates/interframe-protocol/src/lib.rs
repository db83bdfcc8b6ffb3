//! Wire protocol for interframe.
//!
//! This crate defines the "language" that two endpoints speak across an
//! untrusted text channel:
//!
//! - **Types** ([`Envelope`], [`FrameKind`], [`MessageId`]) — the record
//!   structures that travel on the wire and how a raw frame is classified.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those records are
//!   converted to and from serialized text.
//! - **Ids** ([`IdGenerator`]) — correlation identifiers unique within one
//!   endpoint's lifetime.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while encoding,
//!   decoding, or validating a frame.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw text records) and the
//! endpoint engine (handshake, correlation, routing). It knows nothing about
//! contexts, listeners, or timers — only the shape of a frame.
//!
//! ```text
//! Transport (text) → Protocol (Envelope) → Endpoint (handshake/routing)
//! ```

mod codec;
mod envelope;
mod error;
mod id;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use envelope::{Envelope, FrameKind, MessageId, PROTOCOL_TAG};
pub use error::ProtocolError;
pub use id::IdGenerator;
