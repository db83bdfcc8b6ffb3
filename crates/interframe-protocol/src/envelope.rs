//! Envelope types for the interframe wire format.
//!
//! Every record exchanged between two endpoints is one [`Envelope`],
//! serialized as a single JSON object. Handshake frames carry only the
//! protocol tag plus one marker flag; data frames carry an id, a namespace,
//! and a payload, and optionally reference the id of an earlier frame they
//! answer.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Discriminator carried by every frame of this protocol.
///
/// Inbound records whose decoded tag differs are foreign traffic (another
/// protocol sharing the same channel, or noise) and are dropped without
/// further inspection.
pub const PROTOCOL_TAG: &str = "application/interframe-ssoft-v1+json";

// ---------------------------------------------------------------------------
// MessageId
// ---------------------------------------------------------------------------

/// A correlation identifier minted for one outbound data frame.
///
/// Unique within a single endpoint's lifetime, not globally. On the wire it
/// is a plain string, hence `#[serde(transparent)]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MessageId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for MessageId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

// ---------------------------------------------------------------------------
// FrameKind
// ---------------------------------------------------------------------------

/// Classification of a decoded envelope.
///
/// Both peers run the same code; which handshake frame arrives first is the
/// only thing that distinguishes their roles, so the classification is made
/// explicit here instead of being re-derived from flag pairs at every call
/// site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// The peer asks to establish readiness. Answered with an acknowledgment.
    HandshakeRequest,
    /// The peer confirms it saw our request. Not answered.
    HandshakeAck,
    /// A payload-bearing frame, routed by namespace or correlated to a
    /// pending request.
    Data,
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// One record on the wire.
///
/// Absent fields are omitted from the serialized object, so a handshake
/// request is exactly `{"protocolTag": "...", "handshake": true}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Identifier of this frame. Present on every data frame, absent on
    /// handshake frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,

    /// Set when this frame answers an earlier data frame: the id the sender
    /// is replying to.
    #[serde(
        rename = "responseId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub response_id: Option<MessageId>,

    /// Always [`PROTOCOL_TAG`] for frames of this protocol.
    #[serde(rename = "protocolTag")]
    pub protocol_tag: String,

    /// Routing key for data frames. Never empty on a valid data frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Structured payload. May be absent or `null`; receivers treat both
    /// the same.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Marker of a handshake request frame. Mutually exclusive with
    /// `handshake_ack`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub handshake: bool,

    /// Marker of a handshake acknowledgment frame.
    #[serde(
        rename = "handshakeAck",
        default,
        skip_serializing_if = "is_false"
    )]
    pub handshake_ack: bool,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

impl Envelope {
    /// Builds a handshake request frame.
    pub fn handshake() -> Self {
        Self {
            id: None,
            response_id: None,
            protocol_tag: PROTOCOL_TAG.to_string(),
            namespace: None,
            data: None,
            handshake: true,
            handshake_ack: false,
        }
    }

    /// Builds a handshake acknowledgment frame.
    pub fn handshake_ack() -> Self {
        Self {
            id: None,
            response_id: None,
            protocol_tag: PROTOCOL_TAG.to_string(),
            namespace: None,
            data: None,
            handshake: false,
            handshake_ack: true,
        }
    }

    /// Builds a data frame, optionally answering `response_id`.
    pub fn data(
        id: MessageId,
        namespace: impl Into<String>,
        data: Value,
        response_id: Option<MessageId>,
    ) -> Self {
        Self {
            id: Some(id),
            response_id,
            protocol_tag: PROTOCOL_TAG.to_string(),
            namespace: Some(namespace.into()),
            data: Some(data),
            handshake: false,
            handshake_ack: false,
        }
    }

    /// Classifies this envelope. A frame carrying both marker flags is
    /// treated as a request; the flags are mutually exclusive on anything a
    /// conforming sender produces.
    pub fn kind(&self) -> FrameKind {
        if self.handshake {
            FrameKind::HandshakeRequest
        } else if self.handshake_ack {
            FrameKind::HandshakeAck
        } else {
            FrameKind::Data
        }
    }

    /// Whether the tag identifies this protocol.
    pub fn has_valid_tag(&self) -> bool {
        self.protocol_tag == PROTOCOL_TAG
    }

    /// Structural validation beyond what deserialization enforces.
    ///
    /// Handshake frames are always valid. A data frame must carry an id and
    /// a non-empty namespace.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidEnvelope`] naming the missing field.
    pub fn validate(&self) -> Result<(), crate::ProtocolError> {
        if self.kind() != FrameKind::Data {
            return Ok(());
        }
        if self.id.is_none() {
            return Err(crate::ProtocolError::InvalidEnvelope(
                "data frame is missing an id".to_string(),
            ));
        }
        match self.namespace.as_deref() {
            Some(namespace) if !namespace.is_empty() => Ok(()),
            _ => Err(crate::ProtocolError::InvalidEnvelope(
                "data frame is missing a namespace".to_string(),
            )),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
