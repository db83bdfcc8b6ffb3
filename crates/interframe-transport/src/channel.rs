//! In-process transport: two linked contexts exchanging records over
//! unbounded channels.
//!
//! The closest analog to the primitive this crate abstracts: each half can
//! post serialized text into the other half's inbox, nothing more. Records
//! survive in the inbox until the receiving side starts reading, so a peer
//! constructed late still sees everything sent to it.

use tokio::sync::mpsc;

use crate::{
    ContextId, InboundRecord, OriginFilter, Transport, TransportError,
};

/// One half of an in-process transport pair.
pub struct ChannelTransport {
    ctx: ContextId,
    origin: String,
    peer_ctx: ContextId,
    peer_origin: String,
    outbound: mpsc::UnboundedSender<InboundRecord>,
    inbound: mpsc::UnboundedReceiver<InboundRecord>,
}

impl ChannelTransport {
    /// Creates two linked halves. Text transmitted on one half arrives as
    /// an [`InboundRecord`] on the other, stamped with the sender's context
    /// id and origin.
    pub fn pair(origin_a: &str, origin_b: &str) -> (Self, Self) {
        let ctx_a = ContextId::next();
        let ctx_b = ContextId::next();
        let (to_b, inbox_b) = mpsc::unbounded_channel();
        let (to_a, inbox_a) = mpsc::unbounded_channel();

        let a = Self {
            ctx: ctx_a,
            origin: origin_a.to_string(),
            peer_ctx: ctx_b,
            peer_origin: origin_b.to_string(),
            outbound: to_b,
            inbound: inbox_a,
        };
        let b = Self {
            ctx: ctx_b,
            origin: origin_b.to_string(),
            peer_ctx: ctx_a,
            peer_origin: origin_a.to_string(),
            outbound: to_a,
            inbound: inbox_b,
        };
        (a, b)
    }

    /// This half's context id.
    pub fn context(&self) -> ContextId {
        self.ctx
    }

    /// The linked half's context id — what an endpoint built on this half
    /// uses as its target.
    pub fn peer_context(&self) -> ContextId {
        self.peer_ctx
    }

    /// This half's origin string.
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

impl Transport for ChannelTransport {
    fn transmit(
        &self,
        raw: &str,
        target: &OriginFilter,
    ) -> Result<(), TransportError> {
        if !target.matches(&self.peer_origin) {
            tracing::debug!(
                peer_origin = %self.peer_origin,
                filter = %target,
                "peer origin outside target filter, suppressing record"
            );
            return Ok(());
        }
        self.outbound
            .send(InboundRecord {
                source: self.ctx,
                origin: self.origin.clone(),
                raw: raw.to_string(),
            })
            .map_err(|_| TransportError::Closed)
    }

    async fn recv(&mut self) -> Option<InboundRecord> {
        self.inbound.recv().await
    }
}

// =========================================================================
// Tests
// =========================================================================
