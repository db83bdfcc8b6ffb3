//! Handshake state machine: mutual-readiness tracking with deferred work.
//!
//! Both peers run the same machine and diverge only by which frame they see
//! first. Receiving the peer's request means our own request may not have
//! been seen yet — we owe an acknowledgment and become ready. Receiving an
//! acknowledgment means the peer saw our request; nothing more to send.
//!
//! ```text
//!          ┌──────────── on_peer_request (ack owed) ───────────┐
//! Pending ─┤                                                   ├─→ Ready
//!          └─────────────── on_peer_ack ───────────────────────┘
//! ```
//!
//! The state is monotonic: once `Ready`, later handshake frames drain
//! nothing (the queues are already empty) and at most re-owe an
//! acknowledgment.
//!
//! While `Pending`, the machine queues two kinds of work: full `send`
//! invocations to be replayed at the transition, and one-shot ready
//! callbacks. The machine itself only sequences that work — firing
//! callbacks and transmitting frames is the composition layer's job, which
//! keeps this type synchronous and trivially testable.

use std::collections::VecDeque;

use interframe_protocol::MessageId;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::message::Reply;

/// Channel readiness. Never reverts to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandshakeState {
    Pending,
    Ready,
}

/// A `send` captured before readiness. Replayed through the full fresh-send
/// path at the transition, fulfilling the future the original caller
/// already holds via `responder`.
pub(crate) struct DeferredSend {
    pub(crate) namespace: String,
    pub(crate) payload: Value,
    pub(crate) reply_to: Option<MessageId>,
    pub(crate) responder: Option<oneshot::Sender<Option<Reply>>>,
}

/// Invoked exactly once, at (or after) the readiness transition.
pub(crate) type ReadyCallback = Box<dyn FnOnce() + Send>;

/// What one handshake frame obliges the endpoint to do.
pub(crate) struct Transition {
    /// The peer sent a request and expects an acknowledgment frame.
    pub(crate) acknowledge: bool,
    /// Ready callbacks to fire, in registration order. Empty on redundant
    /// frames.
    pub(crate) callbacks: Vec<ReadyCallback>,
    /// Sends to replay, in enqueue order. Empty on redundant frames.
    pub(crate) deferred: Vec<DeferredSend>,
}

pub(crate) struct Handshake {
    state: HandshakeState,
    ready_callbacks: Vec<ReadyCallback>,
    deferred: VecDeque<DeferredSend>,
}

impl Handshake {
    pub(crate) fn new() -> Self {
        Self {
            state: HandshakeState::Pending,
            ready_callbacks: Vec::new(),
            deferred: VecDeque::new(),
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.state == HandshakeState::Ready
    }

    /// Queues a callback for the transition. Only meaningful while
    /// `Pending`; the caller invokes immediately instead when ready.
    pub(crate) fn push_ready_callback(&mut self, callback: ReadyCallback) {
        self.ready_callbacks.push(callback);
    }

    /// Queues a send for replay at the transition.
    pub(crate) fn defer_send(&mut self, send: DeferredSend) {
        self.deferred.push_back(send);
    }

    pub(crate) fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// The peer asked for readiness: an acknowledgment is owed, and we are
    /// ready. Calling this again after the transition re-owes the
    /// acknowledgment (the peer may have missed the first) but drains
    /// nothing.
    pub(crate) fn on_peer_request(&mut self) -> Transition {
        self.transition(true)
    }

    /// The peer acknowledged our request. No reply owed.
    pub(crate) fn on_peer_ack(&mut self) -> Transition {
        self.transition(false)
    }

    fn transition(&mut self, acknowledge: bool) -> Transition {
        self.state = HandshakeState::Ready;
        Transition {
            acknowledge,
            callbacks: std::mem::take(&mut self.ready_callbacks),
            deferred: self.deferred.drain(..).collect(),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deferred(namespace: &str) -> DeferredSend {
        DeferredSend {
            namespace: namespace.to_string(),
            payload: json!(null),
            reply_to: None,
            responder: None,
        }
    }

    #[test]
    fn test_starts_pending() {
        let machine = Handshake::new();
        assert!(!machine.is_ready());
    }

    #[test]
    fn test_peer_request_makes_ready_and_owes_ack() {
        let mut machine = Handshake::new();

        let transition = machine.on_peer_request();

        assert!(machine.is_ready());
        assert!(transition.acknowledge);
    }

    #[test]
    fn test_peer_ack_makes_ready_without_owing_ack() {
        let mut machine = Handshake::new();

        let transition = machine.on_peer_ack();

        assert!(machine.is_ready());
        assert!(!transition.acknowledge);
    }

    #[test]
    fn test_transition_drains_callbacks_once() {
        let mut machine = Handshake::new();
        machine.push_ready_callback(Box::new(|| {}));
        machine.push_ready_callback(Box::new(|| {}));

        let first = machine.on_peer_ack();
        assert_eq!(first.callbacks.len(), 2);

        // A redundant frame finds the queue permanently empty.
        let second = machine.on_peer_ack();
        assert!(second.callbacks.is_empty());
    }

    #[test]
    fn test_transition_drains_deferred_sends_in_enqueue_order() {
        let mut machine = Handshake::new();
        machine.defer_send(deferred("first"));
        machine.defer_send(deferred("second"));
        machine.defer_send(deferred("third"));
        assert_eq!(machine.deferred_len(), 3);

        let transition = machine.on_peer_request();

        let order: Vec<&str> = transition
            .deferred
            .iter()
            .map(|send| send.namespace.as_str())
            .collect();
        assert_eq!(order, ["first", "second", "third"]);
        assert_eq!(machine.deferred_len(), 0);
    }

    #[test]
    fn test_redundant_request_still_owes_ack() {
        // The peer may re-request after missing our acknowledgment; the
        // state is unchanged but the ack must go out again.
        let mut machine = Handshake::new();
        machine.on_peer_request();

        let redundant = machine.on_peer_request();

        assert!(machine.is_ready());
        assert!(redundant.acknowledge);
        assert!(redundant.callbacks.is_empty());
        assert!(redundant.deferred.is_empty());
    }

    #[test]
    fn test_ack_after_request_is_a_quiet_no_op() {
        // Both peers requesting simultaneously ends with each receiving a
        // redundant acknowledgment.
        let mut machine = Handshake::new();
        machine.on_peer_request();

        let redundant = machine.on_peer_ack();

        assert!(machine.is_ready());
        assert!(!redundant.acknowledge);
        assert!(redundant.callbacks.is_empty());
    }
}
