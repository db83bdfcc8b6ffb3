//! Inbound message views and the reply capability.

use interframe_protocol::MessageId;
use serde_json::Value;
use tokio::sync::mpsc::WeakUnboundedSender;

use crate::endpoint::Command;

/// One inbound data frame as seen by a listener.
///
/// Every listener receives its own view of the same frame. The view is
/// inert until [`Message::open`] is called — reading a message does not
/// commit the receiver to answering it.
#[derive(Debug, Clone)]
pub struct Message {
    id: MessageId,
    namespace: String,
    data: Value,
    commands: WeakUnboundedSender<Command>,
}

impl Message {
    pub(crate) fn new(
        id: MessageId,
        namespace: String,
        data: Value,
        commands: WeakUnboundedSender<Command>,
    ) -> Self {
        Self {
            id,
            namespace,
            data,
            commands,
        }
    }

    /// The sender's correlation id for this frame.
    pub fn id(&self) -> &MessageId {
        &self.id
    }

    /// The namespace this frame was routed by.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The frame's payload. `Null` when the sender supplied none.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Opens the message for replying.
    ///
    /// Idempotent and side-effect free: each call returns a fresh
    /// capability bound to this message's id, and opening implies nothing
    /// about whether a reply will actually be sent.
    pub fn open(&self) -> OpenedMessage {
        OpenedMessage {
            id: self.id.clone(),
            namespace: self.namespace.clone(),
            data: self.data.clone(),
            commands: self.commands.clone(),
        }
    }
}

/// Reply capability produced by [`Message::open`]: the only way to
/// correlate an answer to a specific inbound message.
#[derive(Debug, Clone)]
pub struct OpenedMessage {
    id: MessageId,
    namespace: String,
    data: Value,
    commands: WeakUnboundedSender<Command>,
}

impl OpenedMessage {
    /// The correlation id a reply will reference.
    pub fn id(&self) -> &MessageId {
        &self.id
    }

    /// The originating namespace; replies travel on it too.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The original frame's payload.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Sends `payload` back to the peer, correlated to this message.
    ///
    /// Fire-and-forget: nothing on this side awaits the reply's fate. When
    /// the endpoint has already shut down, the reply is silently dropped —
    /// consistent with the protocol's treatment of an absent peer.
    pub fn response(&self, payload: Value) {
        let Some(commands) = self.commands.upgrade() else {
            tracing::debug!(
                id = %self.id,
                "endpoint gone, dropping reply"
            );
            return;
        };
        let _ = commands.send(Command::Send {
            namespace: self.namespace.clone(),
            payload,
            reply_to: Some(self.id.clone()),
            responder: None,
        });
    }
}

/// A resolved request: the caller-facing fields of the data frame that
/// answered it.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// The answering frame's own id.
    pub id: MessageId,
    /// The namespace the answer traveled on.
    pub namespace: String,
    /// The answer's payload. `Null` when the peer supplied none.
    pub data: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn message(
        commands: WeakUnboundedSender<Command>,
    ) -> Message {
        Message::new(
            MessageId::from("m-1"),
            "greet".to_string(),
            json!({ "name": "Ada" }),
            commands,
        )
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let message = message(tx.downgrade());

        let first = message.open();
        let second = message.open();

        // Both capabilities are bound to the same frame.
        assert_eq!(first.id(), message.id());
        assert_eq!(second.id(), message.id());
        assert_eq!(first.data(), &json!({ "name": "Ada" }));
    }

    #[tokio::test]
    async fn test_response_enqueues_correlated_send() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let message = message(tx.downgrade());

        message.open().response(json!({ "hello": "Hi Ada" }));

        match rx.recv().await.expect("command should be enqueued") {
            Command::Send {
                namespace,
                payload,
                reply_to,
                responder,
            } => {
                assert_eq!(namespace, "greet");
                assert_eq!(payload, json!({ "hello": "Hi Ada" }));
                assert_eq!(reply_to, Some(MessageId::from("m-1")));
                assert!(responder.is_none(), "replies are fire-and-forget");
            }
            _ => panic!("expected a Send command"),
        }
    }

    #[tokio::test]
    async fn test_response_after_endpoint_drop_is_silent() {
        let (tx, rx) = mpsc::unbounded_channel::<Command>();
        let opened = message(tx.downgrade()).open();
        drop(tx);
        drop(rx);

        // Must not panic; the reply just evaporates.
        opened.response(json!(1));
    }
}
