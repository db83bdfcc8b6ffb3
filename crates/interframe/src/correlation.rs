//! Outstanding-request tracking: correlation id → pending resolution slot.

use std::collections::HashMap;

use interframe_protocol::MessageId;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::message::Reply;

/// One in-flight request: the caller's resolution slot and the timer that
/// bounds the wait. Resolved at most once — by the matching reply or by the
/// timer, whichever lands first — and removed immediately.
pub(crate) struct PendingRequest {
    responder: oneshot::Sender<Option<Reply>>,
    timer: JoinHandle<()>,
}

/// All requests currently awaiting a reply from the peer.
///
/// Not thread-safe on purpose: it is owned by the endpoint's single task,
/// where every resolution path (inbound frame or timer notice) is already
/// serialized.
pub(crate) struct CorrelationTable {
    pending: HashMap<MessageId, PendingRequest>,
}

impl CorrelationTable {
    pub(crate) fn new() -> Self {
        Self {
            pending: HashMap::new(),
        }
    }

    /// Registers a freshly transmitted request under its id.
    pub(crate) fn register(
        &mut self,
        id: MessageId,
        responder: oneshot::Sender<Option<Reply>>,
        timer: JoinHandle<()>,
    ) {
        self.pending.insert(id, PendingRequest { responder, timer });
    }

    /// Resolves the request awaiting `response_id` with the peer's reply
    /// and cancels its timer. Returns `false` when no such request is live
    /// — a late, duplicate, or never-ours reply — in which case the caller
    /// routes the frame like any fresh message.
    pub(crate) fn resolve(
        &mut self,
        response_id: &MessageId,
        reply: Reply,
    ) -> bool {
        match self.pending.remove(response_id) {
            Some(entry) => {
                entry.timer.abort();
                let _ = entry.responder.send(Some(reply));
                true
            }
            None => false,
        }
    }

    /// The timer path: resolves the request empty. Returns `false` when the
    /// reply already won, making the expiry a no-op.
    pub(crate) fn expire(&mut self, id: &MessageId) -> bool {
        match self.pending.remove(id) {
            Some(entry) => {
                let _ = entry.responder.send(None);
                true
            }
            None => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(raw: &str) -> MessageId {
        MessageId::from(raw)
    }

    fn reply(data: serde_json::Value) -> Reply {
        Reply {
            id: id("r-1"),
            namespace: "n".to_string(),
            data,
        }
    }

    /// A timer that never fires on its own; the tests drive resolution.
    fn idle_timer() -> JoinHandle<()> {
        tokio::spawn(std::future::pending())
    }

    #[tokio::test]
    async fn test_resolve_delivers_reply_and_removes_entry() {
        let mut table = CorrelationTable::new();
        let (tx, rx) = oneshot::channel();
        table.register(id("m-1"), tx, idle_timer());
        assert_eq!(table.len(), 1);

        assert!(table.resolve(&id("m-1"), reply(json!({ "ok": true }))));

        let resolved = rx.await.unwrap().expect("should carry the reply");
        assert_eq!(resolved.data, json!({ "ok": true }));
        assert_eq!(table.len(), 0);
    }

    #[tokio::test]
    async fn test_expire_resolves_empty() {
        let mut table = CorrelationTable::new();
        let (tx, rx) = oneshot::channel();
        table.register(id("m-1"), tx, idle_timer());

        assert!(table.expire(&id("m-1")));

        assert_eq!(rx.await.unwrap(), None);
        assert_eq!(table.len(), 0);
    }

    #[tokio::test]
    async fn test_second_reply_loses() {
        let mut table = CorrelationTable::new();
        let (tx, _rx) = oneshot::channel();
        table.register(id("m-1"), tx, idle_timer());

        assert!(table.resolve(&id("m-1"), reply(json!(1))));
        assert!(!table.resolve(&id("m-1"), reply(json!(2))));
    }

    #[tokio::test]
    async fn test_expire_after_resolve_is_a_no_op() {
        let mut table = CorrelationTable::new();
        let (tx, rx) = oneshot::channel();
        table.register(id("m-1"), tx, idle_timer());

        table.resolve(&id("m-1"), reply(json!("first")));
        assert!(!table.expire(&id("m-1")));

        // The reply won; the expiry changed nothing.
        let resolved = rx.await.unwrap().unwrap();
        assert_eq!(resolved.data, json!("first"));
    }

    #[tokio::test]
    async fn test_resolve_after_expire_is_a_no_op() {
        let mut table = CorrelationTable::new();
        let (tx, rx) = oneshot::channel();
        table.register(id("m-1"), tx, idle_timer());

        table.expire(&id("m-1"));
        assert!(!table.resolve(&id("m-1"), reply(json!("late"))));

        assert_eq!(rx.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unknown_response_id_resolves_nothing() {
        let mut table = CorrelationTable::new();
        let (tx, _rx) = oneshot::channel();
        table.register(id("m-1"), tx, idle_timer());

        assert!(!table.resolve(&id("m-2"), reply(json!(null))));
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_aborts_timer() {
        let mut table = CorrelationTable::new();
        let (tx, _rx) = oneshot::channel();
        let timer = idle_timer();
        // JoinHandles stay usable after being moved in; keep an observer.
        let observer = timer.abort_handle();
        table.register(id("m-1"), tx, timer);

        table.resolve(&id("m-1"), reply(json!(null)));

        for _ in 0..10 {
            if observer.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(observer.is_finished());
    }
}
