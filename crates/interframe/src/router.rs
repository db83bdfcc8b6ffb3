//! Namespace routing: registered listeners plus a bounded backlog for
//! messages that arrive before anyone listens.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use interframe_protocol::MessageId;
use serde_json::Value;

use crate::message::Message;

/// Removal token returned by listener registration.
///
/// Closures have no usable identity of their own, so registration hands
/// back an id instead of echoing the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L-{}", self.0)
    }
}

/// A registered consumer for one namespace.
pub(crate) type ListenerFn = Box<dyn FnMut(Message) + Send>;

/// A routed data frame held in plain form. Turned into a fresh [`Message`]
/// view per delivery, so no reply capability sits in the buffer.
pub(crate) struct BufferedMessage {
    pub(crate) id: MessageId,
    pub(crate) namespace: String,
    pub(crate) data: Value,
}

/// Routes inbound data frames to listeners by namespace.
///
/// A namespace with no listener buffers its traffic (up to
/// `backlog_capacity` entries, oldest evicted first). The backlog belongs
/// to the *next* listener registered for that namespace: it is flushed to
/// that listener alone, in arrival order, and cleared in the same step —
/// buffered traffic is delivered exactly once, and a listener registered
/// later never sees it.
pub(crate) struct NamespaceRouter {
    listeners: HashMap<String, Vec<(ListenerId, ListenerFn)>>,
    backlog: HashMap<String, VecDeque<BufferedMessage>>,
    backlog_capacity: usize,
}

impl NamespaceRouter {
    pub(crate) fn new(backlog_capacity: usize) -> Self {
        Self {
            listeners: HashMap::new(),
            backlog: HashMap::new(),
            backlog_capacity,
        }
    }

    /// Adds a listener and flushes any backlog for its namespace to it.
    pub(crate) fn register(
        &mut self,
        namespace: String,
        id: ListenerId,
        mut listener: ListenerFn,
        make_message: impl Fn(&BufferedMessage) -> Message,
    ) {
        if let Some(backlog) = self.backlog.remove(&namespace) {
            tracing::debug!(
                %namespace,
                %id,
                count = backlog.len(),
                "flushing buffered messages to new listener"
            );
            for buffered in &backlog {
                listener(make_message(buffered));
            }
        }
        self.listeners.entry(namespace).or_default().push((id, listener));
    }

    /// Removes a previously registered listener. Unknown ids are ignored.
    pub(crate) fn unregister(&mut self, namespace: &str, id: ListenerId) {
        if let Some(registered) = self.listeners.get_mut(namespace) {
            registered.retain(|(candidate, _)| *candidate != id);
            if registered.is_empty() {
                self.listeners.remove(namespace);
            }
        }
    }

    /// Routes one inbound message: every listener of the namespace gets its
    /// own view, in registration order. With no listener the message is
    /// buffered for whoever registers next.
    pub(crate) fn dispatch(
        &mut self,
        buffered: BufferedMessage,
        make_message: impl Fn(&BufferedMessage) -> Message,
    ) {
        match self.listeners.get_mut(&buffered.namespace) {
            Some(registered) if !registered.is_empty() => {
                for (_, listener) in registered.iter_mut() {
                    listener(make_message(&buffered));
                }
            }
            _ => self.buffer(buffered),
        }
    }

    fn buffer(&mut self, buffered: BufferedMessage) {
        if self.backlog_capacity == 0 {
            tracing::warn!(
                namespace = %buffered.namespace,
                "no listener and buffering disabled, dropping message"
            );
            return;
        }
        let queue =
            self.backlog.entry(buffered.namespace.clone()).or_default();
        if queue.len() == self.backlog_capacity {
            let evicted = queue.pop_front();
            tracing::warn!(
                namespace = %buffered.namespace,
                evicted_id = ?evicted.map(|m| m.id),
                capacity = self.backlog_capacity,
                "backlog full, evicting oldest buffered message"
            );
        }
        queue.push_back(buffered);
    }

    pub(crate) fn backlog_len(&self, namespace: &str) -> usize {
        self.backlog.get(namespace).map_or(0, VecDeque::len)
    }

    #[cfg(test)]
    fn listener_count(&self, namespace: &str) -> usize {
        self.listeners.get(namespace).map_or(0, Vec::len)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Command;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    fn buffered(namespace: &str, data: Value) -> BufferedMessage {
        BufferedMessage {
            id: MessageId::from("m-1"),
            namespace: namespace.to_string(),
            data,
        }
    }

    /// A listener that appends every received payload to a shared log.
    fn recording_listener(
        log: &Arc<Mutex<Vec<Value>>>,
    ) -> ListenerFn {
        let log = Arc::clone(log);
        Box::new(move |message: Message| {
            log.lock().unwrap().push(message.data().clone());
        })
    }

    /// Router tests need a message factory; the command channel behind it
    /// is irrelevant here, so it is left dangling.
    fn factory() -> impl Fn(&BufferedMessage) -> Message {
        let (tx, _rx) = mpsc::unbounded_channel::<Command>();
        let weak = tx.downgrade();
        move |b: &BufferedMessage| {
            Message::new(
                b.id.clone(),
                b.namespace.clone(),
                b.data.clone(),
                weak.clone(),
            )
        }
    }

    #[test]
    fn test_dispatch_reaches_registered_listener() {
        let mut router = NamespaceRouter::new(8);
        let log = Arc::new(Mutex::new(Vec::new()));
        router.register(
            "greet".into(),
            ListenerId::new(1),
            recording_listener(&log),
            factory(),
        );

        router.dispatch(buffered("greet", json!("hello")), factory());

        assert_eq!(*log.lock().unwrap(), vec![json!("hello")]);
    }

    #[test]
    fn test_dispatch_copies_to_every_listener_in_order() {
        let mut router = NamespaceRouter::new(8);
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let order = Arc::clone(&order);
            router.register(
                "greet".into(),
                ListenerId::new(if tag == "first" { 1 } else { 2 }),
                Box::new(move |_| order.lock().unwrap().push(tag)),
                factory(),
            );
        }

        router.dispatch(buffered("greet", json!(1)), factory());

        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_dispatch_other_namespace_not_delivered() {
        let mut router = NamespaceRouter::new(8);
        let log = Arc::new(Mutex::new(Vec::new()));
        router.register(
            "greet".into(),
            ListenerId::new(1),
            recording_listener(&log),
            factory(),
        );

        router.dispatch(buffered("metrics", json!(1)), factory());

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(router.backlog_len("metrics"), 1);
    }

    #[test]
    fn test_backlog_flushes_to_next_listener_in_arrival_order() {
        let mut router = NamespaceRouter::new(8);
        for i in 0..3 {
            router.dispatch(buffered("log", json!(i)), factory());
        }
        assert_eq!(router.backlog_len("log"), 3);

        let log = Arc::new(Mutex::new(Vec::new()));
        router.register(
            "log".into(),
            ListenerId::new(1),
            recording_listener(&log),
            factory(),
        );

        assert_eq!(*log.lock().unwrap(), vec![json!(0), json!(1), json!(2)]);
        assert_eq!(router.backlog_len("log"), 0);
    }

    #[test]
    fn test_backlog_flushed_only_to_first_listener() {
        let mut router = NamespaceRouter::new(8);
        router.dispatch(buffered("log", json!("early")), factory());

        let first = Arc::new(Mutex::new(Vec::new()));
        router.register(
            "log".into(),
            ListenerId::new(1),
            recording_listener(&first),
            factory(),
        );

        let second = Arc::new(Mutex::new(Vec::new()));
        router.register(
            "log".into(),
            ListenerId::new(2),
            recording_listener(&second),
            factory(),
        );

        assert_eq!(first.lock().unwrap().len(), 1);
        assert!(second.lock().unwrap().is_empty(), "backlog is delivered once");
    }

    #[test]
    fn test_backlog_evicts_oldest_at_capacity() {
        let mut router = NamespaceRouter::new(2);
        for i in 0..4 {
            router.dispatch(buffered("log", json!(i)), factory());
        }
        assert_eq!(router.backlog_len("log"), 2);

        let log = Arc::new(Mutex::new(Vec::new()));
        router.register(
            "log".into(),
            ListenerId::new(1),
            recording_listener(&log),
            factory(),
        );

        // The two newest survive.
        assert_eq!(*log.lock().unwrap(), vec![json!(2), json!(3)]);
    }

    #[test]
    fn test_zero_capacity_disables_buffering() {
        let mut router = NamespaceRouter::new(0);
        router.dispatch(buffered("log", json!(1)), factory());

        assert_eq!(router.backlog_len("log"), 0);
    }

    #[test]
    fn test_unregister_stops_delivery() {
        let mut router = NamespaceRouter::new(8);
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = ListenerId::new(1);
        router.register(
            "greet".into(),
            id,
            recording_listener(&log),
            factory(),
        );

        router.unregister("greet", id);
        router.dispatch(buffered("greet", json!(1)), factory());

        assert!(log.lock().unwrap().is_empty());
        // With no listener left, the message is buffered instead.
        assert_eq!(router.backlog_len("greet"), 1);
        assert_eq!(router.listener_count("greet"), 0);
    }

    #[test]
    fn test_unregister_leaves_other_listeners_alone() {
        let mut router = NamespaceRouter::new(8);
        let kept = Arc::new(Mutex::new(Vec::new()));
        router.register(
            "greet".into(),
            ListenerId::new(1),
            recording_listener(&kept),
            factory(),
        );
        let removed = Arc::new(Mutex::new(Vec::new()));
        router.register(
            "greet".into(),
            ListenerId::new(2),
            recording_listener(&removed),
            factory(),
        );

        router.unregister("greet", ListenerId::new(2));
        router.dispatch(buffered("greet", json!(1)), factory());

        assert_eq!(kept.lock().unwrap().len(), 1);
        assert!(removed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unregister_unknown_id_is_ignored() {
        let mut router = NamespaceRouter::new(8);
        router.unregister("ghost", ListenerId::new(99));
        assert_eq!(router.listener_count("ghost"), 0);
    }
}
