//! Endpoint composition: the public handle and the task that owns every
//! piece of protocol state.
//!
//! All mutable state — handshake machine, correlation table, router — lives
//! inside [`EndpointActor`], a single spawned task that processes exactly
//! one event at a time: a command from a handle, an inbound record from the
//! transport, or a timeout notice from a timer task. That one queue is what
//! serializes every state transition; there is not a single lock in this
//! module.
//!
//! Timer tasks and [`Message`] views hold only *weak* command senders, so
//! once every [`Endpoint`] handle is dropped the queue closes and the actor
//! (with all pending state) winds down; outstanding futures resolve empty.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use interframe_protocol::{
    Codec, Envelope, FrameKind, IdGenerator, JsonCodec, MessageId,
    PROTOCOL_TAG,
};
use interframe_transport::{ContextId, InboundRecord, Transport};

use crate::config::EndpointConfig;
use crate::correlation::CorrelationTable;
use crate::error::EndpointError;
use crate::handshake::{DeferredSend, Handshake, Transition};
use crate::message::{Message, Reply};
use crate::router::{BufferedMessage, ListenerFn, ListenerId, NamespaceRouter};

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Everything a handle (or a timer task, or a reply capability) can ask the
/// actor to do.
pub(crate) enum Command {
    /// Transmit a data frame, or defer it until readiness. `responder` is
    /// absent for fire-and-forget replies.
    Send {
        namespace: String,
        payload: Value,
        reply_to: Option<MessageId>,
        responder: Option<oneshot::Sender<Option<Reply>>>,
    },
    /// Add a listener; flush any backlog for its namespace to it.
    RegisterListener {
        namespace: String,
        id: ListenerId,
        listener: ListenerFn,
    },
    /// Remove a listener.
    UnregisterListener { namespace: String, id: ListenerId },
    /// Invoke now if ready, otherwise queue for the transition.
    OnReady(Box<dyn FnOnce() + Send>),
    /// A request's reply window elapsed.
    ResponseTimeout(MessageId),
}

// ---------------------------------------------------------------------------
// Endpoint (public handle)
// ---------------------------------------------------------------------------

/// One side of an interframe channel.
///
/// Cheap to clone; all clones feed the same underlying actor. Constructing
/// an endpoint immediately transmits a handshake-request frame; data sent
/// before the peer answers is queued and replayed once the channel is
/// ready.
///
/// ## Example
///
/// ```rust,no_run
/// use interframe::{ChannelTransport, Endpoint};
/// use serde_json::json;
///
/// # async fn run() -> Result<(), interframe::EndpointError> {
/// let (shell, widget) = ChannelTransport::pair(
///     "https://shell.test",
///     "https://widget.test",
/// );
/// let target = shell.peer_context();
/// let host = Endpoint::new(shell, target)?;
///
/// let reply = host.send("greet", json!({ "name": "Ada" }))?.await;
/// # let _ = (reply, widget); Ok(()) }
/// ```
#[derive(Clone)]
pub struct Endpoint {
    commands: mpsc::UnboundedSender<Command>,
    ready: Arc<AtomicBool>,
    next_listener_id: Arc<AtomicU64>,
}

impl Endpoint {
    /// Creates an endpoint talking to `target` with default configuration
    /// and the JSON codec, and transmits the opening handshake frame.
    ///
    /// # Errors
    /// Returns an error when the handshake frame cannot be encoded or
    /// transmitted.
    pub fn new<T: Transport>(
        transport: T,
        target: ContextId,
    ) -> Result<Self, EndpointError> {
        Self::with_config(transport, target, EndpointConfig::default())
    }

    /// Like [`Endpoint::new`], with explicit configuration.
    ///
    /// # Errors
    /// Returns an error when the handshake frame cannot be encoded or
    /// transmitted.
    pub fn with_config<T: Transport>(
        transport: T,
        target: ContextId,
        config: EndpointConfig,
    ) -> Result<Self, EndpointError> {
        Self::with_codec(transport, target, JsonCodec, config)
    }

    /// The fully explicit constructor: any [`Codec`], any [`Transport`].
    ///
    /// # Errors
    /// Returns an error when the handshake frame cannot be encoded or
    /// transmitted.
    pub fn with_codec<T: Transport, C: Codec>(
        transport: T,
        target: ContextId,
        codec: C,
        config: EndpointConfig,
    ) -> Result<Self, EndpointError> {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let ready = Arc::new(AtomicBool::new(false));

        // Open the conversation before anything else can happen: the peer
        // answers with an acknowledgment, or with its own request (which
        // the actor acknowledges).
        let raw = codec.encode(&Envelope::handshake())?;
        transport.transmit(&raw, &config.origin)?;
        tracing::debug!(peer = %target, "handshake request transmitted");

        let router = NamespaceRouter::new(config.backlog_capacity);
        let actor = EndpointActor {
            transport,
            codec,
            target,
            config,
            commands: commands_rx,
            command_tx: commands_tx.downgrade(),
            ready: Arc::clone(&ready),
            ids: IdGenerator::new(),
            handshake: Handshake::new(),
            correlation: CorrelationTable::new(),
            router,
        };
        tokio::spawn(actor.run());

        Ok(Self {
            commands: commands_tx,
            ready,
            next_listener_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Whether the handshake has completed.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Reports readiness; when not yet ready, queues `callback` for a
    /// single invocation at the transition.
    ///
    /// Returns `true` (after invoking `callback` synchronously) when the
    /// channel is already ready, `false` otherwise.
    pub fn on_ready(&self, callback: impl FnOnce() + Send + 'static) -> bool {
        if self.is_ready() {
            callback();
            return true;
        }
        // The actor re-checks: if readiness raced this enqueue, the
        // callback still fires exactly once, just from the actor's side.
        let _ = self.commands.send(Command::OnReady(Box::new(callback)));
        false
    }

    /// Resolves once the handshake completes — immediately when it already
    /// has, and also when the endpoint shuts down before ever completing.
    pub async fn ready(&self) {
        let (tx, rx) = oneshot::channel();
        self.on_ready(move || {
            let _ = tx.send(());
        });
        let _ = rx.await;
    }

    /// Registers `listener` for every inbound message on `namespace`.
    ///
    /// If messages for that namespace arrived before any listener existed,
    /// they are delivered to this listener first, in arrival order. The
    /// returned id is the token for [`Endpoint::unregister_listener`].
    pub fn register_listener(
        &self,
        namespace: impl Into<String>,
        listener: impl FnMut(Message) + Send + 'static,
    ) -> ListenerId {
        let id = ListenerId::new(
            self.next_listener_id.fetch_add(1, Ordering::Relaxed),
        );
        let _ = self.commands.send(Command::RegisterListener {
            namespace: namespace.into(),
            id,
            listener: Box::new(listener),
        });
        id
    }

    /// Removes a listener registered on `namespace`. Unknown ids are
    /// ignored.
    pub fn unregister_listener(&self, namespace: &str, id: ListenerId) {
        let _ = self.commands.send(Command::UnregisterListener {
            namespace: namespace.to_string(),
            id,
        });
    }

    /// Sends `payload` on `namespace` and returns the pending reply.
    ///
    /// Before the handshake completes, nothing is transmitted yet: the send
    /// is queued and replayed at the readiness transition, and the returned
    /// future is fulfilled by that replay's outcome. Afterwards the frame
    /// goes out immediately.
    ///
    /// The future resolves with the peer's correlated reply, or `None` once
    /// the response window elapses.
    ///
    /// # Errors
    /// Fails synchronously — before anything reaches the wire — when
    /// `namespace` is empty.
    pub fn send(
        &self,
        namespace: impl Into<String>,
        payload: Value,
    ) -> Result<PendingReply, EndpointError> {
        let namespace = namespace.into();
        if namespace.is_empty() {
            return Err(EndpointError::EmptyNamespace);
        }
        let (responder, receiver) = oneshot::channel();
        let _ = self.commands.send(Command::Send {
            namespace,
            payload,
            reply_to: None,
            responder: Some(responder),
        });
        Ok(PendingReply { receiver })
    }
}

// ---------------------------------------------------------------------------
// PendingReply
// ---------------------------------------------------------------------------

/// Future returned by [`Endpoint::send`].
///
/// Resolves to the correlated reply, or `None` when the request timed out —
/// or when the endpoint went away before an answer could arrive. Dropping
/// it abandons the result without cancelling the request itself.
pub struct PendingReply {
    receiver: oneshot::Receiver<Option<Reply>>,
}

impl Future for PendingReply {
    type Output = Option<Reply>;

    fn poll(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|resolved| resolved.unwrap_or(None))
    }
}

// ---------------------------------------------------------------------------
// EndpointActor
// ---------------------------------------------------------------------------

/// What woke the actor up.
enum Event {
    Command(Command),
    Inbound(InboundRecord),
}

/// The task-private state behind an [`Endpoint`].
struct EndpointActor<T: Transport, C: Codec> {
    transport: T,
    codec: C,
    target: ContextId,
    config: EndpointConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    /// Weak handle to our own queue, cloned into timer tasks and message
    /// views. Weak, so the actor never keeps itself alive.
    command_tx: mpsc::WeakUnboundedSender<Command>,
    ready: Arc<AtomicBool>,
    ids: IdGenerator,
    handshake: Handshake,
    correlation: CorrelationTable,
    router: NamespaceRouter,
}

impl<T: Transport, C: Codec> EndpointActor<T, C> {
    async fn run(mut self) {
        tracing::debug!(peer = %self.target, "endpoint actor started");
        loop {
            let event = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => Event::Command(command),
                    // Every handle, reply capability, and timer is gone.
                    None => break,
                },
                record = self.transport.recv() => match record {
                    Some(record) => Event::Inbound(record),
                    None => {
                        tracing::debug!("transport closed, shutting down");
                        break;
                    }
                },
            };
            match event {
                Event::Command(command) => self.handle_command(command),
                Event::Inbound(record) => self.handle_inbound(record),
            }
        }
        // Dropping the actor drops every pending responder; outstanding
        // `PendingReply` futures resolve with `None`.
        tracing::debug!(peer = %self.target, "endpoint actor stopped");
    }

    // -- Commands ---------------------------------------------------------

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Send {
                namespace,
                payload,
                reply_to,
                responder,
            } => self.handle_send(DeferredSend {
                namespace,
                payload,
                reply_to,
                responder,
            }),
            Command::RegisterListener {
                namespace,
                id,
                listener,
            } => {
                let factory = message_factory(self.command_tx.clone());
                self.router.register(namespace, id, listener, factory);
            }
            Command::UnregisterListener { namespace, id } => {
                self.router.unregister(&namespace, id);
            }
            Command::OnReady(callback) => {
                if self.handshake.is_ready() {
                    callback();
                } else {
                    self.handshake.push_ready_callback(callback);
                }
            }
            Command::ResponseTimeout(id) => {
                if self.correlation.expire(&id) {
                    tracing::debug!(
                        %id,
                        "no reply within the response window, resolving empty"
                    );
                }
            }
        }
    }

    fn handle_send(&mut self, send: DeferredSend) {
        if !self.handshake.is_ready() {
            tracing::debug!(
                namespace = %send.namespace,
                queued = self.handshake.deferred_len() + 1,
                "channel not ready, deferring send"
            );
            self.handshake.defer_send(send);
            return;
        }
        self.transmit_send(send);
    }

    /// The ready-path send: fresh id, wire transmission, correlation entry.
    fn transmit_send(&mut self, send: DeferredSend) {
        let DeferredSend {
            namespace,
            payload,
            reply_to,
            responder,
        } = send;
        let id = self.ids.next();
        let envelope =
            Envelope::data(id.clone(), namespace, payload, reply_to);

        if let Err(error) = self.transmit(&envelope) {
            // No frame made it out, so no reply can ever come back.
            // Resolve empty right away instead of holding the caller for
            // the whole response window.
            tracing::warn!(%id, %error, "transmit failed, resolving empty");
            if let Some(responder) = responder {
                let _ = responder.send(None);
            }
            return;
        }

        // Fire-and-forget replies get no correlation entry: nothing on
        // this side awaits them.
        let Some(responder) = responder else { return };
        let timer = self.spawn_response_timer(id.clone());
        self.correlation.register(id, responder, timer);
    }

    fn spawn_response_timer(&self, id: MessageId) -> JoinHandle<()> {
        let command_tx = self.command_tx.clone();
        let window = self.config.response_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if let Some(commands) = command_tx.upgrade() {
                let _ = commands.send(Command::ResponseTimeout(id));
            }
        })
    }

    fn transmit(&self, envelope: &Envelope) -> Result<(), EndpointError> {
        let raw = self.codec.encode(envelope)?;
        self.transport.transmit(&raw, &self.config.origin)?;
        Ok(())
    }

    // -- Inbound ----------------------------------------------------------

    fn handle_inbound(&mut self, record: InboundRecord) {
        let Some(envelope) = self.screen(record) else { return };
        match envelope.kind() {
            FrameKind::HandshakeRequest => {
                let transition = self.handshake.on_peer_request();
                self.apply_transition(transition);
            }
            FrameKind::HandshakeAck => {
                let transition = self.handshake.on_peer_ack();
                self.apply_transition(transition);
            }
            FrameKind::Data => self.handle_data(envelope),
        }
    }

    /// The safety filter: source context, origin, decodability, protocol
    /// tag, structural validity. Anything that fails is dropped with no
    /// observable error — inbound noise is not worth surfacing.
    fn screen(&self, record: InboundRecord) -> Option<Envelope> {
        if record.source != self.target {
            tracing::debug!(
                source = %record.source,
                peer = %self.target,
                "record from unexpected context, dropping"
            );
            return None;
        }
        if !self.config.origin.matches(&record.origin) {
            tracing::debug!(
                origin = %record.origin,
                "record origin rejected by filter, dropping"
            );
            return None;
        }
        let envelope = match self.codec.decode(&record.raw) {
            Ok(envelope) => envelope,
            Err(error) => {
                tracing::debug!(%error, "undecodable record, dropping");
                return None;
            }
        };
        if envelope.protocol_tag != PROTOCOL_TAG {
            tracing::debug!(
                tag = %envelope.protocol_tag,
                "foreign protocol tag, dropping"
            );
            return None;
        }
        if let Err(error) = envelope.validate() {
            tracing::debug!(%error, "malformed envelope, dropping");
            return None;
        }
        Some(envelope)
    }

    /// Entering `Ready`: acknowledge if owed, flip the shared flag, fire
    /// the drained callbacks, then replay the drained sends — each through
    /// the full fresh-send path, in their original enqueue order.
    fn apply_transition(&mut self, transition: Transition) {
        if transition.acknowledge {
            if let Err(error) = self.transmit(&Envelope::handshake_ack()) {
                tracing::warn!(%error, "failed to transmit handshake acknowledgment");
            }
        }

        let was_ready = self.ready.swap(true, Ordering::Release);
        if !was_ready {
            tracing::info!(peer = %self.target, "handshake complete, channel ready");
        }

        for callback in transition.callbacks {
            callback();
        }
        for send in transition.deferred {
            self.transmit_send(send);
        }
    }

    fn handle_data(&mut self, envelope: Envelope) {
        // `screen` already validated: data frames carry an id and a
        // non-empty namespace.
        let (Some(id), Some(namespace)) = (envelope.id, envelope.namespace)
        else {
            return;
        };
        let data = envelope.data.unwrap_or(Value::Null);

        if let Some(response_id) = &envelope.response_id {
            let reply = Reply {
                id: id.clone(),
                namespace: namespace.clone(),
                data: data.clone(),
            };
            if self.correlation.resolve(response_id, reply) {
                tracing::debug!(
                    %response_id,
                    outstanding = self.correlation.len(),
                    "reply correlated to pending request"
                );
                return;
            }
            // No live request for it — late, duplicate, or aimed at a
            // request we never made. Falls through to namespace routing
            // like any fresh message.
        }

        let factory = message_factory(self.command_tx.clone());
        self.router
            .dispatch(BufferedMessage { id, namespace, data }, factory);
    }
}

/// Builds independent [`Message`] views, each holding a weak command sender
/// for its reply capability.
fn message_factory(
    command_tx: mpsc::WeakUnboundedSender<Command>,
) -> impl Fn(&BufferedMessage) -> Message {
    move |buffered: &BufferedMessage| {
        Message::new(
            buffered.id.clone(),
            buffered.namespace.clone(),
            buffered.data.clone(),
            command_tx.clone(),
        )
    }
}
