//! WebSocket transport: endpoints in separate processes, one text frame per
//! wire record.
//!
//! The peer's socket address doubles as its origin string (`ws://host:port`),
//! so origin filtering degrades gracefully to address filtering. Binary,
//! ping, and pong frames are not part of the protocol and are skipped.

use std::io;
use std::net::SocketAddr;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::{
    ContextId, InboundRecord, OriginFilter, Transport, TransportError,
};

/// Accepts incoming WebSocket connections, producing one
/// [`WebSocketTransport`] per peer.
pub struct WebSocketListener {
    listener: TcpListener,
}

impl WebSocketListener {
    /// Binds to the given address.
    ///
    /// # Errors
    /// Returns [`TransportError::AcceptFailed`] when the bind fails.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket listener bound");
        Ok(Self { listener })
    }

    /// The locally bound address; useful when binding to port 0.
    ///
    /// # Errors
    /// Returns [`TransportError::AcceptFailed`] if the socket is gone.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)
    }

    /// Waits for the next peer and completes the WebSocket upgrade.
    ///
    /// # Errors
    /// Returns [`TransportError::AcceptFailed`] when the TCP accept or the
    /// upgrade fails.
    pub async fn accept(&mut self) -> Result<WebSocketTransport, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| {
                TransportError::AcceptFailed(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    e,
                ))
            })?;

        let peer_ctx = ContextId::next();
        let peer_origin = format!("ws://{addr}");
        tracing::debug!(%peer_ctx, %addr, "accepted WebSocket peer");

        Ok(WebSocketTransport::spawn_io(ws, peer_ctx, peer_origin))
    }
}

/// A [`Transport`] over one established WebSocket connection.
///
/// The connection is split into a writer task (draining an outbound queue,
/// which is what keeps [`Transport::transmit`] non-blocking) and a reader
/// task (stamping text frames into [`InboundRecord`]s). Both tasks end when
/// the socket closes or the transport is dropped.
pub struct WebSocketTransport {
    ctx: ContextId,
    peer_ctx: ContextId,
    peer_origin: String,
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<InboundRecord>,
}

impl WebSocketTransport {
    /// Connects to a listening peer at `addr` (host:port).
    ///
    /// # Errors
    /// Returns [`TransportError::ConnectFailed`] when the connection or the
    /// upgrade fails.
    pub async fn connect(addr: &str) -> Result<Self, TransportError> {
        let url = format!("ws://{addr}");
        let (ws, _) =
            tokio_tungstenite::connect_async(&url).await.map_err(|e| {
                TransportError::ConnectFailed(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    e,
                ))
            })?;

        let peer_ctx = ContextId::next();
        tracing::debug!(%peer_ctx, %url, "connected to WebSocket peer");

        Ok(Self::spawn_io(ws, peer_ctx, url))
    }

    /// This side's context id.
    pub fn context(&self) -> ContextId {
        self.ctx
    }

    /// The context id assigned to the remote peer — what an endpoint built
    /// on this transport uses as its target.
    pub fn peer_context(&self) -> ContextId {
        self.peer_ctx
    }

    /// The remote peer's origin string (`ws://host:port`).
    pub fn peer_origin(&self) -> &str {
        &self.peer_origin
    }

    /// Splits `ws` into pump tasks and wires them to the transport's queues.
    fn spawn_io<S>(ws: S, peer_ctx: ContextId, peer_origin: String) -> Self
    where
        S: Stream<Item = Result<Message, WsError>>
            + Sink<Message, Error = WsError>
            + Send
            + Unpin
            + 'static,
    {
        let (mut sink, mut stream) = ws.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(raw) = outbound_rx.recv().await {
                if let Err(error) = sink.send(Message::Text(raw.into())).await
                {
                    tracing::debug!(%error, "WebSocket write failed, stopping writer");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader_origin = peer_origin.clone();
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        let record = InboundRecord {
                            source: peer_ctx,
                            origin: reader_origin.clone(),
                            raw: text.as_str().to_string(),
                        };
                        if inbound_tx.send(record).is_err() {
                            break; // transport dropped
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue, // skip binary/ping/pong
                    Err(error) => {
                        tracing::debug!(%error, "WebSocket read failed, stopping reader");
                        break;
                    }
                }
            }
        });

        Self {
            ctx: ContextId::next(),
            peer_ctx,
            peer_origin,
            outbound,
            inbound,
        }
    }
}

impl Transport for WebSocketTransport {
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
            .send(raw.to_string())
            .map_err(|_| TransportError::Closed)
    }

    async fn recv(&mut self) -> Option<InboundRecord> {
        self.inbound.recv().await
    }
}
