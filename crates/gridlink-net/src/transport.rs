//! Full-duplex text transports.
//!
//! A [`Connector`] opens a [`Transport`] for a URL. The session's receive
//! task owns the transport exclusively and multiplexes [`Transport::send`]
//! and [`Transport::recv`] with `tokio::select!`, so `recv` must be
//! cancel-safe.
//!
//! Two implementations ship with the crate: [`WsConnector`] over
//! `tokio-tungstenite`, and the in-process [`memory`] pair used for loopback
//! and tests.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// Errors raised by a transport. Any of these ends the session.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("failed to connect to {url}: {reason}")]
    Connect {
        /// Target URL.
        url: String,
        /// Underlying failure.
        reason: String,
    },

    /// WebSocket protocol or I/O failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// The channel was already closed.
    #[error("transport closed")]
    Closed,

    /// Failure reported by the remote side of an in-memory transport.
    #[error("transport failure: {0}")]
    Failed(String),
}

/// One established full-duplex text channel.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one text frame.
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Wait for the next inbound text frame.
    ///
    /// Returns `None` on a clean close and `Some(Err(_))` on failure.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    /// Close the channel. Closing an already-closed channel is not an error.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens transports.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Transport produced by this connector.
    type Transport: Transport;

    /// Establish a connection to `url`.
    async fn connect(&self, url: &str) -> Result<Self::Transport, TransportError>;
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects over `ws://` (or `wss://` when tungstenite has TLS enabled).
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

/// A WebSocket connection carrying JSON text frames.
pub struct WsTransport {
    stream: WsStream,
}

#[async_trait]
impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&self, url: &str) -> Result<WsTransport, TransportError> {
        let (stream, _response) =
            connect_async(url)
                .await
                .map_err(|e| TransportError::Connect {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
        tracing::debug!(url, "websocket handshake complete");
        Ok(WsTransport { stream })
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            let msg = match self.stream.next().await? {
                Ok(msg) => msg,
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return None;
                }
                Err(e) => return Some(Err(e.into())),
            };
            match msg {
                Message::Text(text) => return Some(Ok(text.as_str().to_owned())),
                // Invalid UTF-8 becomes a malformed frame for the decoder to drop.
                Message::Binary(bytes) => {
                    return Some(Ok(String::from_utf8_lossy(&bytes).into_owned()));
                }
                Message::Close(frame) => {
                    tracing::debug!(?frame, "server sent close frame");
                    return None;
                }
                // Control frames are answered by tungstenite itself.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.stream.close(None).await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// In-process transport pair for loopback use and tests.
///
/// Every [`MemoryConnector::connect`] creates a fresh pair and hands the
/// server end ([`MemoryPeer`]) out through the receiver returned by
/// [`MemoryConnector::new`].
pub mod memory {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::{Connector, Transport, TransportError};

    /// Client end of an in-memory channel.
    pub struct MemoryTransport {
        incoming: mpsc::UnboundedReceiver<Result<String, TransportError>>,
        outgoing: mpsc::UnboundedSender<String>,
        closed: Arc<AtomicBool>,
    }

    /// Server end of an in-memory channel. Dropping it closes the channel
    /// cleanly from the client's point of view.
    pub struct MemoryPeer {
        to_client: mpsc::UnboundedSender<Result<String, TransportError>>,
        from_client: mpsc::UnboundedReceiver<String>,
        closed: Arc<AtomicBool>,
    }

    /// Creates [`MemoryTransport`]s and publishes their peers.
    pub struct MemoryConnector {
        peers: mpsc::UnboundedSender<MemoryPeer>,
        refuse: AtomicBool,
    }

    /// Create a connected client/server pair.
    pub fn pair() -> (MemoryTransport, MemoryPeer) {
        let (to_client, incoming) = mpsc::unbounded_channel();
        let (outgoing, from_client) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let transport = MemoryTransport {
            incoming,
            outgoing,
            closed: Arc::clone(&closed),
        };
        let peer = MemoryPeer {
            to_client,
            from_client,
            closed,
        };
        (transport, peer)
    }

    impl MemoryConnector {
        /// Create a connector and the stream of peers it will produce.
        pub fn new() -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
            let (peers, rx) = mpsc::unbounded_channel();
            let connector = Self {
                peers,
                refuse: AtomicBool::new(false),
            };
            (connector, rx)
        }

        /// Make subsequent connection attempts fail.
        pub fn set_refuse(&self, refuse: bool) {
            self.refuse.store(refuse, Ordering::Release);
        }
    }

    impl MemoryPeer {
        /// Deliver a text frame to the client.
        pub fn send_text(&self, text: impl Into<String>) -> bool {
            self.to_client.send(Ok(text.into())).is_ok()
        }

        /// Make the client's next `recv` fail with [`TransportError::Failed`].
        pub fn fail(&self, reason: impl Into<String>) -> bool {
            self.to_client
                .send(Err(TransportError::Failed(reason.into())))
                .is_ok()
        }

        /// Next frame sent by the client, or `None` once the client end is gone.
        pub async fn recv(&mut self) -> Option<String> {
            self.from_client.recv().await
        }

        /// Next frame sent by the client, if one is already queued.
        pub fn try_recv(&mut self) -> Option<String> {
            self.from_client.try_recv().ok()
        }

        /// Whether the client called [`Transport::close`].
        pub fn client_closed(&self) -> bool {
            self.closed.load(Ordering::Acquire)
        }
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn send(&mut self, text: String) -> Result<(), TransportError> {
            if self.closed.load(Ordering::Acquire) {
                return Err(TransportError::Closed);
            }
            self.outgoing
                .send(text)
                .map_err(|_| TransportError::Closed)
        }

        async fn recv(&mut self) -> Option<Result<String, TransportError>> {
            self.incoming.recv().await
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            self.closed.store(true, Ordering::Release);
            self.incoming.close();
            Ok(())
        }
    }

    #[async_trait]
    impl Connector for MemoryConnector {
        type Transport = MemoryTransport;

        async fn connect(&self, url: &str) -> Result<MemoryTransport, TransportError> {
            if self.refuse.load(Ordering::Acquire) {
                return Err(TransportError::Connect {
                    url: url.to_string(),
                    reason: "connection refused".to_string(),
                });
            }
            let (transport, peer) = pair();
            self.peers
                .send(peer)
                .map_err(|_| TransportError::Connect {
                    url: url.to_string(),
                    reason: "no listener for memory transport".to_string(),
                })?;
            Ok(transport)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::{MemoryConnector, pair};
    use super::*;

    #[tokio::test]
    async fn test_memory_pair_delivers_both_ways() {
        let (mut transport, mut peer) = pair();

        transport.send("hello".to_string()).await.unwrap();
        assert_eq!(peer.recv().await.as_deref(), Some("hello"));

        assert!(peer.send_text("world"));
        assert_eq!(transport.recv().await.unwrap().unwrap(), "world");
    }

    #[tokio::test]
    async fn test_dropping_peer_is_clean_close() {
        let (mut transport, peer) = pair();
        drop(peer);
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_peer_failure_surfaces_as_error() {
        let (mut transport, peer) = pair();
        peer.fail("reset by peer");
        let result = transport.recv().await.unwrap();
        assert!(matches!(result, Err(TransportError::Failed(reason)) if reason == "reset by peer"));
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (mut transport, peer) = pair();
        transport.close().await.unwrap();
        assert!(peer.client_closed());
        assert!(matches!(
            transport.send("late".to_string()).await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_refusing_connector() {
        let (connector, _peers) = MemoryConnector::new();
        connector.set_refuse(true);
        let result = connector.connect("mem://game").await;
        assert!(matches!(result, Err(TransportError::Connect { url, .. }) if url == "mem://game"));
    }

    #[tokio::test]
    async fn test_ws_connect_failure_is_connect_error() {
        // Bind then drop a listener so the port is very likely closed.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = WsConnector.connect(&format!("ws://{addr}")).await;
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }
}
