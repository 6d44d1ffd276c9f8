//! Client session: connection lifecycle, heartbeat and inbound dispatch.
//!
//! A [`Session`] owns one transport at a time. While connected it runs two
//! background tasks:
//!
//! * the **receive task**, which owns the transport, writes queued outbound
//!   frames, decodes inbound frames and dispatches them in arrival order;
//! * the **heartbeat task**, which queues a `ping` every interval.
//!
//! Both stop on a shared [`watch`] shutdown signal. Every exit path (local
//! disconnect, remote close, transport failure) goes through the same
//! teardown in the receive task, so cleanup and the `Disconnected` event
//! happen exactly once per session.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::liveness::LivenessMonitor;
use crate::messages::{
    ActionType, GameAction, InboundMessage, MoveDelta, OutboundCommand, PlayerId, ProtocolError,
    decode_inbound, encode_command,
};
use crate::routing::{
    DisconnectReason, Dispatcher, EventHandler, EventTag, SessionEvent, SessionFault,
};
use crate::sequencer::ActionSequencer;
use crate::transport::{Connector, Transport, TransportError, WsConnector};

/// Reference heartbeat interval.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(5000);

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport.
    Disconnected,
    /// Transport handshake in progress.
    Connecting,
    /// Transport open; commands may be sent.
    Connected,
    /// Teardown in progress.
    Disconnecting,
}

/// Observable connection state backed by a [`watch`] channel.
///
/// Multiple subscribers can observe state transitions without polling.
pub struct ConnectionStateWatch {
    tx: watch::Sender<ConnectionState>,
}

impl Default for ConnectionStateWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateWatch {
    /// Create a new watch initialized to [`ConnectionState::Disconnected`].
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::Disconnected);
        Self { tx }
    }

    /// Set the current connection state, notifying all subscribers.
    pub fn set(&self, state: ConnectionState) {
        self.tx.send_replace(state);
    }

    /// Move from `from` to `to` atomically. Returns `false` (and changes
    /// nothing) if the current state is not `from`.
    pub fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        })
    }

    /// Return a new subscriber receiver.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }

    /// Return the current state without blocking.
    pub fn current(&self) -> ConnectionState {
        *self.tx.borrow()
    }
}

// ---------------------------------------------------------------------------
// Errors and options
// ---------------------------------------------------------------------------

/// Errors returned synchronously by [`Session`] operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// `connect` was called while a session is active.
    #[error("session is already connected")]
    AlreadyConnected,

    /// A command was sent while not connected.
    #[error("session is not connected")]
    NotConnected,

    /// `disconnect` was called before the handshake finished.
    #[error("connect cancelled by disconnect")]
    Cancelled,

    /// The transport could not be opened.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The command could not be serialized.
    #[error("failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Tunables for a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Interval between heartbeat pings. Zero disables the heartbeat.
    pub heartbeat_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// State shared between the session handle and its background tasks.
struct Shared {
    state: ConnectionStateWatch,
    player_id: Mutex<Option<PlayerId>>,
    sequencer: ActionSequencer,
    liveness: Mutex<LivenessMonitor>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    dispatcher: Dispatcher,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: ConnectionStateWatch::new(),
            player_id: Mutex::new(None),
            sequencer: ActionSequencer::new(),
            liveness: Mutex::new(LivenessMonitor::new()),
            outbound: Mutex::new(None),
            dispatcher: Dispatcher::new(),
        }
    }

    fn ensure_connected(&self) -> Result<(), SessionError> {
        if self.state.current() == ConnectionState::Connected {
            Ok(())
        } else {
            Err(SessionError::NotConnected)
        }
    }

    /// Queue an encoded frame for the receive task to write.
    fn enqueue(&self, frame: String) -> Result<(), SessionError> {
        self.ensure_connected()?;
        let outbound = self.outbound.lock();
        let sender = outbound.as_ref().ok_or(SessionError::NotConnected)?;
        sender.send(frame).map_err(|_| SessionError::NotConnected)
    }

    fn send(&self, command: &OutboundCommand) -> Result<(), SessionError> {
        self.ensure_connected()?;
        let frame = encode_command(command)?;
        tracing::debug!(%frame, "queueing command");
        self.enqueue(frame)
    }

    /// Stamp and queue a game action. The outbound lock is held across
    /// both steps, so ids reach the transport in issue order.
    fn send_game_action(
        &self,
        action_type: ActionType,
        data: Option<MoveDelta>,
    ) -> Result<GameAction, SessionError> {
        self.ensure_connected()?;
        let outbound = self.outbound.lock();
        let sender = outbound
            .as_ref()
            .filter(|sender| !sender.is_closed())
            .ok_or(SessionError::NotConnected)?;
        let action = self.sequencer.stamp(action_type, data);
        let frame = encode_command(&OutboundCommand::GameAction(action.clone()))?;
        tracing::debug!(%frame, "queueing command");
        sender.send(frame).map_err(|_| SessionError::NotConnected)?;
        Ok(action)
    }

    fn send_ping(&self) -> Result<(), SessionError> {
        self.ensure_connected()?;
        let frame = encode_command(&OutboundCommand::Ping)?;
        // Stamp before queueing so a fast pong always finds the slot filled.
        self.liveness.lock().on_ping_sent(Instant::now());
        self.enqueue(frame)
    }

    fn dispatch(&self, event: SessionEvent) {
        self.dispatcher.dispatch(&event);
    }

    fn report(&self, fault: SessionFault) {
        self.dispatch(SessionEvent::Error(fault));
    }

    /// Decode and dispatch one inbound frame. Never fails: bad frames are
    /// reported and dropped.
    fn handle_frame(&self, text: &str) {
        let msg = match decode_inbound(text) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed frame");
                self.report(SessionFault::Protocol(e.to_string()));
                return;
            }
        };

        match msg {
            InboundMessage::Connected(connected) => {
                {
                    let mut slot = self.player_id.lock();
                    if let Some(existing) = *slot {
                        tracing::warn!(
                            existing,
                            offered = connected.player_id,
                            "ignoring duplicate connected message"
                        );
                        return;
                    }
                    *slot = Some(connected.player_id);
                }
                tracing::info!(player_id = connected.player_id, "server assigned player id");
                self.dispatch(SessionEvent::Connected(connected));
            }
            InboundMessage::MatchFound(found) => {
                tracing::info!(match_id = %found.match_id, "match found");
                self.dispatch(SessionEvent::MatchFound(found));
            }
            InboundMessage::ChatMessage(chat) => self.dispatch(SessionEvent::ChatMessage(chat)),
            InboundMessage::StateUpdate(update) => {
                tracing::trace!(players = update.state.players.len(), "state update");
                self.dispatch(SessionEvent::StateUpdate(update));
            }
            InboundMessage::Pong => {
                let latency_ms = {
                    let mut liveness = self.liveness.lock();
                    liveness
                        .on_pong(Instant::now())
                        .and_then(|_| liveness.latest_latency_ms())
                };
                tracing::debug!(?latency_ms, "pong");
                self.dispatch(SessionEvent::Pong { latency_ms });
            }
            InboundMessage::Unknown(kind) => {
                let e = ProtocolError::UnknownType(kind);
                tracing::warn!(error = %e, "dropping frame");
                self.report(SessionFault::Protocol(e.to_string()));
            }
        }
    }

    fn reset_for_connect(&self) {
        self.sequencer.reset();
        self.liveness.lock().reset();
        *self.player_id.lock() = None;
    }

    /// Clear per-session state and mark the session disconnected.
    fn clear(&self) {
        self.outbound.lock().take();
        *self.player_id.lock() = None;
        self.liveness.lock().reset();
        self.state.set(ConnectionState::Disconnected);
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Background tasks of the active session.
struct ActiveTasks {
    /// Sending `true` stops the receive and heartbeat tasks.
    shutdown_tx: Arc<watch::Sender<bool>>,
    /// Receive task; owns the heartbeat handle and performs teardown.
    /// `None` while the handshake is in progress.
    receiver: Option<JoinHandle<()>>,
}

/// A client session with a game server.
///
/// Construct one per server connection attempt sequence; it can be
/// reconnected after it reaches [`ConnectionState::Disconnected`].
pub struct Session<C: Connector = WsConnector> {
    connector: C,
    options: SessionOptions,
    shared: Arc<Shared>,
    tasks: tokio::sync::Mutex<Option<ActiveTasks>>,
}

impl Session<WsConnector> {
    /// A session over WebSocket.
    pub fn websocket(options: SessionOptions) -> Self {
        Self::new(WsConnector, options)
    }
}

impl<C: Connector> Session<C> {
    /// Create a disconnected session.
    pub fn new(connector: C, options: SessionOptions) -> Self {
        Self {
            connector,
            options,
            shared: Arc::new(Shared::new()),
            tasks: tokio::sync::Mutex::new(None),
        }
    }

    /// Open the transport and start the receive and heartbeat tasks.
    ///
    /// Returns once the transport is open. The server's `connected` message,
    /// which carries the player id, arrives later as a
    /// [`SessionEvent::Connected`]. A [`disconnect`](Self::disconnect) during
    /// the handshake makes this return [`SessionError::Cancelled`].
    pub async fn connect(&self, url: &str) -> Result<(), SessionError> {
        let mut shutdown_rx = {
            let mut tasks = self.tasks.lock().await;

            if self.shared.state.current() != ConnectionState::Disconnected {
                return Err(SessionError::AlreadyConnected);
            }
            // A previous session ended on its own; let its teardown finish.
            if let Some(receiver) = tasks.take().and_then(|previous| previous.receiver) {
                let _ = receiver.await;
            }
            if !self
                .shared
                .state
                .transition(ConnectionState::Disconnected, ConnectionState::Connecting)
            {
                return Err(SessionError::AlreadyConnected);
            }

            self.shared.reset_for_connect();
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            *tasks = Some(ActiveTasks {
                shutdown_tx: Arc::new(shutdown_tx),
                receiver: None,
            });
            shutdown_rx
        };
        tracing::info!(url, "connecting");

        // The tasks lock is not held here, so `disconnect` can cancel.
        let opened = tokio::select! {
            biased;
            _ = shutdown_rx.changed() => None,
            result = self.connector.connect(url) => Some(result),
        };

        let mut tasks = self.tasks.lock().await;
        // `disconnect` removes the pending entry and signals under this lock;
        // it has already moved the state back to Disconnected.
        let cancelled = *shutdown_rx.borrow();
        let transport = match opened {
            Some(Ok(transport)) if !cancelled => transport,
            Some(Ok(mut transport)) => {
                tracing::info!(url, "connect cancelled after handshake");
                if let Err(e) = transport.close().await {
                    tracing::debug!(error = %e, "error while closing transport");
                }
                return Err(SessionError::Cancelled);
            }
            Some(Err(e)) if !cancelled => {
                tracing::error!(url, error = %e, "connect failed");
                tasks.take();
                self.shared.state.set(ConnectionState::Disconnected);
                self.shared.report(SessionFault::Transport(e.to_string()));
                return Err(e.into());
            }
            Some(Err(_)) | None => {
                tracing::info!(url, "connect cancelled");
                return Err(SessionError::Cancelled);
            }
        };
        let Some(active) = tasks.as_mut() else {
            return Err(SessionError::Cancelled);
        };

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        *self.shared.outbound.lock() = Some(outbound_tx);

        self.shared.state.set(ConnectionState::Connected);
        tracing::info!(url, "transport open");

        let heartbeat = tokio::spawn(heartbeat_loop(
            Arc::clone(&self.shared),
            self.options.heartbeat_interval,
            shutdown_rx.clone(),
        ));

        active.receiver = Some(tokio::spawn(receive_loop(
            Arc::clone(&self.shared),
            transport,
            outbound_rx,
            shutdown_rx,
            Arc::clone(&active.shutdown_tx),
            heartbeat,
        )));
        Ok(())
    }

    /// Stop the session and wait for teardown to finish.
    ///
    /// Idempotent: calling it while disconnected does nothing, and a
    /// session that already ended remotely produces no second
    /// `Disconnected` event. A pending handshake is abandoned without
    /// waiting for it.
    pub async fn disconnect(&self) {
        let mut tasks = self.tasks.lock().await;
        let Some(active) = tasks.take() else {
            tracing::debug!("disconnect while disconnected ignored");
            return;
        };

        let Some(receiver) = active.receiver else {
            let _ = active.shutdown_tx.send(true);
            self.shared
                .state
                .transition(ConnectionState::Connecting, ConnectionState::Disconnected);
            tracing::info!("pending connect cancelled");
            return;
        };

        self.shared
            .state
            .transition(ConnectionState::Connected, ConnectionState::Disconnecting);
        let _ = active.shutdown_tx.send(true);

        if let Err(e) = receiver.await {
            tracing::error!(error = %e, "receive task failed during teardown");
            self.shared.clear();
        }
    }

    /// Send a command. Fails with [`SessionError::NotConnected`] unless
    /// connected; nothing is queued in that case.
    pub fn send(&self, command: &OutboundCommand) -> Result<(), SessionError> {
        self.shared.send(command)
    }

    /// Stamp and send a game action. Returns the action as sent.
    ///
    /// No id is consumed when the session is not connected.
    pub fn send_game_action(
        &self,
        action_type: ActionType,
        data: Option<MoveDelta>,
    ) -> Result<GameAction, SessionError> {
        self.shared.send_game_action(action_type, data)
    }

    /// Send a ping now and start a latency measurement.
    pub fn ping(&self) -> Result<(), SessionError> {
        self.shared.send_ping()
    }

    /// Register a handler for one event type.
    pub fn on<H: EventHandler + 'static>(&self, tag: EventTag, handler: H) {
        self.shared.dispatcher.register(tag, handler);
    }

    /// The event dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.shared.dispatcher
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state.current()
    }

    /// Subscribe to connection state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Player id assigned by the server, once its `connected` message arrived.
    pub fn player_id(&self) -> Option<PlayerId> {
        *self.shared.player_id.lock()
    }

    /// Most recent heartbeat round-trip time in milliseconds.
    pub fn latest_latency_ms(&self) -> Option<u64> {
        self.shared.liveness.lock().latest_latency_ms()
    }

    /// Id of the last game action sent this session (0 if none).
    pub fn last_action_id(&self) -> u64 {
        self.shared.sequencer.last_issued()
    }

    /// Heartbeat and other tunables.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }
}

impl<C: Connector> Drop for Session<C> {
    fn drop(&mut self) {
        if let Some(active) = self.tasks.get_mut().take() {
            let _ = active.shutdown_tx.send(true);
            if let Some(receiver) = active.receiver {
                receiver.abort();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

/// Queue a ping every `period` until shutdown.
async fn heartbeat_loop(
    shared: Arc<Shared>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    if period.is_zero() {
        tracing::debug!("heartbeat disabled");
        return;
    }

    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = shared.send_ping() {
                    tracing::debug!(error = %e, "heartbeat stopping");
                    break;
                }
                tracing::trace!("ping queued");
            }
            _ = shutdown_rx.changed() => break,
        }
    }
}

/// Own the transport: write queued frames, dispatch inbound ones, and run
/// teardown on exit.
async fn receive_loop<T: Transport>(
    shared: Arc<Shared>,
    mut transport: T,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    mut shutdown_rx: watch::Receiver<bool>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    heartbeat: JoinHandle<()>,
) {
    let reason = loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => break DisconnectReason::Requested,

            Some(frame) = outbound_rx.recv() => {
                if let Err(e) = transport.send(frame).await {
                    tracing::error!(error = %e, "send failed");
                    break DisconnectReason::TransportFailed(e.to_string());
                }
            }

            inbound = transport.recv() => match inbound {
                Some(Ok(text)) => shared.handle_frame(&text),
                Some(Err(e)) => {
                    tracing::error!(error = %e, "receive failed");
                    break DisconnectReason::TransportFailed(e.to_string());
                }
                None => break DisconnectReason::RemoteClosed,
            },
        }
    };

    shared
        .state
        .transition(ConnectionState::Connected, ConnectionState::Disconnecting);

    let _ = shutdown_tx.send(true);
    if let Err(e) = heartbeat.await
        && e.is_panic()
    {
        tracing::error!("heartbeat task panicked");
    }

    // No new frames can be queued once the sender is gone.
    shared.outbound.lock().take();
    if reason == DisconnectReason::Requested {
        while let Ok(frame) = outbound_rx.try_recv() {
            if transport.send(frame).await.is_err() {
                break;
            }
        }
    }
    if let Err(e) = transport.close().await {
        tracing::debug!(error = %e, "error while closing transport");
    }
    drop(transport);

    shared.clear();
    tracing::info!(?reason, "session ended");

    if let DisconnectReason::TransportFailed(message) = &reason {
        shared.report(SessionFault::Transport(message.clone()));
    }
    shared.dispatch(SessionEvent::Disconnected { reason });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
