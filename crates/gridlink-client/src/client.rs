//! The client facade and its wiring into the prediction engine.

use std::sync::Arc;

use gridlink_config::{Config, PredictionConfig, SessionConfig};
use gridlink_net::{
    ConnectionState, Connector, EventHandler, EventTag, PlayerId, Session, SessionEvent,
    SessionOptions, WsConnector,
};
use gridlink_prediction::{
    PredictionEngine, PredictionSettings, Position, SelfCorrection, WorldBounds,
};
use parking_lot::Mutex;

use crate::chat::ChatApi;
use crate::error::ClientError;
use crate::game_state::GameStateApi;
use crate::matchmaking::MatchmakingApi;

/// Session options from the `session` config section.
pub fn session_options(config: &SessionConfig) -> SessionOptions {
    SessionOptions {
        heartbeat_interval: config.heartbeat_interval(),
    }
}

/// Prediction settings from the `prediction` config section.
pub fn prediction_settings(config: &PredictionConfig) -> PredictionSettings {
    PredictionSettings {
        bounds: WorldBounds::new(config.world_size),
        drift_threshold: config.drift_threshold,
        debounce: config.debounce(),
    }
}

/// A game server client: one session plus the local view of the world.
///
/// ```no_run
/// # async fn run() -> Result<(), gridlink_client::ClientError> {
/// use gridlink_client::{EventTag, GameServerClient, SessionEvent};
/// use gridlink_config::Config;
///
/// let client = GameServerClient::new(Config::default());
/// client.on(EventTag::ChatMessage, |event: &SessionEvent| {
///     if let SessionEvent::ChatMessage(chat) = event {
///         println!("[{}] {}: {}", chat.channel, chat.username, chat.message);
///     }
/// });
/// client.connect().await?;
/// client.matchmaking().queue_for_match()?;
/// client.chat().send_message("hello")?;
/// client.disconnect().await;
/// # Ok(())
/// # }
/// ```
pub struct GameServerClient<C: Connector = WsConnector> {
    pub(crate) session: Session<C>,
    pub(crate) engine: Arc<Mutex<PredictionEngine>>,
    pub(crate) config: Config,
}

impl GameServerClient<WsConnector> {
    /// A WebSocket client for `config.server.url`.
    pub fn new(config: Config) -> Self {
        Self::with_connector(WsConnector, config)
    }
}

impl<C: Connector> GameServerClient<C> {
    /// A client over a custom transport.
    pub fn with_connector(connector: C, config: Config) -> Self {
        let session = Session::new(connector, session_options(&config.session));
        let engine = Arc::new(Mutex::new(PredictionEngine::new(prediction_settings(
            &config.prediction,
        ))));
        // Registered first so application handlers see the updated engine.
        register_engine_handlers(&session, &engine);
        Self {
            session,
            engine,
            config,
        }
    }

    /// Connect to the configured server URL.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.connect_to(&self.config.server.url).await
    }

    /// Connect to `url` instead of the configured one.
    pub async fn connect_to(&self, url: &str) -> Result<(), ClientError> {
        self.session.connect(url).await?;
        Ok(())
    }

    /// Disconnect. Safe to call at any time.
    pub async fn disconnect(&self) {
        self.session.disconnect().await;
    }

    /// Register an event handler.
    pub fn on<H: EventHandler + 'static>(&self, tag: EventTag, handler: H) {
        self.session.on(tag, handler);
    }

    /// Matchmaking operations.
    pub fn matchmaking(&self) -> MatchmakingApi<'_, C> {
        MatchmakingApi::new(self)
    }

    /// Chat operations.
    pub fn chat(&self) -> ChatApi<'_, C> {
        ChatApi::new(self)
    }

    /// Game actions and the local view of the world.
    pub fn game_state(&self) -> GameStateApi<'_, C> {
        GameStateApi::new(self)
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    /// Whether the transport is open.
    pub fn is_connected(&self) -> bool {
        self.session.state() == ConnectionState::Connected
    }

    /// Player id assigned by the server.
    pub fn player_id(&self) -> Option<PlayerId> {
        self.session.player_id()
    }

    /// Most recent heartbeat round-trip time.
    pub fn latency_ms(&self) -> Option<u64> {
        self.session.latest_latency_ms()
    }

    /// The underlying session.
    pub fn session(&self) -> &Session<C> {
        &self.session
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

fn register_engine_handlers<C: Connector>(
    session: &Session<C>,
    engine: &Arc<Mutex<PredictionEngine>>,
) {
    let on_connected = Arc::clone(engine);
    session.on(EventTag::Connected, move |event: &SessionEvent| {
        if let SessionEvent::Connected(connected) = event {
            on_connected.lock().set_self(connected.player_id);
        }
    });

    let on_state = Arc::clone(engine);
    session.on(EventTag::StateUpdate, move |event: &SessionEvent| {
        let SessionEvent::StateUpdate(update) = event else {
            return;
        };
        let snapshot = update
            .state
            .players
            .iter()
            .map(|(id, p)| (*id, Position::new(p.x, p.y)));
        let report = on_state.lock().reconcile(snapshot);
        if let SelfCorrection::Snapped { from, to } = report.self_correction {
            tracing::info!(%from, %to, tick = update.tick, "server corrected local position");
        }
        if !report.removed.is_empty() {
            tracing::debug!(removed = ?report.removed, "players left");
        }
    });

    let on_disconnected = Arc::clone(engine);
    session.on(EventTag::Disconnected, move |_: &SessionEvent| {
        on_disconnected.lock().reset();
    });
}
