//! Demo client that connects to a gridlink game server and plays a short script.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p gridlink-demo` against a server on `ws://localhost:8080`.
//! Run with `cargo run -p gridlink-demo -- --url ws://10.0.0.5:8080 --run-secs 30` to override.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use gridlink_client::{
    ClientError, ConnectionState, EventTag, GameServerClient, InputRejected, SessionEvent,
};
use gridlink_config::{CliArgs, Config, default_config_dir};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Moves played once the server has assigned an id.
const SCRIPTED_MOVES: [(i32, i32); 4] = [(1, 0), (0, 1), (-1, 0), (0, -1)];

/// Pause between scripted inputs; longer than the default debounce.
const INPUT_PAUSE: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(name = "gridlink-demo", about = "Scripted gridlink client")]
struct DemoArgs {
    #[command(flatten)]
    common: CliArgs,

    /// Disconnect after this many seconds (default: wait for Ctrl-C).
    #[arg(long)]
    run_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = DemoArgs::parse();

    let config_dir = args.common.config.clone().unwrap_or_else(default_config_dir);
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args.common);

    let log_dir = config
        .debug
        .log_dir
        .clone()
        .unwrap_or_else(|| config_dir.join("logs"));
    gridlink_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    info!(url = %config.server.url, "gridlink demo starting");

    let client = GameServerClient::new(config);
    let mut connected = print_events(&client);

    if let Err(e) = client.connect().await {
        error!(error = %e, "could not connect");
        return ExitCode::FAILURE;
    }

    match tokio::time::timeout(Duration::from_secs(5), connected.recv()).await {
        Ok(Some(())) => play_script(&client).await,
        _ => warn!("server did not confirm the connection, skipping script"),
    }

    let mut state = client.session().subscribe();
    let run_for = args.run_secs.map(Duration::from_secs);
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
        _ = sleep_or_forever(run_for) => info!("run time elapsed"),
        _ = state.wait_for(|s| *s == ConnectionState::Disconnected) => {
            info!("server ended the session");
        }
    }

    client.disconnect().await;
    ExitCode::SUCCESS
}

async fn sleep_or_forever(duration: Option<Duration>) {
    match duration {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

/// Log every event. Returns a receiver that fires once per server
/// `connected` confirmation.
fn print_events(client: &GameServerClient) -> mpsc::UnboundedReceiver<()> {
    let (ready_tx, ready_rx) = mpsc::unbounded_channel();
    client.on(EventTag::Connected, move |event: &SessionEvent| {
        if let SessionEvent::Connected(c) = event {
            info!("Connected! Player ID: {}", c.player_id);
            let _ = ready_tx.send(());
        }
    });
    client.on(EventTag::MatchFound, |event: &SessionEvent| {
        if let SessionEvent::MatchFound(m) = event {
            info!(
                "Match found! Match ID: {}, Game Mode: {}, Players: {:?}",
                m.match_id, m.game_mode, m.players
            );
        }
    });
    client.on(EventTag::ChatMessage, |event: &SessionEvent| {
        if let SessionEvent::ChatMessage(chat) = event {
            info!("[{}] {}: {}", chat.channel, chat.username, chat.message);
        }
    });
    client.on(EventTag::Pong, |event: &SessionEvent| {
        if let SessionEvent::Pong { latency_ms } = event {
            tracing::debug!(?latency_ms, "heartbeat");
        }
    });
    client.on(EventTag::Disconnected, |event: &SessionEvent| {
        if let SessionEvent::Disconnected { reason } = event {
            info!(?reason, "Disconnected from server");
        }
    });
    client.on(EventTag::Error, |event: &SessionEvent| {
        if let SessionEvent::Error(fault) = event {
            warn!("Error: {fault}");
        }
    });
    ready_rx
}

async fn play_script(client: &GameServerClient) {
    let matchmaking = client.matchmaking();
    if let Err(e) = matchmaking.queue_for_match() {
        warn!(error = %e, "matchmaking request failed");
    }

    if let Err(e) = client.chat().send_message("Hello from gridlink!") {
        warn!(error = %e, "chat failed");
    }

    let game = client.game_state();
    if let Err(e) = game.spawn() {
        warn!(error = %e, "spawn failed");
        return;
    }

    for (dx, dy) in SCRIPTED_MOVES {
        tokio::time::sleep(INPUT_PAUSE).await;
        match game.move_by(dx, dy) {
            Ok(action) => info!(
                action_id = action.action_id,
                position = ?game.self_position(),
                "moved"
            ),
            Err(ClientError::Input(InputRejected::OutOfBounds { .. })) => {
                info!(dx, dy, "move blocked by world edge");
            }
            Err(e) => {
                warn!(error = %e, "move failed");
                return;
            }
        }
    }

    tokio::time::sleep(INPUT_PAUSE).await;
    if let Err(e) = game.shoot(1, 0) {
        warn!(error = %e, "shoot failed");
    }
    info!(latency_ms = ?client.latency_ms(), "script finished");
}
