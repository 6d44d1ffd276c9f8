//! Client against a real WebSocket server on the loopback interface.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use gridlink_client::{
    ConnectionState, DisconnectReason, EventTag, GameServerClient, Position, SessionEvent,
};
use gridlink_config::Config;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Minimal game server: greets with `connected`, sends any scripted frames,
/// answers pings and forwards every other client frame to the test.
///
/// Stops after `close_after` forwarded frames when set.
async fn spawn_server(
    player_id: u64,
    script: Vec<String>,
    close_after: Option<usize>,
) -> (SocketAddr, mpsc::UnboundedReceiver<serde_json::Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        let hello = format!(r#"{{"type":"connected","playerId":{player_id},"serverTime":1}}"#);
        ws.send(Message::Text(hello.into())).await.unwrap();
        for frame in script {
            ws.send(Message::Text(frame.into())).await.unwrap();
        }

        let mut forwarded = 0;
        while let Some(Ok(msg)) = ws.next().await {
            let Message::Text(text) = msg else { continue };
            let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
            if value["type"] == "ping" {
                ws.send(Message::Text(r#"{"type":"pong"}"#.into()))
                    .await
                    .unwrap();
                continue;
            }
            let _ = tx.send(value);
            forwarded += 1;
            if close_after == Some(forwarded) {
                let _ = ws.close(None).await;
                break;
            }
        }
    });

    (addr, rx)
}

fn client_for(addr: SocketAddr) -> GameServerClient {
    let mut config = Config::default();
    config.server.url = format!("ws://{addr}");
    GameServerClient::new(config)
}

fn record(client: &GameServerClient, tags: &[EventTag]) -> mpsc::UnboundedReceiver<SessionEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    for &tag in tags {
        let tx = tx.clone();
        client.on(tag, move |event: &SessionEvent| {
            let _ = tx.send(event.clone());
        });
    }
    rx
}

#[tokio::test]
async fn test_connect_assigns_player_id_and_measures_latency() {
    let (addr, _frames) = spawn_server(7, Vec::new(), None).await;
    let client = client_for(addr);
    let mut events = record(&client, &[EventTag::Connected, EventTag::Pong]);

    client.connect().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Connected);

    match events.recv().await.unwrap() {
        SessionEvent::Connected(connected) => assert_eq!(connected.player_id, 7),
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(client.player_id(), Some(7));

    client.session().ping().unwrap();
    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::Pong { latency_ms: Some(_) }
    ));
    assert!(client.latency_ms().is_some());

    client.disconnect().await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.player_id(), None);
}

#[tokio::test]
async fn test_snapshot_then_move_reaches_server() {
    let snapshot = r#"{"type":"state_update","serverTime":10,"tick":3,"state":{"players":{"7":{"x":3,"y":3,"hp":100},"8":{"x":0,"y":1}}}}"#;
    let (addr, mut frames) = spawn_server(7, vec![snapshot.to_string()], None).await;
    let client = client_for(addr);
    let mut events = record(&client, &[EventTag::StateUpdate]);

    client.connect().await.unwrap();
    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::StateUpdate(_)
    ));

    let game = client.game_state();
    assert_eq!(game.self_position(), Some(Position::new(3, 3)));
    assert_eq!(game.players().len(), 2);

    game.move_by(0, 1).unwrap();
    assert_eq!(game.self_position(), Some(Position::new(3, 4)));

    let action = frames.recv().await.unwrap();
    assert_eq!(action["type"], "game_action");
    assert_eq!(action["actionType"], "move");
    assert_eq!(action["actionId"], 1);
    assert_eq!(action["data"]["dy"], 1);

    client.disconnect().await;
}

#[tokio::test]
async fn test_server_close_ends_session_once() {
    let (addr, mut frames) = spawn_server(3, Vec::new(), Some(1)).await;
    let client = client_for(addr);
    let mut events = record(&client, &[EventTag::Connected, EventTag::Disconnected]);

    client.connect().await.unwrap();
    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::Connected(_)
    ));

    client.chat().send_message("bye").unwrap();
    assert_eq!(frames.recv().await.unwrap()["message"], "bye");

    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::Disconnected {
            reason: DisconnectReason::RemoteClosed
        }
    );
    client.disconnect().await;
    assert!(events.try_recv().is_err());
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_connect_to_closed_port_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(addr);
    assert!(client.connect().await.is_err());
    assert_eq!(client.state(), ConnectionState::Disconnected);
}
