//! Wire protocol: one JSON object per text frame with a `"type"` discriminator.
//!
//! Inbound frames decode into the closed [`InboundMessage`] union via
//! [`decode_inbound`]; optional fields take explicit defaults at decode time.
//! Outbound frames are [`OutboundCommand`] values encoded with
//! [`encode_command`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Server-assigned player identifier.
pub type PlayerId = u64;

// ---------------------------------------------------------------------------
// Inbound (server → client)
// ---------------------------------------------------------------------------

/// A decoded server frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Session identity assigned by the server.
    Connected(Connected),
    /// Matchmaking result.
    MatchFound(MatchFound),
    /// Chat broadcast.
    ChatMessage(ChatMessage),
    /// Authoritative world snapshot.
    StateUpdate(StateUpdate),
    /// Heartbeat reply.
    Pong,
    /// A well-formed frame whose `type` is not recognized. Carries the raw
    /// type string for diagnostics only.
    Unknown(String),
}

/// Payload of a `connected` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connected {
    /// Identity assigned to this client for the lifetime of the connection.
    pub player_id: PlayerId,
    /// Server clock at the time of assignment.
    #[serde(default)]
    pub server_time: u64,
}

/// Payload of a `match_found` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchFound {
    /// Server-side match identifier.
    #[serde(default)]
    pub match_id: String,
    /// Mode the match was made for.
    #[serde(default = "default_game_mode")]
    pub game_mode: String,
    /// Players placed in the match.
    #[serde(default)]
    pub players: Vec<PlayerId>,
}

/// Payload of an inbound `chat_message` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Channel the message was posted to.
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Display name of the sender.
    #[serde(default = "default_username")]
    pub username: String,
    /// Message text.
    #[serde(default)]
    pub message: String,
    /// Server timestamp of the message.
    #[serde(default)]
    pub timestamp: u64,
    /// Sender identity.
    #[serde(default)]
    pub player_id: PlayerId,
}

/// Payload of a `state_update` frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StateUpdate {
    /// Server clock when the snapshot was taken.
    pub server_time: u64,
    /// Server simulation tick.
    pub tick: u64,
    /// Full world state.
    pub state: WorldState,
}

/// The `state` object of a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldState {
    /// Every player the server currently knows about, keyed by id.
    pub players: BTreeMap<PlayerId, PlayerSnapshot>,
}

/// Authoritative position of one player. Extra fields are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Grid column.
    pub x: i32,
    /// Grid row.
    pub y: i32,
}

/// Placeholder sender name when a chat frame omits `username`.
pub const DEFAULT_USERNAME: &str = "Unknown";

/// Channel assumed when a chat frame omits `channel`.
pub const DEFAULT_CHANNEL: &str = "global";

/// Game mode assumed when a frame omits `gameMode`.
pub const DEFAULT_GAME_MODE: &str = "default";

fn default_username() -> String {
    DEFAULT_USERNAME.to_string()
}

fn default_channel() -> String {
    DEFAULT_CHANNEL.to_string()
}

fn default_game_mode() -> String {
    DEFAULT_GAME_MODE.to_string()
}

// ---------------------------------------------------------------------------
// Outbound (client → server)
// ---------------------------------------------------------------------------

/// A command the client sends to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundCommand {
    /// Join the matchmaking queue.
    MatchmakingRequest(MatchmakingRequest),
    /// Leave the matchmaking queue. Best-effort: the server may ignore it.
    CancelMatchmaking,
    /// Post a chat message.
    ChatMessage(ChatSend),
    /// A sequenced gameplay intent.
    GameAction(GameAction),
    /// Heartbeat request.
    Ping,
}

/// Body of a `matchmaking_request` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchmakingRequest {
    /// Requested game mode.
    pub game_mode: String,
    /// Minimum players for the match.
    pub min_players: u32,
    /// Maximum players for the match.
    pub max_players: u32,
}

/// Body of an outbound `chat_message` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSend {
    /// Message text.
    pub message: String,
    /// Target channel.
    pub channel: String,
}

/// Kind of gameplay intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    /// Move by a grid delta.
    Move,
    /// Fire in a direction; does not move the player.
    Shoot,
    /// Ask the server to place this player in the world.
    Spawn,
}

/// Direction or displacement attached to a game action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveDelta {
    /// Column delta.
    pub dx: i32,
    /// Row delta.
    pub dy: i32,
}

/// Body of a `game_action` command. Built by the action sequencer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameAction {
    /// What the player wants to do.
    pub action_type: ActionType,
    /// Strictly increasing per session.
    pub action_id: u64,
    /// Client wall clock in Unix milliseconds. Informational only.
    pub timestamp: u64,
    /// Delta for move/shoot; absent for spawn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<MoveDelta>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why an inbound frame could not be decoded. Never fatal to the session.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON, or a known type has an invalid body.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The frame is not a JSON object with a string `type` field.
    #[error("frame has no `type` discriminator")]
    MissingType,

    /// The frame has a `type` this client does not understand.
    #[error("unknown message type `{0}`")]
    UnknownType(String),
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Decode one text frame.
///
/// A frame whose `type` is not recognized decodes to
/// [`InboundMessage::Unknown`] rather than an error, so callers can log the
/// raw type.
pub fn decode_inbound(text: &str) -> Result<InboundMessage, ProtocolError> {
    let envelope: serde_json::Value = serde_json::from_str(text)?;
    let kind = envelope
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or(ProtocolError::MissingType)?;

    let msg = match kind {
        "connected" => InboundMessage::Connected(serde_json::from_str(text)?),
        "match_found" => InboundMessage::MatchFound(serde_json::from_str(text)?),
        "chat_message" => InboundMessage::ChatMessage(serde_json::from_str(text)?),
        "state_update" => InboundMessage::StateUpdate(serde_json::from_str(text)?),
        "pong" => InboundMessage::Pong,
        other => InboundMessage::Unknown(other.to_string()),
    };
    Ok(msg)
}

/// Encode a command as a single JSON text frame.
pub fn encode_command(command: &OutboundCommand) -> Result<String, serde_json::Error> {
    serde_json::to_string(command)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn encoded(command: &OutboundCommand) -> Value {
        serde_json::from_str(&encode_command(command).unwrap()).unwrap()
    }

    #[test]
    fn test_decode_connected() {
        let msg = decode_inbound(r#"{"type":"connected","playerId":7}"#).unwrap();
        assert_eq!(
            msg,
            InboundMessage::Connected(Connected {
                player_id: 7,
                server_time: 0
            })
        );
    }

    #[test]
    fn test_connected_without_player_id_is_malformed() {
        let result = decode_inbound(r#"{"type":"connected"}"#);
        assert!(matches!(result, Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_chat_defaults_apply() {
        let msg = decode_inbound(r#"{"type":"chat_message","message":"hi"}"#).unwrap();
        let InboundMessage::ChatMessage(chat) = msg else {
            panic!("expected chat message");
        };
        assert_eq!(chat.username, DEFAULT_USERNAME);
        assert_eq!(chat.channel, DEFAULT_CHANNEL);
        assert_eq!(chat.message, "hi");
        assert_eq!(chat.player_id, 0);
    }

    #[test]
    fn test_match_found_defaults_apply() {
        let msg = decode_inbound(r#"{"type":"match_found","matchId":"m-1"}"#).unwrap();
        let InboundMessage::MatchFound(found) = msg else {
            panic!("expected match_found");
        };
        assert_eq!(found.match_id, "m-1");
        assert_eq!(found.game_mode, DEFAULT_GAME_MODE);
        assert!(found.players.is_empty());
    }

    #[test]
    fn test_state_update_parses_string_keys_and_ignores_extras() {
        let frame = json!({
            "type": "state_update",
            "serverTime": 1234,
            "tick": 9,
            "state": {
                "players": {
                    "3": { "x": 1, "y": 2, "hp": 100 },
                    "11": { "x": 7, "y": 0 }
                }
            }
        });
        let msg = decode_inbound(&frame.to_string()).unwrap();
        let InboundMessage::StateUpdate(update) = msg else {
            panic!("expected state_update");
        };
        assert_eq!(update.server_time, 1234);
        assert_eq!(update.tick, 9);
        assert_eq!(update.state.players.len(), 2);
        assert_eq!(update.state.players[&3], PlayerSnapshot { x: 1, y: 2 });
        assert_eq!(update.state.players[&11], PlayerSnapshot { x: 7, y: 0 });
    }

    #[test]
    fn test_state_update_without_state_is_empty_snapshot() {
        let msg = decode_inbound(r#"{"type":"state_update"}"#).unwrap();
        assert_eq!(msg, InboundMessage::StateUpdate(StateUpdate::default()));
    }

    #[test]
    fn test_state_update_with_non_numeric_id_is_malformed() {
        let result =
            decode_inbound(r#"{"type":"state_update","state":{"players":{"abc":{"x":0,"y":0}}}}"#);
        assert!(matches!(result, Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_pong_and_unknown() {
        assert_eq!(decode_inbound(r#"{"type":"pong"}"#).unwrap(), InboundMessage::Pong);
        assert_eq!(
            decode_inbound(r#"{"type":"leaderboard","rows":[]}"#).unwrap(),
            InboundMessage::Unknown("leaderboard".to_string())
        );
    }

    #[test]
    fn test_garbage_and_missing_type_rejected() {
        assert!(matches!(
            decode_inbound("not json at all"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            decode_inbound("[1,2,3]"),
            Err(ProtocolError::MissingType)
        ));
        assert!(matches!(
            decode_inbound(r#"{"playerId":7}"#),
            Err(ProtocolError::MissingType)
        ));
        assert!(matches!(
            decode_inbound(r#"{"type":42}"#),
            Err(ProtocolError::MissingType)
        ));
    }

    #[test]
    fn test_game_action_wire_shape() {
        let command = OutboundCommand::GameAction(GameAction {
            action_type: ActionType::Move,
            action_id: 3,
            timestamp: 1_700_000_000_000,
            data: Some(MoveDelta { dx: 1, dy: 0 }),
        });
        assert_eq!(
            encoded(&command),
            json!({
                "type": "game_action",
                "actionType": "move",
                "actionId": 3,
                "timestamp": 1_700_000_000_000u64,
                "data": { "dx": 1, "dy": 0 }
            })
        );
    }

    #[test]
    fn test_spawn_omits_data() {
        let command = OutboundCommand::GameAction(GameAction {
            action_type: ActionType::Spawn,
            action_id: 1,
            timestamp: 0,
            data: None,
        });
        let value = encoded(&command);
        assert_eq!(value["actionType"], "spawn");
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_unit_commands_carry_only_type() {
        assert_eq!(encoded(&OutboundCommand::Ping), json!({ "type": "ping" }));
        assert_eq!(
            encoded(&OutboundCommand::CancelMatchmaking),
            json!({ "type": "cancel_matchmaking" })
        );
    }

    #[test]
    fn test_matchmaking_and_chat_wire_shape() {
        let request = OutboundCommand::MatchmakingRequest(MatchmakingRequest {
            game_mode: "ranked".to_string(),
            min_players: 2,
            max_players: 4,
        });
        assert_eq!(
            encoded(&request),
            json!({
                "type": "matchmaking_request",
                "gameMode": "ranked",
                "minPlayers": 2,
                "maxPlayers": 4
            })
        );

        let chat = OutboundCommand::ChatMessage(ChatSend {
            message: "gg".to_string(),
            channel: "global".to_string(),
        });
        assert_eq!(
            encoded(&chat),
            json!({ "type": "chat_message", "message": "gg", "channel": "global" })
        );
    }
}
