//! High-level game server client.
//!
//! [`GameServerClient`] pairs a network session with a prediction engine and
//! exposes the matchmaking, chat and game-state APIs on top of them.

mod chat;
mod client;
mod error;
mod game_state;
mod matchmaking;

pub use chat::ChatApi;
pub use client::{GameServerClient, prediction_settings, session_options};
pub use error::ClientError;
pub use game_state::GameStateApi;
pub use matchmaking::MatchmakingApi;

pub use gridlink_net::{
    ConnectionState, DisconnectReason, EventTag, PlayerId, SessionEvent, SessionFault,
};
pub use gridlink_prediction::{InputRejected, PlayerState, Position};
