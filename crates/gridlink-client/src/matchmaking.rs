use gridlink_net::{Connector, MatchmakingRequest, OutboundCommand};

use crate::client::GameServerClient;
use crate::error::ClientError;

/// Matchmaking requests. Results arrive as
/// [`SessionEvent::MatchFound`](gridlink_net::SessionEvent::MatchFound).
pub struct MatchmakingApi<'a, C: Connector> {
    client: &'a GameServerClient<C>,
}

impl<'a, C: Connector> MatchmakingApi<'a, C> {
    pub(crate) fn new(client: &'a GameServerClient<C>) -> Self {
        Self { client }
    }

    /// Queue with the configured game mode and player limits.
    pub fn queue_for_match(&self) -> Result<(), ClientError> {
        let defaults = &self.client.config.matchmaking;
        self.queue_for_mode(&defaults.game_mode, defaults.min_players, defaults.max_players)
    }

    /// Queue for a specific game mode.
    pub fn queue_for_mode(
        &self,
        game_mode: &str,
        min_players: u32,
        max_players: u32,
    ) -> Result<(), ClientError> {
        tracing::info!(game_mode, min_players, max_players, "queueing for match");
        self.client
            .session
            .send(&OutboundCommand::MatchmakingRequest(MatchmakingRequest {
                game_mode: game_mode.to_string(),
                min_players,
                max_players,
            }))?;
        Ok(())
    }

    /// Ask the server to drop this client from the queue. The server may
    /// ignore it; a match can still be found afterwards.
    pub fn cancel(&self) -> Result<(), ClientError> {
        self.client.session.send(&OutboundCommand::CancelMatchmaking)?;
        Ok(())
    }
}
