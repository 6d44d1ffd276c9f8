//! Game actions and the read-only view of the world.

use std::time::Instant;

use gridlink_net::{ActionType, Connector, GameAction, MoveDelta, SessionError};
use gridlink_prediction::{PlayerState, Position};

use crate::client::GameServerClient;
use crate::error::ClientError;

/// Game actions with local prediction, plus a read-only view of the
/// players the engine tracks.
pub struct GameStateApi<'a, C: Connector> {
    client: &'a GameServerClient<C>,
}

impl<'a, C: Connector> GameStateApi<'a, C> {
    pub(crate) fn new(client: &'a GameServerClient<C>) -> Self {
        Self { client }
    }

    fn ensure_connected(&self) -> Result<(), ClientError> {
        if self.client.is_connected() {
            Ok(())
        } else {
            Err(SessionError::NotConnected.into())
        }
    }

    /// Ask the server to place the local player. Not debounced and does not
    /// touch the prediction.
    pub fn spawn(&self) -> Result<GameAction, ClientError> {
        Ok(self
            .client
            .session
            .send_game_action(ActionType::Spawn, None)?)
    }

    /// Move by `(dx, dy)`.
    ///
    /// The move is applied locally first and then sent, both under the
    /// engine lock. A debounced or out-of-bounds move changes nothing and
    /// is not sent; a move that cannot be sent is rolled back.
    pub fn move_by(&self, dx: i32, dy: i32) -> Result<GameAction, ClientError> {
        let mut engine = self.client.engine.lock();
        self.ensure_connected()?;
        let before = engine.clone();
        let target = engine.apply_move(dx, dy, Instant::now())?;
        tracing::trace!(%target, "move predicted");
        self.client
            .session
            .send_game_action(ActionType::Move, Some(MoveDelta { dx, dy }))
            .map_err(|e| {
                *engine = before;
                e.into()
            })
    }

    /// Shoot in direction `(dx, dy)`. Shares the move debounce.
    pub fn shoot(&self, dx: i32, dy: i32) -> Result<GameAction, ClientError> {
        let mut engine = self.client.engine.lock();
        self.ensure_connected()?;
        let before = engine.clone();
        engine.apply_shoot(Instant::now())?;
        self.client
            .session
            .send_game_action(ActionType::Shoot, Some(MoveDelta { dx, dy }))
            .map_err(|e| {
                *engine = before;
                e.into()
            })
    }

    /// Every tracked player, ordered by id.
    pub fn players(&self) -> Vec<PlayerState> {
        self.client.engine.lock().players().copied().collect()
    }

    /// Rendered position of the local player.
    pub fn self_position(&self) -> Option<Position> {
        self.client.engine.lock().self_position()
    }

    /// Predicted position of the local player.
    pub fn predicted_position(&self) -> Position {
        self.client.engine.lock().predicted_position()
    }
}
