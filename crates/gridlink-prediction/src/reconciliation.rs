//! Server reconciliation: merge authoritative snapshots into local state.
//!
//! The [`PredictionEngine`] owns the player map and the local prediction.
//! Each snapshot removes players the server no longer reports, adopts the
//! server position for everyone else, and corrects the local player only
//! when it has drifted past the threshold.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::prediction::{InputRejected, LocalPrediction, PredictionSettings};
use crate::world::{PlayerId, Position, WorldBounds};

// ---------------------------------------------------------------------------
// PlayerState
// ---------------------------------------------------------------------------

/// Rendered state of one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Server-assigned id.
    pub id: PlayerId,
    /// Position on the grid. Always within world bounds.
    pub position: Position,
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// What happened to the local player during a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfCorrection {
    /// No local player id is known yet.
    Unassigned,
    /// The snapshot does not mention the local player.
    Absent,
    /// First snapshot containing the local player; its position was adopted.
    FirstSighting {
        /// Adopted position.
        position: Position,
    },
    /// Prediction kept; the server was within the drift threshold.
    Trusted {
        /// Manhattan distance between prediction and server.
        drift: u32,
    },
    /// Prediction replaced by the server position.
    Snapped {
        /// Predicted position before the snap.
        from: Position,
        /// Server position.
        to: Position,
    },
}

/// Summary of one [`PredictionEngine::reconcile`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Players dropped because the snapshot no longer lists them.
    pub removed: Vec<PlayerId>,
    /// Players seen for the first time.
    pub added: Vec<PlayerId>,
    /// Snapshot entries ignored for lying outside the world.
    pub out_of_bounds: Vec<PlayerId>,
    /// Outcome for the local player.
    pub self_correction: SelfCorrection,
}

// ---------------------------------------------------------------------------
// PredictionEngine
// ---------------------------------------------------------------------------

/// Sole owner of the player map and the local prediction.
#[derive(Debug, Clone)]
pub struct PredictionEngine {
    bounds: WorldBounds,
    local: LocalPrediction,
    self_id: Option<PlayerId>,
    self_sighted: bool,
    players: BTreeMap<PlayerId, PlayerState>,
}

impl PredictionEngine {
    /// Create an empty engine.
    pub fn new(settings: PredictionSettings) -> Self {
        Self {
            bounds: settings.bounds,
            local: LocalPrediction::new(settings.drift_threshold, settings.debounce),
            self_id: None,
            self_sighted: false,
            players: BTreeMap::new(),
        }
    }

    /// Set the id of the local player. Its next appearance in a snapshot is
    /// adopted as-is.
    pub fn set_self(&mut self, id: PlayerId) {
        if self.self_id != Some(id) {
            tracing::debug!(id, "local player id set");
            self.self_id = Some(id);
            self.self_sighted = false;
        }
    }

    /// Id of the local player, if known.
    pub fn self_id(&self) -> Option<PlayerId> {
        self.self_id
    }

    /// Apply a movement intent optimistically.
    ///
    /// Checks the debounce first, then the bounds. On success the predicted
    /// position moves, along with the rendered local player if a snapshot
    /// has reported it, and the new position is returned; on rejection
    /// nothing changes.
    pub fn apply_move(&mut self, dx: i32, dy: i32, now: Instant) -> Result<Position, InputRejected> {
        self.local.check_debounce(now)?;
        let target = self.local.candidate(dx, dy, &self.bounds).inspect_err(|e| {
            tracing::warn!(error = %e, "move rejected");
        })?;

        self.local.record_input(now);
        self.local.predicted_position = target;
        // Entries come from snapshots only; an unsighted local player stays unrendered.
        if let Some(p) = self.self_id.and_then(|id| self.players.get_mut(&id)) {
            p.position = target;
        }
        Ok(target)
    }

    /// Accept a shoot intent. Subject to the debounce; never moves anyone.
    pub fn apply_shoot(&mut self, now: Instant) -> Result<(), InputRejected> {
        self.local.check_debounce(now)?;
        self.local.record_input(now);
        Ok(())
    }

    /// Merge an authoritative snapshot.
    pub fn reconcile<I>(&mut self, snapshot: I) -> ReconcileReport
    where
        I: IntoIterator<Item = (PlayerId, Position)>,
    {
        let snapshot: BTreeMap<PlayerId, Position> = snapshot.into_iter().collect();

        let removed: Vec<PlayerId> = self
            .players
            .keys()
            .filter(|id| !snapshot.contains_key(id))
            .copied()
            .collect();
        for id in &removed {
            self.players.remove(id);
        }

        let mut report = ReconcileReport {
            removed,
            added: Vec::new(),
            out_of_bounds: Vec::new(),
            self_correction: match self.self_id {
                Some(_) => SelfCorrection::Absent,
                None => SelfCorrection::Unassigned,
            },
        };

        for (id, position) in snapshot {
            if !self.bounds.contains(position) {
                tracing::warn!(id, %position, "snapshot position outside world, ignored");
                report.out_of_bounds.push(id);
                continue;
            }
            if !self.players.contains_key(&id) {
                report.added.push(id);
            }

            let rendered = if Some(id) == self.self_id {
                let correction = self.correct_self(position);
                report.self_correction = correction;
                self.local.predicted_position
            } else {
                position
            };
            self.players.insert(
                id,
                PlayerState {
                    id,
                    position: rendered,
                },
            );
        }

        report
    }

    fn correct_self(&mut self, server: Position) -> SelfCorrection {
        if !self.self_sighted {
            self.self_sighted = true;
            self.local.predicted_position = server;
            tracing::debug!(%server, "local player first seen");
            return SelfCorrection::FirstSighting { position: server };
        }

        let from = self.local.predicted_position;
        if self.local.exceeds_drift(server) {
            self.local.predicted_position = server;
            tracing::debug!(%from, to = %server, "prediction snapped to server");
            SelfCorrection::Snapped { from, to: server }
        } else {
            SelfCorrection::Trusted {
                drift: from.manhattan_distance(server),
            }
        }
    }

    /// All tracked players, ordered by id.
    pub fn players(&self) -> impl Iterator<Item = &PlayerState> {
        self.players.values()
    }

    /// Number of tracked players.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// One tracked player.
    pub fn player(&self, id: PlayerId) -> Option<&PlayerState> {
        self.players.get(&id)
    }

    /// Rendered position of the local player, if it is on the map.
    pub fn self_position(&self) -> Option<Position> {
        self.self_id
            .and_then(|id| self.players.get(&id))
            .map(|p| p.position)
    }

    /// Predicted position of the local player.
    pub fn predicted_position(&self) -> Position {
        self.local.predicted_position
    }

    /// Local prediction state.
    pub fn local(&self) -> &LocalPrediction {
        &self.local
    }

    /// World bounds.
    pub fn bounds(&self) -> WorldBounds {
        self.bounds
    }

    /// Forget everything. Called when the session ends.
    pub fn reset(&mut self) {
        self.players.clear();
        self.local.reset();
        self.self_id = None;
        self.self_sighted = false;
    }
}

impl Default for PredictionEngine {
    fn default() -> Self {
        Self::new(PredictionSettings::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
