//! Client-side prediction: immediate local application of player inputs.
//!
//! The client moves its own player as soon as an input is accepted, without
//! waiting for the server. [`LocalPrediction`] holds the predicted position
//! and enforces the input debounce; bounds are checked against
//! [`WorldBounds`] before anything changes.

use std::time::{Duration, Instant};

use crate::world::{DEFAULT_WORLD_SIZE, Position, WorldBounds};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Reference drift threshold (Manhattan distance in cells).
pub const DEFAULT_DRIFT_THRESHOLD: u32 = 1;

/// Reference minimum interval between accepted inputs.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Settings and errors
// ---------------------------------------------------------------------------

/// Tunables for prediction and reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictionSettings {
    /// Playable area.
    pub bounds: WorldBounds,
    /// Largest self drift tolerated before snapping to the server.
    pub drift_threshold: u32,
    /// Minimum interval between accepted inputs.
    pub debounce: Duration,
}

impl Default for PredictionSettings {
    fn default() -> Self {
        Self {
            bounds: WorldBounds::new(DEFAULT_WORLD_SIZE),
            drift_threshold: DEFAULT_DRIFT_THRESHOLD,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Why a local input was dropped. Nothing is mutated or sent in either case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InputRejected {
    /// Arrived within the debounce interval of the last accepted input.
    #[error("input arrived within the debounce interval")]
    Debounced,

    /// The move would leave the world.
    #[error("move from {from} by ({dx}, {dy}) leaves the world")]
    OutOfBounds {
        /// Position before the move.
        from: Position,
        /// Requested column delta.
        dx: i32,
        /// Requested row delta.
        dy: i32,
    },
}

// ---------------------------------------------------------------------------
// LocalPrediction
// ---------------------------------------------------------------------------

/// Predicted state of the local player.
#[derive(Debug, Clone)]
pub struct LocalPrediction {
    /// Where the local player is rendered.
    pub predicted_position: Position,
    /// Manhattan distance tolerated before snapping to the server.
    pub drift_threshold: u32,
    debounce: Duration,
    last_applied_input_at: Option<Instant>,
}

impl LocalPrediction {
    /// Start at the origin with no input history.
    pub fn new(drift_threshold: u32, debounce: Duration) -> Self {
        Self {
            predicted_position: Position::default(),
            drift_threshold,
            debounce,
            last_applied_input_at: None,
        }
    }

    /// Fails with [`InputRejected::Debounced`] if `now` is too close to the
    /// last accepted input.
    pub fn check_debounce(&self, now: Instant) -> Result<(), InputRejected> {
        match self.last_applied_input_at {
            Some(last) if now.saturating_duration_since(last) < self.debounce => {
                Err(InputRejected::Debounced)
            }
            _ => Ok(()),
        }
    }

    /// Mark an input as accepted at `now`.
    pub fn record_input(&mut self, now: Instant) {
        self.last_applied_input_at = Some(now);
    }

    /// When the last input was accepted.
    pub fn last_applied_input_at(&self) -> Option<Instant> {
        self.last_applied_input_at
    }

    /// Validate a move and return the candidate position without applying it.
    pub fn candidate(
        &self,
        dx: i32,
        dy: i32,
        bounds: &WorldBounds,
    ) -> Result<Position, InputRejected> {
        let from = self.predicted_position;
        from.offset(dx, dy)
            .filter(|pos| bounds.contains(*pos))
            .ok_or(InputRejected::OutOfBounds { from, dx, dy })
    }

    /// Whether `server` is far enough from the prediction to force a snap.
    pub fn exceeds_drift(&self, server: Position) -> bool {
        self.predicted_position.manhattan_distance(server) > self.drift_threshold
    }

    /// Back to the origin with no input history.
    pub fn reset(&mut self) {
        self.predicted_position = Position::default();
        self.last_applied_input_at = None;
    }
}

impl Default for LocalPrediction {
    fn default() -> Self {
        Self::new(DEFAULT_DRIFT_THRESHOLD, DEFAULT_DEBOUNCE)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_input_never_debounced() {
        let local = LocalPrediction::default();
        assert!(local.check_debounce(Instant::now()).is_ok());
    }

    #[test]
    fn test_debounce_window() {
        let mut local = LocalPrediction::default();
        let t0 = Instant::now();
        local.record_input(t0);

        assert_eq!(
            local.check_debounce(t0 + Duration::from_millis(10)),
            Err(InputRejected::Debounced)
        );
        assert_eq!(
            local.check_debounce(t0 + Duration::from_millis(49)),
            Err(InputRejected::Debounced)
        );
        assert!(local.check_debounce(t0 + Duration::from_millis(50)).is_ok());
    }

    #[test]
    fn test_zero_debounce_accepts_everything() {
        let mut local = LocalPrediction::new(1, Duration::ZERO);
        let t0 = Instant::now();
        local.record_input(t0);
        assert!(local.check_debounce(t0).is_ok());
    }

    #[test]
    fn test_candidate_respects_bounds() {
        let bounds = WorldBounds::default();
        let mut local = LocalPrediction::default();
        local.predicted_position = Position::new(7, 7);

        assert_eq!(
            local.candidate(1, 0, &bounds),
            Err(InputRejected::OutOfBounds {
                from: Position::new(7, 7),
                dx: 1,
                dy: 0,
            })
        );
        assert_eq!(local.candidate(-1, 0, &bounds), Ok(Position::new(6, 7)));
        // Candidate does not apply.
        assert_eq!(local.predicted_position, Position::new(7, 7));
    }

    #[test]
    fn test_drift_threshold() {
        let mut local = LocalPrediction::default();
        local.predicted_position = Position::new(5, 5);
        assert!(!local.exceeds_drift(Position::new(5, 6)));
        assert!(!local.exceeds_drift(Position::new(5, 5)));
        assert!(local.exceeds_drift(Position::new(3, 3)));
        assert!(local.exceeds_drift(Position::new(6, 6)));
    }
}
