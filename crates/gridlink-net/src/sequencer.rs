//! Action sequencing: ids and timestamps for outgoing game actions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::messages::{ActionType, GameAction, MoveDelta};

/// Hands out strictly increasing action ids, starting at 1 for each session.
///
/// The id comes from a counter, never the clock, so it stays monotonic when
/// the wall clock jumps. The timestamp is informational.
#[derive(Debug)]
pub struct ActionSequencer {
    next_id: AtomicU64,
}

impl ActionSequencer {
    /// Create a sequencer whose first id is 1.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    /// Build a [`GameAction`] with the next id and the current wall-clock time.
    pub fn stamp(&self, action_type: ActionType, data: Option<MoveDelta>) -> GameAction {
        let action_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        GameAction {
            action_type,
            action_id,
            timestamp: unix_millis(),
            data,
        }
    }

    /// The most recently issued id, or 0 if none was issued this session.
    pub fn last_issued(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed) - 1
    }

    /// Restart numbering at 1.
    pub fn reset(&self) {
        self.next_id.store(1, Ordering::Relaxed);
    }
}

impl Default for ActionSequencer {
    fn default() -> Self {
        Self::new()
    }
}

/// Milliseconds since the Unix epoch; 0 if the clock is before the epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
