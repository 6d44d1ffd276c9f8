//! Client-side prediction and server reconciliation on a bounded 2-D grid.
//!
//! Runs synchronously; the caller serializes access (the client keeps the
//! engine behind a mutex).

pub mod prediction;
pub mod reconciliation;
pub mod world;

pub use prediction::{
    DEFAULT_DEBOUNCE, DEFAULT_DRIFT_THRESHOLD, InputRejected, LocalPrediction, PredictionSettings,
};
pub use reconciliation::{PlayerState, PredictionEngine, ReconcileReport, SelfCorrection};
pub use world::{DEFAULT_WORLD_SIZE, PlayerId, Position, WorldBounds};
