//! Error types for the planning engine.
//!
//! Two layers:
//! - [`EngineError`] rejects a whole invocation (bad input, bad config, or an
//!   engine bug).
//! - [`FailureReason`] marks a single occurrence that could not be placed. These
//!   never abort a run; they end up in [`crate::Schedule::unplaceable`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A task failed semantic validation.
    #[error("malformed task '{task}': {reason}")]
    MalformedTask { task: String, reason: String },

    /// Engine configuration is unusable.
    #[error("invalid engine config: {0}")]
    InvalidConfig(String),

    /// Invariant violation inside the engine (e.g. overlapping occupancy).
    #[error("internal engine error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn malformed(task: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedTask {
            task: task.into(),
            reason: reason.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Why a single occurrence ended up unplaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The habit period could not supply enough anchors for `times_per`.
    Underspecified,
    /// The fixed interval is held by a strictly higher-priority occupant.
    SlotConflict,
    /// No free interval inside the request's bounds.
    NoFeasibleSlot,
    /// Scanning ran off the end of the planning horizon.
    HorizonExhausted,
    /// Evicted once and could not be placed again.
    DisplacedNoAlternative,
}

impl FailureReason {
    pub fn code(self) -> &'static str {
        match self {
            FailureReason::Underspecified => "underspecified",
            FailureReason::SlotConflict => "slot_conflict",
            FailureReason::NoFeasibleSlot => "no_feasible_slot",
            FailureReason::HorizonExhausted => "horizon_exhausted",
            FailureReason::DisplacedNoAlternative => "displaced_no_alternative",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
