//! Stage status enum.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle status of a stage within one run.
///
/// A run walks every stage through `idle → active → thinking → complete`.
/// A stage whose completion call failed still ends in `Complete`; the
/// degraded flag on the state is orthogonal to this status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Not started in this run.
    Idle,
    /// Gathering upstream inputs.
    Active,
    /// Waiting on the completion call.
    Thinking,
    /// Result merged into the run state.
    Complete,
}

impl Default for StageStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Active => write!(f, "active"),
            Self::Thinking => write!(f, "thinking"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

impl StageStatus {
    /// Returns the status that follows this one, if any.
    #[must_use]
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::Active),
            Self::Active => Some(Self::Thinking),
            Self::Thinking => Some(Self::Complete),
            Self::Complete => None,
        }
    }

    /// Returns true if moving to `target` keeps the status monotonic.
    ///
    /// Only the same status or the immediate successor is allowed.
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        *self == target || self.next() == Some(target)
    }

    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Returns true while the stage is doing work.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Active | Self::Thinking)
    }
}
