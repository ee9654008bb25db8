/// Job state definitions for tracking a job's lifecycle
///
/// This module defines every state a job can be in and the transitions
/// allowed between them.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the current state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    // ===== Active States =====
    /// Descriptor is in the queue and has not been claimed
    Pending,

    /// A pipeline is running for this job
    Running,

    // ===== Terminal States =====
    /// The pipeline downloaded at least one media file
    Completed,

    /// The pipeline produced nothing, or could not run
    Failed,
}

impl JobState {
    /// Returns true if this is a terminal state (never revisited)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if a scheduler scan must skip a job in this state
    ///
    /// Running jobs are skipped as well: the status record doubles as an
    /// advisory lock.
    pub fn blocks_dispatch(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns true if moving from `self` to `next` is allowed
    ///
    /// Transitions are monotonic: pending → running → {completed | failed}.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }

    /// Converts the job state to its persisted string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a job state from its persisted string representation
    ///
    /// Returns None if the string doesn't match any known state.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible job states
    pub fn all_states() -> Vec<Self> {
        vec![Self::Pending, Self::Running, Self::Completed, Self::Failed]
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
