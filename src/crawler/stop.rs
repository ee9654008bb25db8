//! Walk termination predicates
//!
//! Besides running out of cursors, a walk ends when any configured
//! [`StopCondition`] fires. Conditions are checked at page boundaries, after
//! the previous page has been recorded and before the next request.
//!
//! - [`EmptyPageLimit`] fires after N consecutive pages without posts
//! - [`IdleTimeout`] fires when no media was fetched for too long

use crate::config::StopConfig;
use crate::state::WalkState;
use std::fmt;
use std::time::{Duration, Instant};

/// Why a walk ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The source returned a non-empty page without a cursor
    EndOfFeed,

    /// Too many consecutive empty pages
    EmptyPageLimit(u32),

    /// No successful media fetch within the ceiling
    IdleTimeout(Duration),

    /// Non-success status, transport error or undecodable page
    SourceError(String),

    /// Shutdown was requested
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndOfFeed => write!(f, "end of feed"),
            Self::EmptyPageLimit(n) => write!(f, "{} consecutive empty pages", n),
            Self::IdleTimeout(d) => write!(f, "idle for {}s", d.as_secs()),
            Self::SourceError(e) => write!(f, "feed source error: {}", e),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A predicate over walk progress that can end the walk
pub trait StopCondition: Send + Sync {
    /// Returns a reason if the walk must stop now
    fn check(&self, state: &WalkState, now: Instant) -> Option<StopReason>;
}

/// Stops after `limit` consecutive empty pages
#[derive(Debug, Clone, Copy)]
pub struct EmptyPageLimit {
    limit: u32,
}

impl EmptyPageLimit {
    pub fn new(limit: u32) -> Self {
        Self { limit }
    }
}

impl StopCondition for EmptyPageLimit {
    fn check(&self, state: &WalkState, _now: Instant) -> Option<StopReason> {
        (state.consecutive_empty_pages >= self.limit)
            .then_some(StopReason::EmptyPageLimit(state.consecutive_empty_pages))
    }
}

/// Stops when nothing was fetched successfully for `ceiling`
#[derive(Debug, Clone, Copy)]
pub struct IdleTimeout {
    ceiling: Duration,
}

impl IdleTimeout {
    pub fn new(ceiling: Duration) -> Self {
        Self { ceiling }
    }
}

impl StopCondition for IdleTimeout {
    fn check(&self, state: &WalkState, now: Instant) -> Option<StopReason> {
        (state.idle_for(now) >= self.ceiling).then_some(StopReason::IdleTimeout(self.ceiling))
    }
}

/// Builds the configured conditions
///
/// The empty-page limit is always present; the idle ceiling only when set.
pub fn conditions_from_config(config: &StopConfig) -> Vec<Box<dyn StopCondition>> {
    let mut conditions: Vec<Box<dyn StopCondition>> =
        vec![Box::new(EmptyPageLimit::new(config.empty_page_limit))];

    if let Some(secs) = config.idle_timeout_secs {
        conditions.push(Box::new(IdleTimeout::new(Duration::from_secs(secs))));
    }

    conditions
}

/// Returns the first condition that fires, in configuration order
pub fn first_triggered(
    conditions: &[Box<dyn StopCondition>],
    state: &WalkState,
    now: Instant,
) -> Option<StopReason> {
    conditions.iter().find_map(|c| c.check(state, now))
}
