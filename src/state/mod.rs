//! State module for tracking job and walk progress
//!
//! # Components
//!
//! - `JobState`: lifecycle of a job (pending, running, completed, failed)
//! - `WalkState`: pagination progress of one feed walk

mod job_state;
mod walk_state;

// Re-export main types
pub use job_state::JobState;
pub use walk_state::WalkState;
