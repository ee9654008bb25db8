//! Job store trait and error types
//!
//! This module defines the interface the scheduler uses to discover, claim
//! and finish jobs, independent of where job state is kept.

use crate::output::StatsRecord;
use crate::state::JobState;
use crate::storage::{JobDescriptor, JobOutcome, StatusRecord};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during job store operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Invalid state transition for {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: JobState,
        to: JobState,
    },

    #[error("Invalid job descriptor {path}: {message}")]
    InvalidDescriptor { path: PathBuf, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for job store operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for job store backends
///
/// The store owns every status record. Implementations must make
/// [`JobStore::try_claim`] an atomic compare-and-swap from pending to running
/// so that a job is never dispatched twice.
pub trait JobStore: Send + Sync {
    /// Lists jobs that have no status yet or are still pending
    ///
    /// Jobs whose status is running, completed or failed are never returned.
    fn list_pending(&self) -> StorageResult<Vec<JobDescriptor>>;

    /// Atomically moves a job from pending to running
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The caller now owns the job
    /// * `Ok(false)` - Someone else claimed it, or it already finished
    fn try_claim(&self, job_id: &str) -> StorageResult<bool>;

    /// Moves a running job to its terminal state
    ///
    /// Fails with [`StorageError::InvalidTransition`] if the job is not running.
    fn record_result(
        &self,
        job_id: &str,
        stats: &StatsRecord,
        outcome: &JobOutcome,
    ) -> StorageResult<()>;

    /// Gets the status record for a job, if one exists
    fn get_status(&self, job_id: &str) -> StorageResult<Option<StatusRecord>>;

    /// Gets every status record, ordered by job id
    fn list_statuses(&self) -> StorageResult<Vec<StatusRecord>>;

    /// Human-readable backend name for logging
    fn name(&self) -> &'static str;
}
