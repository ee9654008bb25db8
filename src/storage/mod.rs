//! Storage module for job lifecycle state
//!
//! This module handles everything the scheduler persists:
//! - Job descriptors read from the queue directory
//! - Status records with monotonic state transitions
//! - A plain-file backend and a SQLite backend behind one trait

mod files;
mod schema;
mod sqlite;
mod traits;

pub use files::FsJobStore;
pub use sqlite::SqliteJobStore;
pub use traits::{JobStore, StorageError, StorageResult};

use crate::config::{JobsConfig, StoreBackend};
use crate::output::StatsRecord;
use crate::state::JobState;
use crate::HarvestError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Opens the job store selected by the configuration
///
/// # Arguments
///
/// * `config` - The `[jobs]` section of the configuration
///
/// # Returns
///
/// * `Ok(Arc<dyn JobStore>)` - Store ready for scanning
/// * `Err(HarvestError)` - Directories or database could not be opened
pub fn open_job_store(config: &JobsConfig) -> Result<Arc<dyn JobStore>, HarvestError> {
    match config.backend {
        StoreBackend::Files => {
            let store = FsJobStore::new(&config.queue_dir, &config.status_dir)?;
            Ok(Arc::new(store))
        }
        StoreBackend::Sqlite => {
            let path = config.database_path.as_deref().ok_or_else(|| {
                crate::ConfigError::Validation(
                    "jobs.database-path is required for the sqlite backend".to_string(),
                )
            })?;
            let store = SqliteJobStore::new(path, Some(&config.queue_dir))?;
            Ok(Arc::new(store))
        }
    }
}

/// Reads every descriptor in the queue directory, sorted by job id
///
/// Files that do not match `job_*.json`, or whose id ends in `_stats`, are
/// ignored. Malformed descriptors are logged and skipped.
pub fn scan_queue_dir(queue_dir: &Path) -> StorageResult<Vec<JobDescriptor>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(queue_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let is_descriptor = name
            .to_str()
            .and_then(JobDescriptor::job_id_from_file_name)
            .is_some();
        if is_descriptor && entry.file_type()?.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();

    let mut descriptors = Vec::with_capacity(paths.len());
    for path in paths {
        match JobDescriptor::from_file(&path) {
            Ok(descriptor) => descriptors.push(descriptor),
            Err(e) => tracing::warn!("Skipping descriptor {}: {}", path.display(), e),
        }
    }
    Ok(descriptors)
}

/// A unit of work found in the queue directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    /// File stem of the descriptor, e.g. `job_42`
    pub job_id: String,

    /// Feed-source identifier, e.g. `r/pics`
    pub target: String,
}

#[derive(Deserialize)]
struct DescriptorBody {
    target: String,
}

impl JobDescriptor {
    /// Returns the job id if the file name looks like a descriptor
    ///
    /// Descriptors are named `job_<anything>.json`. Ids ending in `_stats`
    /// are refused; their status file would collide with another job's stats
    /// file.
    pub fn job_id_from_file_name(name: &str) -> Option<&str> {
        let stem = name.strip_suffix(".json")?;
        if stem.starts_with("job_") && stem.len() > "job_".len() && !stem.ends_with("_stats") {
            Some(stem)
        } else {
            None
        }
    }

    /// Reads a descriptor file
    ///
    /// Unknown fields in the body are ignored. The target must be non-empty.
    pub fn from_file(path: &Path) -> StorageResult<Self> {
        let invalid = |message: String| StorageError::InvalidDescriptor {
            path: path.to_path_buf(),
            message,
        };

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| invalid("file name is not valid UTF-8".to_string()))?;
        let job_id = Self::job_id_from_file_name(name)
            .ok_or_else(|| invalid("file name must match job_*.json".to_string()))?;

        let bytes = fs::read(path)?;
        let body: DescriptorBody =
            serde_json::from_slice(&bytes).map_err(|e| invalid(e.to_string()))?;

        let target = body.target.trim();
        if target.is_empty() {
            return Err(invalid("target is empty".to_string()));
        }

        Ok(Self {
            job_id: job_id.to_string(),
            target: target.to_string(),
        })
    }
}

/// The scheduler-visible state of one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub job_id: String,
    pub state: JobState,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusRecord {
    /// A fresh running record, written when a job is claimed
    pub fn running(job_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            job_id: job_id.to_string(),
            state: JobState::Running,
            updated_at: now,
            stats: None,
            error: None,
        }
    }

    /// Applies a terminal outcome to a running record
    pub fn finish(
        &self,
        stats: &StatsRecord,
        outcome: &JobOutcome,
        now: DateTime<Utc>,
    ) -> StorageResult<Self> {
        let next = outcome.state();
        if !self.state.can_transition_to(next) {
            return Err(StorageError::InvalidTransition {
                job_id: self.job_id.clone(),
                from: self.state,
                to: next,
            });
        }

        Ok(Self {
            job_id: self.job_id.clone(),
            state: next,
            updated_at: now,
            stats: Some(stats.clone()),
            error: outcome.error().map(str::to_string),
        })
    }
}

/// How a job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed { error: String },
}

impl JobOutcome {
    /// Decides the outcome from the run statistics alone
    pub fn from_stats(stats: &StatsRecord) -> Self {
        if stats.is_success() {
            Self::Completed
        } else {
            Self::Failed {
                error: HarvestError::ZeroYield.to_string(),
            }
        }
    }

    /// A failure caused by something other than the run's yield
    pub fn infrastructure(error: impl ToString) -> Self {
        Self::Failed {
            error: error.to_string(),
        }
    }

    pub fn state(&self) -> JobState {
        match self {
            Self::Completed => JobState::Completed,
            Self::Failed { .. } => JobState::Failed,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Completed => None,
            Self::Failed { error } => Some(error),
        }
    }
}
