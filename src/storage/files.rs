//! Plain-file job store
//!
//! Descriptors are read from the queue directory; each job's status lives in
//! `<status_dir>/<job_id>.json` and is replaced atomically on every transition.

use crate::output::{read_json, write_json_atomic, StatsRecord};
use crate::storage::traits::{JobStore, StorageError, StorageResult};
use crate::storage::{scan_queue_dir, JobDescriptor, JobOutcome, StatusRecord};
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Job store backed by the queue and status directories
///
/// A claim creates `<status_dir>/<job_id>.claim` with `create_new`, so only one
/// store wins a job even when several processes share the directories. The
/// marker is never removed; a job is claimed at most once.
pub struct FsJobStore {
    queue_dir: PathBuf,
    status_dir: PathBuf,
    lock: Mutex<()>,
}

impl FsJobStore {
    /// Creates the store, creating both directories if needed
    pub fn new(queue_dir: &Path, status_dir: &Path) -> StorageResult<Self> {
        fs::create_dir_all(queue_dir)?;
        fs::create_dir_all(status_dir)?;

        Ok(Self {
            queue_dir: queue_dir.to_path_buf(),
            status_dir: status_dir.to_path_buf(),
            lock: Mutex::new(()),
        })
    }

    pub fn queue_dir(&self) -> &Path {
        &self.queue_dir
    }

    pub fn status_dir(&self) -> &Path {
        &self.status_dir
    }

    fn status_path(&self, job_id: &str) -> PathBuf {
        self.status_dir.join(format!("{}.json", job_id))
    }

    fn claim_path(&self, job_id: &str) -> PathBuf {
        self.status_dir.join(format!("{}.claim", job_id))
    }

    /// Creates the claim marker; false if another claimant got there first
    fn take_claim_marker(&self, job_id: &str) -> StorageResult<bool> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.claim_path(job_id))
        {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn guard(&self) -> StorageResult<MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| StorageError::Database("job store lock poisoned".to_string()))
    }

    fn read_status(&self, job_id: &str) -> StorageResult<Option<StatusRecord>> {
        Ok(read_json(&self.status_path(job_id))?)
    }

    fn write_status(&self, record: &StatusRecord) -> StorageResult<()> {
        write_json_atomic(&self.status_path(&record.job_id), record)?;
        Ok(())
    }
}

/// True for files in the status directory that hold a [`StatusRecord`]
fn is_status_file(name: &str) -> bool {
    name.ends_with(".json") && !name.ends_with("_stats.json") && !name.contains(".tmp")
}

impl JobStore for FsJobStore {
    fn list_pending(&self) -> StorageResult<Vec<JobDescriptor>> {
        let mut pending = Vec::new();

        for descriptor in scan_queue_dir(&self.queue_dir)? {
            match self.read_status(&descriptor.job_id) {
                Ok(Some(record)) if record.state.blocks_dispatch() => continue,
                Ok(_) => pending.push(descriptor),
                Err(e) => {
                    tracing::warn!(
                        "Unreadable status for {}, not dispatching: {}",
                        descriptor.job_id,
                        e
                    );
                }
            }
        }

        Ok(pending)
    }

    fn try_claim(&self, job_id: &str) -> StorageResult<bool> {
        let _guard = self.guard()?;

        if let Some(record) = self.read_status(job_id)? {
            if record.state.blocks_dispatch() {
                return Ok(false);
            }
        }

        if !self.take_claim_marker(job_id)? {
            return Ok(false);
        }

        self.write_status(&StatusRecord::running(job_id, Utc::now()))?;
        Ok(true)
    }

    fn record_result(
        &self,
        job_id: &str,
        stats: &StatsRecord,
        outcome: &JobOutcome,
    ) -> StorageResult<()> {
        let _guard = self.guard()?;

        let current = self
            .read_status(job_id)?
            .ok_or_else(|| StorageError::JobNotFound(job_id.to_string()))?;
        let next = current.finish(stats, outcome, Utc::now())?;
        self.write_status(&next)
    }

    fn get_status(&self, job_id: &str) -> StorageResult<Option<StatusRecord>> {
        self.read_status(job_id)
    }

    fn list_statuses(&self) -> StorageResult<Vec<StatusRecord>> {
        let mut records = Vec::new();

        for entry in fs::read_dir(&self.status_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !is_status_file(name) {
                continue;
            }

            match read_json::<StatusRecord>(&entry.path()) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => tracing::warn!("Skipping status file {}: {}", name, e),
            }
        }

        records.sort_by(|a, b| a.job_id.cmp(&b.job_id));
        Ok(records)
    }

    fn name(&self) -> &'static str {
        "files"
    }
}
