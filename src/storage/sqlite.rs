//! SQLite job store
//!
//! This module provides a SQLite-based implementation of the JobStore trait.
//! Claims are a single conditional UPDATE, so they stay atomic across
//! processes sharing the database file.

use crate::output::StatsRecord;
use crate::state::JobState;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{JobStore, StorageError, StorageResult};
use crate::storage::{scan_queue_dir, JobDescriptor, JobOutcome, StatusRecord};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Raw column values of one `jobs` row
type JobRow = (String, String, String, Option<String>, Option<String>);

const SELECT_STATUS: &str =
    "SELECT job_id, state, updated_at, stats_json, error FROM jobs";

/// SQLite job store backend
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
    queue_dir: Option<PathBuf>,
}

impl SqliteJobStore {
    /// Opens or creates a job database
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `queue_dir` - Descriptor directory imported on every pending scan
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteJobStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path, queue_dir: Option<&Path>) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        if let Some(dir) = queue_dir {
            std::fs::create_dir_all(dir)?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
            queue_dir: queue_dir.map(Path::to_path_buf),
        })
    }

    /// Creates an in-memory database with no queue directory
    ///
    /// Jobs are added with [`SqliteJobStore::enqueue`].
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            queue_dir: None,
        })
    }

    /// Adds a job in the pending state
    ///
    /// Returns false if a job with the same id already exists, whatever its
    /// state; known jobs are never reset.
    pub fn enqueue(&self, descriptor: &JobDescriptor) -> StorageResult<bool> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO jobs (job_id, target, state, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![
                descriptor.job_id,
                descriptor.target,
                JobState::Pending.to_db_string(),
                now
            ],
        )?;
        Ok(inserted == 1)
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Database("connection lock poisoned".to_string()))
    }

    fn import_queue(&self) -> StorageResult<()> {
        let Some(dir) = &self.queue_dir else {
            return Ok(());
        };

        for descriptor in scan_queue_dir(dir)? {
            if self.enqueue(&descriptor)? {
                tracing::debug!("Imported job {} ({})", descriptor.job_id, descriptor.target);
            }
        }
        Ok(())
    }
}

fn row_to_status(row: JobRow) -> StorageResult<StatusRecord> {
    let (job_id, state, updated_at, stats_json, error) = row;

    let state = JobState::from_db_string(&state).ok_or_else(|| {
        StorageError::Database(format!("unknown state '{}' for job {}", state, job_id))
    })?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_at)
        .map_err(|e| StorageError::Database(format!("bad timestamp for {}: {}", job_id, e)))?
        .with_timezone(&Utc);
    let stats = stats_json
        .map(|json| serde_json::from_str::<StatsRecord>(&json))
        .transpose()?;

    Ok(StatusRecord {
        job_id,
        state,
        updated_at,
        stats,
        error,
    })
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<JobRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

impl JobStore for SqliteJobStore {
    fn list_pending(&self) -> StorageResult<Vec<JobDescriptor>> {
        self.import_queue()?;

        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT job_id, target FROM jobs WHERE state = ?1 ORDER BY job_id")?;
        let descriptors = stmt
            .query_map(params![JobState::Pending.to_db_string()], |row| {
                Ok(JobDescriptor {
                    job_id: row.get(0)?,
                    target: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(descriptors)
    }

    fn try_claim(&self, job_id: &str) -> StorageResult<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE jobs SET state = ?1, updated_at = ?2 WHERE job_id = ?3 AND state = ?4",
            params![
                JobState::Running.to_db_string(),
                Utc::now().to_rfc3339(),
                job_id,
                JobState::Pending.to_db_string()
            ],
        )?;
        Ok(updated == 1)
    }

    fn record_result(
        &self,
        job_id: &str,
        stats: &StatsRecord,
        outcome: &JobOutcome,
    ) -> StorageResult<()> {
        let conn = self.conn()?;

        let current: Option<String> = conn
            .query_row(
                "SELECT state FROM jobs WHERE job_id = ?1",
                params![job_id],
                |row| row.get(0),
            )
            .optional()?;
        let current = current.ok_or_else(|| StorageError::JobNotFound(job_id.to_string()))?;
        let from = JobState::from_db_string(&current).ok_or_else(|| {
            StorageError::Database(format!("unknown state '{}' for job {}", current, job_id))
        })?;

        let to = outcome.state();
        if !from.can_transition_to(to) {
            return Err(StorageError::InvalidTransition {
                job_id: job_id.to_string(),
                from,
                to,
            });
        }

        let stats_json = serde_json::to_string(stats)?;
        conn.execute(
            "UPDATE jobs SET state = ?1, updated_at = ?2, stats_json = ?3, error = ?4
             WHERE job_id = ?5 AND state = ?6",
            params![
                to.to_db_string(),
                Utc::now().to_rfc3339(),
                stats_json,
                outcome.error(),
                job_id,
                from.to_db_string()
            ],
        )?;
        Ok(())
    }

    fn get_status(&self, job_id: &str) -> StorageResult<Option<StatusRecord>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("{} WHERE job_id = ?1", SELECT_STATUS),
                params![job_id],
                read_row,
            )
            .optional()?;

        row.map(row_to_status).transpose()
    }

    fn list_statuses(&self) -> StorageResult<Vec<StatusRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{} ORDER BY job_id", SELECT_STATUS))?;
        let rows = stmt
            .query_map([], read_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(row_to_status).collect()
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
