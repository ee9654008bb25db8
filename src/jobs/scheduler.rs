//! Job scheduler: polls the store and runs claimed jobs
//!
//! This module handles:
//! - Periodic scans for pending jobs
//! - Claiming before dispatch so a job is never run twice
//! - Bounding concurrent jobs with a semaphore
//! - Recording every job's terminal status, including crashed runs
//! - Draining running jobs on shutdown

use crate::config::JobsConfig;
use crate::crawler::Pipeline;
use crate::output::StatsRecord;
use crate::storage::{JobDescriptor, JobOutcome, JobStore, StorageResult};
use crate::HarvestError;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Scheduler for crawl jobs
///
/// The scheduler coordinates:
/// - Discovery through [`JobStore::list_pending`]
/// - Exclusive ownership through [`JobStore::try_claim`]
/// - Terminal status through [`JobStore::record_result`]
pub struct JobScheduler {
    store: Arc<dyn JobStore>,
    pipeline: Arc<Pipeline>,
    semaphore: Arc<Semaphore>,
    poll_interval: Duration,
    cancel: CancellationToken,
    tasks: JoinSet<()>,
}

impl JobScheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `store` - Where jobs are discovered and their status kept
    /// * `pipeline` - Shared pipeline that runs each job
    /// * `config` - Poll interval and concurrency limit
    /// * `cancel` - Shutdown token; running jobs get child tokens
    pub fn new(
        store: Arc<dyn JobStore>,
        pipeline: Arc<Pipeline>,
        config: &JobsConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            pipeline,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_jobs as usize)),
            poll_interval: config.poll_interval(),
            cancel,
            tasks: JoinSet::new(),
        }
    }

    /// Number of jobs currently running
    pub fn running(&self) -> usize {
        self.tasks.len()
    }

    /// Scans the store once and dispatches what fits
    ///
    /// Store calls run on the blocking pool.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of jobs dispatched by this scan
    /// * `Err(HarvestError)` - The store could not be listed or claimed
    pub async fn scan_once(&mut self) -> Result<usize, HarvestError> {
        if self.cancel.is_cancelled() {
            return Ok(0);
        }

        let mut dispatched = 0;
        for descriptor in blocking(&self.store, |store| store.list_pending()).await? {
            let permit = match self.semaphore.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::debug!("All job slots busy, deferring remaining jobs");
                    break;
                }
            };

            let job_id = descriptor.job_id.clone();
            if !blocking(&self.store, move |store| store.try_claim(&job_id)).await? {
                tracing::debug!("Job {} already claimed", descriptor.job_id);
                continue;
            }

            tracing::info!("Dispatching job {} ({})", descriptor.job_id, descriptor.target);
            self.spawn_job(descriptor, permit);
            dispatched += 1;
        }

        Ok(dispatched)
    }

    /// Runs scans until cancelled, then waits for running jobs
    pub async fn run(mut self) -> Result<(), HarvestError> {
        tracing::info!(
            "Job scheduler started ({} store, polling every {:?})",
            self.store.name(),
            self.poll_interval
        );

        loop {
            if let Err(e) = self.scan_once().await {
                tracing::error!("Job scan failed: {}", e);
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!("Job task aborted: {}", e);
                    }
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        tracing::info!("Shutdown requested, waiting for {} running jobs", self.running());
        self.drain().await;
        tracing::info!("Job scheduler stopped");
        Ok(())
    }

    /// Waits until every dispatched job has recorded its result
    pub async fn drain(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Job task aborted: {}", e);
            }
        }
    }

    fn spawn_job(&mut self, descriptor: JobDescriptor, permit: OwnedSemaphorePermit) {
        let store = self.store.clone();
        let pipeline = self.pipeline.clone();
        let cancel = self.cancel.child_token();

        self.tasks.spawn(async move {
            let _permit = permit;
            let JobDescriptor { job_id, target } = descriptor;

            // The run gets its own task so a panic surfaces as a JoinError
            let run = {
                let job_id = job_id.clone();
                tokio::spawn(async move { pipeline.run(&target, &job_id, cancel).await })
            };

            let (stats, outcome) = match run.await {
                Ok(Ok(report)) => {
                    let outcome = report.job_outcome();
                    (report.stats, outcome)
                }
                Ok(Err(e)) => {
                    tracing::error!("Job {} could not run: {}", job_id, e);
                    (empty_stats(), JobOutcome::infrastructure(e))
                }
                Err(e) => {
                    let error = HarvestError::Task(e.to_string());
                    tracing::error!("Job {} crashed: {}", job_id, error);
                    (empty_stats(), JobOutcome::infrastructure(error))
                }
            };

            let state = outcome.state();
            let files = stats.files_downloaded();
            let recorded = {
                let job_id = job_id.clone();
                blocking(&store, move |store| store.record_result(&job_id, &stats, &outcome)).await
            };
            match recorded {
                Ok(()) => tracing::info!("Job {} {} ({} files)", job_id, state, files),
                Err(e) => tracing::error!("Failed to record result for {}: {}", job_id, e),
            }
        });
    }
}

/// Runs a synchronous store call on the blocking pool
async fn blocking<T, F>(store: &Arc<dyn JobStore>, call: F) -> Result<T, HarvestError>
where
    T: Send + 'static,
    F: FnOnce(&dyn JobStore) -> StorageResult<T> + Send + 'static,
{
    let store = store.clone();
    tokio::task::spawn_blocking(move || call(store.as_ref()))
        .await
        .map_err(|e| HarvestError::Task(e.to_string()))?
        .map_err(HarvestError::from)
}

fn empty_stats() -> StatsRecord {
    let now = Utc::now();
    let mut stats = StatsRecord::start(now);
    stats.finish(now);
    stats
}
