//! Crawl pipeline - walk, classify, fetch, count
//!
//! This module contains the per-job run loop that coordinates:
//! - Creating the per-job media directories
//! - Walking the feed until a stop reason is reached
//! - Classifying each page and fetching every reference in order
//! - Accumulating statistics and writing the stats file

use crate::config::Config;
use crate::crawler::classifier::{FetchStrategy, MediaClassifier, MediaReference};
use crate::crawler::extractor::{ExtractionOutcome, ExtractionRequest, VideoExtractor};
use crate::crawler::fetcher::{build_http_client, build_media_client, DirectFetcher};
use crate::crawler::outcome::{AttemptTally, FailReason, Outcome, SkipReason};
use crate::crawler::stop::{conditions_from_config, StopReason};
use crate::crawler::walker::FeedWalker;
use crate::output::{write_stats_file, StatsRecord};
use crate::storage::JobOutcome;
use crate::url::{media_file_name, MediaKind};
use crate::HarvestError;
use chrono::Utc;
use reqwest::Client;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Summary of one pipeline run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Final, finished statistics; the only thing the scheduler acts on
    pub stats: StatsRecord,

    /// True iff at least one media file was downloaded
    pub success: bool,

    /// Why the walk ended
    pub stop_reason: Option<StopReason>,

    /// Outcome counts over every attempt
    pub tally: AttemptTally,

    /// Pages received from the feed source
    pub pages: u32,
}

impl RunReport {
    /// The terminal job outcome these statistics imply
    pub fn job_outcome(&self) -> JobOutcome {
        JobOutcome::from_stats(&self.stats)
    }
}

/// Per-job output directories
#[derive(Debug, Clone)]
pub struct JobDirs {
    pub root: PathBuf,
    pub images: PathBuf,
    pub gifs: PathBuf,
    pub videos: PathBuf,
}

impl JobDirs {
    /// Creates `images/`, `gifs/` and `videos/` under `root`
    pub fn create(root: &Path) -> Result<Self, HarvestError> {
        let dirs = Self {
            root: root.to_path_buf(),
            images: root.join("images"),
            gifs: root.join("gifs"),
            videos: root.join("videos"),
        };

        for dir in [&dirs.images, &dirs.gifs, &dirs.videos] {
            std::fs::create_dir_all(dir)?;
        }

        Ok(dirs)
    }

    /// Directory a media kind is stored in
    pub fn for_kind(&self, kind: MediaKind) -> Option<&Path> {
        match kind {
            MediaKind::Image => Some(&self.images),
            MediaKind::Gif => Some(&self.gifs),
            MediaKind::Video => Some(&self.videos),
            MediaKind::Unknown => None,
        }
    }
}

/// Runs crawl jobs; one instance is shared by every job
pub struct Pipeline {
    config: Arc<Config>,
    client: Client,
    fetcher: DirectFetcher,
    classifier: MediaClassifier,
    extractor: Arc<dyn VideoExtractor>,
}

impl Pipeline {
    /// Creates a pipeline instance
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `extractor` - Backend for delegated video references
    ///
    /// # Returns
    ///
    /// * `Ok(Pipeline)` - Ready to run jobs
    /// * `Err(HarvestError)` - The HTTP client could not be built
    pub fn new(
        config: Arc<Config>,
        extractor: Arc<dyn VideoExtractor>,
    ) -> Result<Self, HarvestError> {
        let client = build_http_client(&config.user_agent)?;
        let fetcher = DirectFetcher::new(build_media_client(&config.user_agent)?, &config.download);
        let classifier = MediaClassifier::new(config.download.video_hosts.clone());

        Ok(Self {
            config,
            client,
            fetcher,
            classifier,
            extractor,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs one job to completion
    ///
    /// Fetch problems never fail the run; they are recorded as outcomes. An
    /// `Err` means the run could not happen at all (directories, stats file).
    /// The stats file is written for every run that gets that far, including
    /// runs that downloaded nothing.
    #[tracing::instrument(name = "pipeline", skip_all, fields(job_id = %job_id, target = %target))]
    pub async fn run(
        &self,
        target: &str,
        job_id: &str,
        cancel: CancellationToken,
    ) -> Result<RunReport, HarvestError> {
        let jobs = &self.config.jobs;
        let dirs = JobDirs::create(&jobs.job_media_dir(job_id))?;
        std::fs::create_dir_all(&jobs.log_dir)?;
        let log_file = jobs.log_path(job_id);

        tracing::info!("Starting run into {}", dirs.root.display());

        let mut stats = StatsRecord::start(Utc::now());
        let mut tally = AttemptTally::default();
        let mut walker = FeedWalker::new(
            self.client.clone(),
            &self.config.feed,
            target,
            conditions_from_config(&self.config.stop),
            cancel,
        );

        while let Some(page) = walker.next_page().await {
            let (references, duplicates) = self.classifier.classify_page(&page.posts);
            for _ in 0..duplicates {
                tally.record(&Outcome::Skipped(SkipReason::DuplicateUrl));
            }

            for reference in references {
                let outcome = self.attempt(&reference, &dirs, &log_file).await;
                match &outcome {
                    Outcome::Success(fetched) => {
                        stats.record(fetched.kind);
                        walker.record_success();
                    }
                    Outcome::Skipped(reason) => {
                        tracing::debug!("Skipped {}: {}", reference, reason);
                    }
                    Outcome::Failed(reason) => {
                        tracing::warn!("Failed {}: {}", reference, reason);
                    }
                }
                tally.record(&outcome);
            }
        }

        stats.finish(Utc::now());
        write_stats_file(&jobs.stats_path(job_id), &stats)?;

        let report = RunReport {
            success: stats.is_success(),
            stop_reason: walker.stop_reason().cloned(),
            pages: walker.state().pages_fetched,
            tally,
            stats,
        };

        tracing::info!(
            "Run finished after {} pages: {} images, {} gifs, {} videos ({})",
            report.pages,
            report.stats.images(),
            report.stats.gifs(),
            report.stats.videos(),
            report.tally
        );

        Ok(report)
    }

    async fn attempt(&self, reference: &MediaReference, dirs: &JobDirs, log_file: &Path) -> Outcome {
        let Some(dir) = dirs.for_kind(reference.kind) else {
            return Outcome::Skipped(SkipReason::UnsupportedKind);
        };

        match reference.strategy {
            FetchStrategy::Direct => {
                let dest = dir.join(media_file_name(&reference.url));
                self.fetcher.fetch(reference, &dest).await
            }
            FetchStrategy::Delegated => self.delegate(reference, dir, log_file).await,
        }
    }

    async fn delegate(&self, reference: &MediaReference, dir: &Path, log_file: &Path) -> Outcome {
        let verify = self.config.extractor.verify_output;
        let before = if verify {
            match list_media_files(dir).await {
                Ok(files) => files,
                Err(e) => return Outcome::Failed(FailReason::Io(e.to_string())),
            }
        } else {
            HashSet::new()
        };

        let request = ExtractionRequest {
            url: reference.url.clone(),
            dest_dir: dir.to_path_buf(),
            timeout: self.config.extractor.timeout(),
            log_file: Some(log_file.to_path_buf()),
        };

        tracing::debug!("Delegating {} to {}", reference.url, self.extractor.name());
        match self.extractor.extract(&request).await {
            ExtractionOutcome::Succeeded if !verify => Outcome::Success(reference.clone()),
            ExtractionOutcome::Succeeded => match list_media_files(dir).await {
                Ok(after) if after.difference(&before).next().is_some() => {
                    Outcome::Success(reference.clone())
                }
                Ok(_) => Outcome::Failed(FailReason::NoOutput),
                Err(e) => Outcome::Failed(FailReason::Io(e.to_string())),
            },
            ExtractionOutcome::NonZeroExit(code) => Outcome::Failed(FailReason::ExtractorExit(code)),
            ExtractionOutcome::TimedOut => Outcome::Failed(FailReason::ExtractorTimeout),
            ExtractionOutcome::LaunchFailed(e) => Outcome::Failed(FailReason::LaunchFailed(e)),
        }
    }
}

/// True for names the extractor uses while a download is in progress
fn is_temporary(name: &str) -> bool {
    name.starts_with('.')
        || name.ends_with(".part")
        || name.ends_with(".ytdl")
        || name.ends_with(".temp")
        || name.ends_with(".tmp")
        || name.contains(".part-Frag")
}

/// Names of the finished files currently in `dir`
async fn list_media_files(dir: &Path) -> std::io::Result<HashSet<OsString>> {
    let mut files = HashSet::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let temporary = name.to_str().map(is_temporary).unwrap_or(false);
        if !temporary && entry.file_type().await?.is_file() {
            files.insert(name);
        }
    }

    Ok(files)
}
