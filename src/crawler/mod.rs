//! Crawler module for feed walking and media fetching
//!
//! This module contains the core pipeline logic, including:
//! - Feed pagination with stop conditions
//! - Media classification of posts
//! - Direct downloads with content validation
//! - Delegated extraction of videos
//! - Overall run coordination and statistics

mod classifier;
mod coordinator;
mod extractor;
mod feed;
mod fetcher;
mod outcome;
mod stop;
mod walker;

pub use classifier::{FetchStrategy, MediaClassifier, MediaReference};
pub use coordinator::{JobDirs, Pipeline, RunReport};
pub use extractor::{CliExtractor, ExtractionOutcome, ExtractionRequest, VideoExtractor};
pub use feed::{FeedPage, Listing, Post};
pub use fetcher::{build_http_client, build_media_client, part_path, DirectFetcher};
pub use outcome::{AttemptTally, FailReason, Outcome, SkipReason};
pub use stop::{conditions_from_config, EmptyPageLimit, IdleTimeout, StopCondition, StopReason};
pub use walker::FeedWalker;

use crate::config::Config;
use crate::HarvestError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs a single crawl job with the command-line extractor
///
/// This is the entry point for running one job outside the scheduler. It
/// will:
/// 1. Build the HTTP client and locate the extractor
/// 2. Walk the feed for `target`
/// 3. Fetch and count every media reference
/// 4. Write the stats file
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `target` - Feed-source identifier, e.g. `r/pics`
/// * `job_id` - Identifier used for output paths
/// * `cancel` - Token that stops the walk at the next page boundary
///
/// # Returns
///
/// * `Ok(RunReport)` - The run happened; check `success` for the verdict
/// * `Err(HarvestError)` - The run could not be set up or its stats not written
pub async fn crawl(
    config: Arc<Config>,
    target: &str,
    job_id: &str,
    cancel: CancellationToken,
) -> Result<RunReport, HarvestError> {
    let extractor = Arc::new(CliExtractor::from_config(&config.extractor));
    let pipeline = Pipeline::new(config, extractor)?;
    pipeline.run(target, job_id, cancel).await
}
