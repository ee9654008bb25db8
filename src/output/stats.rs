//! Run statistics
//!
//! This module provides the statistics record a pipeline run accumulates and
//! hands to the scheduler, plus console rendering for the CLI.

use crate::storage::StatusRecord;
use crate::url::MediaKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Media counts for one pipeline run
///
/// Counters only move through [`StatsRecord::record`], which keeps
/// `files_downloaded == images + gifs + videos` at every observation point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsRecord {
    images: u64,
    gifs: u64,
    videos: u64,
    files_downloaded: u64,
    started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ended_at: Option<DateTime<Utc>>,
}

impl StatsRecord {
    /// Starts an empty record at the given time
    pub fn start(started_at: DateTime<Utc>) -> Self {
        Self {
            images: 0,
            gifs: 0,
            videos: 0,
            files_downloaded: 0,
            started_at,
            ended_at: None,
        }
    }

    /// Counts one successfully fetched media file
    ///
    /// Returns false (and counts nothing) for unknown media or once the
    /// record has been finished.
    pub fn record(&mut self, kind: MediaKind) -> bool {
        if self.ended_at.is_some() {
            return false;
        }

        match kind {
            MediaKind::Image => self.images += 1,
            MediaKind::Gif => self.gifs += 1,
            MediaKind::Video => self.videos += 1,
            MediaKind::Unknown => return false,
        }
        self.files_downloaded += 1;
        true
    }

    /// Stamps the end time; the record is immutable afterwards
    pub fn finish(&mut self, ended_at: DateTime<Utc>) {
        if self.ended_at.is_none() {
            self.ended_at = Some(ended_at);
        }
    }

    pub fn images(&self) -> u64 {
        self.images
    }

    pub fn gifs(&self) -> u64 {
        self.gifs
    }

    pub fn videos(&self) -> u64 {
        self.videos
    }

    pub fn files_downloaded(&self) -> u64 {
        self.files_downloaded
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }

    /// True when the total matches the per-kind counters
    pub fn is_consistent(&self) -> bool {
        self.files_downloaded == self.images + self.gifs + self.videos
    }

    /// The job decision rule: success iff anything was downloaded
    pub fn is_success(&self) -> bool {
        self.files_downloaded > 0
    }

    /// Run duration in seconds, once finished
    pub fn duration_seconds(&self) -> Option<i64> {
        self.ended_at
            .map(|ended| (ended - self.started_at).num_seconds())
    }
}

/// Prints one stats record to stdout
pub fn print_statistics(stats: &StatsRecord) {
    println!("  Images: {}", stats.images());
    println!("  GIFs: {}", stats.gifs());
    println!("  Videos: {}", stats.videos());
    println!("  Files downloaded: {}", stats.files_downloaded());
    println!("  Started: {}", stats.started_at().to_rfc3339());
    if let Some(ended) = stats.ended_at() {
        println!("  Ended: {}", ended.to_rfc3339());
    }
    if let Some(duration) = stats.duration_seconds() {
        println!(
            "  Duration: {} seconds ({:.2} minutes)",
            duration,
            duration as f64 / 60.0
        );
    }
}

/// Prints a table of status records to stdout
pub fn print_status_records(records: &[StatusRecord]) {
    println!("=== Job Status ===\n");

    if records.is_empty() {
        println!("No jobs found");
        return;
    }

    for record in records {
        println!(
            "{} [{}] updated {}",
            record.job_id,
            record.state,
            record.updated_at.to_rfc3339()
        );
        if let Some(stats) = &record.stats {
            print_statistics(stats);
        }
        if let Some(error) = &record.error {
            println!("  Error: {}", error);
        }
        println!();
    }

    let completed = records
        .iter()
        .filter(|r| r.state == crate::state::JobState::Completed)
        .count();
    println!(
        "Completed: {} / {} jobs",
        completed,
        records.len()
    );
}
