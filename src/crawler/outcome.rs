//! Per-attempt fetch outcomes
//!
//! Every media reference the pipeline tries ends in exactly one [`Outcome`].
//! Only `Success` moves the statistics; the rest are logged and tallied.

use crate::crawler::classifier::MediaReference;
use std::fmt;

/// Result of one fetch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The media is on disk and counts toward the stats
    Success(MediaReference),

    /// The reference was not worth fetching; nothing was written
    Skipped(SkipReason),

    /// The fetch was attempted and did not produce a file
    Failed(FailReason),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Why an attempt was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Declared content type does not start with the expected prefix
    ContentTypeMismatch { content_type: String },

    /// Declared content length is missing or below the floor
    BelowSizeFloor { declared: Option<u64> },

    /// Same normalized URL already seen on this page
    DuplicateUrl,

    /// Destination file already exists
    AlreadyPresent,

    /// Media kind has no storage directory
    UnsupportedKind,
}

/// Why an attempt failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailReason {
    /// Non-success HTTP status
    HttpStatus(u16),

    /// Connection, timeout or body read error
    Transport(String),

    /// Fewer bytes on disk than the floor after streaming
    Truncated { written: u64 },

    /// Local file system error
    Io(String),

    /// Extractor exited with a non-zero status (None when killed by a signal)
    ExtractorExit(Option<i32>),

    /// Extractor ran past its ceiling and was killed
    ExtractorTimeout,

    /// Extractor could not be started
    LaunchFailed(String),

    /// Extractor exited cleanly but no new file appeared
    NoOutput,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContentTypeMismatch { content_type } => {
                write!(f, "content type '{}' not accepted", content_type)
            }
            Self::BelowSizeFloor { declared: Some(n) } => {
                write!(f, "declared size {} below floor", n)
            }
            Self::BelowSizeFloor { declared: None } => write!(f, "no declared size"),
            Self::DuplicateUrl => write!(f, "duplicate URL"),
            Self::AlreadyPresent => write!(f, "already downloaded"),
            Self::UnsupportedKind => write!(f, "unsupported media kind"),
        }
    }
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HttpStatus(code) => write!(f, "HTTP {}", code),
            Self::Transport(e) => write!(f, "transport error: {}", e),
            Self::Truncated { written } => write!(f, "only {} bytes written", written),
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::ExtractorExit(Some(code)) => write!(f, "extractor exited with {}", code),
            Self::ExtractorExit(None) => write!(f, "extractor killed by signal"),
            Self::ExtractorTimeout => write!(f, "extractor timed out"),
            Self::LaunchFailed(e) => write!(f, "extractor failed to start: {}", e),
            Self::NoOutput => write!(f, "extractor produced no file"),
        }
    }
}

/// Counts of outcomes over one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttemptTally {
    pub succeeded: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl AttemptTally {
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Success(_) => self.succeeded += 1,
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.succeeded + self.skipped + self.failed
    }
}

impl fmt::Display for AttemptTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} skipped, {} failed",
            self.succeeded, self.skipped, self.failed
        )
    }
}
