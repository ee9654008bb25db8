//! Delegated video extraction through an external tool
//!
//! Video references are never streamed directly; they are handed to a
//! [`VideoExtractor`]. The default [`CliExtractor`] runs `yt-dlp` (or any
//! program with the same `-f`/`-o` interface) and only looks at its exit code.

use crate::config::ExtractorConfig;
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use url::Url;

/// One extraction job
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub url: Url,

    /// Directory the tool writes into
    pub dest_dir: PathBuf,

    /// Hard ceiling for the whole invocation
    pub timeout: Duration,

    /// File that receives the tool's stdout and stderr; discarded when None
    pub log_file: Option<PathBuf>,
}

/// What the tool reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Succeeded,
    /// Exit code, or None when terminated by a signal
    NonZeroExit(Option<i32>),
    TimedOut,
    LaunchFailed(String),
}

/// Capability to fetch a video URL into a directory
#[async_trait]
pub trait VideoExtractor: Send + Sync {
    /// Runs one extraction; never panics and never returns an error
    async fn extract(&self, request: &ExtractionRequest) -> ExtractionOutcome;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Extractor backed by an external command-line tool
///
/// # Examples
///
/// ```no_run
/// use feed_harvest::config::ExtractorConfig;
/// use feed_harvest::crawler::CliExtractor;
///
/// let extractor = CliExtractor::from_config(&ExtractorConfig::default());
/// println!("using {}", extractor.program().display());
/// ```
#[derive(Debug, Clone)]
pub struct CliExtractor {
    program: PathBuf,
    format: String,
    output_template: String,
}

impl CliExtractor {
    /// Creates an extractor with an explicit program path
    pub fn new(program: PathBuf, config: &ExtractorConfig) -> Self {
        Self {
            program,
            format: config.format.clone(),
            output_template: config.output_template.clone(),
        }
    }

    /// Creates an extractor for the configured program
    ///
    /// Bare program names are resolved through PATH; if that fails the name
    /// is kept as is and every invocation reports `LaunchFailed`.
    pub fn from_config(config: &ExtractorConfig) -> Self {
        let program = Self::locate(&config.program).unwrap_or_else(|| {
            tracing::warn!(
                "Extractor '{}' not found in PATH; video downloads will fail",
                config.program
            );
            PathBuf::from(&config.program)
        });
        Self::new(program, config)
    }

    /// Attempt to find a program in PATH
    ///
    /// Paths containing a separator are returned unchanged if they exist.
    pub fn locate(program: &str) -> Option<PathBuf> {
        let path = Path::new(program);
        if path.components().count() > 1 {
            return path.exists().then(|| path.to_path_buf());
        }
        which::which(program).ok()
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn build_command(&self, request: &ExtractionRequest) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("-f")
            .arg(&self.format)
            .arg("-o")
            .arg(request.dest_dir.join(&self.output_template))
            .arg(request.url.as_str())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let (stdout, stderr) = match request.log_file.as_deref().map(open_log) {
            Some(Ok(pair)) => pair,
            Some(Err(e)) => {
                tracing::warn!("Cannot open extractor log, discarding output: {}", e);
                (Stdio::null(), Stdio::null())
            }
            None => (Stdio::null(), Stdio::null()),
        };
        command.stdout(stdout).stderr(stderr);

        command
    }
}

fn open_log(path: &Path) -> std::io::Result<(Stdio, Stdio)> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let clone = file.try_clone()?;
    Ok((Stdio::from(file), Stdio::from(clone)))
}

#[async_trait]
impl VideoExtractor for CliExtractor {
    async fn extract(&self, request: &ExtractionRequest) -> ExtractionOutcome {
        let mut child = match self.build_command(request).spawn() {
            Ok(child) => child,
            Err(e) => {
                return ExtractionOutcome::LaunchFailed(format!(
                    "{}: {}",
                    self.program.display(),
                    e
                ))
            }
        };

        match tokio::time::timeout(request.timeout, child.wait()).await {
            Ok(Ok(status)) if status.success() => ExtractionOutcome::Succeeded,
            Ok(Ok(status)) => ExtractionOutcome::NonZeroExit(status.code()),
            Ok(Err(e)) => ExtractionOutcome::LaunchFailed(e.to_string()),
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!("Failed to kill extractor for {}: {}", request.url, e);
                }
                ExtractionOutcome::TimedOut
            }
        }
    }

    fn name(&self) -> &'static str {
        "cli"
    }
}
