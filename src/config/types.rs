use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Feed-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub feed: FeedConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub stop: StopConfig,
    pub jobs: JobsConfig,
}

/// Feed source configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Listing endpoint; `{target}` is replaced with the job's target
    pub endpoint: String,

    /// Number of posts requested per page
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    /// Fixed delay between page requests (milliseconds)
    #[serde(rename = "page-delay-ms", default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Timeout for a single feed request (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl FeedConfig {
    /// Builds the listing URL for a target
    pub fn endpoint_for(&self, target: &str) -> String {
        self.endpoint.replace("{target}", target.trim_matches('/'))
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the harvester
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the harvester
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the harvester
    #[serde(rename = "contact-url", default)]
    pub contact_url: Option<String>,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    ///
    /// Format: `Name/Version` or `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(url) => format!("{}/{} (+{})", self.crawler_name, self.crawler_version, url),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

/// Direct download configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadConfig {
    /// Minimum accepted media size in bytes (declared and on disk)
    #[serde(rename = "min-file-size", default = "default_min_file_size")]
    pub min_file_size: u64,

    /// Write buffer size used while streaming to disk
    #[serde(rename = "chunk-size", default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Timeout for a single media request (seconds)
    #[serde(rename = "timeout-secs", default = "default_request_timeout")]
    pub timeout_secs: u64,

    /// Host patterns whose post links are handed to the extractor
    #[serde(rename = "video-hosts", default = "default_video_hosts")]
    pub video_hosts: Vec<String>,
}

impl DownloadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            min_file_size: default_min_file_size(),
            chunk_size: default_chunk_size(),
            timeout_secs: default_request_timeout(),
            video_hosts: default_video_hosts(),
        }
    }
}

/// External stream extractor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractorConfig {
    /// Program name or path
    #[serde(default = "default_extractor_program")]
    pub program: String,

    /// Format selection argument
    #[serde(default = "default_extractor_format")]
    pub format: String,

    /// Output filename template, relative to the videos directory
    #[serde(rename = "output-template", default = "default_output_template")]
    pub output_template: String,

    /// Hard ceiling for one invocation (seconds)
    #[serde(rename = "timeout-secs", default = "default_extractor_timeout")]
    pub timeout_secs: u64,

    /// Require a new file in the destination directory before counting a success
    #[serde(rename = "verify-output", default = "default_true")]
    pub verify_output: bool,
}

impl ExtractorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            program: default_extractor_program(),
            format: default_extractor_format(),
            output_template: default_output_template(),
            timeout_secs: default_extractor_timeout(),
            verify_output: true,
        }
    }
}

/// Walk termination configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StopConfig {
    /// Consecutive empty pages that end the walk
    #[serde(rename = "empty-page-limit", default = "default_empty_page_limit")]
    pub empty_page_limit: u32,

    /// Maximum time since the last successful media fetch (seconds)
    #[serde(rename = "idle-timeout-secs", default)]
    pub idle_timeout_secs: Option<u64>,
}

impl Default for StopConfig {
    fn default() -> Self {
        Self {
            empty_page_limit: default_empty_page_limit(),
            idle_timeout_secs: None,
        }
    }
}

/// Which JobStore backend the scheduler uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Files,
    Sqlite,
}

/// Job queue and output layout configuration
#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    /// Directory scanned for `job_*.json` descriptors
    #[serde(rename = "queue-dir")]
    pub queue_dir: PathBuf,

    /// Directory holding status and stats files
    #[serde(rename = "status-dir")]
    pub status_dir: PathBuf,

    /// Root of the per-job media directories
    #[serde(rename = "media-dir")]
    pub media_dir: PathBuf,

    /// Directory holding per-job extractor logs
    #[serde(rename = "log-dir")]
    pub log_dir: PathBuf,

    /// Delay between queue scans (milliseconds)
    #[serde(rename = "poll-interval-ms", default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum number of pipelines running at once
    #[serde(rename = "max-concurrent-jobs", default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: u32,

    #[serde(default = "default_backend")]
    pub backend: StoreBackend,

    /// SQLite file, required by the sqlite backend
    #[serde(rename = "database-path", default)]
    pub database_path: Option<PathBuf>,
}

impl JobsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Path of the stats file the pipeline writes at run end
    pub fn stats_path(&self, job_id: &str) -> PathBuf {
        self.status_dir.join(format!("{}_stats.json", job_id))
    }

    /// Path of the per-job extractor log
    pub fn log_path(&self, job_id: &str) -> PathBuf {
        self.log_dir.join(format!("{}.log", job_id))
    }

    /// Root of one job's media output
    pub fn job_media_dir(&self, job_id: &str) -> PathBuf {
        self.media_dir.join(job_id)
    }
}

fn default_page_size() -> u32 {
    100
}

fn default_page_delay_ms() -> u64 {
    400
}

fn default_request_timeout() -> u64 {
    20
}

fn default_min_file_size() -> u64 {
    8 * 1024
}

fn default_chunk_size() -> usize {
    8192
}

fn default_video_hosts() -> Vec<String> {
    vec![
        "*.redgifs.com".to_string(),
        "*.streamable.com".to_string(),
        "*.imgur.com".to_string(),
    ]
}

fn default_extractor_program() -> String {
    "yt-dlp".to_string()
}

fn default_extractor_format() -> String {
    "bv*+ba/b".to_string()
}

fn default_output_template() -> String {
    "%(id)s.%(ext)s".to_string()
}

fn default_extractor_timeout() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_empty_page_limit() -> u32 {
    3
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_max_concurrent_jobs() -> u32 {
    2
}

fn default_backend() -> StoreBackend {
    StoreBackend::Files
}
