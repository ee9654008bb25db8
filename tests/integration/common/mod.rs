//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use feed_harvest::config::{
    Config, DownloadConfig, ExtractorConfig, FeedConfig, JobsConfig, StopConfig, StoreBackend,
    UserAgentConfig,
};
use feed_harvest::crawler::{ExtractionOutcome, ExtractionRequest, VideoExtractor};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use wiremock::{Match, Request};

pub const TARGET: &str = "r/pics";
pub const FEED_PATH: &str = "/r/pics.json";

/// Creates a test configuration pointing at a mock server
pub fn create_test_config(server_uri: &str, root: &Path) -> Config {
    Config {
        feed: FeedConfig {
            endpoint: format!("{}/{{target}}.json", server_uri),
            page_size: 100,
            page_delay_ms: 0, // No pacing in tests
            request_timeout_secs: 5,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestHarvester".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: None,
        },
        download: DownloadConfig {
            timeout_secs: 5,
            ..DownloadConfig::default()
        },
        extractor: ExtractorConfig::default(),
        stop: StopConfig::default(),
        jobs: JobsConfig {
            queue_dir: root.join("queue"),
            status_dir: root.join("status"),
            media_dir: root.join("media"),
            log_dir: root.join("logs"),
            poll_interval_ms: 100,
            max_concurrent_jobs: 2,
            backend: StoreBackend::Files,
            database_path: None,
        },
    }
}

/// Wraps posts in a listing envelope
pub fn listing(posts: Vec<Value>, after: Option<&str>) -> Value {
    let children: Vec<Value> = posts
        .into_iter()
        .map(|post| json!({"kind": "t3", "data": post}))
        .collect();
    json!({"kind": "Listing", "data": {"after": after, "children": children}})
}

/// A link post whose destination is a direct media URL
pub fn link_post(id: &str, dest: &str) -> Value {
    json!({
        "id": id,
        "is_video": false,
        "media": null,
        "url": dest,
        "url_overridden_by_dest": dest
    })
}

/// A post carrying an embedded video
pub fn video_post(id: &str, fallback_url: &str) -> Value {
    json!({
        "id": id,
        "is_video": true,
        "media": {"reddit_video": {"fallback_url": fallback_url}},
        "url": format!("https://v.redd.it/{}", id)
    })
}

/// A body of `len` bytes
pub fn media_bytes(len: usize) -> Vec<u8> {
    vec![0xAB; len]
}

/// Stand-in for the extraction tool
///
/// Optionally drops a file into the destination directory, the way the real
/// tool would, and reports a fixed outcome.
pub struct FakeExtractor {
    writes_file: bool,
    outcome: ExtractionOutcome,
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl FakeExtractor {
    pub fn writing_file() -> Self {
        Self::new(true, ExtractionOutcome::Succeeded)
    }

    pub fn silent_success() -> Self {
        Self::new(false, ExtractionOutcome::Succeeded)
    }

    pub fn failing(outcome: ExtractionOutcome) -> Self {
        Self::new(false, outcome)
    }

    fn new(writes_file: bool, outcome: ExtractionOutcome) -> Self {
        Self {
            writes_file,
            outcome,
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoExtractor for FakeExtractor {
    async fn extract(&self, request: &ExtractionRequest) -> ExtractionOutcome {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(request.url.to_string());

        if self.writes_file {
            std::fs::write(request.dest_dir.join(format!("video_{}.mp4", n)), b"video").unwrap();
        }
        self.outcome.clone()
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Lists file names in a directory, sorted
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Matches feed requests for the first page (no `after` cursor)
pub struct FirstPage;

impl Match for FirstPage {
    fn matches(&self, request: &Request) -> bool {
        !request.url.query_pairs().any(|(key, _)| key == "after")
    }
}
