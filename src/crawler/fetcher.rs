//! Direct media download
//!
//! This module handles:
//! - Building the HTTP client with the configured user agent
//! - Validating content type and declared length before writing anything
//! - Streaming the body to a `.part` file through a fixed-size buffer
//! - Re-checking the on-disk size and renaming into place

use crate::config::{DownloadConfig, UserAgentConfig};
use crate::crawler::classifier::MediaReference;
use crate::crawler::outcome::{FailReason, Outcome, SkipReason};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{redirect::Policy, Client, ClientBuilder, Response};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};

/// Builds an HTTP client with proper configuration
///
/// Per-request timeouts are set by the callers; the client only bounds the
/// connect phase.
///
/// # Example
///
/// ```no_run
/// use feed_harvest::config::UserAgentConfig;
/// use feed_harvest::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "FeedHarvest".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: None,
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    base_client(config).gzip(true).brotli(true).build()
}

/// Builds the client used for media downloads
///
/// Bodies are never decompressed, so the declared `Content-Length` always
/// describes the bytes written to disk.
pub fn build_media_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    base_client(config).no_gzip().no_brotli().build()
}

fn base_client(config: &UserAgentConfig) -> ClientBuilder {
    Client::builder()
        .user_agent(config.header_value())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
}

/// Downloads image and gif references straight to disk
#[derive(Debug, Clone)]
pub struct DirectFetcher {
    client: Client,
    min_file_size: u64,
    chunk_size: usize,
    timeout: Duration,
}

impl DirectFetcher {
    pub fn new(client: Client, config: &DownloadConfig) -> Self {
        Self {
            client,
            min_file_size: config.min_file_size,
            chunk_size: config.chunk_size,
            timeout: config.timeout(),
        }
    }

    /// Fetches one reference to `dest`
    ///
    /// # Request Flow
    ///
    /// 1. Skip if `dest` already exists
    /// 2. GET; the response headers must arrive within the download timeout
    ///    and a non-success status fails
    /// 3. Skip unless the content type has the kind's prefix and the declared
    ///    length reaches the floor
    /// 4. Stream to `<dest>.part`, check the written size, rename to `dest`.
    ///    The timeout applies to each read, not to the whole body.
    ///
    /// Any partial file is removed on failure, so `dest` only ever holds a
    /// complete download of at least the floor size.
    pub async fn fetch(&self, reference: &MediaReference, dest: &Path) -> Outcome {
        if fs::metadata(dest).await.is_ok() {
            return Outcome::Skipped(SkipReason::AlreadyPresent);
        }

        let request = self.client.get(reference.url.clone()).send();
        let response = match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Outcome::Failed(FailReason::Transport(e.to_string())),
            Err(_) => {
                return Outcome::Failed(FailReason::Transport(format!(
                    "no response within {:?}",
                    self.timeout
                )))
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Outcome::Failed(FailReason::HttpStatus(status.as_u16()));
        }

        if let Some(skip) = self.validate(reference, &response) {
            return Outcome::Skipped(skip);
        }

        let part = part_path(dest);
        let written = match self.stream_to_file(response, &part).await {
            Ok(written) => written,
            Err(reason) => {
                let _ = fs::remove_file(&part).await;
                return Outcome::Failed(reason);
            }
        };

        if written < self.min_file_size {
            let _ = fs::remove_file(&part).await;
            return Outcome::Failed(FailReason::Truncated { written });
        }

        if let Err(e) = fs::rename(&part, dest).await {
            let _ = fs::remove_file(&part).await;
            return Outcome::Failed(FailReason::Io(e.to_string()));
        }

        tracing::debug!("Downloaded {} ({} bytes) to {}", reference, written, dest.display());
        Outcome::Success(reference.clone())
    }

    fn validate(&self, reference: &MediaReference, response: &Response) -> Option<SkipReason> {
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        let accepted = reference
            .kind
            .expected_content_prefix()
            .map(|prefix| content_type.starts_with(prefix))
            .unwrap_or(false);
        if !accepted {
            return Some(SkipReason::ContentTypeMismatch { content_type });
        }

        let declared = declared_length(response);
        match declared {
            Some(length) if length >= self.min_file_size => None,
            _ => Some(SkipReason::BelowSizeFloor { declared }),
        }
    }

    async fn stream_to_file(&self, mut response: Response, part: &Path) -> Result<u64, FailReason> {
        let io_err = |e: std::io::Error| FailReason::Io(e.to_string());

        let file = File::create(part).await.map_err(io_err)?;
        let mut writer = BufWriter::with_capacity(self.chunk_size, file);
        let mut written: u64 = 0;

        loop {
            let chunk = tokio::time::timeout(self.timeout, response.chunk())
                .await
                .map_err(|_| {
                    FailReason::Transport(format!("no data received for {:?}", self.timeout))
                })?;
            match chunk {
                Ok(Some(chunk)) => {
                    writer.write_all(&chunk).await.map_err(io_err)?;
                    written += chunk.len() as u64;
                }
                Ok(None) => break,
                Err(e) => return Err(FailReason::Transport(e.to_string())),
            }
        }

        writer.flush().await.map_err(io_err)?;
        let on_disk = fs::metadata(part).await.map_err(io_err)?.len();
        Ok(on_disk.min(written))
    }
}

/// Content-Length as declared by the server, if present and numeric
fn declared_length(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Temporary download path next to the destination
pub fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}
