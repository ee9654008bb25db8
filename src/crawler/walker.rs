//! Feed walker: lazy pagination over the feed source
//!
//! This module handles:
//! - Requesting pages with the page size and continuation cursor
//! - The fixed delay between pages
//! - Evaluating stop conditions at page boundaries
//! - Honoring cancellation between pages

use crate::config::FeedConfig;
use crate::crawler::feed::{FeedPage, Listing};
use crate::crawler::stop::{first_triggered, StopCondition, StopReason};
use crate::state::WalkState;
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Walks a feed page by page until a stop reason is reached
///
/// A failed page request never surfaces as an error: the walk simply ends
/// with [`StopReason::SourceError`] and the caller keeps what it already has.
pub struct FeedWalker {
    client: Client,
    endpoint: String,
    page_size: u32,
    page_delay: Duration,
    request_timeout: Duration,
    conditions: Vec<Box<dyn StopCondition>>,
    cancel: CancellationToken,
    state: WalkState,
    stop_reason: Option<StopReason>,
}

impl FeedWalker {
    /// Creates a walker for one feed target
    ///
    /// # Arguments
    ///
    /// * `client` - Shared HTTP client
    /// * `config` - Feed endpoint, page size and pacing
    /// * `target` - Feed-source identifier substituted into the endpoint
    /// * `conditions` - Stop conditions, checked in order
    /// * `cancel` - Token checked at every page boundary
    pub fn new(
        client: Client,
        config: &FeedConfig,
        target: &str,
        conditions: Vec<Box<dyn StopCondition>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            endpoint: config.endpoint_for(target),
            page_size: config.page_size,
            page_delay: config.page_delay(),
            request_timeout: config.request_timeout(),
            conditions,
            cancel,
            state: WalkState::new(Instant::now(), None),
            stop_reason: None,
        }
    }

    /// Fetches the next page
    ///
    /// # Returns
    ///
    /// * `Some(FeedPage)` - The next page; it may be empty
    /// * `None` - The walk is over; see [`FeedWalker::stop_reason`]
    pub async fn next_page(&mut self) -> Option<FeedPage> {
        if self.stop_reason.is_some() {
            return None;
        }

        if self.state.end_of_feed {
            return self.stop(StopReason::EndOfFeed);
        }

        if self.cancel.is_cancelled() {
            return self.stop(StopReason::Cancelled);
        }

        if self.state.pages_fetched > 0 {
            if let Some(reason) = first_triggered(&self.conditions, &self.state, Instant::now()) {
                return self.stop(reason);
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return self.stop(StopReason::Cancelled),
                _ = tokio::time::sleep(self.page_delay) => {}
            }
        }

        match self.fetch_page().await {
            Ok(page) => {
                self.state
                    .record_page(page.posts.len(), page.next_cursor.clone());
                tracing::debug!(
                    "Page {} from {}: {} posts, next cursor {:?}",
                    self.state.pages_fetched,
                    self.endpoint,
                    page.posts.len(),
                    page.next_cursor
                );
                Some(page)
            }
            Err(message) => {
                tracing::warn!("Ending walk of {}: {}", self.endpoint, message);
                self.stop(StopReason::SourceError(message))
            }
        }
    }

    /// Records that media was fetched, resetting the idle clock
    pub fn record_success(&mut self) {
        self.state.record_success(Instant::now());
    }

    /// Why the walk ended, once it has
    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.stop_reason.as_ref()
    }

    /// Current pagination progress
    pub fn state(&self) -> &WalkState {
        &self.state
    }

    fn stop(&mut self, reason: StopReason) -> Option<FeedPage> {
        tracing::info!(
            "Walk of {} stopped after {} pages: {}",
            self.endpoint,
            self.state.pages_fetched,
            reason
        );
        self.stop_reason = Some(reason);
        None
    }

    async fn fetch_page(&self) -> Result<FeedPage, String> {
        let mut request = self
            .client
            .get(&self.endpoint)
            .timeout(self.request_timeout)
            .query(&[("limit", self.page_size.to_string())]);
        if let Some(cursor) = &self.state.cursor {
            request = request.query(&[("after", cursor.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| format!("reading body failed: {}", e))?;
        let listing: Listing = serde_json::from_slice(&body)
            .map_err(|e| format!("undecodable page: {}", e))?;

        Ok(listing.into_page())
    }
}
