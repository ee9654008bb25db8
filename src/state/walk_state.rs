use std::time::{Duration, Instant};

/// Tracks pagination progress during one feed walk
///
/// This structure holds everything the stop conditions look at: the current
/// continuation cursor, the run of consecutive empty pages, and when media
/// was last fetched successfully.
#[derive(Debug, Clone)]
pub struct WalkState {
    /// Cursor to send with the next request; None requests the first page
    pub cursor: Option<String>,

    /// Number of pages received so far
    pub pages_fetched: u32,

    /// Length of the current run of empty pages
    pub consecutive_empty_pages: u32,

    /// Set once a non-empty page arrives without a continuation cursor
    pub end_of_feed: bool,

    /// When the walk started
    pub started_at: Instant,

    /// When media was last fetched successfully
    pub last_success_at: Option<Instant>,
}

impl WalkState {
    /// Creates a new WalkState starting at `now`, optionally resuming at a cursor
    pub fn new(now: Instant, cursor: Option<String>) -> Self {
        Self {
            cursor,
            pages_fetched: 0,
            consecutive_empty_pages: 0,
            end_of_feed: false,
            started_at: now,
            last_success_at: None,
        }
    }

    /// Records a page received from the feed source
    ///
    /// An empty page extends the empty run even when it carries a cursor. An
    /// empty page without a cursor keeps the current cursor, so the same page
    /// is requested again. A non-empty page without a cursor ends the feed.
    pub fn record_page(&mut self, post_count: usize, next_cursor: Option<String>) {
        self.pages_fetched += 1;

        if post_count == 0 {
            self.consecutive_empty_pages += 1;
            if next_cursor.is_some() {
                self.cursor = next_cursor;
            }
            return;
        }

        self.consecutive_empty_pages = 0;
        match next_cursor {
            Some(cursor) => self.cursor = Some(cursor),
            None => self.end_of_feed = true,
        }
    }

    /// Records that a media fetch succeeded
    pub fn record_success(&mut self, now: Instant) {
        self.last_success_at = Some(now);
    }

    /// Time since the last successful fetch, or since the walk started
    pub fn idle_for(&self, now: Instant) -> Duration {
        let since = self.last_success_at.unwrap_or(self.started_at);
        now.saturating_duration_since(since)
    }
}
