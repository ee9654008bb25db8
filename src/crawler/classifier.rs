//! Media classification for feed posts
//!
//! Each post can contribute several media references. They are collected in
//! a fixed order:
//!
//! 1. Embedded video (`is_video` + fallback stream URL) → video, delegated
//! 2. Post link on a known video host → video, delegated
//! 3. Gallery items → image (or gif for animated items), direct
//! 4. Destination link by suffix → image or gif, direct; anything else dropped
//!
//! Every URL is normalized first and the normalized form deduplicates
//! references within one page.

use crate::crawler::feed::Post;
use crate::url::{classify_suffix, is_video_host, normalize_media_url, MediaKind};
use std::collections::HashSet;
use std::fmt;
use url::Url;

/// How a media reference is fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Streamed over HTTP with content validation
    Direct,
    /// Handed to the external extractor
    Delegated,
}

/// A classified, normalized media URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaReference {
    pub url: Url,
    pub kind: MediaKind,
    pub strategy: FetchStrategy,
}

impl MediaReference {
    fn direct(url: Url, kind: MediaKind) -> Self {
        Self {
            url,
            kind,
            strategy: FetchStrategy::Direct,
        }
    }

    fn delegated(url: Url) -> Self {
        Self {
            url,
            kind: MediaKind::Video,
            strategy: FetchStrategy::Delegated,
        }
    }
}

impl fmt::Display for MediaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.url)
    }
}

/// Turns posts into fetchable media references
#[derive(Debug, Clone)]
pub struct MediaClassifier {
    video_hosts: Vec<String>,
}

impl MediaClassifier {
    /// Creates a classifier with the given video host patterns
    pub fn new(video_hosts: Vec<String>) -> Self {
        Self { video_hosts }
    }

    /// Classifies every post on a page, dropping repeated URLs
    ///
    /// The first reference for a normalized URL wins; later ones are counted
    /// in the returned duplicate tally.
    pub fn classify_page(&self, posts: &[Post]) -> (Vec<MediaReference>, usize) {
        let mut seen = HashSet::new();
        let mut references = Vec::new();
        let mut duplicates = 0;

        for post in posts {
            for reference in self.classify_post(post) {
                if seen.insert(reference.url.as_str().to_string()) {
                    references.push(reference);
                } else {
                    duplicates += 1;
                }
            }
        }

        (references, duplicates)
    }

    /// Classifies one post, in rule order
    pub fn classify_post(&self, post: &Post) -> Vec<MediaReference> {
        let mut references = Vec::new();

        if let Some(video) = post.embedded_video_url().and_then(normalize) {
            references.push(MediaReference::delegated(video));
        } else if let Some(link) = post.url.as_deref().and_then(normalize) {
            if is_video_host(&link, &self.video_hosts) {
                references.push(MediaReference::delegated(link));
            }
        }

        if let Some(gallery) = &post.media_metadata {
            for item in gallery.values() {
                let Some(source) = &item.s else {
                    continue;
                };
                if let Some(url) = source.u.as_deref().and_then(normalize) {
                    references.push(MediaReference::direct(url, MediaKind::Image));
                } else if let Some(url) = source.gif.as_deref().and_then(normalize) {
                    references.push(MediaReference::direct(url, MediaKind::Gif));
                }
            }
        }

        if let Some(dest) = post.url_overridden_by_dest.as_deref().and_then(normalize) {
            match classify_suffix(&dest) {
                kind @ (MediaKind::Image | MediaKind::Gif) => {
                    references.push(MediaReference::direct(dest, kind));
                }
                _ => {}
            }
        }

        references
    }
}

fn normalize(raw: &str) -> Option<Url> {
    match normalize_media_url(raw) {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::debug!("Dropping media URL '{}': {}", raw, e);
            None
        }
    }
}
