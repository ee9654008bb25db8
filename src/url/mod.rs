//! URL handling module for Feed-Harvest
//!
//! This module provides media URL normalization, host pattern matching,
//! and suffix-based media classification.

mod matcher;
mod normalize;

use std::fmt;
use url::Url;

// Re-export main functions
pub use matcher::{matches_any_host, matches_host};
pub use normalize::{media_file_name, normalize_media_url, unescape_html};

/// Kind of media a URL points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Still image (jpg, png, webp)
    Image,
    /// Animated image
    Gif,
    /// Video, always fetched through the extractor
    Video,
    /// Anything else; dropped without being counted
    Unknown,
}

impl MediaKind {
    /// Content-type prefix a direct download must declare
    pub fn expected_content_prefix(&self) -> Option<&'static str> {
        match self {
            Self::Image | Self::Gif => Some("image/"),
            Self::Video => Some("video/"),
            Self::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Gif => "gif",
            Self::Video => "video",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a URL by the file extension of its path
///
/// # Examples
///
/// ```
/// use feed_harvest::url::{classify_suffix, MediaKind};
/// use url::Url;
///
/// let url = Url::parse("https://i.redd.it/cat.JPG").unwrap();
/// assert_eq!(classify_suffix(&url), MediaKind::Image);
///
/// let url = Url::parse("https://example.com/watch").unwrap();
/// assert_eq!(classify_suffix(&url), MediaKind::Unknown);
/// ```
pub fn classify_suffix(url: &Url) -> MediaKind {
    let path = url.path().to_ascii_lowercase();

    if path.ends_with(".jpg")
        || path.ends_with(".jpeg")
        || path.ends_with(".png")
        || path.ends_with(".webp")
    {
        MediaKind::Image
    } else if path.ends_with(".gif") {
        MediaKind::Gif
    } else {
        MediaKind::Unknown
    }
}

/// Returns true if the URL's host matches one of the video host patterns
pub fn is_video_host(url: &Url, patterns: &[String]) -> bool {
    url.host_str()
        .map(|host| matches_any_host(patterns, host))
        .unwrap_or(false)
}
