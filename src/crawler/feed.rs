//! Feed source wire types
//!
//! A listing page looks like
//! `{"data": {"children": [{"kind": "t3", "data": {...post...}}], "after": "t3_x"}}`.
//! Only the fields the classifier reads are modelled; everything else is
//! ignored.

use serde::Deserialize;
use std::collections::BTreeMap;

/// One page of the feed, as handed to the pipeline
#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    pub posts: Vec<Post>,

    /// Continuation cursor; None means the source has nothing after this page
    pub next_cursor: Option<String>,
}

impl FeedPage {
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

/// Top-level listing envelope
#[derive(Debug, Deserialize)]
pub struct Listing {
    pub data: ListingData,
}

#[derive(Debug, Deserialize)]
pub struct ListingData {
    #[serde(default)]
    pub children: Vec<Child>,

    #[serde(default)]
    pub after: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Child {
    #[serde(default)]
    pub data: Post,
}

impl Listing {
    /// Converts the envelope into a page; an empty cursor counts as none
    pub fn into_page(self) -> FeedPage {
        let next_cursor = self.data.after.filter(|after| !after.trim().is_empty());
        FeedPage {
            posts: self.data.children.into_iter().map(|c| c.data).collect(),
            next_cursor,
        }
    }
}

/// The parts of a post that can reference media
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub is_video: bool,

    #[serde(default)]
    pub media: Option<PostMedia>,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub url_overridden_by_dest: Option<String>,

    /// Gallery items keyed by media id; ordered for deterministic fetching
    #[serde(default)]
    pub media_metadata: Option<BTreeMap<String, GalleryItem>>,
}

impl Post {
    /// Fallback stream URL of an embedded video, if the post is one
    pub fn embedded_video_url(&self) -> Option<&str> {
        if !self.is_video {
            return None;
        }
        self.media
            .as_ref()?
            .reddit_video
            .as_ref()?
            .fallback_url
            .as_deref()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostMedia {
    #[serde(default)]
    pub reddit_video: Option<EmbeddedVideo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbeddedVideo {
    #[serde(default)]
    pub fallback_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GalleryItem {
    /// Source rendition; failed uploads have none
    #[serde(default)]
    pub s: Option<GallerySource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GallerySource {
    /// Still image URL
    #[serde(default)]
    pub u: Option<String>,

    /// Animated image URL, present on animated gallery items
    #[serde(default)]
    pub gif: Option<String>,
}
