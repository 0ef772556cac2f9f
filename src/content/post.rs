//! Post models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::rich_text::RichTextNode;

/// A post as shown on the listing page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    /// Unique identifier, also the URL slug
    pub uid: String,

    /// First publication date, if the source reports one
    pub first_publication_date: Option<DateTime<Utc>>,

    /// Post title
    pub title: String,

    /// Post subtitle
    pub subtitle: String,

    /// Author name
    pub author: String,
}

/// A fully fetched post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDetail {
    /// Listing fields
    #[serde(flatten)]
    pub summary: PostSummary,

    /// Banner image URL
    pub banner_url: String,

    /// Content sections in document order
    pub content: Vec<ContentBlock>,
}

/// A section of a post: a heading followed by rich text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub heading: String,
    pub body: Vec<RichTextNode>,
}

/// One page of the post listing
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PostsPage {
    /// Posts in the order the source returned them
    pub results: Vec<PostSummary>,

    /// Opaque cursor for the following page; `None` when exhausted
    pub next_page: Option<String>,
}

impl PostDetail {
    pub fn uid(&self) -> &str {
        &self.summary.uid
    }
}
