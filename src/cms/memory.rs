//! In-memory content source for tests

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{CmsError, ContentSource};
use crate::content::rich_text::{NodeKind, RichTextNode};
use crate::content::{ContentBlock, PostDetail, PostSummary, PostsPage};

/// Serves a fixed list of posts, paginated with `page:<n>` cursors
pub(crate) struct MemorySource {
    posts: Mutex<Vec<PostDetail>>,
    page_size: usize,
    failing: AtomicBool,
    page_calls: AtomicUsize,
    detail_calls: AtomicUsize,
}

pub(crate) fn sample_post(uid: &str, title: &str) -> PostDetail {
    PostDetail {
        summary: PostSummary {
            uid: uid.to_string(),
            first_publication_date: Utc.with_ymd_and_hms(2021, 3, 25, 0, 0, 0).single(),
            title: title.to_string(),
            subtitle: format!("About {}", title),
            author: "Danilo Vieira".to_string(),
        },
        banner_url: format!("https://images.example.com/{}.png", uid),
        content: vec![ContentBlock {
            heading: "Proin et varius".to_string(),
            body: vec![RichTextNode {
                kind: NodeKind::Paragraph,
                text: "Nullam dolor sapien, vulputate eu diam at.".to_string(),
                spans: Vec::new(),
                url: None,
                alt: None,
                oembed: None,
            }],
        }],
    }
}

impl MemorySource {
    pub(crate) fn new(posts: Vec<PostDetail>, page_size: usize) -> Self {
        Self {
            posts: Mutex::new(posts),
            page_size,
            failing: AtomicBool::new(false),
            page_calls: AtomicUsize::new(0),
            detail_calls: AtomicUsize::new(0),
        }
    }

    /// `count` posts named `post-1`..`post-<count>`
    pub(crate) fn with_posts(count: usize, page_size: usize) -> Self {
        let posts = (1..=count)
            .map(|i| sample_post(&format!("post-{}", i), &format!("Post {}", i)))
            .collect();
        Self::new(posts, page_size)
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn set_posts(&self, posts: Vec<PostDetail>) {
        *self.posts.lock().unwrap() = posts;
    }

    pub(crate) fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    fn check_failing(&self, what: &str) -> Result<(), CmsError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CmsError::Status {
                url: what.to_string(),
                status: 503,
            });
        }
        Ok(())
    }

    fn page(&self, number: usize) -> PostsPage {
        let posts = self.posts.lock().unwrap();
        let start = (number - 1) * self.page_size;
        let end = (start + self.page_size).min(posts.len());
        let results = posts
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|p| p.summary.clone())
            .collect();
        let next_page = (end < posts.len()).then(|| format!("page:{}", number + 1));
        PostsPage { results, next_page }
    }
}

#[async_trait]
impl ContentSource for MemorySource {
    async fn first_page(&self) -> Result<PostsPage, CmsError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failing("first page")?;
        Ok(self.page(1))
    }

    async fn page_at(&self, cursor: &str) -> Result<PostsPage, CmsError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failing(cursor)?;
        let number = cursor
            .strip_prefix("page:")
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|n| *n >= 1)
            .ok_or_else(|| CmsError::Status {
                url: cursor.to_string(),
                status: 400,
            })?;
        Ok(self.page(number))
    }

    async fn post_by_uid(&self, uid: &str) -> Result<PostDetail, CmsError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failing(uid)?;
        self.posts
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.uid() == uid)
            .cloned()
            .ok_or_else(|| CmsError::NotFound {
                document_type: "posts".to_string(),
                uid: uid.to_string(),
            })
    }

    async fn all_uids(&self) -> Result<Vec<String>, CmsError> {
        self.check_failing("all uids")?;
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.uid().to_string())
            .collect())
    }
}
