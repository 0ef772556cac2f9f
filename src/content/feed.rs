//! Post listing with cursor-based "load more" pagination

use super::post::{PostSummary, PostsPage};
use crate::cms::{CmsError, ContentSource};

/// Ordered post listing and the cursor for the page after it.
///
/// Posts are only ever appended. `load_more` borrows the feed mutably, so a
/// second load cannot start while one is outstanding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feed {
    posts: Vec<PostSummary>,
    next_page: Option<String>,
}

/// Result of a `load_more` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMore {
    /// This many posts were appended
    Appended(usize),
    /// There was no cursor; nothing was fetched
    Exhausted,
}

impl Feed {
    /// Start a feed from an already fetched page
    pub fn new(page: PostsPage) -> Self {
        Self {
            posts: page.results,
            next_page: page.next_page,
        }
    }

    /// Fetch the first listing page
    pub async fn first_page(source: &dyn ContentSource) -> Result<Self, CmsError> {
        Ok(Self::new(source.first_page().await?))
    }

    pub fn posts(&self) -> &[PostSummary] {
        &self.posts
    }

    pub fn next_page(&self) -> Option<&str> {
        self.next_page.as_deref()
    }

    pub fn has_more(&self) -> bool {
        self.next_page.is_some()
    }

    /// Fetch the page behind the cursor and append it.
    ///
    /// On error the feed is left exactly as it was.
    pub async fn load_more(&mut self, source: &dyn ContentSource) -> Result<LoadMore, CmsError> {
        let Some(cursor) = self.next_page.as_deref() else {
            return Ok(LoadMore::Exhausted);
        };

        let page = source.page_at(cursor).await?;
        let appended = page.results.len();
        tracing::debug!("Loaded {} more posts", appended);

        self.posts.extend(page.results);
        self.next_page = page.next_page;

        Ok(LoadMore::Appended(appended))
    }
}
