//! Content source access
//!
//! The blog never talks HTTP directly; generation and listing go through the
//! [`ContentSource`] trait so a different backend (or an in-memory one in
//! tests) can be swapped in.

mod error;
#[cfg(test)]
pub(crate) mod memory;
mod prismic;

pub use error::CmsError;
pub use prismic::PrismicClient;

use async_trait::async_trait;

use crate::content::{PostDetail, PostsPage};

/// A headless CMS holding the blog posts
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// First listing page, projected to the summary fields
    async fn first_page(&self) -> Result<PostsPage, CmsError>;

    /// Listing page behind an opaque cursor returned by an earlier page
    async fn page_at(&self, cursor: &str) -> Result<PostsPage, CmsError>;

    /// Full post by identifier; `CmsError::NotFound` when it does not exist
    async fn post_by_uid(&self, uid: &str) -> Result<PostDetail, CmsError>;

    /// Identifiers of every post
    async fn all_uids(&self) -> Result<Vec<String>, CmsError>;
}
