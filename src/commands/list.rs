//! List posts from the content source

use anyhow::Result;
use std::io::Write;

use crate::cms::ContentSource;
use crate::content::{Feed, LoadMore, PostSummary};
use crate::helpers::format_publication_date;
use crate::Blog;

/// Print the post listing to stdout
pub async fn run(blog: &Blog, all: bool) -> Result<()> {
    let source = blog.content_source()?;
    let mut listing = Vec::new();
    list_posts(blog, source.as_ref(), all, &mut listing).await?;
    std::io::stdout().lock().write_all(&listing)?;
    Ok(())
}

/// Write the first page of posts, or every page when `all` is set.
///
/// Nothing is written until every page has been fetched.
pub async fn list_posts(
    blog: &Blog,
    source: &dyn ContentSource,
    all: bool,
    out: &mut impl Write,
) -> Result<()> {
    let tz = blog.config.timezone()?;
    let mut feed = Feed::first_page(source).await?;

    if all {
        while let LoadMore::Appended(count) = feed.load_more(source).await? {
            tracing::debug!("Loaded {} more posts", count);
        }
    }

    writeln!(out, "Posts ({}):", feed.posts().len())?;
    for post in feed.posts() {
        write_post(out, post, tz, &blog.config.date_format)?;
    }
    if feed.has_more() {
        writeln!(out, "  ... more posts available (use --all)")?;
    }

    Ok(())
}

fn write_post(
    out: &mut impl Write,
    post: &PostSummary,
    tz: chrono_tz::Tz,
    date_format: &str,
) -> Result<()> {
    let date = format_publication_date(post.first_publication_date.as_ref(), tz, date_format);
    writeln!(
        out,
        "  {:>11}  {} - {} [{}]",
        date, post.title, post.author, post.uid
    )?;
    Ok(())
}
