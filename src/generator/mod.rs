//! Generator module - renders pages from the content source using the
//! built-in Tera templates

use anyhow::Result;
use chrono_tz::Tz;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tera::Context;
use walkdir::WalkDir;

use crate::cms::ContentSource;
use crate::content::{
    reading_minutes, Feed, PostDetail, PostSummary, PrismicRichText, RichTextRenderer,
};
use crate::helpers::{
    date_xml, format_publication_date, full_url_for, post_route, post_url, route_uid, url_for,
};
use crate::templates::{
    ConfigData, FeedData, PostCard, PostPageData, SectionData, TemplateRenderer,
};
use crate::Blog;

/// Route key of the listing page
pub const INDEX_ROUTE: &str = "index";

/// A rendered page and where it belongs
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Route key, `index` or `post/<uid>`
    pub route: String,
    /// Post identifier, for post pages
    pub uid: Option<String>,
    pub html: String,
}

/// Result of rendering one route
#[derive(Debug, Clone)]
pub enum PageOutcome {
    Rendered(RenderedPage),
    /// The content source does not know this post
    NotFound,
}

/// Static page generator
pub struct Generator {
    blog: Blog,
    source: Arc<dyn ContentSource>,
    rich_text: Arc<dyn RichTextRenderer>,
    renderer: TemplateRenderer,
    timezone: Tz,
}

impl Generator {
    /// Create a new generator using the Prismic rich text format
    pub fn new(blog: &Blog, source: Arc<dyn ContentSource>) -> Result<Self> {
        let rich_text = Arc::new(PrismicRichText::new(&blog.config.root));
        Self::with_rich_text(blog, source, rich_text)
    }

    /// Create a generator with a custom rich text renderer
    pub fn with_rich_text(
        blog: &Blog,
        source: Arc<dyn ContentSource>,
        rich_text: Arc<dyn RichTextRenderer>,
    ) -> Result<Self> {
        Ok(Self {
            blog: blog.clone(),
            source,
            rich_text,
            renderer: TemplateRenderer::new()?,
            timezone: blog.config.timezone()?,
        })
    }

    /// Build config data for templates
    fn build_config_data(&self) -> ConfigData {
        let config = &self.blog.config;
        ConfigData {
            title: config.title.clone(),
            description: config.description.clone(),
            language: config.language.clone(),
            logo: url_for(config, &config.logo),
            root: url_for(config, ""),
            timezone: config.timezone.clone(),
        }
    }

    fn create_base_context(&self) -> Context {
        let mut context = Context::new();
        context.insert("config", &self.build_config_data());
        context
    }

    fn format_date(&self, post: &PostSummary) -> (String, String) {
        let date = format_publication_date(
            post.first_publication_date.as_ref(),
            self.timezone,
            &self.blog.config.date_format,
        );
        let xml = post
            .first_publication_date
            .as_ref()
            .map(date_xml)
            .unwrap_or_default();
        (date, xml)
    }

    fn post_card(&self, post: &PostSummary) -> PostCard {
        let (date, date_xml) = self.format_date(post);
        PostCard {
            uid: post.uid.clone(),
            title: post.title.clone(),
            subtitle: post.subtitle.clone(),
            author: post.author.clone(),
            date,
            date_xml,
            url: post_url(&self.blog.config, &post.uid),
        }
    }

    /// Render the listing page from the first page of posts
    pub async fn render_index(&self) -> Result<RenderedPage> {
        let feed = Feed::first_page(self.source.as_ref()).await?;
        tracing::debug!("Listing page has {} posts", feed.posts().len());
        self.render_feed(&feed)
    }

    /// Render the listing page for an already loaded feed
    pub fn render_feed(&self, feed: &Feed) -> Result<RenderedPage> {
        let data = FeedData {
            posts: feed.posts().iter().map(|p| self.post_card(p)).collect(),
            next_page: feed.next_page().map(str::to_string),
        };

        let mut context = self.create_base_context();
        context.insert("feed", &data);

        Ok(RenderedPage {
            route: INDEX_ROUTE.to_string(),
            uid: None,
            html: self.renderer.render("index.html", &context)?,
        })
    }

    /// Fetch and render a single post
    pub async fn render_post(&self, uid: &str) -> Result<PageOutcome> {
        match self.source.post_by_uid(uid).await {
            Ok(post) => Ok(PageOutcome::Rendered(self.render_post_detail(&post)?)),
            Err(e) if e.is_not_found() => {
                tracing::info!("Post not found upstream: {}", uid);
                Ok(PageOutcome::NotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Render a post that has already been fetched
    pub fn render_post_detail(&self, post: &PostDetail) -> Result<RenderedPage> {
        let (date, date_xml) = self.format_date(&post.summary);
        let sections = post
            .content
            .iter()
            .map(|block| SectionData {
                heading: block.heading.clone(),
                html: self.rich_text.as_html(&block.body),
            })
            .collect();

        let data = PostPageData {
            uid: post.uid().to_string(),
            title: post.summary.title.clone(),
            subtitle: post.summary.subtitle.clone(),
            author: post.summary.author.clone(),
            date,
            date_xml,
            banner_url: post.banner_url.clone(),
            permalink: full_url_for(
                &self.blog.config,
                &format!("{}/", post_route(post.uid())),
            ),
            reading_minutes: reading_minutes(&post.content, self.rich_text.as_ref()),
            sections,
        };

        let mut context = self.create_base_context();
        context.insert("post", &data);

        Ok(RenderedPage {
            route: post_route(post.uid()),
            uid: Some(post.uid().to_string()),
            html: self.renderer.render("post.html", &context)?,
        })
    }

    /// Render whatever lives at `route`
    pub async fn render_route(&self, route: &str) -> Result<PageOutcome> {
        if route == INDEX_ROUTE {
            return Ok(PageOutcome::Rendered(self.render_index().await?));
        }
        match route_uid(route) {
            Some(uid) => self.render_post(uid).await,
            None => anyhow::bail!("Unknown route: {}", route),
        }
    }

    /// Identifiers of every post to pre-render
    pub async fn enumerate_paths(&self) -> Result<Vec<String>> {
        Ok(self.source.all_uids().await?)
    }

    pub fn render_loading(&self) -> Result<String> {
        self.renderer.render("loading.html", &self.create_base_context())
    }

    pub fn render_not_found(&self) -> Result<String> {
        self.renderer.render("not_found.html", &self.create_base_context())
    }

    /// Output file for a route
    pub fn output_path(&self, route: &str) -> Result<PathBuf> {
        if route == INDEX_ROUTE {
            return Ok(self.blog.public_dir.join("index.html"));
        }
        Ok(self.post_dir(route)?.join("index.html"))
    }

    /// Directory of a post page; refuses anything but `post/<uid>` with a
    /// single-component uid
    fn post_dir(&self, route: &str) -> Result<PathBuf> {
        match route_uid(route) {
            Some(uid) => Ok(self.blog.public_dir.join("post").join(uid)),
            None => anyhow::bail!("Invalid route: {:?}", route),
        }
    }

    /// Write a page, replacing any previous version in one step
    pub fn write(&self, page: &RenderedPage) -> Result<PathBuf> {
        let output_path = self.output_path(&page.route)?;
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| anyhow::anyhow!("Failed to create dir {:?}: {}", parent, e))?;
        }

        let tmp_path = output_path.with_extension("html.tmp");
        fs::write(&tmp_path, &page.html)
            .map_err(|e| anyhow::anyhow!("Failed to write {:?}: {}", tmp_path, e))?;
        fs::rename(&tmp_path, &output_path)?;

        tracing::debug!("Generated: {:?}", output_path);
        Ok(output_path)
    }

    /// Delete the output of a post page
    pub fn remove(&self, route: &str) -> Result<()> {
        if route == INDEX_ROUTE {
            return Ok(());
        }
        let dir = self.post_dir(route)?;
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
            tracing::info!("Deleted: {:?}", dir);
        }
        Ok(())
    }

    /// Write the 404 page
    pub fn write_not_found_page(&self) -> Result<()> {
        fs::create_dir_all(&self.blog.public_dir)?;
        fs::write(self.blog.public_dir.join("404.html"), self.render_not_found()?)?;
        Ok(())
    }

    /// Copy static assets (logo, images, etc.)
    pub fn copy_static_assets(&self) -> Result<()> {
        let static_dir = &self.blog.static_dir;
        if !static_dir.exists() {
            return Ok(());
        }

        let mut copied = 0;
        for entry in WalkDir::new(static_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let relative = path.strip_prefix(static_dir)?;
            let dest = self.blog.public_dir.join(relative);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(path, &dest)?;
            copied += 1;
        }

        tracing::debug!("Copied {} static assets", copied);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::memory::{sample_post, MemorySource};
    use crate::config::SiteConfig;

    fn blog(dir: &std::path::Path) -> Blog {
        Blog::with_config(dir.to_path_buf(), SiteConfig::default())
    }

    fn generator(blog: &Blog, source: MemorySource) -> Generator {
        Generator::new(blog, Arc::new(source)).unwrap()
    }

    #[tokio::test]
    async fn test_index_lists_first_page_with_load_more() {
        let dir = tempfile::tempdir().unwrap();
        let gen = generator(&blog(dir.path()), MemorySource::with_posts(7, 5));

        let page = gen.render_index().await.unwrap();
        assert_eq!(page.route, INDEX_ROUTE);
        assert!(page.html.contains(r#"href="/post/post-1/""#));
        assert!(page.html.contains(r#"href="/post/post-5/""#));
        assert!(!page.html.contains("post-6"));
        assert!(page.html.contains("25 Mar 2021"));
        assert!(page.html.contains("Danilo Vieira"));
        assert!(page.html.contains(r#"data-next-page="page:2""#));
        assert!(page.html.contains("Load more posts"));
    }

    #[tokio::test]
    async fn test_index_without_cursor_has_no_load_more() {
        let dir = tempfile::tempdir().unwrap();
        let gen = generator(&blog(dir.path()), MemorySource::with_posts(3, 5));

        let page = gen.render_index().await.unwrap();
        assert!(page.html.contains("Post 3"));
        assert!(!page.html.contains(r#"id="load-more""#));
        assert!(!page.html.contains("<script>"));
    }

    #[tokio::test]
    async fn test_render_post() {
        let dir = tempfile::tempdir().unwrap();
        let gen = generator(&blog(dir.path()), MemorySource::with_posts(2, 5));

        let PageOutcome::Rendered(page) = gen.render_post("post-2").await.unwrap() else {
            panic!("post-2 should exist");
        };
        assert_eq!(page.route, "post/post-2");
        assert_eq!(page.uid.as_deref(), Some("post-2"));
        assert!(page.html.contains(r#"src="https://images.example.com/post-2.png""#));
        assert!(page.html.contains("<h1>Post 2</h1>"));
        assert!(page.html.contains("<h2>Proin et varius</h2>"));
        assert!(page.html.contains("<p>Nullam dolor sapien, vulputate eu diam at.</p>"));
        assert!(page.html.contains("1 min"));
        assert!(page.html.contains(
            r#"<link rel="canonical" href="http://localhost:3000/post/post-2/">"#
        ));
        assert!(page.html.contains("25 Mar 2021"));
    }

    #[tokio::test]
    async fn test_post_without_content_reads_in_zero_minutes() {
        let dir = tempfile::tempdir().unwrap();
        let mut post = sample_post("empty", "Empty");
        post.content.clear();
        let gen = generator(&blog(dir.path()), MemorySource::new(vec![post], 5));

        let PageOutcome::Rendered(page) = gen.render_post("empty").await.unwrap() else {
            panic!("empty should exist");
        };
        assert!(page.html.contains("0 min"));
    }

    #[tokio::test]
    async fn test_unknown_post_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let gen = generator(&blog(dir.path()), MemorySource::with_posts(2, 5));

        let outcome = gen.render_route("post/nope").await.unwrap();
        assert!(matches!(outcome, PageOutcome::NotFound));
    }

    #[tokio::test]
    async fn test_source_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = MemorySource::with_posts(2, 5);
        source.set_failing(true);
        let gen = generator(&blog(dir.path()), source);

        assert!(gen.render_post("post-1").await.is_err());
    }

    #[tokio::test]
    async fn test_write_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let blog = blog(dir.path());
        let gen = generator(&blog, MemorySource::with_posts(1, 5));

        let page = gen.render_post_detail(&sample_post("hello", "Hello")).unwrap();
        let path = gen.write(&page).unwrap();
        assert_eq!(path, blog.public_dir.join("post/hello/index.html"));
        assert_eq!(fs::read_to_string(&path).unwrap(), page.html);
        assert!(!path.with_extension("html.tmp").exists());

        gen.remove("post/hello").unwrap();
        assert!(!blog.public_dir.join("post/hello").exists());
    }

    #[test]
    fn test_remove_refuses_dot_segments() {
        let dir = tempfile::tempdir().unwrap();
        let blog = blog(dir.path());
        let gen = generator(&blog, MemorySource::with_posts(1, 5));

        let page = gen.render_post_detail(&sample_post("keep", "Keep")).unwrap();
        gen.write(&page).unwrap();

        for route in ["post/.", "post/..", "post/a/b", "post/", "posts", "../public"] {
            assert!(gen.remove(route).is_err(), "{} should be refused", route);
            assert!(gen.output_path(route).is_err());
        }
        assert!(blog.public_dir.join("post/keep/index.html").exists());
        assert!(gen.remove("index").is_ok());
    }

    #[test]
    fn test_unsafe_uid_from_source_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let blog = blog(dir.path());
        let gen = generator(&blog, MemorySource::with_posts(1, 5));

        let page = gen.render_post_detail(&sample_post("..", "Dots")).unwrap();
        assert!(gen.write(&page).is_err());
        assert!(!blog.public_dir.join("index.html").exists());
    }

    #[tokio::test]
    async fn test_render_route_rejects_unsafe_uid() {
        let dir = tempfile::tempdir().unwrap();
        let source = MemorySource::with_posts(1, 5);
        let gen = generator(&blog(dir.path()), source);

        assert!(gen.render_route("post/.").await.is_err());
    }

    #[test]
    fn test_copy_static_assets() {
        let dir = tempfile::tempdir().unwrap();
        let blog = blog(dir.path());
        fs::create_dir_all(blog.static_dir.join("assets")).unwrap();
        fs::write(blog.static_dir.join("assets/Logo.png"), b"png").unwrap();

        let gen = generator(&blog, MemorySource::with_posts(0, 5));
        gen.copy_static_assets().unwrap();
        assert_eq!(
            fs::read(blog.public_dir.join("assets/Logo.png")).unwrap(),
            b"png"
        );
    }
}
