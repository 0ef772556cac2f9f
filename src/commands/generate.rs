//! Generate static files

use anyhow::Result;
use std::sync::Arc;

use crate::cache::{self, CacheDb};
use crate::cms::ContentSource;
use crate::generator::{Generator, PageOutcome, RenderedPage};
use crate::helpers::is_safe_uid;
use crate::Blog;

/// What a generation pass did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GenerateReport {
    pub written: usize,
    pub unchanged: usize,
    pub removed: usize,
    pub not_found: usize,
    /// Uids that cannot be used as a directory name
    pub skipped: usize,
}

/// Generate the static site from the configured content source
pub async fn run(blog: &Blog) -> Result<()> {
    let source = blog.content_source()?;
    run_with_source(blog, source).await?;
    Ok(())
}

/// Generate the static site from the given content source
pub async fn run_with_source(
    blog: &Blog,
    source: Arc<dyn ContentSource>,
) -> Result<GenerateReport> {
    let start = std::time::Instant::now();
    let generator = Generator::new(blog, source)?;

    let previous = CacheDb::load(&blog.base_dir);
    let mut current = CacheDb::new();
    let mut report = GenerateReport::default();

    generator.copy_static_assets()?;
    generator.write_not_found_page()?;

    let index = generator.render_index().await?;
    write_page(&generator, &previous, &mut current, &mut report, &index)?;

    let uids = generator.enumerate_paths().await?;
    tracing::info!("Found {} posts", uids.len());

    for uid in &uids {
        if !is_safe_uid(uid) {
            tracing::warn!("Skipping post with unusable uid {:?}", uid);
            report.skipped += 1;
            continue;
        }
        match generator.render_post(uid).await? {
            PageOutcome::Rendered(page) => {
                write_page(&generator, &previous, &mut current, &mut report, &page)?
            }
            PageOutcome::NotFound => {
                tracing::warn!("Skipping post {}: listed but not found", uid);
                report.not_found += 1;
            }
        }
    }

    for route in previous.removed_routes(&current) {
        generator.remove(&route)?;
        report.removed += 1;
    }

    current.save(&blog.base_dir)?;

    tracing::info!(
        "Generated {} pages ({} unchanged, {} removed) in {:.2}s",
        report.written,
        report.unchanged,
        report.removed,
        start.elapsed().as_secs_f64()
    );

    Ok(report)
}

fn write_page(
    generator: &Generator,
    previous: &CacheDb,
    current: &mut CacheDb,
    report: &mut GenerateReport,
    page: &RenderedPage,
) -> Result<()> {
    let hash = cache::hash_content(&page.html);
    if previous.is_unchanged(&page.route, hash) && generator.output_path(&page.route)?.exists() {
        report.unchanged += 1;
    } else {
        generator.write(page)?;
        report.written += 1;
    }
    current.record(&page.route, hash, page.uid.as_deref());
    Ok(())
}

/// Regenerate the whole site every revalidation interval until Ctrl+C
pub async fn watch(blog: &Blog) -> Result<()> {
    let source = blog.content_source()?;
    let mut ticker = tokio::time::interval(blog.config.revalidate_interval());

    tracing::info!(
        "Regenerating every {}s. Press Ctrl+C to stop.",
        blog.config.revalidate_interval().as_secs()
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = run_with_source(blog, source.clone()).await {
                    tracing::error!("Generation failed: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Stopping");
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::memory::{sample_post, MemorySource};
    use crate::config::SiteConfig;
    use std::fs;

    fn blog(dir: &std::path::Path) -> Blog {
        Blog::with_config(dir.to_path_buf(), SiteConfig::default())
    }

    #[tokio::test]
    async fn test_generate_writes_every_page() {
        let dir = tempfile::tempdir().unwrap();
        let blog = blog(dir.path());
        let source = Arc::new(MemorySource::with_posts(6, 5));

        let report = run_with_source(&blog, source).await.unwrap();
        assert_eq!(report.written, 7);
        assert_eq!(report.unchanged, 0);

        let public = &blog.public_dir;
        assert!(public.join("index.html").exists());
        assert!(public.join("404.html").exists());
        for i in 1..=6 {
            assert!(public.join(format!("post/post-{}/index.html", i)).exists());
        }

        let index = fs::read_to_string(public.join("index.html")).unwrap();
        assert!(index.contains(r#"data-next-page="page:2""#));

        let cache = CacheDb::load(&blog.base_dir);
        assert_eq!(cache.pages.len(), 7);
        assert_eq!(cache.get("post/post-3").unwrap().uid.as_deref(), Some("post-3"));
    }

    #[tokio::test]
    async fn test_second_run_skips_unchanged_pages() {
        let dir = tempfile::tempdir().unwrap();
        let blog = blog(dir.path());
        let source = Arc::new(MemorySource::with_posts(2, 5));

        run_with_source(&blog, source.clone()).await.unwrap();
        let report = run_with_source(&blog, source).await.unwrap();
        assert_eq!(report.written, 0);
        assert_eq!(report.unchanged, 3);
    }

    #[tokio::test]
    async fn test_deleted_posts_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        let blog = blog(dir.path());
        let source = Arc::new(MemorySource::with_posts(2, 5));

        run_with_source(&blog, source.clone()).await.unwrap();
        assert!(blog.public_dir.join("post/post-2/index.html").exists());

        source.set_posts(vec![sample_post("post-1", "Post 1")]);
        let report = run_with_source(&blog, source).await.unwrap();
        assert_eq!(report.removed, 1);
        // the index lost a card
        assert_eq!(report.written, 1);
        assert!(!blog.public_dir.join("post/post-2").exists());
        assert!(blog.public_dir.join("post/post-1/index.html").exists());
    }

    #[tokio::test]
    async fn test_unusable_uids_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let blog = blog(dir.path());
        let source = Arc::new(MemorySource::new(
            vec![sample_post("ok", "Ok"), sample_post("..", "Dots")],
            5,
        ));

        let report = run_with_source(&blog, source).await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.written, 2);
        assert!(blog.public_dir.join("post/ok/index.html").exists());
        let cache = CacheDb::load(&blog.base_dir);
        assert_eq!(cache.pages.len(), 2);
        assert!(cache.get("post/..").is_none());
    }

    #[tokio::test]
    async fn test_source_failure_aborts_generation() {
        let dir = tempfile::tempdir().unwrap();
        let blog = blog(dir.path());
        let source = Arc::new(MemorySource::with_posts(2, 5));
        source.set_failing(true);

        assert!(run_with_source(&blog, source).await.is_err());
        assert!(!blog.public_dir.join("index.html").exists());
    }
}
