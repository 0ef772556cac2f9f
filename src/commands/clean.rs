//! Clean the public directory

use anyhow::Result;
use std::fs;

use crate::cache::CacheDb;
use crate::Blog;

/// Clean the public directory and the build manifest
pub fn run(blog: &Blog) -> Result<()> {
    if blog.public_dir.exists() {
        fs::remove_dir_all(&blog.public_dir)?;
        tracing::info!("Deleted: {:?}", blog.public_dir);
    }

    CacheDb::clear(&blog.base_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;

    #[test]
    fn test_clean_removes_output_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let blog = Blog::with_config(dir.path().to_path_buf(), SiteConfig::default());
        fs::create_dir_all(blog.public_dir.join("post/a")).unwrap();
        fs::write(blog.public_dir.join("post/a/index.html"), "x").unwrap();
        let mut cache = CacheDb::new();
        cache.record("post/a", 1, Some("a"));
        cache.save(&blog.base_dir).unwrap();

        run(&blog).unwrap();
        assert!(!blog.public_dir.exists());
        assert!(CacheDb::load(&blog.base_dir).pages.is_empty());

        // cleaning twice is fine
        run(&blog).unwrap();
    }
}
