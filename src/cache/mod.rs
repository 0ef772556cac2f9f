//! Build manifest for incremental generation
//!
//! Records, for every generated route, a hash of the rendered HTML and when
//! it was generated. Full generations use it to skip rewriting unchanged
//! pages and to remove pages whose post no longer exists upstream; the server
//! uses the timestamps to decide when a page has gone stale.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Cache directory name
const CACHE_DIR: &str = ".spacetraveling-cache";

/// Cache file name
const CACHE_FILE: &str = "db.json";

/// A generated page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Hash of the rendered HTML
    pub content_hash: u64,
    /// Generation time (as unix timestamp)
    pub generated_at: u64,
    /// Post identifier, for post pages
    pub uid: Option<String>,
}

/// Cache database of generated pages
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheDb {
    /// Version of the cache format
    pub version: u32,
    /// Generated pages, keyed by route
    pub pages: BTreeMap<String, PageRecord>,
}

impl CacheDb {
    /// Current cache format version
    const VERSION: u32 = 1;

    /// Load cache from disk, or create a new empty cache
    pub fn load(base_dir: &Path) -> Self {
        let cache_path = base_dir.join(CACHE_DIR).join(CACHE_FILE);
        if let Ok(content) = fs::read_to_string(&cache_path) {
            match serde_json::from_str::<CacheDb>(&content) {
                Ok(cache) if cache.version == Self::VERSION => return cache,
                Ok(_) => tracing::info!("Cache version mismatch, rebuilding cache"),
                Err(e) => tracing::warn!("Ignoring unreadable cache {:?}: {}", cache_path, e),
            }
        }
        Self::new()
    }

    /// Save cache to disk
    pub fn save(&self, base_dir: &Path) -> Result<()> {
        let cache_dir = base_dir.join(CACHE_DIR);
        fs::create_dir_all(&cache_dir)?;

        let content = serde_json::to_string_pretty(self)?;
        fs::write(cache_dir.join(CACHE_FILE), content)?;
        Ok(())
    }

    /// Remove the cache directory
    pub fn clear(base_dir: &Path) -> Result<()> {
        let cache_dir = base_dir.join(CACHE_DIR);
        if cache_dir.exists() {
            fs::remove_dir_all(&cache_dir)?;
            tracing::info!("Deleted: {:?}", cache_dir);
        }
        Ok(())
    }

    /// Create a new cache with version set
    pub fn new() -> Self {
        Self {
            version: Self::VERSION,
            ..Default::default()
        }
    }

    pub fn get(&self, route: &str) -> Option<&PageRecord> {
        self.pages.get(route)
    }

    /// Whether the cached page for `route` has exactly this content
    pub fn is_unchanged(&self, route: &str, content_hash: u64) -> bool {
        self.get(route)
            .map(|r| r.content_hash == content_hash)
            .unwrap_or(false)
    }

    /// Record a page as generated now
    pub fn record(&mut self, route: &str, content_hash: u64, uid: Option<&str>) {
        self.pages.insert(
            route.to_string(),
            PageRecord {
                content_hash,
                generated_at: unix_now(),
                uid: uid.map(str::to_string),
            },
        );
    }

    /// Drop the record of `route`; returns whether there was one
    pub fn forget(&mut self, route: &str) -> bool {
        self.pages.remove(route).is_some()
    }

    /// Routes present here but absent from `current`
    pub fn removed_routes(&self, current: &CacheDb) -> Vec<String> {
        self.pages
            .keys()
            .filter(|route| !current.pages.contains_key(*route))
            .cloned()
            .collect()
    }

    /// Time elapsed since `route` was generated
    pub fn age(&self, route: &str, now: SystemTime) -> Option<Duration> {
        let record = self.get(route)?;
        let generated = SystemTime::UNIX_EPOCH + Duration::from_secs(record.generated_at);
        Some(now.duration_since(generated).unwrap_or_default())
    }
}

/// Calculate a hash for rendered content
pub fn hash_content(content: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

/// Current time as unix timestamp
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
