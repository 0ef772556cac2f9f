//! Site configuration (_config.yml)

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub description: String,
    pub language: String,
    pub logo: String,

    // URL
    pub url: String,
    pub root: String,

    // Directory
    pub public_dir: String,
    pub static_dir: String,

    // Date / Time format
    pub timezone: String,
    pub date_format: String,

    // Regeneration interval in seconds
    pub revalidate: u64,

    // Content source
    #[serde(default)]
    pub cms: CmsConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "spacetraveling".to_string(),
            description: String::new(),
            language: "en".to_string(),
            logo: "/assets/Logo.png".to_string(),

            url: "http://localhost:3000".to_string(),
            root: "/".to_string(),

            public_dir: "public".to_string(),
            static_dir: "static".to_string(),

            timezone: "UTC".to_string(),
            date_format: "%d %b %Y".to_string(),

            revalidate: 60 * 15,

            cms: CmsConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: SiteConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid configuration in {:?}", path.as_ref()))?;
        config.timezone()?;
        Ok(config)
    }

    /// Parsed display timezone
    pub fn timezone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Unknown timezone {:?}: {}", self.timezone, e))
    }

    /// Interval after which generated pages become stale
    pub fn revalidate_interval(&self) -> Duration {
        Duration::from_secs(self.revalidate.max(1))
    }
}

/// Headless CMS connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CmsConfig {
    /// Repository API endpoint, e.g. `https://<repo>.prismic.io/api/v2`
    pub endpoint: String,
    /// Access token for private repositories
    pub access_token: Option<String>,
    /// Custom type holding blog posts
    pub document_type: String,
    /// Number of posts per listing page
    pub page_size: usize,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://ignitenewsrm.prismic.io/api/v2".to_string(),
            access_token: None,
            document_type: "posts".to_string(),
            page_size: 5,
        }
    }
}
