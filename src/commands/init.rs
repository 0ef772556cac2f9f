//! Initialize a new site

use anyhow::Result;
use std::fs;
use std::path::Path;

const DEFAULT_CONFIG: &str = r#"# spacetraveling configuration

# Site
title: spacetraveling
description: ''
language: en
logo: /assets/Logo.png

# URL
url: http://localhost:3000
root: /

# Directory
public_dir: public
static_dir: static

# Date / Time format
timezone: UTC
date_format: '%d %b %Y'

# Seconds before a generated page is regenerated
revalidate: 900

# Content source
cms:
  endpoint: https://ignitenewsrm.prismic.io/api/v2
  # access_token: <token for private repositories>
  document_type: posts
  page_size: 5
"#;

/// Initialize a new site in the given directory
pub fn init_site(target_dir: &Path) -> Result<()> {
    let config_path = target_dir.join("_config.yml");
    if config_path.exists() {
        anyhow::bail!("{:?} already exists", config_path);
    }

    fs::create_dir_all(target_dir.join("static/assets"))?;
    fs::write(&config_path, DEFAULT_CONFIG)?;

    tracing::info!("Initialized site in {:?}", target_dir);
    Ok(())
}
