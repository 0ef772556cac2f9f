//! URL helper functions

use percent_encoding::percent_decode_str;
use std::path::{Component, Path};

use crate::config::SiteConfig;

/// Generate a URL with the root path
///
/// # Examples
/// ```ignore
/// url_for(&config, "/assets/Logo.png") // -> "/blog/assets/Logo.png"
/// ```
pub fn url_for(config: &SiteConfig, path: &str) -> String {
    let root = config.root.trim_end_matches('/');
    let path = path.trim_start_matches('/');

    if path.is_empty() {
        format!("{}/", root)
    } else {
        format!("{}/{}", root, path)
    }
}

/// Generate a full URL including the domain
pub fn full_url_for(config: &SiteConfig, path: &str) -> String {
    let base = config.url.trim_end_matches('/');
    format!("{}{}", base, url_for(config, path))
}

/// Route key of a post page, relative to the public directory
pub fn post_route(uid: &str) -> String {
    format!("post/{}", uid)
}

/// Link to a post page
pub fn post_url(config: &SiteConfig, uid: &str) -> String {
    url_for(config, &format!("{}/", post_route(uid)))
}

/// Whether `uid` names exactly one regular directory under `post/`
pub fn is_safe_uid(uid: &str) -> bool {
    let mut components = Path::new(uid).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(name)), None) if name == uid
    )
}

/// Uid of a `post/<uid>` route, if it is safe to use as a directory name
pub fn route_uid(route: &str) -> Option<&str> {
    route.strip_prefix("post/").filter(|uid| is_safe_uid(uid))
}

/// Extract the route key from a request path, relative to the site root.
///
/// The path is percent-decoded first. Returns `"index"` for the home page
/// and `"post/<uid>"` for post pages; anything else is not a generated route.
pub fn route_for_path(config: &SiteConfig, path: &str) -> Option<String> {
    let decoded = percent_decode_str(path).decode_utf8().ok()?;
    let path: &str = &decoded;
    let root = config.root.trim_end_matches('/');
    let path = path.strip_prefix(root).unwrap_or(path);
    let path = path.trim_matches('/');
    let path = path.strip_suffix("index.html").unwrap_or(path).trim_end_matches('/');

    if path.is_empty() {
        return Some("index".to_string());
    }

    route_uid(path).map(post_route)
}
