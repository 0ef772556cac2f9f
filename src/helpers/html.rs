//! HTML helper functions

/// Escape text for use in HTML element content or attribute values
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        push_escaped(&mut out, c);
    }
    out
}

/// Append a single escaped character
pub(crate) fn push_escaped(out: &mut String, c: char) {
    match c {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '"' => out.push_str("&quot;"),
        '\'' => out.push_str("&#39;"),
        _ => out.push(c),
    }
}

/// Generate an image tag
///
/// # Examples
/// ```ignore
/// image_tag("/images/photo.jpg", "My Photo") // -> <img src="/images/photo.jpg" alt="My Photo" />
/// ```
pub fn image_tag(src: &str, alt: &str) -> String {
    format!(
        r#"<img src="{}" alt="{}" />"#,
        escape_html(src),
        escape_html(alt)
    )
}
