//! Rich text conversion
//!
//! The content source delivers formatted text as a list of structured nodes
//! instead of HTML. A [`RichTextRenderer`] turns those nodes into plain text,
//! used for word counting, and into an HTML fragment for the post body.

use serde::{Deserialize, Serialize};

use super::null_as_default;
use crate::helpers::{escape_html, image_tag, push_escaped};

/// A block-level rich text node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichTextNode {
    #[serde(rename = "type")]
    pub kind: NodeKind,

    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub spans: Vec<Span>,

    /// Image source (image nodes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Image alternative text (image nodes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,

    /// oEmbed payload (embed nodes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oembed: Option<Embed>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Paragraph,
    Preformatted,
    Heading1,
    Heading2,
    Heading3,
    Heading4,
    Heading5,
    Heading6,
    ListItem,
    OListItem,
    Image,
    Embed,
    #[serde(other)]
    Unknown,
}

/// Inline formatting over a range of a node's text.
///
/// `start` and `end` are UTF-16 code unit offsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "type")]
    pub kind: SpanKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<SpanData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    Strong,
    Em,
    Hyperlink,
    Label,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpanData {
    pub link_type: Option<String>,
    pub url: Option<String>,
    pub target: Option<String>,
    pub uid: Option<String>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    pub embed_url: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub provider_name: Option<String>,
    pub html: Option<String>,
}

/// Converts rich text nodes to plain text and HTML.
///
/// Both conversions are pure: the same nodes always give the same output.
pub trait RichTextRenderer: Send + Sync {
    /// Plain text of every node, joined with a single space
    fn as_text(&self, nodes: &[RichTextNode]) -> String;

    /// HTML fragment for the nodes, in order
    fn as_html(&self, nodes: &[RichTextNode]) -> String;
}

/// Renderer for the Prismic rich text format
#[derive(Debug, Clone)]
pub struct PrismicRichText {
    /// Prefix for links to other posts, e.g. `/post/`
    post_prefix: String,
}

impl PrismicRichText {
    pub fn new(root: &str) -> Self {
        Self {
            post_prefix: format!("{}/post/", root.trim_end_matches('/')),
        }
    }

    fn link_href(&self, data: Option<&SpanData>) -> Option<String> {
        let data = data?;
        if let Some(url) = &data.url {
            return Some(url.clone());
        }
        match (data.link_type.as_deref(), &data.uid) {
            (Some("Document"), Some(uid)) => Some(format!("{}{}/", self.post_prefix, uid)),
            _ => None,
        }
    }

    fn open_tag(&self, span: &Span) -> String {
        match span.kind {
            SpanKind::Strong => "<strong>".to_string(),
            SpanKind::Em => "<em>".to_string(),
            SpanKind::Label => {
                let label = span
                    .data
                    .as_ref()
                    .and_then(|d| d.label.as_deref())
                    .unwrap_or("");
                format!(r#"<span class="{}">"#, escape_html(label))
            }
            SpanKind::Hyperlink => {
                let href = self.link_href(span.data.as_ref()).unwrap_or_default();
                let target = span.data.as_ref().and_then(|d| d.target.as_deref());
                match target {
                    Some(target) => format!(
                        r#"<a href="{}" target="{}" rel="noopener noreferrer">"#,
                        escape_html(&href),
                        escape_html(target)
                    ),
                    None => format!(r#"<a href="{}">"#, escape_html(&href)),
                }
            }
            SpanKind::Unknown => String::new(),
        }
    }

    fn close_tag(span: &Span) -> &'static str {
        match span.kind {
            SpanKind::Strong => "</strong>",
            SpanKind::Em => "</em>",
            SpanKind::Label => "</span>",
            SpanKind::Hyperlink => "</a>",
            SpanKind::Unknown => "",
        }
    }

    /// Render text with its inline spans applied
    fn render_text(&self, text: &str, spans: &[Span]) -> String {
        let mut pending: Vec<&Span> = spans
            .iter()
            .filter(|s| s.end > s.start)
            .filter(|s| match s.kind {
                SpanKind::Unknown => false,
                SpanKind::Hyperlink => self.link_href(s.data.as_ref()).is_some(),
                _ => true,
            })
            .collect();
        // Outer spans first when two start together
        pending.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

        let mut out = String::with_capacity(text.len());
        let mut open: Vec<&Span> = Vec::new();
        let mut next = 0;
        let mut pos = 0;

        for c in text.chars() {
            self.close_ended(&mut open, pos, &mut out);
            while next < pending.len() && pending[next].start <= pos {
                out.push_str(&self.open_tag(pending[next]));
                open.push(pending[next]);
                next += 1;
            }
            if c == '\n' {
                out.push_str("<br />");
            } else {
                push_escaped(&mut out, c);
            }
            pos += c.len_utf16();
        }

        self.close_ended(&mut open, pos, &mut out);
        for span in open.iter().rev() {
            out.push_str(Self::close_tag(span));
        }

        out
    }

    /// Close every span ending at `pos`, reopening the ones nested inside
    /// it that continue past `pos`.
    fn close_ended<'a>(&self, open: &mut Vec<&'a Span>, pos: usize, out: &mut String) {
        let Some(depth) = open.iter().position(|s| s.end <= pos) else {
            return;
        };
        let closed: Vec<&Span> = open.drain(depth..).collect();
        for span in closed.iter().rev() {
            out.push_str(Self::close_tag(span));
        }
        for span in closed {
            if span.end > pos {
                out.push_str(&self.open_tag(span));
                open.push(span);
            }
        }
    }

    fn render_node(&self, node: &RichTextNode, out: &mut String) {
        let tag = match node.kind {
            NodeKind::Paragraph => "p",
            NodeKind::Preformatted => "pre",
            NodeKind::Heading1 => "h1",
            NodeKind::Heading2 => "h2",
            NodeKind::Heading3 => "h3",
            NodeKind::Heading4 => "h4",
            NodeKind::Heading5 => "h5",
            NodeKind::Heading6 => "h6",
            NodeKind::ListItem | NodeKind::OListItem => "li",
            NodeKind::Image => {
                if let Some(url) = &node.url {
                    out.push_str(&format!(
                        r#"<p class="block-img">{}</p>"#,
                        image_tag(url, node.alt.as_deref().unwrap_or(""))
                    ));
                }
                return;
            }
            NodeKind::Embed => {
                if let Some(embed) = &node.oembed {
                    out.push_str(&format!(
                        r#"<div data-oembed="{}" data-oembed-type="{}" data-oembed-provider="{}">{}</div>"#,
                        escape_html(embed.embed_url.as_deref().unwrap_or("")),
                        escape_html(embed.kind.as_deref().unwrap_or("")),
                        escape_html(embed.provider_name.as_deref().unwrap_or("")),
                        embed.html.as_deref().unwrap_or("")
                    ));
                }
                return;
            }
            NodeKind::Unknown => return,
        };

        out.push_str(&format!(
            "<{tag}>{}</{tag}>",
            self.render_text(&node.text, &node.spans)
        ));
    }
}

impl Default for PrismicRichText {
    fn default() -> Self {
        Self::new("/")
    }
}

impl RichTextRenderer for PrismicRichText {
    fn as_text(&self, nodes: &[RichTextNode]) -> String {
        nodes
            .iter()
            .map(|n| n.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn as_html(&self, nodes: &[RichTextNode]) -> String {
        let mut out = String::new();
        let mut list: Option<&'static str> = None;

        for node in nodes {
            let wanted = match node.kind {
                NodeKind::ListItem => Some("ul"),
                NodeKind::OListItem => Some("ol"),
                _ => None,
            };
            if wanted != list {
                if let Some(tag) = list {
                    out.push_str(&format!("</{tag}>"));
                }
                if let Some(tag) = wanted {
                    out.push_str(&format!("<{tag}>"));
                }
                list = wanted;
            }
            self.render_node(node, &mut out);
        }

        if let Some(tag) = list {
            out.push_str(&format!("</{tag}>"));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(json: &str) -> Vec<RichTextNode> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_as_text_joins_blocks() {
        let body = nodes(
            r#"[
                {"type": "paragraph", "text": "Hello world", "spans": []},
                {"type": "image", "url": "https://img/x.png", "alt": null},
                {"type": "list-item", "text": "one two", "spans": []}
            ]"#,
        );
        assert_eq!(PrismicRichText::default().as_text(&body), "Hello world one two");
    }

    #[test]
    fn test_paragraph_with_spans() {
        let body = nodes(
            r#"[{"type": "paragraph", "text": "Go to the moon", "spans": [
                {"start": 0, "end": 2, "type": "strong"},
                {"start": 10, "end": 14, "type": "hyperlink",
                 "data": {"link_type": "Web", "url": "https://nasa.gov", "target": "_blank"}}
            ]}]"#,
        );
        assert_eq!(
            PrismicRichText::default().as_html(&body),
            r#"<p><strong>Go</strong> to the <a href="https://nasa.gov" target="_blank" rel="noopener noreferrer">moon</a></p>"#
        );
    }

    #[test]
    fn test_overlapping_spans_stay_well_formed() {
        let body = nodes(
            r#"[{"type": "paragraph", "text": "abcdef", "spans": [
                {"start": 2, "end": 6, "type": "em"},
                {"start": 0, "end": 4, "type": "strong"}
            ]}]"#,
        );
        assert_eq!(
            PrismicRichText::default().as_html(&body),
            "<p><strong>ab<em>cd</em></strong><em>ef</em></p>"
        );
    }

    #[test]
    fn test_nested_spans_sharing_start() {
        let body = nodes(
            r#"[{"type": "heading2", "text": "abcdef", "spans": [
                {"start": 0, "end": 3, "type": "em"},
                {"start": 0, "end": 6, "type": "strong"}
            ]}]"#,
        );
        assert_eq!(
            PrismicRichText::default().as_html(&body),
            "<h2><strong><em>abc</em>def</strong></h2>"
        );
    }

    #[test]
    fn test_span_offsets_are_utf16() {
        let body = nodes(
            r#"[{"type": "paragraph", "text": "😀 hi", "spans": [
                {"start": 3, "end": 5, "type": "strong"}
            ]}]"#,
        );
        assert_eq!(
            PrismicRichText::default().as_html(&body),
            "<p>😀 <strong>hi</strong></p>"
        );
    }

    #[test]
    fn test_lists_are_grouped() {
        let body = nodes(
            r#"[
                {"type": "list-item", "text": "a", "spans": []},
                {"type": "list-item", "text": "b", "spans": []},
                {"type": "o-list-item", "text": "c", "spans": []},
                {"type": "paragraph", "text": "d", "spans": []}
            ]"#,
        );
        assert_eq!(
            PrismicRichText::default().as_html(&body),
            "<ul><li>a</li><li>b</li></ul><ol><li>c</li></ol><p>d</p>"
        );
    }

    #[test]
    fn test_text_is_escaped_and_breaks_kept() {
        let body = nodes(
            r#"[{"type": "preformatted", "text": "if a < b &&\nc", "spans": []}]"#,
        );
        assert_eq!(
            PrismicRichText::default().as_html(&body),
            "<pre>if a &lt; b &amp;&amp;<br />c</pre>"
        );
    }

    #[test]
    fn test_document_link_resolves_to_post() {
        let body = nodes(
            r#"[{"type": "paragraph", "text": "see this", "spans": [
                {"start": 4, "end": 8, "type": "hyperlink",
                 "data": {"link_type": "Document", "uid": "other-post"}},
                {"start": 0, "end": 3, "type": "hyperlink", "data": {"link_type": "Document"}}
            ]}]"#,
        );
        assert_eq!(
            PrismicRichText::new("/blog/").as_html(&body),
            r#"<p>see <a href="/blog/post/other-post/">this</a></p>"#
        );
    }

    #[test]
    fn test_image_embed_and_unknown_nodes() {
        let body = nodes(
            r#"[
                {"type": "image", "url": "https://img/x.png", "alt": "An image"},
                {"type": "embed", "oembed": {"embed_url": "https://youtu.be/x", "type": "video",
                 "provider_name": "YouTube", "html": "<iframe></iframe>"}},
                {"type": "something-new", "text": "ignored"}
            ]"#,
        );
        assert_eq!(
            PrismicRichText::default().as_html(&body),
            concat!(
                r#"<p class="block-img"><img src="https://img/x.png" alt="An image" /></p>"#,
                r#"<div data-oembed="https://youtu.be/x" data-oembed-type="video" data-oembed-provider="YouTube"><iframe></iframe></div>"#
            )
        );
    }
}
