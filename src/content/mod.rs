//! Content module - post models, listing feed, reading time and rich text

mod feed;
mod post;
pub mod reading_time;
pub mod rich_text;

pub use feed::{Feed, LoadMore};
pub use post::{ContentBlock, PostDetail, PostSummary, PostsPage};
pub use reading_time::reading_minutes;
pub use rich_text::{PrismicRichText, RichTextNode, RichTextRenderer};

use serde::{Deserialize, Deserializer};

/// Deserialize a field that the content source may send as `null`
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
