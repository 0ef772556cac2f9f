//! Reading time estimation

use super::post::ContentBlock;
use super::rich_text::RichTextRenderer;

/// Average reading speed used for the estimate
pub const WORDS_PER_MINUTE: usize = 200;

/// Count whitespace-delimited words
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Estimated reading time in whole minutes.
///
/// Words from every heading and body are summed first and the total is
/// rounded up once, so many short sections do not each add a minute.
pub fn reading_minutes(blocks: &[ContentBlock], rich_text: &dyn RichTextRenderer) -> usize {
    let words: usize = blocks
        .iter()
        .map(|block| count_words(&block.heading) + count_words(&rich_text.as_text(&block.body)))
        .sum();

    words.div_ceil(WORDS_PER_MINUTE)
}
