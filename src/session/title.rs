use crate::constants::TITLE_ELLIPSIS;

/// Title for a conversation taken from its first user message
///
/// Messages longer than `max_chars` are cut so the result, ellipsis included,
/// is exactly `max_chars` long. Counting is by `char`, never by byte.
pub fn derive_title(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }

    let keep = max_chars.saturating_sub(TITLE_ELLIPSIS.chars().count());
    let mut title: String = content.chars().take(keep).collect();
    title.push_str(TITLE_ELLIPSIS);
    title
}
