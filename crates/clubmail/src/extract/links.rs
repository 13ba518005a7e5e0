//! Registration-form link extraction.

use std::sync::LazyLock;

use regex::Regex;

/// The two link shapes that carry registration forms: the forms host itself
/// and its short-link redirector.
static FORM_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://docs\.google\.com/forms/[^\s<>]+|https://forms\.gle/[^\s<>]+").unwrap()
});

/// Extracts all form links from body text, in source order.
pub fn extract_form_links(text: &str) -> Vec<String> {
    FORM_LINK_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}
