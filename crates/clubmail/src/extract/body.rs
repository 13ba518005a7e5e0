//! Body extraction from the nested message part tree.

use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::{alphabet, Engine as _};

use crate::gmail::client::MessagePart;

/// URL-safe base64 that accepts both padded and unpadded input.
const PERMISSIVE_URL_SAFE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Extracts the message body text from a (possibly nested) part tree.
///
/// Preference order: the first `text/plain` part anywhere in the tree, then
/// the first `text/html` part, then any inline body at all. Returns an empty
/// string when nothing decodable exists.
pub fn extract_body(payload: &MessagePart) -> String {
    if let Some(text) = find_typed(payload, "text/plain") {
        return text;
    }
    if let Some(text) = find_typed(payload, "text/html") {
        return text;
    }
    find_any_inline(payload).unwrap_or_default()
}

/// Depth-first search for the first part of the given MIME type carrying a
/// non-empty body.
fn find_typed(part: &MessagePart, mime_type: &str) -> Option<String> {
    if part.mime_type.as_deref() == Some(mime_type) {
        if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_deref()) {
            if !data.is_empty() {
                return Some(decode_base64url(data));
            }
        }
    }

    for child in part.parts.as_deref().unwrap_or_default() {
        if let Some(text) = find_typed(child, mime_type) {
            return Some(text);
        }
    }

    None
}

/// Depth-first search for any inline body; nested parts are tried before a
/// part's own body.
fn find_any_inline(part: &MessagePart) -> Option<String> {
    for child in part.parts.as_deref().unwrap_or_default() {
        if let Some(text) = find_any_inline(child) {
            return Some(text);
        }
    }

    let data = part.body.as_ref().and_then(|b| b.data.as_deref())?;
    if data.is_empty() {
        return None;
    }
    Some(decode_base64url(data))
}

/// Decodes URL-safe base64, degrading to best-effort text on malformed
/// input: a trailing partial chunk is dropped and retried, and invalid
/// UTF-8 is replaced rather than rejected.
pub(crate) fn decode_base64url(data: &str) -> String {
    let trimmed = data.trim_end_matches('=');

    if let Ok(bytes) = PERMISSIVE_URL_SAFE.decode(trimmed) {
        return String::from_utf8_lossy(&bytes).into_owned();
    }

    let whole_chunks = trimmed.len() - trimmed.len() % 4;
    match PERMISSIVE_URL_SAFE.decode(&trimmed[..whole_chunks]) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => String::new(),
    }
}
