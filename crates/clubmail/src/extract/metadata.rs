//! Event metadata extraction from labeled lines in body text.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Sentinel for a field no labeled line was found for.
pub const NOT_AVAILABLE: &str = "N/A";

static VENUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)venue\s*[:\-]\s*([^\n\r]+)").unwrap());
static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)date\s*[:\-]\s*([^\n\r]+)").unwrap());
static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)time\s*[:\-]\s*([^\n\r]+)").unwrap());

/// Venue, date and time lifted from an announcement body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub venue: String,
    pub date: String,
    pub time: String,
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self {
            venue: NOT_AVAILABLE.to_string(),
            date: NOT_AVAILABLE.to_string(),
            time: NOT_AVAILABLE.to_string(),
        }
    }
}

/// Extracts "Venue:", "Date:" and "Time:" labeled lines from body text.
/// Each field matches independently; the first match wins; absent fields
/// default to [`NOT_AVAILABLE`].
pub fn extract_event_metadata(text: &str) -> EventMetadata {
    let mut metadata = EventMetadata::default();
    if text.is_empty() {
        return metadata;
    }

    if let Some(captures) = VENUE_RE.captures(text) {
        metadata.venue = captures[1].trim().to_string();
    }
    if let Some(captures) = DATE_RE.captures(text) {
        metadata.date = captures[1].trim().to_string();
    }
    if let Some(captures) = TIME_RE.captures(text) {
        metadata.time = captures[1].trim().to_string();
    }

    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_fields_extracted() {
        let text = "Join us!\nVenue: Auditorium\nDate: 12/12\nTime: 5pm\n";
        let metadata = extract_event_metadata(text);
        assert_eq!(metadata.venue, "Auditorium");
        assert_eq!(metadata.date, "12/12");
        assert_eq!(metadata.time, "5pm");
    }

    #[test]
    fn test_missing_fields_default_to_sentinel() {
        let metadata = extract_event_metadata("Date: tomorrow");
        assert_eq!(metadata.venue, NOT_AVAILABLE);
        assert_eq!(metadata.date, "tomorrow");
        assert_eq!(metadata.time, NOT_AVAILABLE);
    }

    #[test]
    fn test_empty_text_defaults_everything() {
        assert_eq!(extract_event_metadata(""), EventMetadata::default());
    }

    #[test]
    fn test_case_insensitive_and_dash_separator() {
        let text = "VENUE - Main Hall\ndate- 1 Jan\nTIME : noon";
        let metadata = extract_event_metadata(text);
        assert_eq!(metadata.venue, "Main Hall");
        assert_eq!(metadata.date, "1 Jan");
        assert_eq!(metadata.time, "noon");
    }

    #[test]
    fn test_first_match_wins() {
        let text = "Venue: First Hall\nVenue: Second Hall";
        assert_eq!(extract_event_metadata(text).venue, "First Hall");
    }

    #[test]
    fn test_captures_to_end_of_line_only() {
        let text = "Venue: Block A, Room 2\nTime: 5pm";
        let metadata = extract_event_metadata(text);
        assert_eq!(metadata.venue, "Block A, Room 2");
        assert_eq!(metadata.time, "5pm");
    }
}
