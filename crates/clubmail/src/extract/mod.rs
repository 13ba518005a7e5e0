//! Message content extraction.
//!
//! Pulls a readable text body out of the nested MIME part tree, then finds
//! registration-form links and labeled event metadata inside it. All of this
//! is pure and best-effort: malformed input degrades to empty results rather
//! than failing the message.

pub mod body;
pub mod links;
pub mod metadata;

pub use body::extract_body;
pub use links::extract_form_links;
pub use metadata::{extract_event_metadata, EventMetadata, NOT_AVAILABLE};
