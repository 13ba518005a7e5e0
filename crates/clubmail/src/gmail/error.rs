//! Gmail API error types.

use thiserror::Error;

/// Errors from mailbox provider API calls.
#[derive(Error, Debug)]
pub enum GmailError {
    /// Network-level failure (connect, timeout, body read).
    #[error("Gmail API request failed: {0}")]
    Network(String),

    /// Access token rejected.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Quota or rate limit hit.
    #[error("Rate limit exceeded: retry after {0}s")]
    RateLimited(u64),

    /// Message or history cursor not found (cursors expire server-side).
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Response body did not match the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Any other non-success status.
    #[error("Gmail API error ({status}): {body}")]
    Api { status: u16, body: String },
}

/// Result type for Gmail operations.
pub type Result<T> = std::result::Result<T, GmailError>;
