//! Inbound change-notification payloads.
//!
//! The notification transport delivers a base64-encoded JSON document
//! carrying the affected mailbox address and the provider's new history
//! cursor. A malformed payload is a permanent condition: callers log it and
//! acknowledge, never bounce it back for redelivery.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use thiserror::Error;

/// Errors decoding a notification payload.
#[derive(Error, Debug)]
pub enum NotificationDecodeError {
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Invalid notification JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A decoded mailbox change notification.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub email_address: String,
    pub history_id: u64,
}

impl Notification {
    /// Decodes the base64-JSON wire form.
    pub fn decode(data: &str) -> Result<Self, NotificationDecodeError> {
        let bytes = STANDARD.decode(data.trim())?;
        let text = String::from_utf8(bytes)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// The notification's cursor in stored (string) form.
    pub fn cursor(&self) -> String {
        self.history_id.to_string()
    }
}
