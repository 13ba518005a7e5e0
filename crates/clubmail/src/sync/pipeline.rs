//! Per-message processing: fetch, filter, extract, resolve, persist, mark.

use chrono::Utc;
use tracing::{debug, info};

use crate::db::{event_repo, ledger_repo, Database};
use crate::db::event_repo::ExtractedEventRow;
use crate::extract::{extract_body, extract_event_metadata, extract_form_links};
use crate::forms::FieldResolver;
use crate::gmail::Mailbox;

use super::engine::SyncError;

/// Title used when an announcement carries no `Subject` header.
const DEFAULT_TITLE: &str = "Club Mail";

/// Processes one message end to end for a single account.
pub struct MessagePipeline<'a> {
    db: &'a Database,
    mailbox: &'a dyn Mailbox,
    resolver: &'a dyn FieldResolver,
    allowed_senders: &'a [String],
    account: &'a str,
    ledger_retention: u64,
}

impl<'a> MessagePipeline<'a> {
    pub fn new(
        db: &'a Database,
        mailbox: &'a dyn Mailbox,
        resolver: &'a dyn FieldResolver,
        allowed_senders: &'a [String],
        account: &'a str,
        ledger_retention: u64,
    ) -> Self {
        Self {
            db,
            mailbox,
            resolver,
            allowed_senders,
            account,
            ledger_retention,
        }
    }

    /// Fetches and evaluates one message, persisting an event per form link
    /// found. The ledger mark is written only after every event persisted,
    /// so a storage failure leaves the message eligible for reprocessing.
    pub async fn process_message(
        &self,
        message_id: &str,
    ) -> Result<Vec<ExtractedEventRow>, SyncError> {
        let message = self.mailbox.get_message(message_id).await?;

        let from = message.header("From").unwrap_or("").to_lowercase();
        let mut events = Vec::new();

        if self.is_allowed_sender(&from) {
            let title = message.header("Subject").unwrap_or(DEFAULT_TITLE).to_string();
            let body = message
                .payload
                .as_ref()
                .map(extract_body)
                .unwrap_or_default();
            let links = extract_form_links(&body);
            let metadata = extract_event_metadata(&body);
            let sender = sender_address(&from);
            let created_at = Utc::now().to_rfc3339();

            for link in links {
                let fields = self.resolver.resolve_fields(&link).await;
                let fields_json =
                    serde_json::to_string(&fields).unwrap_or_else(|_| "{}".to_string());

                let row = ExtractedEventRow {
                    event_key: event_repo::make_key(self.account, message_id, &link),
                    recipient: self.account.to_string(),
                    message_id: message_id.to_string(),
                    link,
                    fields_json,
                    sender: sender.clone(),
                    title: title.clone(),
                    venue: metadata.venue.clone(),
                    date: metadata.date.clone(),
                    time: metadata.time.clone(),
                    created_at: created_at.clone(),
                };
                event_repo::upsert(self.db, &row)?;
                events.push(row);
            }

            if events.is_empty() {
                debug!("No form links in message {} from '{}'", message_id, sender);
            } else {
                info!(
                    "Extracted {} event(s) from message {} for '{}'",
                    events.len(),
                    message_id,
                    self.account
                );
            }
        } else {
            debug!(
                "Sender '{}' of message {} is not allow-listed, skipping",
                from, message_id
            );
        }

        ledger_repo::mark(self.db, self.account, message_id, &Utc::now().to_rfc3339())?;
        ledger_repo::prune(self.db, self.account, self.ledger_retention)?;

        Ok(events)
    }

    fn is_allowed_sender(&self, from: &str) -> bool {
        self.allowed_senders
            .iter()
            .any(|sender| from.contains(&sender.to_lowercase()))
    }
}

/// Reduces a `From` header to a bare lowercased address:
/// `"Tech Club <club@example.edu>"` becomes `club@example.edu`.
pub fn sender_address(from_header: &str) -> String {
    let lower = from_header.trim().to_lowercase();
    if let (Some(start), Some(end)) = (lower.find('<'), lower.rfind('>')) {
        if start < end {
            return lower[start + 1..end].trim().to_string();
        }
    }
    lower
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_address_strips_display_name() {
        assert_eq!(
            sender_address("Tech Club <Club@Example.edu>"),
            "club@example.edu"
        );
    }

    #[test]
    fn test_sender_address_bare() {
        assert_eq!(sender_address("  CLUB@example.edu "), "club@example.edu");
    }

    #[test]
    fn test_sender_address_malformed_brackets() {
        assert_eq!(sender_address("weird > name < here"), "weird > name < here");
    }
}
