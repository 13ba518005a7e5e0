//! The incremental sync engine.
//!
//! Drives notification-triggered delta syncs, cold-start backfills and
//! watch registration for one account at a time, against whatever
//! [`Mailbox`] and [`FieldResolver`] it is handed.

use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::db::event_repo::ExtractedEventRow;
use crate::db::{account_repo, ledger_repo, Database, DatabaseError};
use crate::forms::FieldResolver;
use crate::gmail::{CredentialError, GmailError, Mailbox, WatchResponse};

use super::notification::NotificationDecodeError;
use super::pipeline::MessagePipeline;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("No account registered for '{0}'")]
    UnknownAccount(String),

    #[error("Sync misconfigured: {0}")]
    Config(String),

    #[error(transparent)]
    Notification(#[from] NotificationDecodeError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("Mailbox request failed: {0}")]
    Mailbox(#[from] GmailError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Sync driver bound to one mailbox provider and one field resolver.
pub struct SyncEngine<'a> {
    db: &'a Database,
    mailbox: &'a dyn Mailbox,
    resolver: &'a dyn FieldResolver,
    config: &'a Config,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        db: &'a Database,
        mailbox: &'a dyn Mailbox,
        resolver: &'a dyn FieldResolver,
        config: &'a Config,
    ) -> Self {
        Self {
            db,
            mailbox,
            resolver,
            config,
        }
    }

    fn pipeline(&self, account: &'a str) -> MessagePipeline<'a> {
        MessagePipeline::new(
            self.db,
            self.mailbox,
            self.resolver,
            &self.config.allowed_senders,
            account,
            self.config.ledger_retention,
        )
    }

    /// Runs a delta sync for a change notification carrying `new_cursor`.
    ///
    /// The first notification for an account only establishes a baseline:
    /// the cursor is stored and nothing is fetched. On later notifications
    /// the delta since the stored cursor is enumerated and each unseen
    /// message is processed. Per-message failures are logged and skipped;
    /// the cursor advances to `new_cursor` regardless, so one poisoned
    /// message can never wedge the account.
    pub async fn sync_from_notification(
        &self,
        account: &'a str,
        new_cursor: &str,
    ) -> Result<Vec<ExtractedEventRow>, SyncError> {
        let row = account_repo::find(self.db, account)?
            .ok_or_else(|| SyncError::UnknownAccount(account.to_string()))?;

        let Some(last_cursor) = row.history_cursor else {
            info!(
                "First notification for '{}': storing baseline cursor {}",
                account, new_cursor
            );
            account_repo::set_cursor(self.db, account, new_cursor)?;
            return Ok(Vec::new());
        };

        let message_ids = self.mailbox.list_added_message_ids(&last_cursor).await?;
        info!(
            "Delta sync for '{}': {} added message(s) since cursor {}",
            account,
            message_ids.len(),
            last_cursor
        );

        let pipeline = self.pipeline(account);
        let mut events = Vec::new();
        for message_id in &message_ids {
            match ledger_repo::is_processed(self.db, account, message_id) {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    error!("Ledger check failed for message {}: {}", message_id, e);
                    continue;
                }
            }

            match pipeline.process_message(message_id).await {
                Ok(mut rows) => events.append(&mut rows),
                Err(e) => error!("Failed to process message {}: {}", message_id, e),
            }
        }

        account_repo::set_cursor(self.db, account, new_cursor)?;

        Ok(events)
    }

    /// Processes the most recent messages from each allow-listed sender,
    /// bounded per sender. Already-marked messages are skipped, so repeated
    /// backfills converge. Returns the number of events persisted.
    pub async fn backfill_sync(&self, account: &'a str) -> Result<usize, SyncError> {
        let pipeline = self.pipeline(account);
        let mut total = 0;

        for sender in &self.config.allowed_senders {
            let query = format!("from:{}", sender);
            let message_ids = match self
                .mailbox
                .list_message_ids(&query, self.config.backfill_max_results)
                .await
            {
                Ok(ids) => ids,
                Err(e) => {
                    error!("Backfill listing for sender '{}' failed: {}", sender, e);
                    continue;
                }
            };

            for message_id in &message_ids {
                match ledger_repo::is_processed(self.db, account, message_id) {
                    Ok(true) => continue,
                    Ok(false) => {}
                    Err(e) => {
                        error!("Ledger check failed for message {}: {}", message_id, e);
                        continue;
                    }
                }

                match pipeline.process_message(message_id).await {
                    Ok(rows) => total += rows.len(),
                    Err(e) => error!("Failed to process message {}: {}", message_id, e),
                }
            }
        }

        info!("Backfill for '{}' persisted {} event(s)", account, total);
        Ok(total)
    }

    /// Registers a change-notification subscription and stores the returned
    /// cursor as the account's baseline.
    pub async fn register_watch(&self, account: &'a str) -> Result<WatchResponse, SyncError> {
        let topic = self
            .config
            .pubsub_topic
            .as_deref()
            .ok_or_else(|| SyncError::Config("pubsubTopic is not configured".to_string()))?;

        let response = self.mailbox.watch(topic).await?;

        if account_repo::find(self.db, account)?.is_none() {
            warn!("Watch registered for unknown account '{}'", account);
        }
        account_repo::set_cursor(self.db, account, &response.history_id)?;
        info!(
            "Watch registered for '{}' at cursor {} (expires {:?})",
            account, response.history_id, response.expiration
        );

        Ok(response)
    }
}
