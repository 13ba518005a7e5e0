//! Incremental mailbox synchronization.
//!
//! Ties the pieces together: a change notification (or an explicit backfill
//! request) selects an account, credentials are resolved, the delta is
//! enumerated against the stored history cursor, and every unseen message
//! runs through the extraction pipeline exactly once.

use std::time::Duration;

use tracing::info;

use crate::config::Config;
use crate::db::event_repo::ExtractedEventRow;
use crate::db::{account_repo, Database};
use crate::forms::{FormFieldResolver, FormResolveError};
use crate::gmail::{CredentialStore, GmailClient, WatchResponse};

pub mod engine;
pub mod notification;
pub mod pipeline;

pub use engine::{SyncEngine, SyncError};
pub use notification::{Notification, NotificationDecodeError};
pub use pipeline::MessagePipeline;

impl From<FormResolveError> for SyncError {
    fn from(e: FormResolveError) -> Self {
        SyncError::Config(format!("Failed to build form resolver: {}", e))
    }
}

/// Handles one raw change-notification payload end to end: decode, resolve
/// credentials, delta-sync. Returns the events extracted from the delta.
pub async fn handle_notification(
    db: &Database,
    config: &Config,
    data: &str,
) -> Result<Vec<ExtractedEventRow>, SyncError> {
    let notification = Notification::decode(data)?;
    let account = account_repo::normalize_email(&notification.email_address);
    info!(
        "Notification for '{}' at cursor {}",
        account, notification.history_id
    );

    let (client, resolver) = build_live_components(db, config, &account).await?;
    let engine = SyncEngine::new(db, &client, &resolver, config);
    engine
        .sync_from_notification(&account, &notification.cursor())
        .await
}

/// Runs a bounded backfill over every allow-listed sender for an account.
/// Returns the number of events persisted.
pub async fn run_backfill(
    db: &Database,
    config: &Config,
    account: &str,
) -> Result<usize, SyncError> {
    let account = account_repo::normalize_email(account);
    let (client, resolver) = build_live_components(db, config, &account).await?;
    let engine = SyncEngine::new(db, &client, &resolver, config);
    engine.backfill_sync(&account).await
}

/// Registers a change-notification watch for an account and stores the
/// returned cursor as its sync baseline.
pub async fn register_watch(
    db: &Database,
    config: &Config,
    account: &str,
) -> Result<WatchResponse, SyncError> {
    let account = account_repo::normalize_email(account);
    let (client, resolver) = build_live_components(db, config, &account).await?;
    let engine = SyncEngine::new(db, &client, &resolver, config);
    engine.register_watch(&account).await
}

async fn build_live_components(
    db: &Database,
    config: &Config,
    account: &str,
) -> Result<(GmailClient, FormFieldResolver), SyncError> {
    let store = CredentialStore::new(db.clone(), config.oauth.clone())?;
    let credential = store.get_usable_credential(account).await?;
    let client = GmailClient::new(credential.access_token)?;
    let resolver = FormFieldResolver::new(Duration::from_secs(config.form_fetch_timeout_secs))?;
    Ok((client, resolver))
}
