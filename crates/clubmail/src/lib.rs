pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod forms;
pub mod gmail;
pub mod logging;
pub mod sync;

pub use config::{load_config, Config, ConfigError, OAuthClientConfig};
pub use db::Database;
pub use error::{ClubmailError, Result};
pub use forms::{FieldMap, FieldResolver, FormField, FormFieldResolver};
pub use gmail::{Credential, CredentialStore, GmailClient, Mailbox};
pub use sync::{handle_notification, register_watch, run_backfill, Notification, SyncEngine};
