use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClubmailError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Credential error: {0}")]
    Credential(#[from] crate::gmail::CredentialError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] crate::gmail::GmailError),

    #[error("Sync error: {0}")]
    Sync(#[from] crate::sync::SyncError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

pub type Result<T> = std::result::Result<T, ClubmailError>;
