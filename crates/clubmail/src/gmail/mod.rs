//! Gmail access module.
//!
//! Provides the REST client for the mailbox provider API (message get,
//! query search, history listing, watch registration) and the credential
//! store that keeps per-account OAuth material usable.

pub mod client;
pub mod credentials;
pub mod error;

pub use client::{GmailClient, Mailbox, Message, MessagePart, WatchResponse};
pub use credentials::{Credential, CredentialError, CredentialStore};
pub use error::GmailError;
