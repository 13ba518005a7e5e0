//! Per-account OAuth credential store.
//!
//! Stored credential material arrives in three shapes: a full refreshable
//! token, a one-time exchange code, or a partial/legacy token without a
//! refresh token. `get_usable_credential` reconciles whichever shape is on
//! record into a non-expired access token, refreshing or exchanging (and
//! persisting the result) as needed.

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::OAuthClientConfig;
use crate::db::{account_repo, Database, DatabaseError};

/// Maximum length for sanitized error bodies to prevent log flooding.
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Tokens expiring within this window are refreshed ahead of use.
const EXPIRY_BUFFER_SECS: i64 = 60;

/// Connect timeout for token endpoint requests (10 seconds).
const CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Request timeout for token endpoint requests (30 seconds).
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Errors from credential resolution.
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("No usable credential for account '{0}'")]
    NotFound(String),

    #[error("Credential for '{0}' is expired and has no refresh token")]
    Unrefreshable(String),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Authorization code exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("Failed to build HTTP client: {0}")]
    Http(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Result type for credential operations.
pub type Result<T> = std::result::Result<T, CredentialError>;

/// A fully resolved, refreshable-form credential.
#[derive(Debug, Clone)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub client_id: String,
    pub client_secret: String,
    pub expiry: Option<DateTime<Utc>>,
}

impl Credential {
    /// Checks if the access token is expired (or expires within
    /// `buffer_seconds`). An unknown expiry counts as non-expired.
    pub fn is_expired(&self, buffer_seconds: i64) -> bool {
        match self.expiry {
            Some(expiry) => expiry <= Utc::now() + Duration::seconds(buffer_seconds),
            None => false,
        }
    }

    fn needs_refresh(&self) -> bool {
        self.access_token.is_empty() || self.is_expired(EXPIRY_BUFFER_SECS)
    }
}

/// Response from the OAuth token endpoint.
#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Sanitizes a token endpoint error body by truncating to a reasonable
/// length, keeping error context out of the token material's way. The cut
/// backs up to a character boundary so multibyte bodies stay valid.
fn sanitize_token_error_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }

    let mut cut = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}... (truncated)", &body[..cut])
}

/// Parses a stored RFC 3339 expiry. Unparseable values are treated as
/// already expired so the token gets refreshed rather than used blind.
fn parse_expiry(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(_) => {
            warn!("Unparseable token expiry '{}', treating as expired", raw);
            Some(DateTime::UNIX_EPOCH)
        }
    }
}

/// Credential store backed by the accounts table and the provider's token
/// endpoint.
pub struct CredentialStore {
    db: Database,
    oauth: OAuthClientConfig,
    http: Client,
}

impl CredentialStore {
    pub fn new(db: Database, oauth: OAuthClientConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CredentialError::Http(e.to_string()))?;

        Ok(Self { db, oauth, http })
    }

    /// Resolves the stored credential for an account into a usable,
    /// non-expired form, persisting any refresh or exchange along the way.
    pub async fn get_usable_credential(&self, account: &str) -> Result<Credential> {
        let row = account_repo::find(&self.db, account)?
            .ok_or_else(|| CredentialError::NotFound(account.to_string()))?;

        let credential = if let (Some(client_id), Some(client_secret), Some(refresh_token)) =
            (&row.client_id, &row.client_secret, &row.refresh_token)
        {
            // Shape 1: full refreshable token, usable as stored.
            Credential {
                access_token: row.access_token.clone().unwrap_or_default(),
                refresh_token: Some(refresh_token.clone()),
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
                expiry: parse_expiry(row.token_expiry.as_deref()),
            }
        } else if row.refresh_token.is_none() && row.auth_code.is_some() {
            // Shape 2: one-time exchange code, convert and persist.
            let code = row.auth_code.as_deref().unwrap_or_default();
            return self.exchange_code(account, code).await;
        } else {
            // Shape 3: partial/legacy token. Rebuild what we can; it may be
            // unrefreshable if no refresh token was ever stored.
            let access_token = row
                .access_token
                .clone()
                .filter(|t| !t.is_empty())
                .ok_or_else(|| CredentialError::NotFound(account.to_string()))?;
            Credential {
                access_token,
                refresh_token: row.refresh_token.clone(),
                client_id: row.client_id.clone().unwrap_or_else(|| self.oauth.client_id.clone()),
                client_secret: row
                    .client_secret
                    .clone()
                    .unwrap_or_else(|| self.oauth.client_secret.clone()),
                expiry: parse_expiry(row.token_expiry.as_deref()),
            }
        };

        if credential.needs_refresh() {
            return match credential.refresh_token.clone() {
                Some(refresh_token) => {
                    self.refresh(account, &credential, SecretString::from(refresh_token))
                        .await
                }
                None => Err(CredentialError::Unrefreshable(account.to_string())),
            };
        }

        Ok(credential)
    }

    /// Exchanges a one-time authorization code for a refreshable credential
    /// and persists it. A rejected code is cleared so it is never retried.
    async fn exchange_code(&self, account: &str, code: &str) -> Result<Credential> {
        info!("Exchanging authorization code for account '{}'", account);

        let params = [
            ("client_id", self.oauth.client_id.as_str()),
            ("client_secret", self.oauth.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.oauth.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http
            .post(&self.oauth.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| CredentialError::ExchangeFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if body.contains("invalid_grant") {
                // Consumed or revoked code. Drop it so the next call does
                // not retry a code the provider will never accept again.
                account_repo::clear_auth_code(&self.db, account)?;
            }
            return Err(CredentialError::ExchangeFailed(format!(
                "({}) {}",
                status,
                sanitize_token_error_body(&body)
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::ExchangeFailed(e.to_string()))?;

        let credential = self.persist_token(account, token).await?;
        account_repo::clear_auth_code(&self.db, account)?;

        info!("Authorization code exchanged for account '{}'", account);
        Ok(credential)
    }

    /// Refreshes an expired access token and persists the refreshed form.
    async fn refresh(
        &self,
        account: &str,
        credential: &Credential,
        refresh_token: SecretString,
    ) -> Result<Credential> {
        info!("Refreshing access token for account '{}'", account);

        let params = [
            ("client_id", credential.client_id.as_str()),
            ("client_secret", credential.client_secret.as_str()),
            ("refresh_token", refresh_token.expose_secret()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .http
            .post(&self.oauth.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| CredentialError::RefreshFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::RefreshFailed(format!(
                "({}) {}",
                status,
                sanitize_token_error_body(&body)
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::RefreshFailed(e.to_string()))?;

        let credential = self.persist_token(account, token).await?;

        info!("Access token refreshed for account '{}'", account);
        Ok(credential)
    }

    /// Writes a token endpoint response back to the account row (merge
    /// update) and returns the resolved credential.
    async fn persist_token(&self, account: &str, token: TokenResponse) -> Result<Credential> {
        let expiry = token
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs.min(i64::MAX as u64) as i64));

        account_repo::set_tokens(
            &self.db,
            account,
            &token.access_token,
            token.refresh_token.as_deref(),
            expiry.map(|dt| dt.to_rfc3339()).as_deref(),
        )?;

        // The stored refresh token survives a rotation that omitted it, so
        // reread the row for the authoritative value.
        let row = account_repo::find(&self.db, account)?
            .ok_or_else(|| CredentialError::NotFound(account.to_string()))?;

        Ok(Credential {
            access_token: token.access_token,
            refresh_token: row.refresh_token,
            client_id: self.oauth.client_id.clone(),
            client_secret: self.oauth.client_secret.clone(),
            expiry,
        })
    }
}
