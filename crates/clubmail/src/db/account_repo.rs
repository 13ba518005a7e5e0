//! Account repository: credential material and the per-account history
//! cursor, keyed by normalized mailbox address.
//!
//! Updates are column-targeted so that writing one concern (tokens, cursor,
//! exchange code) never clobbers the others.

use chrono::Utc;
use rusqlite::params;

use super::{Database, DatabaseError};

/// A raw account row from the database.
#[derive(Debug, Clone, Default)]
pub struct AccountRow {
    pub email: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// RFC 3339 expiry of the access token, if known.
    pub token_expiry: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// One-time authorization code pending exchange. Cleared once consumed.
    pub auth_code: Option<String>,
    pub history_cursor: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Normalizes a mailbox address for use as an account key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Inserts an account, or merges the credential fields into an existing row.
/// The history cursor is deliberately not part of this write.
pub fn upsert(db: &Database, row: &AccountRow) -> Result<(), DatabaseError> {
    db.exec(|conn| {
        conn.execute(
            "INSERT INTO accounts (email, access_token, refresh_token, token_expiry,
                                   client_id, client_secret, auth_code, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(email) DO UPDATE SET
               access_token = COALESCE(?2, access_token),
               refresh_token = COALESCE(?3, refresh_token),
               token_expiry = COALESCE(?4, token_expiry),
               client_id = COALESCE(?5, client_id),
               client_secret = COALESCE(?6, client_secret),
               auth_code = COALESCE(?7, auth_code),
               updated_at = ?9",
            params![
                row.email,
                row.access_token,
                row.refresh_token,
                row.token_expiry,
                row.client_id,
                row.client_secret,
                row.auth_code,
                row.created_at,
                row.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds an account by normalized email.
pub fn find(db: &Database, email: &str) -> Result<Option<AccountRow>, DatabaseError> {
    db.exec(|conn| {
        let mut stmt = conn.prepare(
            "SELECT email, access_token, refresh_token, token_expiry, client_id,
                    client_secret, auth_code, history_cursor, created_at, updated_at
             FROM accounts WHERE email = ?1",
        )?;
        let mut rows = stmt.query_map(params![email], |row| {
            Ok(AccountRow {
                email: row.get(0)?,
                access_token: row.get(1)?,
                refresh_token: row.get(2)?,
                token_expiry: row.get(3)?,
                client_id: row.get(4)?,
                client_secret: row.get(5)?,
                auth_code: row.get(6)?,
                history_cursor: row.get(7)?,
                created_at: row.get(8)?,
                updated_at: row.get(9)?,
            })
        })?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Query(e)),
            None => Ok(None),
        }
    })
}

/// Advances the stored history cursor for an account.
pub fn set_cursor(db: &Database, email: &str, cursor: &str) -> Result<(), DatabaseError> {
    db.exec(|conn| {
        conn.execute(
            "UPDATE accounts SET history_cursor = ?2, updated_at = ?3 WHERE email = ?1",
            params![email, cursor, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    })
}

/// Persists a refreshed or freshly exchanged token set.
///
/// The refresh grant may omit the refresh token; in that case the existing
/// one is kept (COALESCE), matching the provider's rotation semantics.
pub fn set_tokens(
    db: &Database,
    email: &str,
    access_token: &str,
    refresh_token: Option<&str>,
    token_expiry: Option<&str>,
) -> Result<(), DatabaseError> {
    db.exec(|conn| {
        conn.execute(
            "UPDATE accounts SET
               access_token = ?2,
               refresh_token = COALESCE(?3, refresh_token),
               token_expiry = ?4,
               updated_at = ?5
             WHERE email = ?1",
            params![
                email,
                access_token,
                refresh_token,
                token_expiry,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    })
}

/// Clears a consumed (or rejected) one-time exchange code so it is never
/// retried.
pub fn clear_auth_code(db: &Database, email: &str) -> Result<(), DatabaseError> {
    db.exec(|conn| {
        conn.execute(
            "UPDATE accounts SET auth_code = NULL, updated_at = ?2 WHERE email = ?1",
            params![email, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    })
}
