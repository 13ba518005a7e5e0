//! Extracted event repository: one record per (recipient, message, link).
//!
//! Writes are upserts on a composite dedupe key so reprocessing the same
//! message merges into the existing record instead of duplicating it.

use rusqlite::params;

use super::{Database, DatabaseError};

/// Longest link prefix participating in the dedupe key. Long enough to
/// distinguish distinct forms in one message, short enough to tolerate
/// volatile tracking parameters appended on resend.
const LINK_PREFIX_MAX_LEN: usize = 120;

/// A stored extracted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEventRow {
    pub event_key: String,
    pub recipient: String,
    pub message_id: String,
    pub link: String,
    /// JSON object mapping semantic field names to form field identifiers.
    pub fields_json: String,
    pub sender: String,
    pub title: String,
    pub venue: String,
    pub date: String,
    pub time: String,
    pub created_at: String,
}

/// Reduces a link to the prefix used for deduplication: the URL without its
/// query string, capped in length.
pub fn link_prefix(link: &str) -> String {
    let stripped = link.split('?').next().unwrap_or(link);
    stripped.chars().take(LINK_PREFIX_MAX_LEN).collect()
}

/// Creates the composite dedupe key for an event.
pub fn make_key(recipient: &str, message_id: &str, link: &str) -> String {
    format!("{}:{}:{}", recipient, message_id, link_prefix(link))
}

/// Inserts an event, or merges into the existing record with the same key.
/// The original creation timestamp is preserved on merge.
pub fn upsert(db: &Database, row: &ExtractedEventRow) -> Result<(), DatabaseError> {
    db.exec(|conn| {
        conn.execute(
            "INSERT INTO extracted_events
               (event_key, recipient, message_id, link, fields_json, sender,
                title, venue, date, time, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(event_key) DO UPDATE SET
               link = ?4,
               fields_json = ?5,
               sender = ?6,
               title = ?7,
               venue = ?8,
               date = ?9,
               time = ?10",
            params![
                row.event_key,
                row.recipient,
                row.message_id,
                row.link,
                row.fields_json,
                row.sender,
                row.title,
                row.venue,
                row.date,
                row.time,
                row.created_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds an event by its dedupe key.
pub fn find(db: &Database, event_key: &str) -> Result<Option<ExtractedEventRow>, DatabaseError> {
    db.exec(|conn| {
        let mut stmt = conn.prepare(
            "SELECT event_key, recipient, message_id, link, fields_json, sender,
                    title, venue, date, time, created_at
             FROM extracted_events WHERE event_key = ?1",
        )?;
        let mut rows = stmt.query_map(params![event_key], map_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Query(e)),
            None => Ok(None),
        }
    })
}

/// Lists the newest events for a recipient account.
pub fn list_for_recipient(
    db: &Database,
    recipient: &str,
    limit: u32,
) -> Result<Vec<ExtractedEventRow>, DatabaseError> {
    db.exec(|conn| {
        let mut stmt = conn.prepare(
            "SELECT event_key, recipient, message_id, link, fields_json, sender,
                    title, venue, date, time, created_at
             FROM extracted_events WHERE recipient = ?1
             ORDER BY created_at DESC LIMIT ?2",
        )?;
        let rows: Vec<ExtractedEventRow> = stmt
            .query_map(params![recipient, limit], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Counts events stored for a message.
pub fn count_for_message(
    db: &Database,
    recipient: &str,
    message_id: &str,
) -> Result<u64, DatabaseError> {
    db.exec(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM extracted_events WHERE recipient = ?1 AND message_id = ?2",
            params![recipient, message_id],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExtractedEventRow> {
    Ok(ExtractedEventRow {
        event_key: row.get(0)?,
        recipient: row.get(1)?,
        message_id: row.get(2)?,
        link: row.get(3)?,
        fields_json: row.get(4)?,
        sender: row.get(5)?,
        title: row.get(6)?,
        venue: row.get(7)?,
        date: row.get(8)?,
        time: row.get(9)?,
        created_at: row.get(10)?,
    })
}
