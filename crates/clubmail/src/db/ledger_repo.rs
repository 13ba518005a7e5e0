//! Idempotency ledger: the set of message IDs already evaluated per account.
//!
//! Existence of a mark means "do not reprocess". Marks are append-only in
//! normal operation; a bounded-retention prune drops the oldest entries.

use rusqlite::params;

use super::{Database, DatabaseError};

/// Creates the ledger key for an account/message pair.
pub fn make_id(account: &str, message_id: &str) -> String {
    format!("{}:{}", account, message_id)
}

/// Marks a message as processed. Re-marking is a no-op.
pub fn mark(
    db: &Database,
    account: &str,
    message_id: &str,
    processed_at: &str,
) -> Result<(), DatabaseError> {
    db.exec(|conn| {
        conn.execute(
            "INSERT OR IGNORE INTO processed_messages (id, account, message_id, processed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![make_id(account, message_id), account, message_id, processed_at],
        )?;
        Ok(())
    })
}

/// Checks whether a message has already been evaluated for an account.
pub fn is_processed(db: &Database, account: &str, message_id: &str) -> Result<bool, DatabaseError> {
    db.exec(|conn| {
        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM processed_messages WHERE id = ?1",
            params![make_id(account, message_id)],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    })
}

/// Counts ledger entries for an account.
pub fn count(db: &Database, account: &str) -> Result<u64, DatabaseError> {
    db.exec(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM processed_messages WHERE account = ?1",
            params![account],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Prunes the ledger for an account down to the newest `keep` marks.
/// Returns the number of rows deleted.
pub fn prune(db: &Database, account: &str, keep: u64) -> Result<u64, DatabaseError> {
    db.exec(|conn| {
        let deleted = conn.execute(
            "DELETE FROM processed_messages
             WHERE account = ?1 AND id NOT IN (
                 SELECT id FROM processed_messages
                 WHERE account = ?1
                 ORDER BY processed_at DESC, rowid DESC
                 LIMIT ?2
             )",
            params![account, keep],
        )?;
        Ok(deleted as u64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    #[test]
    fn test_make_id() {
        assert_eq!(make_id("a@example.edu", "msg-1"), "a@example.edu:msg-1");
    }

    #[test]
    fn test_mark_and_check() {
        let db = test_db();
        assert!(!is_processed(&db, "a@example.edu", "msg-1").unwrap());

        mark(&db, "a@example.edu", "msg-1", "2026-01-01T00:00:00Z").unwrap();
        assert!(is_processed(&db, "a@example.edu", "msg-1").unwrap());
        // Same message for another account is a separate mark.
        assert!(!is_processed(&db, "b@example.edu", "msg-1").unwrap());
    }

    #[test]
    fn test_mark_is_idempotent() {
        let db = test_db();
        mark(&db, "a@example.edu", "msg-1", "2026-01-01T00:00:00Z").unwrap();
        mark(&db, "a@example.edu", "msg-1", "2026-01-02T00:00:00Z").unwrap();
        assert_eq!(count(&db, "a@example.edu").unwrap(), 1);
    }

    #[test]
    fn test_prune_keeps_newest() {
        let db = test_db();
        for i in 0..5 {
            let ts = format!("2026-01-0{}T00:00:00Z", i + 1);
            mark(&db, "a@example.edu", &format!("msg-{}", i), &ts).unwrap();
        }

        let deleted = prune(&db, "a@example.edu", 2).unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(count(&db, "a@example.edu").unwrap(), 2);

        // The two newest survive.
        assert!(is_processed(&db, "a@example.edu", "msg-3").unwrap());
        assert!(is_processed(&db, "a@example.edu", "msg-4").unwrap());
        assert!(!is_processed(&db, "a@example.edu", "msg-0").unwrap());
    }

    #[test]
    fn test_prune_leaves_other_accounts_alone() {
        let db = test_db();
        mark(&db, "a@example.edu", "msg-1", "2026-01-01T00:00:00Z").unwrap();
        mark(&db, "b@example.edu", "msg-1", "2026-01-01T00:00:00Z").unwrap();

        prune(&db, "a@example.edu", 0).unwrap();
        assert_eq!(count(&db, "a@example.edu").unwrap(), 0);
        assert_eq!(count(&db, "b@example.edu").unwrap(), 1);
    }

    #[test]
    fn test_prune_under_limit_is_noop() {
        let db = test_db();
        mark(&db, "a@example.edu", "msg-1", "2026-01-01T00:00:00Z").unwrap();
        let deleted = prune(&db, "a@example.edu", 1000).unwrap();
        assert_eq!(deleted, 0);
        assert_eq!(count(&db, "a@example.edu").unwrap(), 1);
    }
}
