//! Persistence tests against an on-disk database: reopening must preserve
//! accounts, ledger marks and extracted events, and migrations must be
//! idempotent across process restarts.

use clubmail::db::{account_repo, event_repo, ledger_repo, Database};
use tempfile::TempDir;

fn open_at(dir: &TempDir) -> Database {
    Database::open(&dir.path().join("clubmail.db")).expect("Failed to open database")
}

#[test]
fn test_state_survives_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let db = open_at(&dir);
        account_repo::upsert(
            &db,
            &account_repo::AccountRow {
                email: "student@example.edu".to_string(),
                access_token: Some("token".to_string()),
                created_at: "2026-01-01T00:00:00Z".to_string(),
                updated_at: "2026-01-01T00:00:00Z".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        account_repo::set_cursor(&db, "student@example.edu", "12345").unwrap();
        ledger_repo::mark(&db, "student@example.edu", "m1", "2026-01-01T00:00:00Z").unwrap();

        let event = event_repo::ExtractedEventRow {
            event_key: event_repo::make_key(
                "student@example.edu",
                "m1",
                "https://forms.gle/abc",
            ),
            recipient: "student@example.edu".to_string(),
            message_id: "m1".to_string(),
            link: "https://forms.gle/abc".to_string(),
            fields_json: r#"{"email":"1000002"}"#.to_string(),
            sender: "clubs@example.edu".to_string(),
            title: "Workshop".to_string(),
            venue: "Auditorium".to_string(),
            date: "12/12".to_string(),
            time: "5pm".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
        };
        event_repo::upsert(&db, &event).unwrap();
    }

    // Second open runs migrations again over an already-migrated file.
    let db = open_at(&dir);

    let account = account_repo::find(&db, "student@example.edu").unwrap().unwrap();
    assert_eq!(account.history_cursor.as_deref(), Some("12345"));
    assert!(ledger_repo::is_processed(&db, "student@example.edu", "m1").unwrap());

    let events = event_repo::list_for_recipient(&db, "student@example.edu", 10).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].link, "https://forms.gle/abc");
}

#[test]
fn test_dedupe_key_stable_across_reopen() {
    let dir = TempDir::new().unwrap();
    let key = event_repo::make_key("a@example.edu", "m1", "https://forms.gle/abc?usp=1");

    {
        let db = open_at(&dir);
        event_repo::upsert(
            &db,
            &event_repo::ExtractedEventRow {
                event_key: key.clone(),
                recipient: "a@example.edu".to_string(),
                message_id: "m1".to_string(),
                link: "https://forms.gle/abc?usp=1".to_string(),
                fields_json: "{}".to_string(),
                sender: "clubs@example.edu".to_string(),
                title: "Workshop".to_string(),
                venue: "N/A".to_string(),
                date: "N/A".to_string(),
                time: "N/A".to_string(),
                created_at: "2026-01-01T00:00:00Z".to_string(),
            },
        )
        .unwrap();
    }

    // A resync after restart computes the same key and merges.
    let db = open_at(&dir);
    assert_eq!(
        event_repo::make_key("a@example.edu", "m1", "https://forms.gle/abc?utm=2"),
        key
    );
    event_repo::upsert(
        &db,
        &event_repo::ExtractedEventRow {
            event_key: key,
            recipient: "a@example.edu".to_string(),
            message_id: "m1".to_string(),
            link: "https://forms.gle/abc?utm=2".to_string(),
            fields_json: "{}".to_string(),
            sender: "clubs@example.edu".to_string(),
            title: "Workshop".to_string(),
            venue: "N/A".to_string(),
            date: "N/A".to_string(),
            time: "N/A".to_string(),
            created_at: "2026-02-01T00:00:00Z".to_string(),
        },
    )
    .unwrap();

    assert_eq!(
        event_repo::count_for_message(&db, "a@example.edu", "m1").unwrap(),
        1
    );
}
