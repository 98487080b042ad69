use crate::error::{PuzzleError, PuzzleResult};
use crate::model::{Entry, Puzzle, PuzzleDate};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Storage handle shared between the API handlers and the scheduler
pub type SharedConnection = Arc<Mutex<Connection>>;

/// Lock a shared connection; a poisoned lock is a storage failure
pub fn lock(db: &Mutex<Connection>) -> PuzzleResult<MutexGuard<'_, Connection>> {
    db.lock()
        .map_err(|_| PuzzleError::StorageFailure("database lock poisoned".to_string()))
}

/// Event for the ingestion audit trail
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// What a puzzle write did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    /// No puzzle existed for the date before this write
    pub created: bool,
    /// Raw payload differs from the previously stored one (always true when created)
    pub changed: bool,
}

pub fn setup_database(conn: &Connection) -> PuzzleResult<()> {
    // Enable WAL mode so readers never block on the scheduler's write
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;

    // ==========================================================================
    // Puzzles: one document per date
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS puzzles (
            date TEXT PRIMARY KEY NOT NULL,
            entries TEXT NOT NULL,
            raw_payload TEXT NOT NULL,
            source_hash TEXT NOT NULL,
            ingested_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Availability index: singleton row holding a JSON array of dates
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS availability_index (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            dates TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// Writes
// ============================================================================

/// Store a puzzle and register its date in the availability index.
///
/// Both writes and the audit event commit in one transaction: a reader sees
/// either none of them or all of them.
pub fn save_puzzle(conn: &mut Connection, puzzle: &Puzzle, actor: &str) -> PuzzleResult<SaveOutcome> {
    let entries_json = serde_json::to_string(&puzzle.entries)?;
    let raw_json = puzzle.raw.to_string();
    let source_hash = puzzle.source_hash();
    let now = Utc::now().to_rfc3339();

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let previous_hash: Option<String> = tx
        .query_row(
            "SELECT source_hash FROM puzzles WHERE date = ?1",
            [puzzle.date.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    tx.execute(
        "INSERT INTO puzzles (date, entries, raw_payload, source_hash, ingested_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(date) DO UPDATE SET
            entries = excluded.entries,
            raw_payload = excluded.raw_payload,
            source_hash = excluded.source_hash,
            ingested_at = excluded.ingested_at",
        params![puzzle.date.as_str(), entries_json, raw_json, source_hash, now],
    )?;

    // Add-if-absent; an index that does not exist yet starts from the full key set
    let mut dates = match read_index(&tx)? {
        Some(dates) => dates,
        None => scan_puzzle_dates(&tx)?,
    };
    if !dates.contains(&puzzle.date) {
        dates.push(puzzle.date.clone());
    }
    write_index(&tx, &dates)?;

    let outcome = SaveOutcome {
        created: previous_hash.is_none(),
        changed: previous_hash.as_deref() != Some(source_hash.as_str()),
    };

    let event = Event::new(
        if outcome.created { "puzzle_ingested" } else { "puzzle_reingested" },
        "puzzle",
        puzzle.date.as_str(),
        serde_json::json!({
            "entries": puzzle.entries.len(),
            "source_hash": source_hash,
            "changed": outcome.changed,
        }),
        actor,
    );
    insert_event(&tx, &event)?;

    tx.commit()?;

    debug!("Stored puzzle {} (created: {}, changed: {})", puzzle.date, outcome.created, outcome.changed);
    Ok(outcome)
}

/// Rebuild the availability index from a full scan of puzzle keys.
///
/// The scan is merged with whatever index is present when the write happens,
/// so a rebuild never drops a date added by a concurrent ingest.
pub fn rebuild_index(conn: &mut Connection) -> PuzzleResult<Vec<PuzzleDate>> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut merged: BTreeSet<PuzzleDate> = scan_puzzle_dates(&tx)?.into_iter().collect();
    if let Some(existing) = read_index(&tx)? {
        merged.extend(existing);
    }

    let dates: Vec<PuzzleDate> = merged.into_iter().collect();
    write_index(&tx, &dates)?;
    tx.commit()?;

    info!("Rebuilt availability index with {} dates", dates.len());
    Ok(dates)
}

fn write_index(conn: &Connection, dates: &[PuzzleDate]) -> PuzzleResult<()> {
    let dates_json = serde_json::to_string(dates)?;

    conn.execute(
        "INSERT INTO availability_index (id, dates, updated_at) VALUES (1, ?1, ?2)
         ON CONFLICT(id) DO UPDATE SET dates = excluded.dates, updated_at = excluded.updated_at",
        params![dates_json, Utc::now().to_rfc3339()],
    )?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> PuzzleResult<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

// ============================================================================
// Reads
// ============================================================================

/// Entries stored for `date`, if any
pub fn load_entries(conn: &Connection, date: &PuzzleDate) -> PuzzleResult<Option<Vec<Entry>>> {
    let entries_json: Option<String> = conn
        .query_row(
            "SELECT entries FROM puzzles WHERE date = ?1",
            [date.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    match entries_json {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// The most recently dated puzzle's date and entries
pub fn load_latest(conn: &Connection) -> PuzzleResult<Option<(PuzzleDate, Vec<Entry>)>> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT date, entries FROM puzzles ORDER BY date DESC LIMIT 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match row {
        Some((date, entries_json)) => {
            let date = stored_date(&date)?;
            Ok(Some((date, serde_json::from_str(&entries_json)?)))
        }
        None => Ok(None),
    }
}

/// Raw source payload kept for `date`, for debugging
pub fn load_raw_payload(conn: &Connection, date: &PuzzleDate) -> PuzzleResult<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT raw_payload FROM puzzles WHERE date = ?1",
            [date.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    match raw {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Availability index contents in stored order, or `None` if never written
pub fn read_index(conn: &Connection) -> PuzzleResult<Option<Vec<PuzzleDate>>> {
    let dates_json: Option<String> = conn
        .query_row(
            "SELECT dates FROM availability_index WHERE id = 1",
            [],
            |row| row.get(0),
        )
        .optional()?;

    match dates_json {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Every stored puzzle key (full scan)
pub fn scan_puzzle_dates(conn: &Connection) -> PuzzleResult<Vec<PuzzleDate>> {
    let mut stmt = conn.prepare("SELECT date FROM puzzles")?;

    let raw_dates = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    raw_dates.iter().map(|d| stored_date(d)).collect()
}

pub fn count_puzzles(conn: &Connection) -> PuzzleResult<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM puzzles", [], |row| row.get(0))?;

    Ok(count)
}

/// Audit events recorded for one puzzle date, newest first
pub fn get_events_for_date(conn: &Connection, date: &PuzzleDate) -> PuzzleResult<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = 'puzzle' AND entity_id = ?1
         ORDER BY id DESC",
    )?;

    let rows = stmt
        .query_map([date.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(event_id, timestamp, event_type, entity_type, entity_id, data, actor)| {
            let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                .map_err(|e| PuzzleError::StorageFailure(format!("bad event timestamp: {}", e)))?
                .with_timezone(&Utc);

            Ok(Event {
                event_id,
                timestamp,
                event_type,
                entity_type,
                entity_id,
                data: serde_json::from_str(&data)?,
                actor,
            })
        })
        .collect()
}

fn stored_date(raw: &str) -> PuzzleResult<PuzzleDate> {
    PuzzleDate::parse(raw)
        .map_err(|_| PuzzleError::StorageFailure(format!("stored puzzle key is not a date: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Difficulty;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn create_test_puzzle(date: &str, word: &str) -> Puzzle {
        Puzzle {
            date: PuzzleDate::parse(date).unwrap(),
            entries: vec![Entry::new("0-0", word, "DOWNRIGHT", Difficulty::Easy)],
            raw: serde_json::json!({"status": "OK", "word": word}),
        }
    }

    fn date(s: &str) -> PuzzleDate {
        PuzzleDate::parse(s).unwrap()
    }

    #[test]
    fn test_save_then_load() {
        let mut conn = test_db();
        let puzzle = create_test_puzzle("2026-02-13", "PURE");

        let outcome = save_puzzle(&mut conn, &puzzle, "test").unwrap();
        assert!(outcome.created);
        assert!(outcome.changed);

        let entries = load_entries(&conn, &date("2026-02-13")).unwrap().unwrap();
        assert_eq!(entries, puzzle.entries);

        let raw = load_raw_payload(&conn, &date("2026-02-13")).unwrap().unwrap();
        assert_eq!(raw, puzzle.raw);

        assert_eq!(read_index(&conn).unwrap(), Some(vec![date("2026-02-13")]));
    }

    #[test]
    fn test_save_twice_is_idempotent() {
        let mut conn = test_db();
        let puzzle = create_test_puzzle("2026-02-13", "PURE");

        save_puzzle(&mut conn, &puzzle, "test").unwrap();
        let second = save_puzzle(&mut conn, &puzzle, "test").unwrap();

        assert!(!second.created);
        assert!(!second.changed);
        assert_eq!(count_puzzles(&conn).unwrap(), 1);
        assert_eq!(read_index(&conn).unwrap(), Some(vec![date("2026-02-13")]));
    }

    #[test]
    fn test_resave_overwrites_content() {
        let mut conn = test_db();
        save_puzzle(&mut conn, &create_test_puzzle("2026-02-13", "PURE"), "test").unwrap();
        let outcome = save_puzzle(&mut conn, &create_test_puzzle("2026-02-13", "SHEER"), "test").unwrap();

        assert!(outcome.changed);
        let entries = load_entries(&conn, &date("2026-02-13")).unwrap().unwrap();
        assert_eq!(entries[0].text, "SHEER");
    }

    #[test]
    fn test_index_appends_in_write_order() {
        let mut conn = test_db();
        save_puzzle(&mut conn, &create_test_puzzle("2026-02-13", "A"), "test").unwrap();
        save_puzzle(&mut conn, &create_test_puzzle("2026-02-11", "B"), "test").unwrap();

        assert_eq!(
            read_index(&conn).unwrap(),
            Some(vec![date("2026-02-13"), date("2026-02-11")])
        );
    }

    #[test]
    fn test_first_save_seeds_missing_index_from_scan() {
        let mut conn = test_db();
        save_puzzle(&mut conn, &create_test_puzzle("2026-02-10", "A"), "test").unwrap();
        conn.execute("DELETE FROM availability_index", []).unwrap();

        save_puzzle(&mut conn, &create_test_puzzle("2026-02-11", "B"), "test").unwrap();

        let mut dates = read_index(&conn).unwrap().unwrap();
        dates.sort();
        assert_eq!(dates, vec![date("2026-02-10"), date("2026-02-11")]);
    }

    #[test]
    fn test_load_latest() {
        let mut conn = test_db();
        assert!(load_latest(&conn).unwrap().is_none());

        save_puzzle(&mut conn, &create_test_puzzle("2026-02-13", "NEW"), "test").unwrap();
        save_puzzle(&mut conn, &create_test_puzzle("2025-12-01", "OLD"), "test").unwrap();

        let (latest, entries) = load_latest(&conn).unwrap().unwrap();
        assert_eq!(latest, date("2026-02-13"));
        assert_eq!(entries[0].text, "NEW");
    }

    #[test]
    fn test_rebuild_merges_with_existing_index() {
        let mut conn = test_db();
        save_puzzle(&mut conn, &create_test_puzzle("2026-02-10", "A"), "test").unwrap();

        // An index entry whose record is not visible to this scan must survive the rebuild
        write_index(&conn, &[date("2026-02-12")]).unwrap();

        let dates = rebuild_index(&mut conn).unwrap();
        assert_eq!(dates, vec![date("2026-02-10"), date("2026-02-12")]);
        assert_eq!(read_index(&conn).unwrap(), Some(dates));
    }

    #[test]
    fn test_rebuild_on_empty_store() {
        let mut conn = test_db();
        let dates = rebuild_index(&mut conn).unwrap();
        assert!(dates.is_empty());
        assert_eq!(read_index(&conn).unwrap(), Some(vec![]));
    }

    #[test]
    fn test_event_log() {
        let mut conn = test_db();
        save_puzzle(&mut conn, &create_test_puzzle("2026-02-13", "PURE"), "scheduler").unwrap();
        save_puzzle(&mut conn, &create_test_puzzle("2026-02-13", "PURE"), "cli").unwrap();

        let events = get_events_for_date(&conn, &date("2026-02-13")).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "puzzle_reingested");
        assert_eq!(events[0].actor, "cli");
        assert_eq!(events[0].data["changed"], serde_json::json!(false));
        assert_eq!(events[1].event_type, "puzzle_ingested");
    }

    #[test]
    fn test_missing_tables_surface_as_storage_failure() {
        let conn = Connection::open_in_memory().unwrap();
        let err = load_entries(&conn, &date("2026-02-13")).unwrap_err();
        assert!(matches!(err, PuzzleError::StorageFailure(_)));
    }
}
