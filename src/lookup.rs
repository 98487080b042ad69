// Puzzle Lookup Service - read side of the store
//
// Lookups never scrape. A missing puzzle is a plain "not found"; the
// scheduled job is the only writer of puzzle content.

use crate::db;
use crate::error::{PuzzleError, PuzzleResult};
use crate::model::{Entry, PuzzleDate};
use rusqlite::Connection;
use tracing::{debug, warn};

/// Entries for `date`, or for the most recent stored puzzle when `date` is `None`.
///
/// A supplied date is validated before the store is touched.
pub fn get_puzzle(conn: &Connection, date: Option<&str>) -> PuzzleResult<Vec<Entry>> {
    match date {
        Some(raw) => {
            let date = PuzzleDate::parse(raw)?;
            debug!("Looking up puzzle for {}", date);
            db::load_entries(conn, &date)?.ok_or(PuzzleError::PuzzleNotFound)
        }
        None => {
            let (latest, entries) = db::load_latest(conn)?.ok_or(PuzzleError::PuzzleNotFound)?;
            debug!("Resolved latest puzzle to {}", latest);
            Ok(entries)
        }
    }
}

/// All dates with a stored puzzle, newest first.
///
/// Reads the availability index; if it has never been written, falls back to a
/// full scan and rebuilds it. The stored order is not trusted.
pub fn get_available_dates(conn: &mut Connection) -> PuzzleResult<Vec<PuzzleDate>> {
    let mut dates = match db::read_index(conn)? {
        Some(dates) => dates,
        None => {
            warn!("Availability index missing; rebuilding from puzzle scan");
            db::rebuild_index(conn)?
        }
    };

    dates.sort_unstable_by(|a, b| b.cmp(a));
    dates.dedup();
    Ok(dates)
}
