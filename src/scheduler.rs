// Daily scrape trigger
//
// Fires once a day at a fixed local hour and ingests that local date.
// Failures are logged; the next day's run is the retry.

use crate::db::SharedConnection;
use crate::ingest::{self, Ingested, PuzzleSource};
use crate::model::PuzzleDate;
use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use std::sync::Arc;
use tracing::{error, info};

/// Next trigger strictly after `now`, at `hour`:00 local time in `offset`
pub fn next_run_after(now: DateTime<Utc>, offset: FixedOffset, hour: u32) -> DateTime<Utc> {
    let local_now = now.with_timezone(&offset);
    let at = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or_default();
    let shift = Duration::seconds(offset.local_minus_utc() as i64);

    let today_local = local_now.date_naive().and_time(at);
    let today_run = Utc.from_utc_datetime(&(today_local - shift));

    if today_run > now {
        today_run
    } else {
        today_run + Duration::days(1)
    }
}

/// Local puzzle date a trigger at `at` belongs to
pub fn run_date(at: DateTime<Utc>, offset: FixedOffset) -> PuzzleDate {
    PuzzleDate::from_naive(at.with_timezone(&offset).date_naive())
}

/// Ingest `date` on the blocking pool
pub async fn run_once(
    db: SharedConnection,
    source: Arc<dyn PuzzleSource>,
    date: PuzzleDate,
) -> Option<Ingested> {
    let task = tokio::task::spawn_blocking(move || {
        ingest::ingest_logged(source.as_ref(), &db, &date, "scheduler")
    });

    match task.await {
        Ok(ingested) => ingested,
        Err(e) => {
            error!("Scheduled ingest task failed to complete: {}", e);
            None
        }
    }
}

/// Run forever, ingesting the local date once a day
pub async fn run_daily(db: SharedConnection, source: Arc<dyn PuzzleSource>, offset: FixedOffset, hour: u32) {
    loop {
        let now = Utc::now();
        let next = next_run_after(now, offset, hour);
        info!("Next scheduled scrape at {}", next.with_timezone(&offset));

        let wait = (next - now).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;

        // Date of the trigger, not of whenever the sleep returned
        let date = run_date(next, offset);
        info!("Scheduled scrape for {}", date);
        run_once(db.clone(), source.clone(), date).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{count_puzzles, setup_database};
    use crate::ingest::tests::{sample_payload, CannedSource};
    use rusqlite::Connection;
    use std::sync::Mutex;

    fn eastern() -> FixedOffset {
        FixedOffset::west_opt(5 * 3600).unwrap()
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_next_run_later_today() {
        // 03:00 local on Feb 13; next local midnight is Feb 14 05:00 UTC
        let now = utc("2026-02-13T08:00:00Z");
        assert_eq!(next_run_after(now, eastern(), 0), utc("2026-02-14T05:00:00Z"));
    }

    #[test]
    fn test_next_run_same_local_day() {
        // 03:00 local, run hour 06:00 local
        let now = utc("2026-02-13T08:00:00Z");
        assert_eq!(next_run_after(now, eastern(), 6), utc("2026-02-13T11:00:00Z"));
    }

    #[test]
    fn test_next_run_exactly_at_trigger_moves_a_day() {
        let now = utc("2026-02-14T05:00:00Z");
        assert_eq!(next_run_after(now, eastern(), 0), utc("2026-02-15T05:00:00Z"));
    }

    #[test]
    fn test_next_run_local_date_differs_from_utc() {
        // 23:30 UTC on Feb 13 is already 08:30 Feb 14 at UTC+9
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let now = utc("2026-02-13T23:30:00Z");
        assert_eq!(next_run_after(now, tokyo, 9), utc("2026-02-14T00:00:00Z"));
    }

    #[test]
    fn test_run_date_is_the_trigger_local_day() {
        let next = next_run_after(utc("2026-02-13T08:00:00Z"), eastern(), 0);
        assert_eq!(run_date(next, eastern()), PuzzleDate::parse("2026-02-14").unwrap());

        // One second early is still the previous local day
        let early = next - Duration::seconds(1);
        assert_eq!(run_date(early, eastern()), PuzzleDate::parse("2026-02-13").unwrap());
    }

    #[tokio::test]
    async fn test_run_once_ingests() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let db: SharedConnection = Arc::new(Mutex::new(conn));
        let source: Arc<dyn PuzzleSource> = Arc::new(CannedSource::ok(sample_payload()));

        let ingested = run_once(db.clone(), source, PuzzleDate::parse("2026-02-13").unwrap()).await;

        assert!(ingested.is_some());
        assert_eq!(count_puzzles(&db.lock().unwrap()).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_run_once_failure_is_swallowed() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let db: SharedConnection = Arc::new(Mutex::new(conn));
        let source: Arc<dyn PuzzleSource> = Arc::new(CannedSource::failing("503"));

        assert!(run_once(db, source, PuzzleDate::parse("2026-02-13").unwrap()).await.is_none());
    }
}
