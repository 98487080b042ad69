// REST API with Axum: the two read routes plus a health check

use crate::db::{self, SharedConnection};
use crate::error::{PuzzleError, PuzzleResult};
use crate::lookup;
use crate::model::{Entry, PuzzleDate};
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: SharedConnection,
}

#[derive(Debug, Deserialize)]
pub struct WordsQuery {
    pub date: Option<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    puzzles: i64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/getAvailableDates", get(get_available_dates))
        .route("/getWords", get(get_words))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /health
async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, PuzzleError> {
    let puzzles = with_connection(&state, |conn| db::count_puzzles(conn))?;

    Ok(Json(HealthResponse { status: "OK", puzzles }))
}

/// GET /getAvailableDates - every stored date, newest first
async fn get_available_dates(State(state): State<AppState>) -> Result<Json<Vec<PuzzleDate>>, PuzzleError> {
    let dates = with_connection(&state, |conn| lookup::get_available_dates(conn))?;
    Ok(Json(dates))
}

/// GET /getWords?date=YYYY-MM-DD - entries of one puzzle (latest when no date)
async fn get_words(
    State(state): State<AppState>,
    Query(query): Query<WordsQuery>,
) -> Result<Json<Vec<Entry>>, PuzzleError> {
    // An empty `date=` counts as no date
    let date = query.date.as_deref().filter(|d| !d.is_empty());

    let entries = with_connection(&state, |conn| lookup::get_puzzle(conn, date))?;
    Ok(Json(entries))
}

// The guard never lives across an await point
fn with_connection<T>(
    state: &AppState,
    f: impl FnOnce(&mut rusqlite::Connection) -> PuzzleResult<T>,
) -> PuzzleResult<T> {
    let mut conn = db::lock(&state.db)?;
    f(&mut conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{save_puzzle, setup_database};
    use crate::model::{Difficulty, Puzzle};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use rusqlite::Connection;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    fn entries(word: &str) -> Vec<Entry> {
        vec![
            Entry::new("0-0", word, "DOWNRIGHT", Difficulty::Easy),
            Entry::new("1-0", "FLAG", "PENNANT", Difficulty::Medium),
        ]
    }

    fn test_state(dates: &[&str]) -> AppState {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        for date in dates {
            let puzzle = Puzzle {
                date: PuzzleDate::parse(date).unwrap(),
                entries: entries(date),
                raw: serde_json::json!({"status": "OK"}),
            };
            save_puzzle(&mut conn, &puzzle, "test").unwrap();
        }
        AppState { db: Arc::new(Mutex::new(conn)) }
    }

    async fn get(state: AppState, uri: &str) -> (StatusCode, String) {
        let response = router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_get_words_for_date() {
        let (status, body) = get(test_state(&["2026-02-13"]), "/getWords?date=2026-02-13").await;

        assert_eq!(status, StatusCode::OK);
        let returned: Vec<Entry> = serde_json::from_str(&body).unwrap();
        assert_eq!(returned, entries("2026-02-13"));
    }

    #[tokio::test]
    async fn test_get_words_defaults_to_latest() {
        let state = test_state(&["2026-02-11", "2026-02-13", "2026-02-12"]);

        for uri in ["/getWords", "/getWords?date="] {
            let (status, body) = get(state.clone(), uri).await;
            assert_eq!(status, StatusCode::OK);
            let returned: Vec<Entry> = serde_json::from_str(&body).unwrap();
            assert_eq!(returned[0].text, "2026-02-13");
        }
    }

    #[tokio::test]
    async fn test_get_words_not_found() {
        let (status, body) = get(test_state(&["2026-02-13"]), "/getWords?date=2099-01-01").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "Game not found");

        let (status, _) = get(test_state(&[]), "/getWords").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_words_bad_date() {
        let (status, body) = get(test_state(&["2026-02-13"]), "/getWords?date=13-02-2026").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Invalid date format. Expected YYYY-MM-DD");
    }

    #[tokio::test]
    async fn test_storage_failure_is_500() {
        let state = AppState { db: Arc::new(Mutex::new(Connection::open_in_memory().unwrap())) };
        let (status, body) = get(state, "/getWords?date=2026-02-13").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Internal Server Error");
    }

    #[tokio::test]
    async fn test_available_dates_descending() {
        let (status, body) = get(test_state(&["2026-02-12", "2026-02-13", "2026-01-30"]), "/getAvailableDates").await;

        assert_eq!(status, StatusCode::OK);
        let dates: Vec<String> = serde_json::from_str(&body).unwrap();
        assert_eq!(dates, vec!["2026-02-13", "2026-02-12", "2026-01-30"]);
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get(test_state(&["2026-02-13"]), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"puzzles\":1"));
    }
}
