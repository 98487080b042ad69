// Puzzle Ingestion - fetch, normalize, persist
//
// The source is a trait so the scheduler, the CLI, and tests can all drive
// the same pipeline with different backends.

use crate::db::{self, SaveOutcome};
use crate::error::{PuzzleError, PuzzleResult};
use crate::model::{Difficulty, Entry, Puzzle, PuzzleDate};
use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Deserialize;
use std::sync::Mutex;
use tracing::{error, info, warn};

// ============================================================================
// SOURCE PAYLOAD
// ============================================================================

const STATUS_OK: &str = "OK";

#[derive(Debug, Clone, Deserialize)]
pub struct SourceResponse {
    pub status: String,
    #[serde(default)]
    pub categories: Vec<SourceCategory>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceCategory {
    pub title: String,
    pub cards: Vec<SourceCard>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceCard {
    pub content: String,
}

// ============================================================================
// SOURCES
// ============================================================================

/// Where raw puzzle payloads come from
pub trait PuzzleSource: Send + Sync {
    /// Fetch the raw JSON payload for `date`
    fn fetch(&self, date: &PuzzleDate) -> Result<serde_json::Value>;

    /// Short name for logs
    fn name(&self) -> &str {
        "source"
    }
}

/// The third-party HTTP endpoint: `GET {base_url}/{date}.json`
///
/// The blocking client is built per fetch so it is created and dropped on the
/// calling thread, never inside an async runtime.
pub struct HttpSource {
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: &str) -> Self {
        HttpSource {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, date: &PuzzleDate) -> String {
        format!("{}/{}.json", self.base_url, date)
    }
}

impl PuzzleSource for HttpSource {
    fn fetch(&self, date: &PuzzleDate) -> Result<serde_json::Value> {
        let url = self.url_for(date);
        info!("Fetching puzzle for {} from {}", date, url);

        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("solve-sixteen/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        let payload = client
            .get(&url)
            .send()
            .with_context(|| format!("Request to {} failed", url))?
            .error_for_status()
            .with_context(|| format!("Source rejected request for {}", date))?
            .json::<serde_json::Value>()
            .context("Source response is not JSON")?;

        Ok(payload)
    }

    fn name(&self) -> &str {
        "http"
    }
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Turn a raw source payload into a puzzle.
///
/// Entry ids are `{category_index}-{card_index}`: deterministic and unique
/// within one puzzle.
pub fn normalize(date: &PuzzleDate, raw: serde_json::Value) -> PuzzleResult<Puzzle> {
    let response: SourceResponse = serde_json::from_value(raw.clone())
        .map_err(|e| PuzzleError::SourceUnavailable(format!("unexpected payload shape: {}", e)))?;

    if response.status != STATUS_OK {
        return Err(PuzzleError::SourceUnavailable(format!(
            "source status was {:?}",
            response.status
        )));
    }

    if response.categories.is_empty() {
        return Err(PuzzleError::SourceUnavailable("source returned no categories".to_string()));
    }

    if response.categories.len() > 4 {
        warn!(
            "Source returned {} categories for {}; extras get unknown difficulty",
            response.categories.len(),
            date
        );
    }

    let entries = response
        .categories
        .iter()
        .enumerate()
        .flat_map(|(rank, category)| {
            let difficulty = Difficulty::from_rank(rank);
            category.cards.iter().enumerate().map(move |(position, card)| {
                Entry::new(
                    format!("{}-{}", rank, position),
                    card.content.clone(),
                    category.title.clone(),
                    difficulty,
                )
            })
        })
        .collect();

    Ok(Puzzle {
        date: date.clone(),
        entries,
        raw,
    })
}

// ============================================================================
// INGEST
// ============================================================================

/// Result of a successful ingest
#[derive(Debug, Clone)]
pub struct Ingested {
    pub puzzle: Puzzle,
    pub outcome: SaveOutcome,
}

/// Fetch, normalize, and persist the puzzle for `date`.
///
/// The network fetch happens before the storage lock is taken. Nothing is
/// written unless the whole payload normalized cleanly. No retries.
pub fn ingest(
    source: &dyn PuzzleSource,
    db: &Mutex<Connection>,
    date: &PuzzleDate,
    actor: &str,
) -> PuzzleResult<Ingested> {
    let raw = source
        .fetch(date)
        .map_err(|e| PuzzleError::SourceUnavailable(format!("{:#}", e)))?;

    let puzzle = normalize(date, raw)?;

    let outcome = {
        let mut conn = db::lock(db)?;
        db::save_puzzle(&mut conn, &puzzle, actor)?
    };

    info!(
        "Ingested {} entries for {} via {} (created: {}, changed: {})",
        puzzle.entries.len(),
        date,
        source.name(),
        outcome.created,
        outcome.changed
    );

    Ok(Ingested { puzzle, outcome })
}

/// Scheduled-path wrapper: failures are logged and swallowed
pub fn ingest_logged(source: &dyn PuzzleSource, db: &Mutex<Connection>, date: &PuzzleDate, actor: &str) -> Option<Ingested> {
    match ingest(source, db, date, actor) {
        Ok(ingested) => Some(ingested),
        Err(e) => {
            error!("Scheduled ingest for {} failed: {}", date, e);
            None
        }
    }
}
