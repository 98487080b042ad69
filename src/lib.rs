// Solve Sixteen - Core Library
// Shared by the CLI, the terminal client, the API server, and tests

pub mod arrangement;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod lookup;
pub mod model;
pub mod palette;
pub mod session;

#[cfg(feature = "server")]
pub mod api;
#[cfg(feature = "server")]
pub mod scheduler;

// Re-export commonly used types
pub use arrangement::{
    shuffle, Arrangement, DropTarget, Location, Notice, Transition,
    GRID_COLUMNS, GRID_SIZE,
};
pub use client::ApiClient;
pub use config::Config;
pub use db::{
    Event, SaveOutcome, SharedConnection,
    setup_database, save_puzzle, rebuild_index, load_entries, load_latest,
    load_raw_payload, read_index, scan_puzzle_dates, count_puzzles, get_events_for_date,
};
pub use error::{PuzzleError, PuzzleResult};
pub use ingest::{ingest, normalize, HttpSource, Ingested, PuzzleSource};
pub use lookup::{get_available_dates, get_puzzle};
pub use model::{Difficulty, Entry, Puzzle, PuzzleDate};
pub use palette::{CategoryPalette, GroupColor};
pub use session::{Applied, FetchRequest, FetchResult, Session, SolvedBanner};
