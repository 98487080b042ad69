// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::sync::Mutex;
use tracing_subscriber::{fmt, EnvFilter};

// Use library instead of local modules
use solve_sixteen::{
    get_available_dates, get_events_for_date, ingest, load_raw_payload, rebuild_index, setup_database,
    Config, HttpSource, PuzzleDate, PuzzleError,
};

#[derive(Parser)]
#[command(name = "solve-sixteen", version, about = "Daily sixteen-word grouping puzzle")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch one day's puzzle from the source and store it
    Ingest {
        /// Puzzle date (YYYY-MM-DD); defaults to today in the configured offset
        #[arg(long)]
        date: Option<String>,
    },
    /// List stored puzzle dates, newest first
    Dates,
    /// Rebuild the availability index from a full scan of stored puzzles
    RebuildIndex,
    /// Print the stored source payload for one date
    Raw {
        #[arg(long)]
        date: String,
    },
    /// Play in the terminal against the API server (default)
    Play {
        /// API base URL; overrides SIXTEEN_API_URL
        #[arg(long)]
        api_url: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command.unwrap_or(Command::Play { api_url: None }) {
        Command::Ingest { date } => {
            init_tracing();
            run_ingest(&config, date.as_deref())
        }
        Command::Dates => {
            init_tracing();
            run_dates(&config)
        }
        Command::RebuildIndex => {
            init_tracing();
            run_rebuild(&config)
        }
        Command::Raw { date } => {
            init_tracing();
            run_raw(&config, &date)
        }
        // No log subscriber here: output would tear the alternate screen
        Command::Play { api_url } => run_ui_mode(api_url.unwrap_or(config.api_url)),
    }
}

fn init_tracing() {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();
}

fn open_database(config: &Config) -> Result<Connection> {
    let conn = Connection::open(&config.db_path)
        .with_context(|| format!("Failed to open database at {}", config.db_path))?;
    setup_database(&conn).context("Failed to initialize database")?;
    Ok(conn)
}

fn run_ingest(config: &Config, date: Option<&str>) -> Result<()> {
    let date = match date {
        Some(d) => PuzzleDate::parse(d)?,
        None => PuzzleDate::today(config.offset()?),
    };

    println!("📥 Ingesting puzzle for {}", date);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let db = Mutex::new(open_database(config)?);
    println!("✓ Database ready: {}", config.db_path);

    let source = HttpSource::new(&config.source_url);
    let ingested = ingest(&source, &db, &date, "cli")?;

    println!("✓ Stored {} entries", ingested.puzzle.entries.len());
    for category in ingested.puzzle.categories() {
        println!("   • {}", category);
    }

    if ingested.outcome.created {
        println!("✓ New puzzle added to the index");
    } else if ingested.outcome.changed {
        println!("✓ Existing puzzle replaced with changed content");
    } else {
        println!("✓ Existing puzzle unchanged");
    }

    let conn = solve_sixteen::db::lock(&db)?;
    let events = get_events_for_date(&conn, &date)?;
    println!("✓ {} audit event(s) recorded for {}", events.len(), date);

    Ok(())
}

fn run_dates(config: &Config) -> Result<()> {
    let mut conn = open_database(config)?;
    let dates = get_available_dates(&mut conn)?;

    if dates.is_empty() {
        println!("No puzzles stored yet. Run: solve-sixteen ingest");
        return Ok(());
    }

    for date in &dates {
        println!("{}", date);
    }
    Ok(())
}

fn run_rebuild(config: &Config) -> Result<()> {
    let mut conn = open_database(config)?;
    let dates = rebuild_index(&mut conn)?;
    println!("✓ Availability index rebuilt: {} date(s)", dates.len());
    Ok(())
}

fn run_raw(config: &Config, date: &str) -> Result<()> {
    let date = PuzzleDate::parse(date)?;
    let conn = open_database(config)?;

    let payload = load_raw_payload(&conn, &date)?.ok_or(PuzzleError::PuzzleNotFound)?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(api_url: String) -> Result<()> {
    println!("🖥️  Connecting to {}...\n", api_url);

    let client = solve_sixteen::ApiClient::new(&api_url)?;
    let mut app = ui::App::new(client);
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_api_url: String) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or serve the API: cargo run --bin solve-sixteen-server --features server");
    std::process::exit(1);
}
