// Solve Sixteen - Web Server
// Read API plus the daily scrape scheduler

use anyhow::{Context, Result};
use rusqlite::Connection;
use solve_sixteen::{
    api::{self, AppState},
    scheduler, setup_database, Config, HttpSource, PuzzleSource, SharedConnection,
};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Config::load()?;
    let offset = config.offset()?;

    let conn = Connection::open(&config.db_path)
        .with_context(|| format!("Failed to open database at {}", config.db_path))?;
    setup_database(&conn).context("Failed to initialize database")?;
    info!("Database opened: {}", config.db_path);

    let db: SharedConnection = Arc::new(Mutex::new(conn));

    // Daily scrape runs alongside the API
    let source: Arc<dyn PuzzleSource> = Arc::new(HttpSource::new(&config.source_url));
    tokio::spawn(scheduler::run_daily(db.clone(), source, offset, config.scrape_hour));

    let app = api::router(AppState { db });

    let address = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to {}", address))?;

    info!("Server running on http://{}", address);
    info!("   Dates: http://localhost:{}/getAvailableDates", config.port);
    info!("   Words: http://localhost:{}/getWords?date=YYYY-MM-DD", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
