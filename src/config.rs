use anyhow::{anyhow, Context, Result};
use chrono::FixedOffset;
use std::{env, fmt::Display, str::FromStr};
use tracing::{debug, info};

pub const DEFAULT_SOURCE_URL: &str = "https://www.nytimes.com/svc/connections/v2";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub db_path: String,
    /// Base of the third-party puzzle endpoint; `/{date}.json` is appended
    pub source_url: String,
    /// Where the terminal client finds the read API
    pub api_url: String,
    /// Local hour (0-23) at which the daily scrape runs
    pub scrape_hour: u32,
    /// Fixed offset of the scrape timezone, in minutes east of UTC
    pub utc_offset_minutes: i32,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `load` uses the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            port: try_load(&lookup, "SIXTEEN_PORT", "3000")?,
            db_path: try_load(&lookup, "SIXTEEN_DB_PATH", "solve_sixteen.db")?,
            source_url: try_load(&lookup, "SIXTEEN_SOURCE_URL", DEFAULT_SOURCE_URL)?,
            api_url: try_load(&lookup, "SIXTEEN_API_URL", "http://localhost:3000")?,
            scrape_hour: try_load(&lookup, "SIXTEEN_SCRAPE_HOUR", "0")?,
            // US Eastern standard time
            utc_offset_minutes: try_load(&lookup, "SIXTEEN_UTC_OFFSET_MINUTES", "-300")?,
        };

        if config.scrape_hour > 23 {
            return Err(anyhow!("SIXTEEN_SCRAPE_HOUR must be 0-23, got {}", config.scrape_hour));
        }
        config.offset()?;

        Ok(config)
    }

    pub fn offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .ok_or_else(|| anyhow!("SIXTEEN_UTC_OFFSET_MINUTES out of range: {}", self.utc_offset_minutes))
    }
}

fn try_load<T, F>(lookup: &F, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| {
        debug!("{key} not set, using default: {default}");
        default.to_string()
    });

    let value = raw
        .parse()
        .map_err(|e| anyhow!("{e}"))
        .with_context(|| format!("Invalid {key} value: {raw:?}"))?;

    info!("{key} = {raw}");
    Ok(value)
}
