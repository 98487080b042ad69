// HTTP client for the read API, used by the terminal shell

use crate::model::{Entry, PuzzleDate};
use crate::session::{FetchRequest, FetchResult};
use anyhow::{Context, Result};
use tracing::debug;

pub struct ApiClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        Ok(ApiClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn dates_url(&self) -> String {
        format!("{}/getAvailableDates", self.base_url)
    }

    pub fn words_url(&self, date: Option<&PuzzleDate>) -> String {
        match date {
            Some(date) => format!("{}/getWords?date={}", self.base_url, date),
            None => format!("{}/getWords", self.base_url),
        }
    }

    /// `GET /getAvailableDates`
    pub fn available_dates(&self) -> Result<Vec<PuzzleDate>> {
        let url = self.dates_url();
        debug!("GET {}", url);

        let dates = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("Request to {} failed", url))?
            .error_for_status()
            .context("Server could not list dates")?
            .json::<Vec<PuzzleDate>>()
            .context("Date list was not a JSON array of dates")?;

        Ok(dates)
    }

    /// `GET /getWords[?date=...]`
    pub fn words(&self, date: Option<&PuzzleDate>) -> Result<Vec<Entry>> {
        let url = self.words_url(date);
        debug!("GET {}", url);

        let entries = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("Request to {} failed", url))?
            .error_for_status()
            .context("Server could not load the puzzle")?
            .json::<Vec<Entry>>()
            .context("Puzzle was not a JSON array of entries")?;

        Ok(entries)
    }

    /// Run one fetch to completion; meant to be called off the UI thread
    pub fn execute(&self, request: FetchRequest) -> FetchResult {
        match request {
            FetchRequest::Dates => FetchResult::Dates(self.available_dates().map_err(|e| format!("{:#}", e))),
            FetchRequest::Puzzle { ticket, date } => {
                let result = self.words(date.as_ref()).map_err(|e| format!("{:#}", e));
                FetchResult::Puzzle { ticket, date, result }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let client = ApiClient::new("http://localhost:3000/").unwrap();
        let date = PuzzleDate::parse("2026-02-13").unwrap();

        assert_eq!(client.dates_url(), "http://localhost:3000/getAvailableDates");
        assert_eq!(client.words_url(None), "http://localhost:3000/getWords");
        assert_eq!(client.words_url(Some(&date)), "http://localhost:3000/getWords?date=2026-02-13");
    }

    #[test]
    fn test_unreachable_server_yields_error_result() {
        // Port 9 (discard) on localhost is essentially never listening
        let client = ApiClient::new("http://127.0.0.1:9").unwrap();
        match client.execute(FetchRequest::Dates) {
            FetchResult::Dates(result) => assert!(result.is_err()),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_puzzle_result_keeps_ticket() {
        let client = ApiClient::new("http://127.0.0.1:9").unwrap();
        let date = PuzzleDate::parse("2026-02-13").unwrap();
        match client.execute(FetchRequest::Puzzle { ticket: 4, date: Some(date.clone()) }) {
            FetchResult::Puzzle { ticket, date: got, result } => {
                assert_eq!(ticket, 4);
                assert_eq!(got, Some(date));
                assert!(result.is_err());
            }
            other => panic!("unexpected result {:?}", other),
        }
    }
}
