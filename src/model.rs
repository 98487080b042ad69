// Puzzle data model: entries, dates, and the stored puzzle document

use crate::error::{PuzzleError, PuzzleResult};
use chrono::{FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

// ============================================================================
// DIFFICULTY
// ============================================================================

/// Difficulty rank of a category, assigned by its position in the source payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Tricky,
    /// Category rank beyond the four the source normally supplies
    Unknown,
}

impl Difficulty {
    /// Map a zero-based category rank to its difficulty
    pub fn from_rank(rank: usize) -> Self {
        match rank {
            0 => Difficulty::Easy,
            1 => Difficulty::Medium,
            2 => Difficulty::Hard,
            3 => Difficulty::Tricky,
            _ => Difficulty::Unknown,
        }
    }
}

// ============================================================================
// ENTRY
// ============================================================================

/// One puzzle tile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Unique within one puzzle only
    pub id: String,
    pub text: String,
    pub category: String,
    pub difficulty: Difficulty,
}

impl Entry {
    pub fn new(id: impl Into<String>, text: impl Into<String>, category: impl Into<String>, difficulty: Difficulty) -> Self {
        Entry {
            id: id.into(),
            text: text.into(),
            category: category.into(),
            difficulty,
        }
    }
}

// ============================================================================
// PUZZLE DATE
// ============================================================================

/// A `YYYY-MM-DD` date key.
///
/// Validation is syntactic only: four digits, `-`, two digits, `-`, two digits.
/// Because the layout is fixed-width, string order is chronological order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PuzzleDate(String);

impl PuzzleDate {
    pub fn parse(input: &str) -> PuzzleResult<Self> {
        let bytes = input.as_bytes();
        if bytes.len() != 10 {
            return Err(PuzzleError::InvalidDateFormat);
        }

        let well_formed = bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });

        if well_formed {
            Ok(PuzzleDate(input.to_string()))
        } else {
            Err(PuzzleError::InvalidDateFormat)
        }
    }

    pub fn from_naive(date: NaiveDate) -> Self {
        PuzzleDate(date.format("%Y-%m-%d").to_string())
    }

    /// Current calendar date at a fixed UTC offset
    pub fn today(offset: FixedOffset) -> Self {
        Self::from_naive(Utc::now().with_timezone(&offset).date_naive())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PuzzleDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PuzzleDate {
    type Error = PuzzleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PuzzleDate::parse(&value)
    }
}

impl From<PuzzleDate> for String {
    fn from(date: PuzzleDate) -> Self {
        date.0
    }
}

// ============================================================================
// PUZZLE
// ============================================================================

/// One day's game as persisted by ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Puzzle {
    pub date: PuzzleDate,
    pub entries: Vec<Entry>,
    /// Untouched source response, kept for audit and debugging
    pub raw: serde_json::Value,
}

impl Puzzle {
    /// SHA-256 hex digest of the raw payload
    pub fn source_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.raw.to_string());
        format!("{:x}", hasher.finalize())
    }

    /// Distinct category names in entry order
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if !seen.contains(&entry.category.as_str()) {
                seen.push(&entry.category);
            }
        }
        seen
    }
}
