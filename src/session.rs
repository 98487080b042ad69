// Client session: date selection, fetch results, and the active arrangement
//
// Fetches run elsewhere (background threads in the terminal shell). Their
// results come back here as `FetchResult` values and are applied one at a time.
// Each puzzle request carries a ticket; only the newest ticket's result is
// applied, and only once. A failed or stale result never touches the board.

use crate::arrangement::{Arrangement, DropTarget, Transition};
use crate::model::{Entry, PuzzleDate};
use crate::palette::{CategoryPalette, GroupColor};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// How long transient messages stay visible
pub const MESSAGE_TTL: Duration = Duration::from_millis(1500);

/// Answers are checked on the official site, not locally
pub const VERIFY_URL: &str = "https://www.nytimes.com/games/connections";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRequest {
    Dates,
    /// `date: None` asks the server for its most recent puzzle
    Puzzle { ticket: u64, date: Option<PuzzleDate> },
}

impl FetchRequest {
    /// Result for a request whose worker never produced one
    pub fn failed(self, reason: impl Into<String>) -> FetchResult {
        let reason = reason.into();
        match self {
            FetchRequest::Dates => FetchResult::Dates(Err(reason)),
            FetchRequest::Puzzle { ticket, date } => FetchResult::Puzzle { ticket, date, result: Err(reason) },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    Dates(Result<Vec<PuzzleDate>, String>),
    Puzzle {
        ticket: u64,
        date: Option<PuzzleDate>,
        result: Result<Vec<Entry>, String>,
    },
}

/// Outcome of applying one fetch result
#[derive(Debug, Default, PartialEq)]
pub struct Applied {
    /// The board was re-initialized with a new puzzle
    pub reloaded: bool,
    /// Request to issue next, if any
    pub follow_up: Option<FetchRequest>,
}

impl Applied {
    fn follow_up(request: FetchRequest) -> Self {
        Applied { reloaded: false, follow_up: Some(request) }
    }
}

/// A solved category ready to render as a banner row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolvedBanner {
    pub category: String,
    pub color: GroupColor,
    pub words: Vec<String>,
}

pub struct Session {
    dates: Vec<PuzzleDate>,
    selected: Option<PuzzleDate>,
    loaded: Option<PuzzleDate>,
    entries: Vec<Entry>,
    arrangement: Arrangement,
    palette: CategoryPalette,
    message: Option<(String, Instant)>,
    rng: StdRng,
    last_ticket: u64,
    /// Ticket of the one puzzle request whose result may still be applied
    pending: Option<u64>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Session {
            dates: Vec::new(),
            selected: None,
            loaded: None,
            entries: Vec::new(),
            arrangement: Arrangement::new(),
            palette: CategoryPalette::default(),
            message: None,
            rng,
            last_ticket: 0,
            pending: None,
        }
    }

    /// First request to issue when the client starts
    pub fn start(&self) -> FetchRequest {
        FetchRequest::Dates
    }

    // ========================================================================
    // FETCH RESULTS
    // ========================================================================

    /// Apply one fetch result
    pub fn apply(&mut self, result: FetchResult) -> Applied {
        match result {
            FetchResult::Dates(Ok(dates)) => {
                info!("{} puzzle dates available", dates.len());
                self.dates = dates;

                if self.selected.is_some() {
                    return Applied::default();
                }
                match self.dates.first().cloned() {
                    Some(latest) => {
                        self.selected = Some(latest.clone());
                        Applied::follow_up(self.puzzle_request(Some(latest)))
                    }
                    None if self.entries.is_empty() => Applied::follow_up(self.puzzle_request(None)),
                    None => Applied::default(),
                }
            }
            FetchResult::Dates(Err(e)) => {
                warn!("Failed to fetch available dates: {}", e);
                // Without a date list, fall back to whatever the server has as latest
                if self.entries.is_empty() && self.selected.is_none() {
                    Applied::follow_up(self.puzzle_request(None))
                } else {
                    Applied::default()
                }
            }
            FetchResult::Puzzle { ticket, date, result } => {
                if self.pending != Some(ticket) {
                    info!("Ignoring stale puzzle response #{} for {:?}", ticket, date);
                    return Applied::default();
                }
                self.pending = None;

                match result {
                    Ok(entries) => {
                        self.load(date, entries);
                        Applied { reloaded: true, follow_up: None }
                    }
                    Err(e) => {
                        warn!("Failed to fetch puzzle {:?}: {}", date, e);
                        Applied::default()
                    }
                }
            }
        }
    }

    /// New puzzle request; supersedes every earlier one
    fn puzzle_request(&mut self, date: Option<PuzzleDate>) -> FetchRequest {
        self.last_ticket += 1;
        self.pending = Some(self.last_ticket);
        FetchRequest::Puzzle { ticket: self.last_ticket, date }
    }

    fn load(&mut self, date: Option<PuzzleDate>, entries: Vec<Entry>) {
        self.arrangement.initialize(&entries, &mut self.rng);
        self.palette = CategoryPalette::from_entries(&entries);
        self.entries = entries;
        self.loaded = date;
        self.message = None;
    }

    // ========================================================================
    // DATE SELECTION
    // ========================================================================

    /// Switch to `date`; the board changes only once the fetch succeeds
    pub fn select_date(&mut self, date: PuzzleDate) -> Option<FetchRequest> {
        if self.selected.as_ref() == Some(&date) {
            return None;
        }
        self.selected = Some(date.clone());
        Some(self.puzzle_request(Some(date)))
    }

    /// Step to an older date in the list
    pub fn older_date(&mut self) -> Option<FetchRequest> {
        self.step_date(1)
    }

    /// Step to a newer date in the list
    pub fn newer_date(&mut self) -> Option<FetchRequest> {
        self.step_date(-1)
    }

    fn step_date(&mut self, delta: isize) -> Option<FetchRequest> {
        let current = self
            .selected
            .as_ref()
            .and_then(|s| self.dates.iter().position(|d| d == s))
            .unwrap_or(0) as isize;
        let next = current + delta;
        if next < 0 || next >= self.dates.len() as isize {
            return None;
        }
        let date = self.dates[next as usize].clone();
        self.select_date(date)
    }

    // ========================================================================
    // INTENTS
    // ========================================================================

    pub fn drag_start(&mut self, id: &str) {
        self.arrangement.drag_start(id);
    }

    pub fn drag_end(&mut self, id: &str, target: Option<DropTarget>) -> Transition {
        self.arrangement.drag_end(id, target)
    }

    pub fn click_move(&mut self, id: &str, now: Instant) -> Transition {
        let transition = self.arrangement.click_move(id);
        if let Some(notice) = self.arrangement.notice() {
            self.flash(notice.message(), now);
            self.arrangement.clear_notice();
        }
        transition
    }

    pub fn reset_all(&mut self) -> Transition {
        self.arrangement.reset_all()
    }

    /// Mark the category of entry `id` as solved
    pub fn mark_solved(&mut self, id: &str) -> bool {
        match self.entry(id).map(|e| e.category.clone()) {
            Some(category) => self.arrangement.mark_category(&category),
            None => false,
        }
    }

    /// Point the user at the official site for verification
    pub fn submit(&mut self, now: Instant) {
        self.flash(&format!("Verify your rows at {}", VERIFY_URL), now);
    }

    // ========================================================================
    // MESSAGES
    // ========================================================================

    pub fn flash(&mut self, message: &str, now: Instant) {
        self.message = Some((message.to_string(), now));
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_ref().map(|(m, _)| m.as_str())
    }

    /// Drop a message once it has been shown for `MESSAGE_TTL`
    pub fn expire_message(&mut self, now: Instant) {
        if let Some((_, shown_at)) = &self.message {
            if now.duration_since(*shown_at) >= MESSAGE_TTL {
                self.message = None;
            }
        }
    }

    // ========================================================================
    // READ-ONLY VIEW
    // ========================================================================

    pub fn arrangement(&self) -> &Arrangement {
        &self.arrangement
    }

    pub fn dates(&self) -> &[PuzzleDate] {
        &self.dates
    }

    pub fn selected_date(&self) -> Option<&PuzzleDate> {
        self.selected.as_ref()
    }

    pub fn loaded_date(&self) -> Option<&PuzzleDate> {
        self.loaded.as_ref()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entry(&self, id: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn palette(&self) -> &CategoryPalette {
        &self.palette
    }

    /// Solved categories in the order they were marked, with their words
    pub fn solved_banners(&self) -> Vec<SolvedBanner> {
        self.arrangement
            .solved_groups()
            .iter()
            .map(|category| SolvedBanner {
                category: category.clone(),
                color: self.palette.color_for(category),
                words: self
                    .entries
                    .iter()
                    .filter(|e| &e.category == category)
                    .map(|e| e.text.clone())
                    .collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Difficulty;

    fn session() -> Session {
        Session::with_rng(StdRng::seed_from_u64(7))
    }

    fn date(s: &str) -> PuzzleDate {
        PuzzleDate::parse(s).unwrap()
    }

    fn entries(prefix: &str) -> Vec<Entry> {
        (0..16)
            .map(|i| {
                Entry::new(
                    format!("{}-{}", i / 4, i % 4),
                    format!("{}{}", prefix, i),
                    format!("{}CAT{}", prefix, i / 4),
                    Difficulty::from_rank(i / 4),
                )
            })
            .collect()
    }

    fn requested_date(request: &FetchRequest) -> Option<PuzzleDate> {
        match request {
            FetchRequest::Puzzle { date, .. } => date.clone(),
            FetchRequest::Dates => panic!("expected a puzzle request"),
        }
    }

    /// Successful server answer to `request`
    fn answer(request: &FetchRequest, entries: Vec<Entry>) -> FetchResult {
        match request.clone() {
            FetchRequest::Puzzle { ticket, date } => FetchResult::Puzzle { ticket, date, result: Ok(entries) },
            FetchRequest::Dates => panic!("expected a puzzle request"),
        }
    }

    fn loaded_session() -> Session {
        let mut s = session();
        let applied = s.apply(FetchResult::Dates(Ok(vec![date("2026-02-13"), date("2026-02-12")])));
        let request = applied.follow_up.unwrap();
        assert_eq!(requested_date(&request), Some(date("2026-02-13")));
        assert!(s.apply(answer(&request, entries("A"))).reloaded);
        s
    }

    #[test]
    fn test_start_fetches_dates_then_latest_puzzle() {
        let s = loaded_session();
        assert_eq!(s.start(), FetchRequest::Dates);
        assert_eq!(s.selected_date(), Some(&date("2026-02-13")));
        assert_eq!(s.loaded_date(), Some(&date("2026-02-13")));
        assert_eq!(s.arrangement().pool().len(), 16);
    }

    #[test]
    fn test_empty_date_list_falls_back_to_latest() {
        let mut s = session();
        let request = s.apply(FetchResult::Dates(Ok(vec![]))).follow_up.unwrap();
        assert_eq!(requested_date(&request), None);

        s.apply(answer(&request, entries("A")));
        assert_eq!(s.entries().len(), 16);
        assert_eq!(s.loaded_date(), None);
    }

    #[test]
    fn test_failed_dates_fetch_falls_back_to_latest() {
        let mut s = session();
        let request = s.apply(FetchResult::Dates(Err("connection refused".into()))).follow_up.unwrap();
        assert_eq!(requested_date(&request), None);
    }

    #[test]
    fn test_failed_puzzle_fetch_keeps_state() {
        let mut s = loaded_session();
        let id = s.arrangement().pool()[0].clone();
        s.drag_end(&id, Some(DropTarget::Slot(0)));
        let before = s.arrangement().clone();

        let request = s.select_date(date("2026-02-12")).unwrap();
        let applied = s.apply(request.failed("404"));

        assert_eq!(applied, Applied::default());
        assert_eq!(s.arrangement(), &before);
        assert_eq!(s.loaded_date(), Some(&date("2026-02-13")));
    }

    #[test]
    fn test_stale_puzzle_result_is_ignored() {
        let mut s = loaded_session();
        let first = s.select_date(date("2026-02-12")).unwrap();
        let second = s.select_date(date("2026-02-13")).unwrap();

        // A late answer for a request the user already moved away from
        assert!(!s.apply(answer(&first, entries("STALE"))).reloaded);
        assert_eq!(s.entries()[0].text, "A0");

        assert!(s.apply(answer(&second, entries("B"))).reloaded);
        assert_eq!(s.entries()[0].text, "B0");
        assert_eq!(s.loaded_date(), Some(&date("2026-02-13")));
    }

    #[test]
    fn test_duplicate_response_keeps_placements() {
        let mut s = loaded_session();
        let older = s.older_date().unwrap();
        let newer = s.newer_date().unwrap();
        assert_eq!(requested_date(&newer), Some(date("2026-02-13")));

        assert!(s.apply(answer(&newer, entries("A"))).reloaded);
        let id = s.arrangement().pool()[0].clone();
        s.drag_end(&id, Some(DropTarget::Slot(0)));

        // The same answer again, then the superseded one
        assert!(!s.apply(answer(&newer, entries("A"))).reloaded);
        assert!(!s.apply(answer(&older, entries("B"))).reloaded);

        assert_eq!(s.arrangement().slot(0), Some(id.as_str()));
        assert_eq!(s.arrangement().placed_count(), 1);
    }

    #[test]
    fn test_new_puzzle_reinitializes_board() {
        let mut s = loaded_session();
        let id = s.arrangement().pool()[0].clone();
        s.click_move(&id, Instant::now());
        s.mark_solved(&id);

        let request = s.select_date(date("2026-02-12")).unwrap();
        assert!(s.apply(answer(&request, entries("B"))).reloaded);

        assert_eq!(s.arrangement().placed_count(), 0);
        assert!(s.arrangement().solved_groups().is_empty());
    }

    #[test]
    fn test_date_stepping() {
        let mut s = loaded_session();
        assert_eq!(s.newer_date(), None);
        let older = s.older_date().unwrap();
        assert_eq!(requested_date(&older), Some(date("2026-02-12")));
        assert_eq!(s.older_date(), None);
        assert_eq!(s.select_date(date("2026-02-12")), None);
    }

    #[test]
    fn test_grid_full_message_expires() {
        let mut s = session();
        let mut all = entries("A");
        all.push(Entry::new("4-0", "EXTRA", "EXTRA", Difficulty::Unknown));
        let request = s.apply(FetchResult::Dates(Ok(vec![]))).follow_up.unwrap();
        s.apply(answer(&request, all.clone()));

        let start = Instant::now();
        for e in all.iter().take(16) {
            s.click_move(&e.id, start);
        }
        assert_eq!(s.click_move("4-0", start), Transition::GridFull);
        assert_eq!(s.message(), Some("Grid is full!"));
        assert_eq!(s.arrangement().notice(), None);

        s.expire_message(start + Duration::from_millis(100));
        assert!(s.message().is_some());
        s.expire_message(start + MESSAGE_TTL);
        assert!(s.message().is_none());
    }

    #[test]
    fn test_solved_banners() {
        let mut s = loaded_session();
        assert!(s.mark_solved("1-2"));
        assert!(!s.mark_solved("1-0"));
        assert!(!s.mark_solved("nope"));

        let banners = s.solved_banners();
        assert_eq!(banners.len(), 1);
        assert_eq!(banners[0].category, "ACAT1");
        assert_eq!(banners[0].color, GroupColor::Green);
        assert_eq!(banners[0].words, vec!["A4", "A5", "A6", "A7"]);
    }

    #[test]
    fn test_reset_keeps_solved_groups() {
        let mut s = loaded_session();
        let id = s.arrangement().pool()[0].clone();
        s.click_move(&id, Instant::now());
        s.mark_solved(&id);

        assert_eq!(s.reset_all(), Transition::Moved);
        assert_eq!(s.arrangement().placed_count(), 0);
        assert_eq!(s.arrangement().solved_groups().len(), 1);
    }

    #[test]
    fn test_submit_points_to_official_site() {
        let mut s = session();
        s.submit(Instant::now());
        assert!(s.message().unwrap().contains(VERIFY_URL));
    }
}
