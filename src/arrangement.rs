// Arrangement State Machine
//
// Client-side model of where each entry sits: the holding pool or one of the
// sixteen grid slots. Every transition keeps the two disjoint and together
// equal to the set of entry ids the arrangement was initialized with.

use crate::model::Entry;
use rand::Rng;

pub const GRID_SIZE: usize = 16;
pub const GRID_COLUMNS: usize = 4;

/// Where a drag gesture ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    Pool,
    Slot(usize),
}

/// Where an entry currently lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Index into the pool's display order
    Pool(usize),
    Slot(usize),
}

/// Transient message for the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    GridFull,
}

impl Notice {
    pub fn message(&self) -> &'static str {
        match self {
            Notice::GridFull => "Grid is full!",
        }
    }
}

/// What a transition did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Moved,
    Unchanged,
    /// Click-move from the pool found no empty slot
    GridFull,
}

/// Unbiased in-place Fisher-Yates shuffle
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arrangement {
    pool: Vec<String>,
    grid: [Option<String>; GRID_SIZE],
    solved_groups: Vec<String>,
    lifted: Option<String>,
    notice: Option<Notice>,
}

impl Default for Arrangement {
    fn default() -> Self {
        Self::new()
    }
}

impl Arrangement {
    /// Empty arrangement with no entries
    pub fn new() -> Self {
        Arrangement {
            pool: Vec::new(),
            grid: std::array::from_fn(|_| None),
            solved_groups: Vec::new(),
            lifted: None,
            notice: None,
        }
    }

    /// Fresh arrangement for a puzzle: all ids shuffled into the pool
    pub fn from_entries<R: Rng + ?Sized>(entries: &[Entry], rng: &mut R) -> Self {
        let mut arrangement = Self::new();
        arrangement.initialize(entries, rng);
        arrangement
    }

    // ========================================================================
    // TRANSITIONS
    // ========================================================================

    /// Start over with a new puzzle. Clears placements, solved groups, and notices.
    pub fn initialize<R: Rng + ?Sized>(&mut self, entries: &[Entry], rng: &mut R) {
        let mut ids: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();
        shuffle(&mut ids, rng);

        self.pool = ids;
        self.grid = std::array::from_fn(|_| None);
        self.solved_groups.clear();
        self.lifted = None;
        self.notice = None;
    }

    /// Record the lifted entry. Placement is untouched.
    pub fn drag_start(&mut self, id: &str) {
        if self.location(id).is_some() {
            self.lifted = Some(id.to_string());
        }
    }

    /// Drop `id` on `target`; `None` means outside any zone and changes nothing.
    pub fn drag_end(&mut self, id: &str, target: Option<DropTarget>) -> Transition {
        self.lifted = None;

        let (Some(target), Some(source)) = (target, self.location(id)) else {
            return Transition::Unchanged;
        };

        match (source, target) {
            (Location::Pool(_), DropTarget::Pool) => Transition::Unchanged,
            (Location::Slot(from), DropTarget::Pool) => {
                self.grid[from] = None;
                self.pool.push(id.to_string());
                Transition::Moved
            }
            (_, DropTarget::Slot(to)) if to >= GRID_SIZE => Transition::Unchanged,
            (Location::Slot(from), DropTarget::Slot(to)) if from == to => Transition::Unchanged,
            (Location::Pool(index), DropTarget::Slot(to)) => {
                let placed = self.pool.remove(index);
                if let Some(displaced) = self.grid[to].replace(placed) {
                    self.pool.push(displaced);
                }
                Transition::Moved
            }
            (Location::Slot(from), DropTarget::Slot(to)) => {
                self.grid.swap(from, to);
                Transition::Moved
            }
        }
    }

    /// Tap/click alternative to dragging: pool -> first empty slot, grid -> pool.
    pub fn click_move(&mut self, id: &str) -> Transition {
        match self.location(id) {
            None => Transition::Unchanged,
            Some(Location::Slot(from)) => {
                self.grid[from] = None;
                self.pool.push(id.to_string());
                Transition::Moved
            }
            Some(Location::Pool(index)) => match self.first_empty_slot() {
                Some(slot) => {
                    let placed = self.pool.remove(index);
                    self.grid[slot] = Some(placed);
                    Transition::Moved
                }
                None => {
                    self.notice = Some(Notice::GridFull);
                    Transition::GridFull
                }
            },
        }
    }

    /// Return every placed entry to the pool in slot order. Solved groups stay.
    pub fn reset_all(&mut self) -> Transition {
        let placed: Vec<String> = self.grid.iter_mut().filter_map(Option::take).collect();
        if placed.is_empty() {
            return Transition::Unchanged;
        }
        self.pool.extend(placed);
        Transition::Moved
    }

    /// Mark a category solved; returns false if it already was
    pub fn mark_category(&mut self, category: &str) -> bool {
        if self.solved_groups.iter().any(|c| c == category) {
            return false;
        }
        self.solved_groups.push(category.to_string());
        true
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn location(&self, id: &str) -> Option<Location> {
        if let Some(slot) = self.grid.iter().position(|s| s.as_deref() == Some(id)) {
            return Some(Location::Slot(slot));
        }
        self.pool.iter().position(|p| p == id).map(Location::Pool)
    }

    pub fn pool(&self) -> &[String] {
        &self.pool
    }

    pub fn grid(&self) -> &[Option<String>; GRID_SIZE] {
        &self.grid
    }

    pub fn slot(&self, index: usize) -> Option<&str> {
        self.grid.get(index).and_then(|s| s.as_deref())
    }

    pub fn first_empty_slot(&self) -> Option<usize> {
        self.grid.iter().position(Option::is_none)
    }

    pub fn is_grid_full(&self) -> bool {
        self.first_empty_slot().is_none()
    }

    pub fn placed_count(&self) -> usize {
        self.grid.iter().filter(|s| s.is_some()).count()
    }

    pub fn solved_groups(&self) -> &[String] {
        &self.solved_groups
    }

    pub fn lifted(&self) -> Option<&str> {
        self.lifted.as_deref()
    }

    pub fn notice(&self) -> Option<Notice> {
        self.notice
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    /// All ids currently held, pool first, then grid in slot order
    pub fn all_ids(&self) -> Vec<&str> {
        self.pool
            .iter()
            .map(String::as_str)
            .chain(self.grid.iter().filter_map(|s| s.as_deref()))
            .collect()
    }
}
