// Category colors as plain data: a lookup table with an explicit default

use crate::model::{Difficulty, Entry};
use std::collections::HashMap;

/// Banner color of a solved group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupColor {
    Yellow,
    Green,
    Blue,
    Purple,
}

impl GroupColor {
    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        match difficulty {
            Difficulty::Easy => GroupColor::Yellow,
            Difficulty::Medium => GroupColor::Green,
            Difficulty::Hard => GroupColor::Blue,
            Difficulty::Tricky | Difficulty::Unknown => GroupColor::Purple,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryPalette {
    colors: HashMap<String, GroupColor>,
    default: GroupColor,
}

impl Default for CategoryPalette {
    fn default() -> Self {
        CategoryPalette {
            colors: HashMap::new(),
            default: GroupColor::Purple,
        }
    }
}

impl CategoryPalette {
    /// Table keyed by each entry's category, colored by its difficulty
    pub fn from_entries(entries: &[Entry]) -> Self {
        let colors = entries
            .iter()
            .map(|e| (e.category.clone(), GroupColor::for_difficulty(e.difficulty)))
            .collect();

        CategoryPalette {
            colors,
            ..Self::default()
        }
    }

    pub fn color_for(&self, category: &str) -> GroupColor {
        self.colors.get(category).copied().unwrap_or(self.default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colors_follow_difficulty() {
        let entries = vec![
            Entry::new("0-0", "PURE", "DOWNRIGHT", Difficulty::Easy),
            Entry::new("1-0", "FLAG", "PENNANT", Difficulty::Medium),
            Entry::new("2-0", "CAMEL", "CIGARETTE BRANDS", Difficulty::Hard),
            Entry::new("3-0", "SYNC", "HOMOPHONES", Difficulty::Tricky),
        ];
        let palette = CategoryPalette::from_entries(&entries);

        assert_eq!(palette.color_for("DOWNRIGHT"), GroupColor::Yellow);
        assert_eq!(palette.color_for("PENNANT"), GroupColor::Green);
        assert_eq!(palette.color_for("CIGARETTE BRANDS"), GroupColor::Blue);
        assert_eq!(palette.color_for("HOMOPHONES"), GroupColor::Purple);
    }

    #[test]
    fn test_unknown_category_uses_default() {
        let entries = vec![Entry::new("0-0", "PURE", "DOWNRIGHT", Difficulty::Easy)];
        let palette = CategoryPalette::from_entries(&entries);
        assert_eq!(palette.color_for("NOT A CATEGORY"), GroupColor::Purple);
        assert_eq!(CategoryPalette::default().color_for("x"), GroupColor::Purple);
    }
}
