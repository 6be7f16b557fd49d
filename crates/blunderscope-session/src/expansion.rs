//! Collapsed/expanded view state for the nested results view.
//!
//! Purely presentational: derived from user clicks, rendered against the
//! result cache, and reset whenever a new result set arrives.

use std::collections::HashSet;

/// Toggle state per expandable list item.
#[derive(Debug, Clone, Default)]
pub struct ExpansionState {
    /// Expanded blunder categories, by breakdown index.
    categories: HashSet<usize>,
    /// Expanded games, by game number.
    games: HashSet<u32>,
    /// Whether the hero stat's example list is expanded.
    hero_examples: bool,
}

impl ExpansionState {
    /// Creates a fully collapsed state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggles one category; returns the new expanded state.
    pub fn toggle_category(&mut self, index: usize) -> bool {
        if !self.categories.remove(&index) {
            self.categories.insert(index);
            return true;
        }
        false
    }

    /// Returns true when the category is expanded.
    pub fn is_category_expanded(&self, index: usize) -> bool {
        self.categories.contains(&index)
    }

    /// Toggles one game; returns the new expanded state.
    pub fn toggle_game(&mut self, game_number: u32) -> bool {
        if !self.games.remove(&game_number) {
            self.games.insert(game_number);
            return true;
        }
        false
    }

    /// Returns true when the game is expanded.
    pub fn is_game_expanded(&self, game_number: u32) -> bool {
        self.games.contains(&game_number)
    }

    /// Toggles the hero stat's example list; returns the new state.
    pub fn toggle_hero_examples(&mut self) -> bool {
        self.hero_examples = !self.hero_examples;
        self.hero_examples
    }

    /// Returns true when the hero example list is expanded.
    pub fn hero_examples_expanded(&self) -> bool {
        self.hero_examples
    }

    /// Collapses everything, e.g. when a new result set arrives.
    pub fn collapse_all(&mut self) {
        self.categories.clear();
        self.games.clear();
        self.hero_examples = false;
    }
}
