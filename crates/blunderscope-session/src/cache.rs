//! Cache of the most recent completed result set.
//!
//! Serves the lazy UI expansion lookups without re-fetching: a category's
//! occurrence list, a game's blunder sub-list, and the severity-sorted
//! display order. Replaced wholesale on each completed session; owned by
//! the controller and read-only to everything else.

use std::collections::HashMap;

use blunderscope_models::{BlunderOccurrence, HeroStat, ResultSet};

const NO_OCCURRENCES: &[BlunderOccurrence] = &[];

/// Holds the most recent completed result set plus lookup indexes.
#[derive(Debug, Default)]
pub struct ResultCache {
    inner: Option<CachedResultSet>,
}

#[derive(Debug)]
struct CachedResultSet {
    results: ResultSet,
    /// game_number -> index into `games_with_blunders`.
    game_index: HashMap<u32, usize>,
    /// Category indices sorted by severity score descending.
    severity_order: Vec<usize>,
}

impl ResultCache {
    /// Replaces the cached result set and rebuilds the lookup indexes.
    pub fn replace(&mut self, results: ResultSet) {
        let game_index = results
            .games_with_blunders
            .iter()
            .enumerate()
            .map(|(idx, game)| (game.game_number, idx))
            .collect();
        let severity_order = results.categories_by_severity();

        self.inner = Some(CachedResultSet {
            results,
            game_index,
            severity_order,
        });
    }

    /// Drops the cached result set.
    pub fn clear(&mut self) {
        self.inner = None;
    }

    /// Returns true when no result set is cached.
    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    /// The cached result set, if any.
    pub fn results(&self) -> Option<&ResultSet> {
        self.inner.as_ref().map(|c| &c.results)
    }

    /// The hero stat of the cached result set, if present.
    pub fn hero_stat(&self) -> Option<&HeroStat> {
        self.results().and_then(|r| r.hero_stat.as_ref())
    }

    /// Full occurrence list for one blunder category, by breakdown index.
    ///
    /// Out-of-range or absent data yields an empty list, never an error.
    pub fn category_occurrences(&self, index: usize) -> &[BlunderOccurrence] {
        self.results()
            .and_then(|r| r.blunder_breakdown.get(index))
            .map(|c| c.occurrences.as_slice())
            .unwrap_or(NO_OCCURRENCES)
    }

    /// Blunder sub-list for one game.
    ///
    /// An unknown game and a game with zero blunders both yield an empty
    /// list; the distinction is a documented don't-care.
    pub fn game_blunders(&self, game_number: u32) -> &[BlunderOccurrence] {
        let Some(cached) = &self.inner else {
            return NO_OCCURRENCES;
        };
        cached
            .game_index
            .get(&game_number)
            .and_then(|&idx| cached.results.games_with_blunders.get(idx))
            .map(|g| g.blunders.as_slice())
            .unwrap_or(NO_OCCURRENCES)
    }

    /// Category indices in severity-descending display order.
    pub fn categories_by_severity(&self) -> &[usize] {
        self.inner
            .as_ref()
            .map(|c| c.severity_order.as_slice())
            .unwrap_or(&[])
    }
}
