//! The terminal payload of a completed session.
//!
//! Wire names accept both the server's snake_case keys and the legacy
//! camelCase keys via serde aliases.

use serde::{Deserialize, Serialize};

/// Result payload of a completed analysis session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Number of games the engine examined.
    #[serde(default, alias = "gamesAnalyzed")]
    pub games_analyzed: u32,

    /// Total blunders found across all games.
    #[serde(default, alias = "totalBlunders")]
    pub total_blunders: u32,

    /// The single highest-severity blunder category, absent when no
    /// blunders were found.
    #[serde(default, alias = "heroStat", skip_serializing_if = "Option::is_none")]
    pub hero_stat: Option<HeroStat>,

    /// Blunder categories in server order. Consumers sort by severity for
    /// display; the underlying sequence is preserved for indexed lookup.
    #[serde(default, alias = "blunderBreakdown")]
    pub blunder_breakdown: Vec<BlunderCategory>,

    /// Games in server order, each with its own blunder sub-list, keyed by
    /// a `game_number` unique within the result set.
    #[serde(default, alias = "gamesWithBlunders")]
    pub games_with_blunders: Vec<GameReport>,
}

impl ResultSet {
    /// Category indices sorted by severity score descending.
    ///
    /// A derived view only; `blunder_breakdown` itself is never reordered.
    pub fn categories_by_severity(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.blunder_breakdown.len()).collect();
        indices.sort_by(|&a, &b| {
            self.blunder_breakdown[b]
                .severity_score
                .total_cmp(&self.blunder_breakdown[a].severity_score)
        });
        indices
    }

    /// Game numbers referenced by occurrences but missing from
    /// `games_with_blunders`.
    ///
    /// Empty for a well-formed result set; the two sequences are independent
    /// views over the same blunder events.
    pub fn unknown_game_references(&self) -> Vec<u32> {
        let known: std::collections::HashSet<u32> = self
            .games_with_blunders
            .iter()
            .map(|g| g.game_number)
            .collect();

        let mut missing: Vec<u32> = self
            .blunder_breakdown
            .iter()
            .flat_map(|c| c.occurrences.iter())
            .map(|o| o.game_number)
            .filter(|n| !known.contains(n))
            .collect();
        missing.sort_unstable();
        missing.dedup();
        missing
    }
}

/// The single most severe blunder category, highlighted distinctly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroStat {
    /// Category name.
    pub category: String,

    /// Precomputed severity weighting, opaque to the client.
    #[serde(alias = "severityScore")]
    pub severity_score: f64,

    /// Human-readable description of the category.
    pub description: String,

    /// Up to 3 example occurrences.
    #[serde(default)]
    pub examples: Vec<BlunderOccurrence>,
}

/// One blunder category with its full occurrence list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlunderCategory {
    /// Category name.
    pub category: String,

    /// How many times this category occurred.
    pub frequency: u32,

    /// Average win-probability impact, in percent.
    #[serde(alias = "averageImpact")]
    pub average_impact: f64,

    /// Precomputed severity weighting, opaque to the client.
    #[serde(alias = "severityScore")]
    pub severity_score: f64,

    /// Every occurrence of this category, in server order.
    #[serde(default)]
    pub occurrences: Vec<BlunderOccurrence>,
}

/// A single flagged suboptimal move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlunderOccurrence {
    /// Which game this move belongs to; references an entry in
    /// `games_with_blunders`.
    #[serde(alias = "gameNumber")]
    pub game_number: u32,

    /// Move number within the game.
    #[serde(alias = "moveNumber")]
    pub move_number: u32,

    /// Win-probability drop caused by the move, in percent.
    #[serde(alias = "probabilityDrop")]
    pub probability_drop: f64,

    /// What went wrong.
    pub description: String,

    /// Suggested better move, when the engine has one.
    #[serde(default, alias = "bestMove", skip_serializing_if = "Option::is_none")]
    pub best_move: Option<String>,

    /// Metadata of the source game.
    #[serde(default, alias = "gameInfo", skip_serializing_if = "Option::is_none")]
    pub game_info: Option<GameInfo>,
}

/// One analyzed game with its blunder sub-list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameReport {
    /// Unique within the result set.
    #[serde(alias = "gameNumber")]
    pub game_number: u32,

    /// Metadata of the source game.
    #[serde(default, alias = "gameInfo", skip_serializing_if = "Option::is_none")]
    pub game_info: Option<GameInfo>,

    /// Blunders found in this game, in move order.
    #[serde(default)]
    pub blunders: Vec<BlunderOccurrence>,
}

/// Source-game metadata attached to reports and occurrences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameInfo {
    /// White player's username.
    pub white: String,

    /// Black player's username.
    pub black: String,

    /// Game result string, e.g. "1-0".
    pub result: String,

    /// Link to the game, when the source site provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}
