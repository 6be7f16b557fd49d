//! Analysis settings and their validation.
//!
//! Settings are snapshotted into the session when analysis starts; the live
//! copy is owned by the `SettingsStore` in the session crate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Game speed categories the analysis can be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    Bullet,
    Blitz,
    Rapid,
    Classical,
    Correspondence,
}

/// Rated/casual filter for fetched games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RatingFilter {
    /// Both rated and casual games.
    #[default]
    Any,
    /// Rated games only.
    Rated,
    /// Casual games only.
    Casual,
}

/// Game outcome filter for fetched games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResultFilter {
    /// All outcomes.
    #[default]
    Any,
    Wins,
    Losses,
    Draws,
}

/// How deeply the engine examines each move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisDepth {
    Fast,
    #[default]
    Balanced,
    Deep,
}

impl AnalysisDepth {
    /// Estimated engine seconds spent per move at this depth.
    ///
    /// Feeds the advisory remaining-time estimate only.
    pub fn per_move_seconds(self) -> f64 {
        match self {
            AnalysisDepth::Fast => 0.05,
            AnalysisDepth::Balanced => 0.08,
            AnalysisDepth::Deep => 0.15,
        }
    }
}

/// User-chosen parameters for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Account whose games are analyzed.
    pub username: String,

    /// Number of recent games to fetch.
    pub game_count: u32,

    /// Game speed categories to include. Must not be empty.
    pub game_types: Vec<GameType>,

    /// Rated/casual filter.
    #[serde(default)]
    pub rating_filter: RatingFilter,

    /// Outcome filter.
    #[serde(default)]
    pub game_result: ResultFilter,

    /// Win-probability drop (percent) above which a move counts as a blunder.
    pub blunder_threshold: f64,

    /// Engine depth preset.
    #[serde(default)]
    pub analysis_depth: AnalysisDepth,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            username: String::new(),
            game_count: 20,
            game_types: vec![GameType::Blitz, GameType::Rapid],
            rating_filter: RatingFilter::Any,
            game_result: ResultFilter::Any,
            blunder_threshold: 10.0,
            analysis_depth: AnalysisDepth::Balanced,
        }
    }
}

impl AnalysisSettings {
    /// Checks the settings against the pre-flight rules.
    ///
    /// Returns one message per failed rule, keyed by field name. An invalid
    /// report blocks submission; no network call is made.
    pub fn validate(&self) -> ValidationReport {
        let mut errors = BTreeMap::new();

        if self.username.trim().is_empty() {
            errors.insert("username".to_string(), "Username is required".to_string());
        }
        if self.game_types.is_empty() {
            errors.insert(
                "game_types".to_string(),
                "Select at least one game type".to_string(),
            );
        }

        ValidationReport {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// Applies a partial update, leaving unset fields untouched.
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(username) = patch.username {
            self.username = username;
        }
        if let Some(game_count) = patch.game_count {
            self.game_count = game_count;
        }
        if let Some(game_types) = patch.game_types {
            self.game_types = game_types;
        }
        if let Some(rating_filter) = patch.rating_filter {
            self.rating_filter = rating_filter;
        }
        if let Some(game_result) = patch.game_result {
            self.game_result = game_result;
        }
        if let Some(blunder_threshold) = patch.blunder_threshold {
            self.blunder_threshold = blunder_threshold;
        }
        if let Some(analysis_depth) = patch.analysis_depth {
            self.analysis_depth = analysis_depth;
        }
    }
}

/// Partial update for [`AnalysisSettings`].
///
/// Every field is optional; `None` means "leave as is".
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub username: Option<String>,
    pub game_count: Option<u32>,
    pub game_types: Option<Vec<GameType>>,
    pub rating_filter: Option<RatingFilter>,
    pub game_result: Option<ResultFilter>,
    pub blunder_threshold: Option<f64>,
    pub analysis_depth: Option<AnalysisDepth>,
}

impl SettingsPatch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the game count.
    pub fn with_game_count(mut self, count: u32) -> Self {
        self.game_count = Some(count);
        self
    }

    /// Sets the game types.
    pub fn with_game_types(mut self, types: Vec<GameType>) -> Self {
        self.game_types = Some(types);
        self
    }

    /// Sets the blunder threshold.
    pub fn with_blunder_threshold(mut self, threshold: f64) -> Self {
        self.blunder_threshold = Some(threshold);
        self
    }

    /// Sets the analysis depth.
    pub fn with_analysis_depth(mut self, depth: AnalysisDepth) -> Self {
        self.analysis_depth = Some(depth);
        self
    }
}

/// Outcome of a settings-validation query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// True when every rule passed.
    pub is_valid: bool,
    /// One message per failed rule, keyed by field name.
    pub errors: BTreeMap<String, String>,
}

impl ValidationReport {
    /// Returns the message for one field, if that field failed.
    pub fn error_for(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }
}
