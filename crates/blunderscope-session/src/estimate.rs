//! Remaining-time estimate.
//!
//! Advisory UI sugar derived purely from the settings and the latest
//! percentage; it never blocks or alters the real completion signal.

use blunderscope_models::AnalysisSettings;

/// Assumed average moves per game.
pub const AVERAGE_MOVES_PER_GAME: f64 = 40.0;

/// Cap on the fixed fetch overhead, in seconds.
const MAX_FETCH_OVERHEAD_SECONDS: f64 = 15.0;

/// Total expected duration of a run with these settings, in seconds.
pub fn total_estimate_seconds(settings: &AnalysisSettings) -> f64 {
    let games = f64::from(settings.game_count);
    let analysis = games * AVERAGE_MOVES_PER_GAME * settings.analysis_depth.per_move_seconds();
    let fetch_overhead = (games * 0.5).min(MAX_FETCH_OVERHEAD_SECONDS);
    analysis + fetch_overhead
}

/// Seconds left given the latest displayed percentage, floored at 0.
pub fn remaining_seconds(settings: &AnalysisSettings, percentage: f64) -> f64 {
    let fraction_left = 1.0 - percentage / 100.0;
    (total_estimate_seconds(settings) * fraction_left).max(0.0)
}
