//! Core data models for Blunderscope.
//!
//! This crate provides the fundamental data types used throughout the
//! Blunderscope client: session identity and lifecycle, analysis settings,
//! progress events, and the completed result set.

pub mod ids;
pub mod progress;
pub mod results;
pub mod settings;

// Re-export main types
pub use ids::SessionId;
pub use progress::{LogEntry, ProgressEvent, Session, SessionStatus, TerminalStatus};
pub use results::{
    BlunderCategory, BlunderOccurrence, GameInfo, GameReport, HeroStat, ResultSet,
};
pub use settings::{
    AnalysisDepth, AnalysisSettings, GameType, RatingFilter, ResultFilter, SettingsPatch,
    ValidationReport,
};
