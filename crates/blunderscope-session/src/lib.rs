//! Analysis-session orchestration for Blunderscope.
//!
//! This crate owns the client-side lifecycle of a chess blunder-analysis
//! run: validating settings, submitting the job, keeping a progress channel
//! open while the remote engine works, and serving the completed results to
//! the UI layer.
//!
//! The [`AnalysisSessionController`] is the single entry point. It enforces
//! one live session at a time, reconciles progress events into session
//! state in arrival order, and broadcasts [`SessionUpdate`]s for the UI to
//! render from.
//!
//! # Example
//!
//! ```ignore
//! use blunderscope_session::{AnalysisSessionController, ControllerConfig, SessionUpdate};
//! use blunderscope_models::{AnalysisSettings, GameType};
//! use url::Url;
//!
//! let config = ControllerConfig::new(Url::parse("http://localhost:8080/")?);
//! let controller = AnalysisSessionController::new(config);
//!
//! let mut updates = controller.subscribe();
//! controller
//!     .start(AnalysisSettings {
//!         username: "magnus_fan".to_string(),
//!         game_types: vec![GameType::Blitz],
//!         ..Default::default()
//!     })
//!     .await?;
//!
//! while let Ok(update) = updates.recv().await {
//!     if let SessionUpdate::ResultsVisible { .. } = update {
//!         break;
//!     }
//! }
//! ```

pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod estimate;
pub mod event;
pub mod expansion;
pub mod store;
pub mod submit;

pub use cache::ResultCache;
pub use config::ControllerConfig;
pub use controller::AnalysisSessionController;
pub use error::{Result, SessionError};
pub use event::SessionUpdate;
pub use expansion::ExpansionState;
pub use store::SettingsStore;
pub use submit::{HttpJobSubmitter, JobSubmitter};
