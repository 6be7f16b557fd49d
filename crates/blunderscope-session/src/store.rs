//! Owned holder for the user's analysis settings.

use blunderscope_models::{AnalysisSettings, SettingsPatch, ValidationReport};

/// Holds the live analysis settings between sessions.
///
/// Explicitly constructed and passed to consumers; there is no ambient
/// global copy. Updates are either a partial [`SettingsPatch`] or, for
/// derived-from-previous values, a closure over the current settings.
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    settings: AnalysisSettings,
}

impl SettingsStore {
    /// Creates a store with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with the given settings.
    pub fn with_settings(settings: AnalysisSettings) -> Self {
        Self { settings }
    }

    /// The current settings.
    pub fn current(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// A snapshot of the current settings, e.g. for starting a session.
    pub fn snapshot(&self) -> AnalysisSettings {
        self.settings.clone()
    }

    /// Applies a partial update.
    pub fn update(&mut self, patch: SettingsPatch) {
        self.settings.apply(patch);
    }

    /// Replaces the settings with a value derived from the previous ones.
    pub fn update_with<F>(&mut self, f: F)
    where
        F: FnOnce(&AnalysisSettings) -> AnalysisSettings,
    {
        self.settings = f(&self.settings);
    }

    /// Validates the current settings.
    pub fn validate(&self) -> ValidationReport {
        self.settings.validate()
    }
}
