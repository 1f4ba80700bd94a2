//! Applying colour schemes and window themes.
//!
//! `ThemeApplier` is the outward-facing seam: the switcher only ever asks for
//! the current values and sets new ones. `PreferencesThemeApplier` stores them
//! under the `color_scheme` and `theme` keys of an editor preferences table.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use toml::Value;

use crate::constants::{PREF_COLOR_SCHEME, PREF_THEME};
use crate::logger::Log;
use crate::settings::{SettingsProvider, TomlSettings};
use crate::time_state::TimeState;
use crate::utils::path_for_display;

/// Scheme and theme to use for one state. `None` leaves that value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemeChoice {
    pub colour_scheme: Option<String>,
    pub window_theme: Option<String>,
}

impl ThemeChoice {
    /// Empty strings are treated as unset.
    pub fn new(colour_scheme: Option<String>, window_theme: Option<String>) -> Self {
        Self {
            colour_scheme: colour_scheme.filter(|s| !s.trim().is_empty()),
            window_theme: window_theme.filter(|s| !s.trim().is_empty()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.colour_scheme.is_none() && self.window_theme.is_none()
    }
}

/// Day and night theme choices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemePair {
    pub day: ThemeChoice,
    pub night: ThemeChoice,
}

impl ThemePair {
    pub fn for_state(&self, state: TimeState) -> &ThemeChoice {
        match state {
            TimeState::Day => &self.day,
            TimeState::Night => &self.night,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait ThemeApplier: Send + Sync {
    fn current_color_scheme(&self) -> Option<String>;
    fn current_window_theme(&self) -> Option<String>;
    fn set_color_scheme(&self, name: &str) -> Result<()>;
    fn set_window_theme(&self, name: &str) -> Result<()>;
}

/// Which values `apply_theme` actually wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedChanges {
    pub colour_scheme: bool,
    pub window_theme: bool,
}

impl AppliedChanges {
    pub fn any(&self) -> bool {
        self.colour_scheme || self.window_theme
    }
}

/// Write the desired scheme and theme, skipping values that are unset or
/// already active.
pub fn apply_theme(applier: &dyn ThemeApplier, choice: &ThemeChoice) -> Result<AppliedChanges> {
    let mut changes = AppliedChanges::default();

    if let Some(scheme) = choice.colour_scheme.as_deref() {
        if applier.current_color_scheme().as_deref() != Some(scheme) {
            Log::log_decorated(&format!("Switching to new colour scheme: {}", scheme));
            applier.set_color_scheme(scheme)?;
            changes.colour_scheme = true;
        }
    }

    if let Some(theme) = choice.window_theme.as_deref() {
        if applier.current_window_theme().as_deref() != Some(theme) {
            Log::log_decorated(&format!("Switching to new window theme: {}", theme));
            applier.set_window_theme(theme)?;
            changes.window_theme = true;
        }
    }

    Ok(changes)
}

/// Theme applier backed by an editor preferences table.
pub struct PreferencesThemeApplier {
    preferences: Arc<dyn SettingsProvider>,
}

impl PreferencesThemeApplier {
    pub fn new(preferences: Arc<dyn SettingsProvider>) -> Self {
        Self { preferences }
    }

    /// Applier for the editor preferences file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let preferences = TomlSettings::load(path).with_context(|| {
            format!(
                "Failed to read editor preferences at {}",
                path_for_display(path)
            )
        })?;
        Ok(Self::new(Arc::new(preferences)))
    }

    fn read_string(&self, key: &str) -> Option<String> {
        match self.preferences.get(key)? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl ThemeApplier for PreferencesThemeApplier {
    fn current_color_scheme(&self) -> Option<String> {
        self.read_string(PREF_COLOR_SCHEME)
    }

    fn current_window_theme(&self) -> Option<String> {
        self.read_string(PREF_THEME)
    }

    fn set_color_scheme(&self, name: &str) -> Result<()> {
        self.preferences
            .set(PREF_COLOR_SCHEME, Value::String(name.to_string()))
    }

    fn set_window_theme(&self, name: &str) -> Result<()> {
        self.preferences.set(PREF_THEME, Value::String(name.to_string()))
    }
}
