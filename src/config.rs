//! Configuration loading, validation, and default generation.
//!
//! Settings are read key by key through a `SettingsProvider`, deserialized
//! into an all-optional `RawConfig`, then turned into a validated `Config`
//! with defaults applied. Anything malformed fails fast with an error that
//! names the offending key: the switcher never runs on a half-understood
//! configuration.
//!
//! The default location is `$XDG_CONFIG_HOME/suntheme/suntheme.toml`. When no
//! file exists there, `Config::load` writes a commented one.

use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use toml::{Table, Value};

use crate::constants::*;
use crate::geo::{GeoPosition, TimezoneSetting, ZenithKind, ZoneSpec, resolve_offset};
use crate::logger::Log;
use crate::settings::{SettingsProvider, TomlSettings};
use crate::theme::{ThemeChoice, ThemePair};
use crate::time_state::ClassifierConfig;
use crate::utils::{format_clock_time, parse_clock_time, path_for_display};

/// Every key the configuration understands.
const KNOWN_KEYS: [&str; 16] = [
    KEY_CHECK_CYCLE,
    KEY_TIMEZONE,
    KEY_OVERRIDE_TIMES,
    KEY_OVERRIDE_SUNRISE,
    KEY_OVERRIDE_SUNSET,
    KEY_LATITUDE,
    KEY_LONGITUDE,
    KEY_ZENITH,
    KEY_COLLAR_MINUTES,
    KEY_FORCE_NIGHT,
    KEY_FORCE_DAY,
    KEY_NIGHT_COLOUR_SCHEME,
    KEY_NIGHT_WINDOW_THEME,
    KEY_DAY_COLOUR_SCHEME,
    KEY_DAY_WINDOW_THEME,
    KEY_PREFERENCES_PATH,
];

/// Settings exactly as found, before defaults and validation.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    check_cycle: Option<f64>,
    timezone: Option<TimezoneSetting>,
    override_times: Option<bool>,
    override_sunrise_time: Option<String>,
    override_sunset_time: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    zenith: Option<ZenithKind>,
    collar_minutes: Option<f64>,
    force_night: Option<bool>,
    force_day: Option<bool>,
    night_colour_scheme: Option<String>,
    night_window_theme: Option<String>,
    day_colour_scheme: Option<String>,
    day_window_theme: Option<String>,
    preferences_path: Option<PathBuf>,
}

/// Operator-supplied sunrise and sunset clock times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverrideTimes {
    pub sunrise: NaiveTime,
    pub sunset: NaiveTime,
}

/// Validated configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub check_cycle: Duration,
    pub zone: ZoneSpec,
    /// Use `overrides` instead of the solver.
    pub override_times: bool,
    /// Present whenever both override times are configured, even if unused,
    /// so they can stand in for a failed solar computation.
    pub overrides: Option<OverrideTimes>,
    pub position: Option<GeoPosition>,
    pub zenith: ZenithKind,
    pub classifier: ClassifierConfig,
    pub themes: ThemePair,
    pub preferences_path: Option<PathBuf>,
}

/// Parse an optional `HH:MM` override, naming the key on failure.
fn parse_override(key: &str, value: Option<&str>) -> Result<Option<NaiveTime>> {
    match value {
        None => Ok(None),
        Some(text) => parse_clock_time(text).map(Some).with_context(|| {
            format!(
                "Invalid {} '{}': expected a 24-hour HH:MM time such as 06:30",
                key, text
            )
        }),
    }
}

impl Config {
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Where the editor preferences live: `preferencesPath`, or next to the config.
    pub fn get_preferences_path(&self) -> Result<PathBuf> {
        match &self.preferences_path {
            Some(path) => Ok(path.clone()),
            None => {
                let config_dir =
                    dirs::config_dir().context("Could not determine config directory")?;
                Ok(config_dir.join(APP_DIR_NAME).join(PREFERENCES_FILE_NAME))
            }
        }
    }

    /// Build a validated configuration from any settings source.
    pub fn from_settings(settings: &dyn SettingsProvider) -> Result<Self> {
        let mut table = Table::new();
        for key in KNOWN_KEYS {
            if let Some(value) = settings.get(key) {
                table.insert(key.to_string(), value);
            }
        }

        let raw: RawConfig = Value::Table(table)
            .try_into()
            .context("Invalid setting value")?;

        let config = Self::from_raw(raw)?;
        validate_config(&config)?;
        Ok(config)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        let override_times = raw.override_times.unwrap_or(DEFAULT_OVERRIDE_TIMES);

        let sunrise = parse_override(KEY_OVERRIDE_SUNRISE, raw.override_sunrise_time.as_deref())?;
        let sunset = parse_override(KEY_OVERRIDE_SUNSET, raw.override_sunset_time.as_deref())?;
        let overrides = match (sunrise, sunset) {
            (Some(sunrise), Some(sunset)) => Some(OverrideTimes { sunrise, sunset }),
            _ if override_times => anyhow::bail!(
                "{} is true but {} and {} are not both set.\n\
                 Provide both as HH:MM, or set {} = false to use latitude and longitude.",
                KEY_OVERRIDE_TIMES,
                KEY_OVERRIDE_SUNRISE,
                KEY_OVERRIDE_SUNSET,
                KEY_OVERRIDE_TIMES
            ),
            _ => None,
        };

        let position = match (raw.latitude, raw.longitude) {
            (Some(lat), Some(lon)) => Some(
                GeoPosition::new(lat, lon)
                    .map_err(anyhow::Error::new)
                    .context("Invalid coordinates")?,
            ),
            (None, None) if override_times => None,
            (None, None) => anyhow::bail!(
                "{} and {} are required unless {} is true",
                KEY_LATITUDE,
                KEY_LONGITUDE,
                KEY_OVERRIDE_TIMES
            ),
            (Some(_), None) => anyhow::bail!("{} is set but {} is missing", KEY_LATITUDE, KEY_LONGITUDE),
            (None, Some(_)) => anyhow::bail!("{} is set but {} is missing", KEY_LONGITUDE, KEY_LATITUDE),
        };

        let timezone = raw.timezone.with_context(|| {
            format!(
                "{} is required: a numeric UTC offset such as -4, or a timezone name such as America/New_York",
                KEY_TIMEZONE
            )
        })?;
        let zone = resolve_offset(&timezone, position)
            .map_err(anyhow::Error::new)
            .with_context(|| format!("Could not resolve {}", KEY_TIMEZONE))?;

        let check_cycle_secs = raw.check_cycle.unwrap_or(DEFAULT_CHECK_CYCLE_SECS);
        if !check_cycle_secs.is_finite()
            || !(MINIMUM_CHECK_CYCLE_SECS..=MAXIMUM_CHECK_CYCLE_SECS).contains(&check_cycle_secs)
        {
            anyhow::bail!(
                "{} ({}) must be between {} and {} seconds",
                KEY_CHECK_CYCLE,
                check_cycle_secs,
                MINIMUM_CHECK_CYCLE_SECS,
                MAXIMUM_CHECK_CYCLE_SECS
            );
        }

        Ok(Self {
            check_cycle: Duration::from_secs_f64(check_cycle_secs),
            zone,
            override_times,
            overrides,
            position,
            zenith: raw.zenith.unwrap_or(ZenithKind::Official),
            classifier: ClassifierConfig {
                collar_minutes: raw.collar_minutes.unwrap_or(DEFAULT_COLLAR_MINUTES),
                force_day: raw.force_day.unwrap_or(DEFAULT_FORCE_DAY),
                force_night: raw.force_night.unwrap_or(DEFAULT_FORCE_NIGHT),
            },
            themes: ThemePair {
                day: ThemeChoice::new(raw.day_colour_scheme, raw.day_window_theme),
                night: ThemeChoice::new(raw.night_colour_scheme, raw.night_window_theme),
            },
            preferences_path: raw.preferences_path,
        })
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "Configuration file not found at specified path: {}",
                path.display()
            );
        }
        let settings = TomlSettings::load(path)?;
        Self::from_settings(&settings)
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Load from the default location, creating a default file if needed.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)
                .context("Failed to create default config during load")?;
            Log::log_decorated(&format!(
                "Created default configuration at {}",
                path_for_display(&config_path)
            ));
        }

        Self::load_from_path(&config_path).with_context(|| {
            Log::log_pipe();
            format!(
                "SunTheme is improperly configured; see {}",
                config_path.display()
            )
        })
    }

    /// Write a commented default configuration.
    ///
    /// The timezone is written as the machine's current UTC offset so the
    /// generated file is explicit about it. Override times are on, so the
    /// file works before any coordinates are filled in.
    pub fn create_default_config(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let local_offset_hours =
            f64::from(chrono::Local::now().offset().local_minus_utc()) / 3600.0;

        let config_content = ConfigBuilder::new()
            .add_section("SunTheme configuration")
            .add_setting(
                KEY_CHECK_CYCLE,
                &format!("{}", DEFAULT_CHECK_CYCLE_SECS),
                "Seconds between day/night checks",
            )
            .add_setting(
                KEY_TIMEZONE,
                &format!("{}", local_offset_hours),
                "UTC offset in hours, \"+05:30\", an IANA name, or \"auto\"",
            )
            .add_section("Location")
            .add_comment(&format!("{} = 40.7128", KEY_LATITUDE))
            .add_comment(&format!("{} = -74.0060", KEY_LONGITUDE))
            .add_setting(
                KEY_ZENITH,
                &format!("\"{}\"", DEFAULT_ZENITH),
                "official, civil, nautical, amateur or astronomical",
            )
            .add_setting(
                KEY_COLLAR_MINUTES,
                &format!("{}", DEFAULT_COLLAR_MINUTES),
                "Extra daytime before sunrise and after sunset",
            )
            .add_section("Fixed times")
            .add_setting(
                KEY_OVERRIDE_TIMES,
                "true",
                "Set false once latitude and longitude are filled in",
            )
            .add_setting(
                KEY_OVERRIDE_SUNRISE,
                &format!("\"{}\"", DEFAULT_OVERRIDE_SUNRISE),
                "HH:MM",
            )
            .add_setting(
                KEY_OVERRIDE_SUNSET,
                &format!("\"{}\"", DEFAULT_OVERRIDE_SUNSET),
                "HH:MM",
            )
            .add_section("Overrides")
            .add_setting(KEY_FORCE_NIGHT, &DEFAULT_FORCE_NIGHT.to_string(), "Always use the night theme")
            .add_setting(KEY_FORCE_DAY, &DEFAULT_FORCE_DAY.to_string(), "Always use the day theme")
            .add_section("Themes")
            .add_setting(KEY_DAY_COLOUR_SCHEME, "\"\"", "Empty leaves the current scheme alone")
            .add_setting(KEY_DAY_WINDOW_THEME, "\"\"", "Empty leaves the current theme alone")
            .add_setting(KEY_NIGHT_COLOUR_SCHEME, "\"\"", "")
            .add_setting(KEY_NIGHT_WINDOW_THEME, "\"\"", "")
            .build();

        fs::write(path, config_content)
            .with_context(|| format!("Failed to write default config to {}", path.display()))?;
        Ok(())
    }

    pub fn log_config(&self, source: &Path) {
        Log::log_block_start(&format!(
            "Loaded configuration from {}",
            path_for_display(source)
        ));
        Log::log_indented(&format!("Timezone: {}", self.zone));
        Log::log_indented(&format!(
            "Check cycle: {} seconds",
            self.check_cycle.as_secs_f64()
        ));

        match (&self.overrides, self.override_times) {
            (Some(times), true) => {
                Log::log_indented(&format!(
                    "Fixed times: sunrise {}, sunset {}",
                    format_clock_time(&times.sunrise),
                    format_clock_time(&times.sunset)
                ));
            }
            _ => {
                if let Some(position) = &self.position {
                    Log::log_indented(&format!("Location: {}", position));
                }
                Log::log_indented(&format!("Zenith: {}", self.zenith));
            }
        }

        if self.classifier.collar_minutes > 0.0 {
            Log::log_indented(&format!(
                "Collar: {} minutes",
                self.classifier.collar_minutes
            ));
        }
        if self.classifier.force_night {
            Log::log_indented("Forcing night theme");
        } else if self.classifier.force_day {
            Log::log_indented("Forcing day theme");
        }

        for (label, choice) in [("Day", &self.themes.day), ("Night", &self.themes.night)] {
            Log::log_indented(&format!(
                "{} scheme: {}, theme: {}",
                label,
                choice.colour_scheme.as_deref().unwrap_or("(unchanged)"),
                choice.window_theme.as_deref().unwrap_or("(unchanged)")
            ));
        }
    }
}

/// Range checks that apply after defaults are filled in.
pub fn validate_config(config: &Config) -> Result<()> {
    let collar = config.classifier.collar_minutes;
    if !collar.is_finite() || !(MINIMUM_COLLAR_MINUTES..=MAXIMUM_COLLAR_MINUTES).contains(&collar) {
        anyhow::bail!(
            "{} ({}) must be between {} and {} minutes",
            KEY_COLLAR_MINUTES,
            collar,
            MINIMUM_COLLAR_MINUTES,
            MAXIMUM_COLLAR_MINUTES
        );
    }

    if let Some(times) = &config.overrides {
        if times.sunrise >= times.sunset {
            anyhow::bail!(
                "{} ({}) must be earlier than {} ({})",
                KEY_OVERRIDE_SUNRISE,
                format_clock_time(&times.sunrise),
                KEY_OVERRIDE_SUNSET,
                format_clock_time(&times.sunset)
            );
        }
    }

    if config.classifier.force_day && config.classifier.force_night {
        Log::log_warning(&format!(
            "Both {} and {} are set; {} takes priority",
            KEY_FORCE_DAY, KEY_FORCE_NIGHT, KEY_FORCE_NIGHT
        ));
    }

    if config.themes.day.is_empty() && config.themes.night.is_empty() {
        Log::log_warning("No day or night themes configured; nothing will be switched");
    }

    Ok(())
}

/// Builder for creating dynamically-aligned configuration files.
///
/// Trailing comments line up one column past the longest setting line.
struct ConfigBuilder {
    entries: Vec<EntryType>,
}

enum EntryType {
    Section(String),
    Comment(String),
    Setting { line: String, comment: String },
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_section(mut self, title: &str) -> Self {
        self.entries.push(EntryType::Section(format!("#[{}]", title)));
        self
    }

    fn add_comment(mut self, text: &str) -> Self {
        self.entries.push(EntryType::Comment(format!("# {}", text)));
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(EntryType::Setting {
            line: format!("{} = {}", key, value),
            comment: if comment.is_empty() {
                String::new()
            } else {
                format!("# {}", comment)
            },
        });
        self
    }

    fn build(self) -> String {
        let max_width = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                EntryType::Setting { line, .. } => Some(line.len()),
                _ => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let mut result = Vec::new();
        let mut first_section = true;

        for entry in self.entries {
            match entry {
                EntryType::Section(title) => {
                    if !first_section {
                        result.push(String::new());
                    }
                    result.push(title);
                    first_section = false;
                }
                EntryType::Comment(text) => result.push(text),
                EntryType::Setting { line, comment } if comment.is_empty() => result.push(line),
                EntryType::Setting { line, comment } => {
                    let padding = " ".repeat(max_width - line.len());
                    result.push(format!("{}{}{}", line, padding, comment));
                }
            }
        }

        result.push(String::new());
        result.join("\n")
    }
}
