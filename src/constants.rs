//! Application constants and default values for suntheme.
//!
//! This module contains the configuration defaults, validation limits,
//! solver parameters, and setting key names used throughout the application.

// ═══ Application Configuration Defaults ═══
// These values are used when config options are not specified by the user

pub const DEFAULT_CHECK_CYCLE_SECS: f64 = 2.0; // seconds between day/night checks
pub const DEFAULT_COLLAR_MINUTES: f64 = 0.0; // no lead/lag around sunrise and sunset
pub const DEFAULT_ZENITH: &str = "official"; // sun's upper limb on the horizon
pub const DEFAULT_OVERRIDE_TIMES: bool = false;
pub const DEFAULT_OVERRIDE_SUNRISE: &str = "06:00";
pub const DEFAULT_OVERRIDE_SUNSET: &str = "18:00";
pub const DEFAULT_FORCE_DAY: bool = false;
pub const DEFAULT_FORCE_NIGHT: bool = false;

// ═══ Validation Limits ═══
// These limits ensure user inputs are within reasonable and safe ranges

// Latitudes beyond this make the hour-angle iteration unreliable
pub const MAXIMUM_LATITUDE: f64 = 63.0;
pub const MAXIMUM_LONGITUDE: f64 = 180.0;

// Check cycle limits (seconds)
pub const MINIMUM_CHECK_CYCLE_SECS: f64 = 0.1;
pub const MAXIMUM_CHECK_CYCLE_SECS: f64 = 3600.0; // an hour between checks at most

// Collar limits (minutes)
pub const MINIMUM_COLLAR_MINUTES: f64 = 0.0;
pub const MAXIMUM_COLLAR_MINUTES: f64 = 720.0; // half a day either side

// UTC offset limits (hours); real zones span -12..+14
pub const MAXIMUM_UTC_OFFSET_HOURS: f64 = 14.0;

// ═══ Solver Parameters ═══
// Fixed-point iteration bounds for the hour-angle estimate

pub const SOLVER_MAX_ITERATIONS: u32 = 35; // upper bound on refinement rounds
pub const SOLVER_TOLERANCE: f64 = 0.001; // radians between successive estimates

// Solar altitude (degrees) for each twilight definition
pub const ZENITH_OFFICIAL_DEGREES: f64 = -0.833;
pub const ZENITH_CIVIL_DEGREES: f64 = -6.0;
pub const ZENITH_NAUTICAL_DEGREES: f64 = -12.0;
pub const ZENITH_AMATEUR_DEGREES: f64 = -15.0;
pub const ZENITH_ASTRONOMICAL_DEGREES: f64 = -18.0;

// ═══ Setting Keys ═══
// Names used in the settings file

pub const KEY_CHECK_CYCLE: &str = "checkCycle";
pub const KEY_TIMEZONE: &str = "timezone";
pub const KEY_OVERRIDE_TIMES: &str = "overrideTimes";
pub const KEY_OVERRIDE_SUNRISE: &str = "overrideSunriseTime";
pub const KEY_OVERRIDE_SUNSET: &str = "overrideSunsetTime";
pub const KEY_LATITUDE: &str = "latitude";
pub const KEY_LONGITUDE: &str = "longitude";
pub const KEY_ZENITH: &str = "zenith";
pub const KEY_COLLAR_MINUTES: &str = "collarMinutes";
pub const KEY_FORCE_NIGHT: &str = "forceNight";
pub const KEY_FORCE_DAY: &str = "forceDay";
pub const KEY_NIGHT_COLOUR_SCHEME: &str = "nightColourScheme";
pub const KEY_NIGHT_WINDOW_THEME: &str = "nightWindowTheme";
pub const KEY_DAY_COLOUR_SCHEME: &str = "dayColourScheme";
pub const KEY_DAY_WINDOW_THEME: &str = "dayWindowTheme";
pub const KEY_PREFERENCES_PATH: &str = "preferencesPath";

// Keys in the editor preferences file
pub const PREF_COLOR_SCHEME: &str = "color_scheme";
pub const PREF_THEME: &str = "theme";

// ═══ File Locations ═══

pub const APP_DIR_NAME: &str = "suntheme";
pub const CONFIG_FILE_NAME: &str = "suntheme.toml";
pub const PREFERENCES_FILE_NAME: &str = "preferences.toml";
pub const LOCK_FILE_NAME: &str = "suntheme.lock";

// ═══ Operational Timing Constants ═══

pub const SHUTDOWN_POLL_MS: u64 = 100; // main thread wakes this often to check the running flag

// ═══ Exit Codes ═══

pub const EXIT_FAILURE: i32 = 1;
