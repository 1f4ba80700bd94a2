//! # SunTheme
//!
//! Switches an editor's colour scheme and window theme between a day and a
//! night pair at local sunrise and sunset.
//!
//! ## Architecture
//!
//! - **geo**: observer position, the sunrise/sunset solver, and timezone resolution
//! - **time_state**: day/night classification with an optional collar
//! - **config**: loading, validation, and default generation
//! - **settings**: key/value settings stores (TOML file or in-memory)
//! - **theme**: theme pairs and writing them to the editor preferences
//! - **switcher**: the periodic check that ties the above together
//! - **scheduler** / **time_source**: injectable timer and clock
//! - **lock** / **signals** / **args**: process plumbing for the binary
//! - **logger**: structured logging with visual formatting

pub mod args;
pub mod config;
pub mod constants;
pub mod geo;
pub mod lock;
pub mod logger;
pub mod scheduler;
pub mod settings;
pub mod signals;
pub mod switcher;
pub mod theme;
pub mod time_source;
pub mod time_state;
pub mod utils;

// Re-export important types for easier access
pub use config::Config;
pub use geo::{GeoPosition, SolarEvents, ZenithKind, ZoneSpec, compute_events};
pub use logger::{Log, LogLevel};
pub use switcher::SwitcherService;
pub use time_state::{ClassifierConfig, TimeState, classify, is_night};
