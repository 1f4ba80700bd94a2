//! Day/night classification against a day's solar events.
//!
//! Everything here is a pure function of its inputs. The caller decides what
//! to do when the classification changes (see `switcher`).
//!
//! ## Key Functionality
//! - **Classification**: `is_night` compares full timestamps, so a collar may
//!   cross midnight and "now" may be in a different offset from the events
//! - **Overrides**: `classify` applies force-night, then force-day
//! - **Update Logic**: `should_update_state` reports whether the theme needs touching
//! - **Standardized Messaging**: state announcement strings for the log

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_COLLAR_MINUTES, DEFAULT_FORCE_DAY, DEFAULT_FORCE_NIGHT};
use crate::geo::SolarEvents;
use crate::logger::Log;

/// Whether it is currently day or night.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeState {
    Day,
    Night,
}

impl TimeState {
    pub fn is_night(self) -> bool {
        self == TimeState::Night
    }
}

/// Inputs to `classify` besides the events and the clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierConfig {
    /// Minutes of extra daytime before sunrise and after sunset.
    pub collar_minutes: f64,
    pub force_day: bool,
    /// Wins over `force_day`.
    pub force_night: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            collar_minutes: DEFAULT_COLLAR_MINUTES,
            force_day: DEFAULT_FORCE_DAY,
            force_night: DEFAULT_FORCE_NIGHT,
        }
    }
}

/// Convert fractional collar minutes to a duration, at millisecond precision.
pub fn collar_duration(collar_minutes: f64) -> Duration {
    Duration::milliseconds((collar_minutes * 60_000.0).round() as i64)
}

/// True iff `now` is before `sunrise - collar` or after `sunset + collar`.
///
/// The exact sunrise and sunset instants count as day.
pub fn is_night<Tz: TimeZone>(events: &SolarEvents, now: &DateTime<Tz>, collar_minutes: f64) -> bool {
    let collar = collar_duration(collar_minutes);
    let now = now.with_timezone(&Utc);
    let dawn = (events.sunrise() - collar).with_timezone(&Utc);
    let dusk = (events.sunset() + collar).with_timezone(&Utc);
    now < dawn || now > dusk
}

/// Classify `now`, honouring the force switches before the solar events.
pub fn classify<Tz: TimeZone>(
    events: &SolarEvents,
    now: &DateTime<Tz>,
    config: &ClassifierConfig,
) -> TimeState {
    if config.force_night {
        return TimeState::Night;
    }
    if config.force_day {
        return TimeState::Day;
    }
    if is_night(events, now, config.collar_minutes) {
        TimeState::Night
    } else {
        TimeState::Day
    }
}

/// The next collar-adjusted boundary after `now` on the same day, if any.
///
/// Returns `None` once the evening boundary has passed; the following
/// boundary belongs to tomorrow's events.
pub fn next_boundary<Tz: TimeZone>(
    events: &SolarEvents,
    now: &DateTime<Tz>,
    collar_minutes: f64,
) -> Option<DateTime<FixedOffset>> {
    let collar = collar_duration(collar_minutes);
    let now = now.with_timezone(&Utc);
    let dawn = events.sunrise() - collar;
    let dusk = events.sunset() + collar;
    if now < dawn.with_timezone(&Utc) {
        Some(dawn)
    } else if now <= dusk.with_timezone(&Utc) {
        Some(dusk)
    } else {
        None
    }
}

/// Decide whether the theme must be (re)applied.
///
/// The first classification always applies; after that only a change does.
pub fn should_update_state(previous: Option<TimeState>, next: TimeState) -> bool {
    match previous {
        None => {
            Log::log_block_start(get_stable_state_message(next));
            true
        }
        Some(prev) if prev != next => {
            Log::log_block_start(&format!("State changed from {:?} to {:?}", prev, next));
            Log::log_decorated(get_stable_state_message(next));
            true
        }
        Some(_) => false,
    }
}

pub fn get_stable_state_message(state: TimeState) -> &'static str {
    match state {
        TimeState::Day => "Entering day mode 󰖨 ",
        TimeState::Night => "Entering night mode  ",
    }
}
