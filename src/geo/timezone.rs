//! Timezone resolution for the `timezone` setting.
//!
//! The setting is resolved once, up front, into a `ZoneSpec`: either a fixed
//! UTC offset or an IANA zone from `chrono-tz`. A value that cannot be resolved
//! is a configuration error; there is no fallback to UTC.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use std::fmt;
use std::sync::OnceLock;

use super::GeoPosition;
use crate::constants::MAXIMUM_UTC_OFFSET_HOURS;

const REMEDIATION: &str = "Use a numeric UTC offset such as -4 or 5.5, a signed offset such as +05:30, \
     an IANA name such as America/New_York, or \"auto\" with latitude and longitude set";

/// Raw `timezone` value as it appears in the settings file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TimezoneSetting {
    Hours(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum TimezoneError {
    Empty,
    Unknown(String),
    OffsetOutOfRange(f64),
    /// `auto` was requested but no position was configured.
    AutoWithoutPosition,
    UndetectableZone { latitude: f64, longitude: f64 },
}

impl fmt::Display for TimezoneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimezoneError::Empty => write!(f, "Timezone setting is empty. {}", REMEDIATION),
            TimezoneError::Unknown(value) => {
                write!(f, "Unknown timezone '{}'. {}", value, REMEDIATION)
            }
            TimezoneError::OffsetOutOfRange(hours) => write!(
                f,
                "UTC offset {} hours is outside ±{} hours. {}",
                hours, MAXIMUM_UTC_OFFSET_HOURS, REMEDIATION
            ),
            TimezoneError::AutoWithoutPosition => write!(
                f,
                "Timezone \"auto\" needs latitude and longitude to be configured. {}",
                REMEDIATION
            ),
            TimezoneError::UndetectableZone {
                latitude,
                longitude,
            } => write!(
                f,
                "Could not determine a timezone for {:.4}, {:.4}. {}",
                latitude, longitude, REMEDIATION
            ),
        }
    }
}

impl std::error::Error for TimezoneError {}

/// A resolved timezone: fixed offset or a zone with its own DST rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoneSpec {
    Fixed(FixedOffset),
    Named(Tz),
}

impl ZoneSpec {
    /// Offset in effect at `instant`.
    pub fn offset_at(&self, instant: DateTime<Utc>) -> FixedOffset {
        match self {
            ZoneSpec::Fixed(offset) => *offset,
            ZoneSpec::Named(tz) => tz.offset_from_utc_datetime(&instant.naive_utc()).fix(),
        }
    }

    /// Express `instant` as local time in this zone.
    pub fn localize(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset_at(instant))
    }

    /// Local wall-clock `time` on `date`.
    ///
    /// Ambiguous times (DST fall-back) take the earlier instant. Times that do
    /// not exist (spring-forward gap) move one hour later.
    pub fn at_local_time(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<FixedOffset>> {
        let naive = date.and_time(time);
        match self {
            ZoneSpec::Fixed(offset) => offset.from_local_datetime(&naive).single(),
            ZoneSpec::Named(tz) => tz
                .from_local_datetime(&naive)
                .earliest()
                .or_else(|| {
                    tz.from_local_datetime(&(naive + chrono::Duration::hours(1)))
                        .earliest()
                })
                .map(|dt| dt.fixed_offset()),
        }
    }
}

impl fmt::Display for ZoneSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneSpec::Fixed(offset) => write!(f, "UTC{}", offset),
            ZoneSpec::Named(tz) => f.write_str(tz.name()),
        }
    }
}

fn fixed_from_hours(hours: f64) -> Result<ZoneSpec, TimezoneError> {
    if !hours.is_finite() || hours.abs() > MAXIMUM_UTC_OFFSET_HOURS {
        return Err(TimezoneError::OffsetOutOfRange(hours));
    }
    let seconds = (hours * 3600.0).round() as i32;
    FixedOffset::east_opt(seconds)
        .map(ZoneSpec::Fixed)
        .ok_or(TimezoneError::OffsetOutOfRange(hours))
}

/// Parse `+05:30`, `-4`, `UTC+9`, `GMT-03:30` style offsets into hours.
fn parse_signed_offset(text: &str) -> Option<f64> {
    use regex::Regex;
    let re = Regex::new(r"^(?i:utc|gmt)?\s*([+-])(\d{1,2})(?::?(\d{2}))?$").ok()?;
    let caps = re.captures(text)?;
    let sign = if &caps[1] == "-" { -1.0 } else { 1.0 };
    let hours: f64 = caps[2].parse().ok()?;
    let minutes: f64 = match caps.get(3) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0.0,
    };
    if minutes >= 60.0 {
        return None;
    }
    Some(sign * (hours + minutes / 60.0))
}

/// Find the IANA zone containing a position.
pub fn detect_zone(position: GeoPosition) -> Result<Tz, TimezoneError> {
    use tzf_rs::DefaultFinder;

    static FINDER: OnceLock<DefaultFinder> = OnceLock::new();
    let finder = FINDER.get_or_init(DefaultFinder::new);

    // tzf-rs takes (longitude, latitude)
    let name = finder.get_tz_name(position.longitude(), position.latitude());
    name.parse::<Tz>()
        .map_err(|_| TimezoneError::UndetectableZone {
            latitude: position.latitude(),
            longitude: position.longitude(),
        })
}

/// Resolve the `timezone` setting once.
///
/// `position` is only consulted for `"auto"`.
pub fn resolve_offset(
    setting: &TimezoneSetting,
    position: Option<GeoPosition>,
) -> Result<ZoneSpec, TimezoneError> {
    let text = match setting {
        TimezoneSetting::Hours(hours) => return fixed_from_hours(*hours),
        TimezoneSetting::Text(text) => text.trim(),
    };

    if text.is_empty() {
        return Err(TimezoneError::Empty);
    }
    if let Ok(hours) = text.parse::<f64>() {
        return fixed_from_hours(hours);
    }
    if let Some(hours) = parse_signed_offset(text) {
        return fixed_from_hours(hours);
    }
    if text.eq_ignore_ascii_case("auto") {
        let position = position.ok_or(TimezoneError::AutoWithoutPosition)?;
        return detect_zone(position).map(ZoneSpec::Named);
    }

    text.parse::<Tz>()
        .map(ZoneSpec::Named)
        .map_err(|_| TimezoneError::Unknown(text.to_string()))
}
