//! Sunrise and sunset solver.
//!
//! Computes the local sunrise and sunset instants for the calendar day of a
//! timezone-aware instant, a position, and a twilight definition (`ZenithKind`).
//! The hour angle of the event is found by fixed-point iteration over a
//! low-precision solar ephemeris referenced to the year 2000.0; the result is
//! accurate to a couple of minutes between the polar circles.
//!
//! The iteration is capped at `SOLVER_MAX_ITERATIONS` rounds. If it has not
//! settled by then the last estimate is returned as is: near the latitude limit
//! this is an approximation, not a failure.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use super::GeoPosition;
use crate::constants::{
    SOLVER_MAX_ITERATIONS, SOLVER_TOLERANCE, ZENITH_AMATEUR_DEGREES, ZENITH_ASTRONOMICAL_DEGREES,
    ZENITH_CIVIL_DEGREES, ZENITH_NAUTICAL_DEGREES, ZENITH_OFFICIAL_DEGREES,
};

const TWO_PI: f64 = 2.0 * PI;
const MICROS_PER_HOUR: f64 = 3_600_000_000.0;
const MICROS_PER_DAY: i64 = 86_400_000_000;

/// Invalid input to the solver. Fatal to that computation; callers fall back
/// to override times or skip switching.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SolarError {
    LatitudeOutOfRange(f64),
    LongitudeOutOfRange(f64),
    UnknownZenith(String),
    /// The instant parsed but carried no UTC offset.
    MissingOffset(String),
    UnparseableInstant(String),
    InvalidLocalTime,
}

impl fmt::Display for SolarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolarError::LatitudeOutOfRange(lat) => write!(
                f,
                "Invalid latitude: {}. Must be between -63 and 63 degrees",
                lat
            ),
            SolarError::LongitudeOutOfRange(lon) => write!(
                f,
                "Invalid longitude: {}. Must be between -180 and 180 degrees",
                lon
            ),
            SolarError::UnknownZenith(name) => write!(
                f,
                "Invalid zenith name [{}] must be one of: {}",
                name,
                ZenithKind::ALL.map(|z| z.name()).join(", ")
            ),
            SolarError::MissingOffset(input) => write!(
                f,
                "Instant '{}' has no UTC offset; append one such as +00:00 or -04:00",
                input
            ),
            SolarError::UnparseableInstant(input) => write!(
                f,
                "Could not parse '{}' as an RFC 3339 instant (e.g. 2020-06-21T12:00:00-04:00)",
                input
            ),
            SolarError::InvalidLocalTime => {
                write!(f, "Computed time of day does not exist on the requested date")
            }
        }
    }
}

impl std::error::Error for SolarError {}

/// Solar altitude that counts as "risen" or "set".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZenithKind {
    Official,
    Civil,
    Nautical,
    Amateur,
    Astronomical,
}

impl ZenithKind {
    pub const ALL: [ZenithKind; 5] = [
        ZenithKind::Official,
        ZenithKind::Civil,
        ZenithKind::Nautical,
        ZenithKind::Amateur,
        ZenithKind::Astronomical,
    ];

    /// Altitude of the sun's centre in degrees (negative is below the horizon).
    pub fn altitude_degrees(self) -> f64 {
        match self {
            ZenithKind::Official => ZENITH_OFFICIAL_DEGREES,
            ZenithKind::Civil => ZENITH_CIVIL_DEGREES,
            ZenithKind::Nautical => ZENITH_NAUTICAL_DEGREES,
            ZenithKind::Amateur => ZENITH_AMATEUR_DEGREES,
            ZenithKind::Astronomical => ZENITH_ASTRONOMICAL_DEGREES,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ZenithKind::Official => "official",
            ZenithKind::Civil => "civil",
            ZenithKind::Nautical => "nautical",
            ZenithKind::Amateur => "amateur",
            ZenithKind::Astronomical => "astronomical",
        }
    }
}

impl FromStr for ZenithKind {
    type Err = SolarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ZenithKind::ALL
            .into_iter()
            .find(|z| z.name() == s)
            .ok_or_else(|| SolarError::UnknownZenith(s.to_string()))
    }
}

impl fmt::Display for ZenithKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sunrise and sunset for one calendar day, in the offset of the input instant.
///
/// Both instants carry the input's calendar date. With a large UTC offset the
/// time of day wraps, so sunset may read earlier than sunrise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolarEvents {
    sunrise: DateTime<FixedOffset>,
    sunset: DateTime<FixedOffset>,
}

impl SolarEvents {
    pub fn new(sunrise: DateTime<FixedOffset>, sunset: DateTime<FixedOffset>) -> Self {
        Self { sunrise, sunset }
    }

    pub fn sunrise(&self) -> DateTime<FixedOffset> {
        self.sunrise
    }

    pub fn sunset(&self) -> DateTime<FixedOffset> {
        self.sunset
    }

    pub fn day_length(&self) -> chrono::Duration {
        self.sunset - self.sunrise
    }
}

#[derive(Debug, Clone, Copy)]
enum Event {
    Sunrise,
    Sunset,
}

impl Event {
    fn direction(self) -> f64 {
        match self {
            Event::Sunrise => 1.0,
            Event::Sunset => -1.0,
        }
    }
}

/// Wrap an angle in radians into `[0, 2π)`.
pub fn reduce_to_range(value: f64) -> f64 {
    let turns = value / TWO_PI;
    let mut reduced = TWO_PI * (turns - turns.trunc());
    if reduced < 0.0 {
        reduced += TWO_PI;
    }
    // A tiny negative remainder rounds up to exactly 2π.
    if reduced >= TWO_PI { 0.0 } else { reduced }
}

/// Days from 2000-01-01 12:00 UT to 00:00 UT on `date`.
pub fn epoch_day(date: NaiveDate) -> f64 {
    let y = i64::from(date.year());
    let m = i64::from(date.month());
    let d = i64::from(date.day());
    let whole = 367 * y - (7 * (y + (m + 9).div_euclid(12))).div_euclid(4)
        + (275 * m).div_euclid(9)
        + d;
    whole as f64 - 730_531.5
}

/// Universal time of the event as an angle in `[0, 2π)`.
fn solve_universal_time(
    epoch_day: f64,
    position: GeoPosition,
    zenith: ZenithKind,
    event: Event,
) -> f64 {
    let sin_altitude = zenith.altitude_degrees().to_radians().sin();
    let (sin_phi, cos_phi) = position.latitude().to_radians().sin_cos();
    let longitude = position.longitude().to_radians();
    let direction = event.direction();

    // The π seed only forces the first pass; refinement starts from 0.
    let mut previous = PI;
    let mut estimate = 0.0_f64;
    let mut rounds = 0;

    while (previous - estimate).abs() > SOLVER_TOLERANCE && rounds < SOLVER_MAX_ITERATIONS {
        rounds += 1;
        previous = estimate;

        let centuries = (epoch_day + previous / TWO_PI) / 36_525.0;

        // Orbital elements of the sun
        let mean_longitude = reduce_to_range(4.894_950_420_143_3 + 628.331_969_753_199 * centuries);
        let mean_anomaly = reduce_to_range(6.240_040_8 + 628.301_950_1 * centuries);
        let centre = 0.033_423 * mean_anomaly.sin() + 0.000_349_07 * (2.0 * mean_anomaly).sin();
        let ecliptic_longitude = mean_longitude + centre;
        let equation_of_time = -centre + 0.043_039_8 * (2.0 * ecliptic_longitude).sin()
            - 0.000_925_02 * (4.0 * ecliptic_longitude).sin();
        let obliquity = 0.409_093 - 0.000_226_9 * centuries;

        let sin_declination = obliquity.sin() * ecliptic_longitude.sin();
        let declination =
            sin_declination.atan2((1.0 - sin_declination * sin_declination).sqrt());

        let greenwich_hour_angle = previous - PI + equation_of_time;
        let cos_correction =
            (sin_altitude - sin_phi * declination.sin()) / (cos_phi * declination.cos());

        let correction = if cos_correction > 1.0 {
            // Sun never climbs to this altitude today
            0.0
        } else if cos_correction < -1.0 {
            // Sun never drops to this altitude today
            PI
        } else {
            (1.0 - cos_correction * cos_correction)
                .sqrt()
                .atan2(cos_correction)
        };

        estimate = reduce_to_range(
            previous - (greenwich_hour_angle + longitude + direction * correction),
        );
    }

    estimate
}

/// Put the universal time `ut` (radians) onto `date` as local wall-clock time.
fn splice_local_time(
    date: NaiveDate,
    ut: f64,
    offset: FixedOffset,
) -> Result<DateTime<FixedOffset>, SolarError> {
    let offset_hours = f64::from(offset.local_minus_utc()) / 3600.0;
    let mut hours = ut.to_degrees() / 15.0 + offset_hours;
    if hours < 0.0 {
        hours += 24.0;
    } else if hours >= 24.0 {
        hours -= 24.0;
    }

    // Rounding to the microsecond may reach midnight; keep it inside the day.
    let micros = ((hours * MICROS_PER_HOUR).round() as i64).clamp(0, MICROS_PER_DAY - 1);
    let seconds = u32::try_from(micros / 1_000_000).map_err(|_| SolarError::InvalidLocalTime)?;
    let nanos =
        u32::try_from((micros % 1_000_000) * 1_000).map_err(|_| SolarError::InvalidLocalTime)?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds, nanos)
        .ok_or(SolarError::InvalidLocalTime)?;

    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .ok_or(SolarError::InvalidLocalTime)
}

/// Compute sunrise and sunset for the calendar day of `local_now`.
///
/// The UTC offset in effect at `local_now` is applied to both events, so a
/// named zone contributes whatever offset it has at that instant.
pub fn compute_events<Tz: TimeZone>(
    local_now: &DateTime<Tz>,
    position: GeoPosition,
    zenith: ZenithKind,
) -> Result<SolarEvents, SolarError> {
    let offset = local_now.offset().fix();
    let date = local_now.date_naive();
    let day = epoch_day(date);

    let sunrise_ut = solve_universal_time(day, position, zenith, Event::Sunrise);
    let sunset_ut = solve_universal_time(day, position, zenith, Event::Sunset);

    Ok(SolarEvents::new(
        splice_local_time(date, sunrise_ut, offset)?,
        splice_local_time(date, sunset_ut, offset)?,
    ))
}

/// Validate raw inputs, then compute sunrise and sunset.
pub fn compute_events_for(
    local_now: &DateTime<FixedOffset>,
    latitude: f64,
    longitude: f64,
    zenith: &str,
) -> Result<SolarEvents, SolarError> {
    let zenith = zenith.parse::<ZenithKind>()?;
    let position = GeoPosition::new(latitude, longitude)?;
    compute_events(local_now, position, zenith)
}

/// Parse an instant that must carry its own UTC offset.
///
/// Accepts RFC 3339 (`2020-06-21T05:00:00-04:00`) and the space-separated
/// variant. A well-formed date-time without an offset is rejected with
/// `MissingOffset` rather than being assumed to be UTC.
pub fn parse_local_instant(input: &str) -> Result<DateTime<FixedOffset>, SolarError> {
    let trimmed = input.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(instant);
    }
    if let Ok(instant) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%:z") {
        return Ok(instant);
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    if NAIVE_FORMATS
        .iter()
        .any(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).is_ok())
    {
        return Err(SolarError::MissingOffset(trimmed.to_string()));
    }

    Err(SolarError::UnparseableInstant(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::test_constants::*;
    use chrono::{Duration, Timelike};

    fn local(y: i32, m: u32, d: u32, hours_offset: i32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(hours_offset * 3600)
            .unwrap()
            .with_ymd_and_hms(y, m, d, 12, 0, 0)
            .unwrap()
    }

    fn hms(time: DateTime<FixedOffset>) -> NaiveTime {
        time.time()
    }

    fn assert_close(actual: NaiveTime, expected: NaiveTime, tolerance_secs: i64) {
        let diff = (actual - expected).num_seconds().abs();
        assert!(
            diff <= tolerance_secs,
            "expected {} within {}s, got {}",
            expected,
            tolerance_secs,
            actual
        );
    }

    #[test]
    fn test_reduce_to_range_known_values() {
        assert_eq!(reduce_to_range(0.0), 0.0);
        assert!((reduce_to_range(-PI / 2.0) - 1.5 * PI).abs() < 1e-12);
        assert!((reduce_to_range(5.0 * PI) - PI).abs() < 1e-12);
        assert!(reduce_to_range(TWO_PI) < 1e-12);
        assert!((reduce_to_range(-7.0 * PI) - PI).abs() < 1e-9);
    }

    #[test]
    fn test_reduce_to_range_tiny_negative_stays_below_two_pi() {
        let reduced = reduce_to_range(-1e-20);
        assert!((0.0..TWO_PI).contains(&reduced));
    }

    #[test]
    fn test_epoch_day_reference_dates() {
        assert_eq!(epoch_day(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()), -0.5);
        assert_eq!(epoch_day(NaiveDate::from_ymd_opt(2000, 1, 2).unwrap()), 0.5);
        assert_eq!(
            epoch_day(NaiveDate::from_ymd_opt(2020, 6, 21).unwrap()),
            7476.5
        );
        // Leap day then the following day differ by exactly one
        let leap = epoch_day(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        let next = epoch_day(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(next - leap, 1.0);
    }

    #[test]
    fn test_zenith_names_parse() {
        for name in ["official", "civil", "nautical", "amateur", "astronomical"] {
            let zenith: ZenithKind = name.parse().unwrap();
            assert_eq!(zenith.name(), name);
        }
        assert_eq!(
            "twilight".parse::<ZenithKind>(),
            Err(SolarError::UnknownZenith("twilight".to_string()))
        );
        assert!("Official".parse::<ZenithKind>().is_err());
    }

    #[test]
    fn test_zenith_altitudes() {
        assert_eq!(ZenithKind::Official.altitude_degrees(), -0.833);
        assert_eq!(ZenithKind::Civil.altitude_degrees(), -6.0);
        assert_eq!(ZenithKind::Nautical.altitude_degrees(), -12.0);
        assert_eq!(ZenithKind::Amateur.altitude_degrees(), -15.0);
        assert_eq!(ZenithKind::Astronomical.altitude_degrees(), -18.0);
    }

    #[test]
    fn test_new_york_summer_solstice() {
        let now = local(2020, 6, 21, NYC_SUMMER_OFFSET_HOURS);
        let position = GeoPosition::new(NYC_LATITUDE, NYC_LONGITUDE).unwrap();
        let events = compute_events(&now, position, ZenithKind::Official).unwrap();

        assert!(events.sunrise().hour() < 6);
        assert!(events.sunset().hour() >= 19);
        assert_close(
            hms(events.sunrise()),
            NaiveTime::from_hms_opt(5, 25, 8).unwrap(),
            60,
        );
        assert_close(
            hms(events.sunset()),
            NaiveTime::from_hms_opt(20, 30, 34).unwrap(),
            60,
        );
        assert_eq!(events.sunrise().date_naive(), now.date_naive());
        assert_eq!(events.sunset().offset(), now.offset());
        assert!(events.day_length() > Duration::hours(15));
    }

    #[test]
    fn test_twilight_kinds_widen_the_day() {
        let now = local(2020, 6, 21, NYC_SUMMER_OFFSET_HOURS);
        let position = GeoPosition::new(NYC_LATITUDE, NYC_LONGITUDE).unwrap();
        let official = compute_events(&now, position, ZenithKind::Official).unwrap();
        let civil = compute_events(&now, position, ZenithKind::Civil).unwrap();
        let astronomical = compute_events(&now, position, ZenithKind::Astronomical).unwrap();

        assert!(civil.sunrise() < official.sunrise());
        assert!(civil.sunset() > official.sunset());
        assert!(astronomical.sunrise() < civil.sunrise());
        assert_close(
            hms(astronomical.sunrise()),
            NaiveTime::from_hms_opt(3, 18, 41).unwrap(),
            60,
        );
    }

    #[test]
    fn test_equator_equinox_is_roughly_twelve_hours() {
        let now = local(2024, 3, 20, 0);
        let position = GeoPosition::new(0.0, 0.0).unwrap();
        let events = compute_events(&now, position, ZenithKind::Official).unwrap();
        assert_close(hms(events.sunrise()), NaiveTime::from_hms_opt(6, 4, 4).unwrap(), 60);
        assert_close(hms(events.sunset()), NaiveTime::from_hms_opt(18, 10, 35).unwrap(), 60);
    }

    #[test]
    fn test_southern_hemisphere_summer() {
        let now = local(2021, 1, 15, 11);
        let position = GeoPosition::new(-33.87, 151.21).unwrap();
        let events = compute_events(&now, position, ZenithKind::Official).unwrap();
        assert_close(hms(events.sunrise()), NaiveTime::from_hms_opt(6, 0, 40).unwrap(), 60);
        assert_close(hms(events.sunset()), NaiveTime::from_hms_opt(20, 8, 57).unwrap(), 60);
    }

    #[test]
    fn test_latitude_limit_still_solves() {
        let position = GeoPosition::new(63.0, 10.0).unwrap();
        let winter = compute_events(&local(2020, 12, 21, 1), position, ZenithKind::Official)
            .unwrap();
        assert!(winter.sunrise() < winter.sunset());
        assert!(winter.day_length() < Duration::hours(5));

        let summer = compute_events(&local(2020, 6, 21, 2), position, ZenithKind::Official)
            .unwrap();
        assert!(summer.day_length() > Duration::hours(20));
    }

    #[test]
    fn test_utc_offset_wraps_time_of_day() {
        // At UTC the New York sunset falls after midnight and wraps onto the same date
        let now = local(2020, 6, 21, 0);
        let position = GeoPosition::new(NYC_LATITUDE, NYC_LONGITUDE).unwrap();
        let events = compute_events(&now, position, ZenithKind::Official).unwrap();
        assert_eq!(events.sunset().date_naive(), now.date_naive());
        assert_eq!(events.sunset().hour(), 0);
        assert!(events.sunset() < events.sunrise());
    }

    #[test]
    fn test_named_zone_uses_offset_at_instant() {
        let zone: chrono_tz::Tz = "America/New_York".parse().unwrap();
        let named = zone.with_ymd_and_hms(2020, 6, 21, 12, 0, 0).unwrap();
        let fixed = local(2020, 6, 21, NYC_SUMMER_OFFSET_HOURS);
        let position = GeoPosition::new(NYC_LATITUDE, NYC_LONGITUDE).unwrap();
        assert_eq!(
            compute_events(&named, position, ZenithKind::Official).unwrap(),
            compute_events(&fixed, position, ZenithKind::Official).unwrap()
        );
    }

    #[test]
    fn test_compute_events_for_rejects_bad_input() {
        let now = local(2020, 6, 21, 0);
        assert_eq!(
            compute_events_for(&now, 64.0, 0.0, "official"),
            Err(SolarError::LatitudeOutOfRange(64.0))
        );
        assert_eq!(
            compute_events_for(&now, -64.0, 0.0, "official"),
            Err(SolarError::LatitudeOutOfRange(-64.0))
        );
        assert!(compute_events_for(&now, 63.0, 0.0, "official").is_ok());
        assert_eq!(
            compute_events_for(&now, 40.0, 0.0, "dusk"),
            Err(SolarError::UnknownZenith("dusk".to_string()))
        );
        for zenith in ZenithKind::ALL {
            assert!(compute_events_for(&now, 40.0, 0.0, zenith.name()).is_ok());
        }
    }

    #[test]
    fn test_parse_local_instant() {
        let parsed = parse_local_instant("2020-06-21T05:00:00-04:00").unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), -4 * 3600);
        assert_eq!(parsed.hour(), 5);

        assert!(parse_local_instant("2020-06-21 05:00:00+02:00").is_ok());

        assert!(matches!(
            parse_local_instant("2020-06-21T05:00:00"),
            Err(SolarError::MissingOffset(_))
        ));
        assert!(matches!(
            parse_local_instant("2020-06-21 05:00"),
            Err(SolarError::MissingOffset(_))
        ));
        assert!(matches!(
            parse_local_instant("tomorrow"),
            Err(SolarError::UnparseableInstant(_))
        ));
    }

    #[test]
    fn test_error_messages_name_the_problem() {
        assert!(SolarError::LatitudeOutOfRange(70.0).to_string().contains("70"));
        let zenith = SolarError::UnknownZenith("dusk".into()).to_string();
        assert!(zenith.contains("dusk"));
        assert!(zenith.contains("astronomical"));
    }
}
