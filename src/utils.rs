//! Utility functions shared across the codebase.
//!
//! Clock-time parsing and formatting, and path display helpers.

use chrono::{NaiveTime, Timelike};
use std::path::Path;

/// Parse a literal `HH:MM` clock time with no date component.
///
/// Surrounding whitespace is ignored. Seconds are not accepted.
///
/// # Examples
/// ```
/// use suntheme::utils::parse_clock_time;
/// use chrono::NaiveTime;
/// assert_eq!(parse_clock_time("06:30"), Some(NaiveTime::from_hms_opt(6, 30, 0).unwrap()));
/// assert_eq!(parse_clock_time("25:00"), None);
/// assert_eq!(parse_clock_time("6:30pm"), None);
/// ```
pub fn parse_clock_time(value: &str) -> Option<NaiveTime> {
    let trimmed = value.trim();
    let (hours, minutes) = trimmed.split_once(':')?;
    if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return None;
    }
    if !hours.bytes().chain(minutes.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveTime::from_hms_opt(hours.parse().ok()?, minutes.parse().ok()?, 0)
}

/// Format a time of day as `HH:MM`, truncating seconds.
pub fn format_clock_time<T: Timelike>(time: &T) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}

/// Replace the home directory prefix with `~` for display.
///
/// # Examples
/// ```
/// use suntheme::utils::path_for_display;
/// use std::path::Path;
/// assert_eq!(path_for_display(Path::new("/etc/suntheme.toml")), "/etc/suntheme.toml");
/// ```
pub fn path_for_display(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(rest) = path.strip_prefix(&home) {
            return format!("~/{}", rest.display());
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    #[test]
    fn test_parse_clock_time_valid() {
        assert_eq!(parse_clock_time("00:00"), NaiveTime::from_hms_opt(0, 0, 0));
        assert_eq!(parse_clock_time("23:59"), NaiveTime::from_hms_opt(23, 59, 0));
        assert_eq!(parse_clock_time(" 7:05 "), NaiveTime::from_hms_opt(7, 5, 0));
    }

    #[test]
    fn test_parse_clock_time_invalid() {
        for bad in ["", "12", "24:00", "12:60", "12:5", "12:30:00", "ab:cd", "-1:30", "+6:00"] {
            assert_eq!(parse_clock_time(bad), None, "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_format_clock_time() {
        let t = NaiveTime::from_hms_opt(5, 25, 59).unwrap();
        assert_eq!(format_clock_time(&t), "05:25");
        let dt = FixedOffset::west_opt(4 * 3600)
            .unwrap()
            .with_ymd_and_hms(2020, 6, 21, 20, 30, 34)
            .unwrap();
        assert_eq!(format_clock_time(&dt), "20:30");
    }

    #[test]
    fn test_path_for_display_home_prefix() {
        if let Some(home) = dirs::home_dir() {
            let path = home.join(".config").join("suntheme").join("suntheme.toml");
            assert_eq!(path_for_display(&path), "~/.config/suntheme/suntheme.toml");
        }
    }
}
