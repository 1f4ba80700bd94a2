//! Geographic position, solar event calculation, and timezone resolution.
//!
//! - `solar`: iterative sunrise/sunset solver for a date and position
//! - `timezone`: turns the configured timezone value into a usable offset

pub mod solar;
pub mod timezone;

use crate::constants::{MAXIMUM_LATITUDE, MAXIMUM_LONGITUDE};
use solar::SolarError;

pub use solar::{SolarEvents, ZenithKind, compute_events, parse_local_instant, reduce_to_range};
pub use timezone::{TimezoneError, TimezoneSetting, ZoneSpec, resolve_offset};

/// An observer position on the Earth, in decimal degrees.
///
/// Construction rejects latitudes beyond ±63° because the hour-angle iteration
/// stops converging reliably near the polar circles. Fields are private so a
/// value that exists is always valid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPosition {
    latitude: f64,
    longitude: f64,
}

impl GeoPosition {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, SolarError> {
        if !latitude.is_finite() || latitude.abs() > MAXIMUM_LATITUDE {
            return Err(SolarError::LatitudeOutOfRange(latitude));
        }
        if !longitude.is_finite() || longitude.abs() > MAXIMUM_LONGITUDE {
            return Err(SolarError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl std::fmt::Display for GeoPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ns = if self.latitude >= 0.0 { 'N' } else { 'S' };
        let ew = if self.longitude >= 0.0 { 'E' } else { 'W' };
        write!(
            f,
            "{:.4}°{}, {:.4}°{}",
            self.latitude.abs(),
            ns,
            self.longitude.abs(),
            ew
        )
    }
}
