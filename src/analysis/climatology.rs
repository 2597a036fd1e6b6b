//! Climatological estimates of ocean conditions.
//!
//! Pure functions of latitude and day of year. They back-fill fields the
//! upstream service could not supply and provide the baseline the heatwave
//! classifier measures anomalies against. No randomness, no clock: callers
//! pass the day of year explicitly.

use chrono::{Datelike, Duration, NaiveDate};

use crate::model::SstSample;

pub const SST_MIN_C: f64 = -2.0;
pub const SST_MAX_C: f64 = 32.0;
pub const OXYGEN_MIN_ML_L: f64 = 4.0;
pub const OXYGEN_MAX_ML_L: f64 = 9.0;

const DAYS_PER_YEAR: f64 = 365.0;
/// Day of year at which the northern seasonal SST term crosses zero upward.
const SST_PHASE_DAY: f64 = 80.0;
/// Northern and southern spring bloom phase offsets.
const BLOOM_PHASE_NORTH: f64 = 60.0;
const BLOOM_PHASE_SOUTH: f64 = 240.0;

fn seasonal_sine(day_of_year: u32, phase_day: f64) -> f64 {
    ((day_of_year as f64 - phase_day) * 2.0 * std::f64::consts::PI / DAYS_PER_YEAR).sin()
}

/// Expected sea-surface temperature in °C.
///
/// Warm tropics, cold poles, with a seasonal swing that grows with latitude
/// up to ±4°C and is inverted in the southern hemisphere. The seasonal
/// amplitude vanishes at the equator, so the curve is continuous across it.
pub fn estimate_sst(lat: f64, day_of_year: u32) -> f64 {
    let abs_lat = lat.abs();
    let base = 28.0 - (abs_lat / 90.0) * 30.0;

    let mut seasonal = seasonal_sine(day_of_year, SST_PHASE_DAY);
    if lat < 0.0 {
        seasonal = -seasonal;
    }
    let amplitude = (abs_lat / 30.0).min(1.0) * 4.0;

    (base + seasonal * amplitude).clamp(SST_MIN_C, SST_MAX_C)
}

/// Expected chlorophyll-a concentration in mg/m³.
pub fn estimate_chlorophyll(lat: f64, day_of_year: u32) -> f64 {
    let abs_lat = lat.abs();
    let base = if abs_lat < 15.0 {
        0.1 // oligotrophic tropics
    } else if abs_lat < 40.0 {
        0.3
    } else {
        1.0 // nutrient-rich subpolar
    };

    let phase = if lat < 0.0 { BLOOM_PHASE_SOUTH } else { BLOOM_PHASE_NORTH };
    let bloom = seasonal_sine(day_of_year, phase).max(0.0);

    base + bloom * base * 2.0
}

/// Expected dissolved oxygen in ml/L; colder water holds more.
pub fn estimate_oxygen(sst: f64) -> f64 {
    (8.0 - (sst / 30.0) * 3.5).clamp(OXYGEN_MIN_ML_L, OXYGEN_MAX_ML_L)
}

/// Expected surface pH, slightly higher in the tropics.
pub fn estimate_ph(lat: f64) -> f64 {
    8.1 + (1.0 - lat.abs() / 90.0) * 0.1
}

/// Expected salinity in PSU.
pub fn estimate_salinity(lat: f64) -> f64 {
    let abs_lat = lat.abs();
    if abs_lat < 10.0 {
        34.5 // equatorial rainfall
    } else if abs_lat < 35.0 {
        36.5 // subtropical evaporation
    } else if abs_lat < 60.0 {
        35.0
    } else {
        34.0 // ice melt
    }
}

/// Daily climatological SST for the `days` days ending on `end`.
///
/// Each day uses its own day of year plus a fixed ±0.5°C daily wobble, so
/// the series is reproducible for a given end date.
pub fn sst_series(lat: f64, end: NaiveDate, days: u32) -> Vec<SstSample> {
    (0..days)
        .map(|i| {
            let date = end - Duration::days((days - i - 1) as i64);
            let wobble = (i as f64 * 0.5).sin() * 0.5;
            SstSample {
                date,
                sst: round_to(estimate_sst(lat, date.ordinal()) + wobble, 1),
            }
        })
        .collect()
}

/// Rounds half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
