//! Stateless metric/statute unit conversions
//!
//! All conversions operate on `Option<f64>`: a missing measurement stays
//! missing. No conversion ever turns an unknown value into a zero.

use chrono::NaiveTime;

/// Which unit system the stored values should use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitSystem {
    #[default]
    Metric,
    /// Feet, miles, pounds
    Statute,
}

const FEET_PER_METER: f64 = 3.280_839_895_013_123;
const METERS_PER_MILE: f64 = 1_609.344;

pub fn centimeters_to_meters(v: Option<f64>) -> Option<f64> {
    v.map(|cm| cm / 100.0)
}

pub fn meters_to_feet(v: Option<f64>) -> Option<f64> {
    v.map(|m| m * FEET_PER_METER)
}

pub fn feet_to_meters(v: Option<f64>) -> Option<f64> {
    v.map(|ft| ft / FEET_PER_METER)
}

pub fn meters_to_miles(v: Option<f64>) -> Option<f64> {
    v.map(|m| m / METERS_PER_MILE)
}

pub fn miles_to_meters(v: Option<f64>) -> Option<f64> {
    v.map(|mi| mi * METERS_PER_MILE)
}

/// Convert a length in meters to the target unit system's short length
/// unit (meters or feet).
pub fn length_for(v: Option<f64>, units: UnitSystem) -> Option<f64> {
    match units {
        UnitSystem::Metric => v,
        UnitSystem::Statute => meters_to_feet(v),
    }
}

/// Milliseconds to a time-of-day encoding. Values of a day or more are
/// unknown, not an error.
pub fn ms_to_time(v: Option<f64>) -> Option<NaiveTime> {
    let ms = v?;
    if !ms.is_finite() || ms < 0.0 {
        return None;
    }
    let secs = (ms / 1000.0) as u32;
    let nanos = ((ms % 1000.0) * 1_000_000.0) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
}

/// Whole seconds to a time-of-day encoding.
pub fn secs_to_time(v: Option<f64>) -> Option<NaiveTime> {
    let secs = v?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    NaiveTime::from_num_seconds_from_midnight_opt(secs as u32, 0)
}
