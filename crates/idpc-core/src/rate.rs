//! Per-minute rate computation for monotonically increasing counters.
//!
//! ```text
//! duration = now - previous_time          (whole seconds)
//! rate     = (current - previous) * 60 / duration
//! ```
//!
//! Windows longer than [`MAX_WINDOW_SECS`] are rejected. A decrease is a
//! counter reset for floats. Unsigned counters are diffed with wrapping
//! arithmetic, so a wrapped counter yields a large but finite delta; such a
//! value is still accepted while it stays under ten times the previous rate.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Longest window, in seconds, over which a rate is computed.
pub const MAX_WINDOW_SECS: i64 = 600;

/// Factor bounding how far an unsigned rate may jump after a decrease.
pub const WRAP_TOLERANCE_FACTOR: f64 = 10.0;

/// Reasons a rate cannot be computed this cycle.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum RateError {
    #[error("too long duration: {seconds}s since last observation")]
    DurationTooLong { seconds: i64 },

    #[error("non-positive duration: {seconds}s since last observation")]
    NonPositiveDuration { seconds: i64 },

    #[error("counter seems to be reset")]
    CounterReset,
}

fn window_secs(now: DateTime<Utc>, previous_time: DateTime<Utc>) -> Result<i64, RateError> {
    let seconds = now.timestamp() - previous_time.timestamp();
    if seconds > MAX_WINDOW_SECS {
        return Err(RateError::DurationTooLong { seconds });
    }
    if seconds <= 0 {
        return Err(RateError::NonPositiveDuration { seconds });
    }
    Ok(seconds)
}

/// Rate of a floating point counter. Any decrease is a reset.
pub fn rate_f64(
    current: f64,
    now: DateTime<Utc>,
    previous: f64,
    previous_time: DateTime<Utc>,
) -> Result<f64, RateError> {
    let seconds = window_secs(now, previous_time)?;
    if previous <= current {
        Ok((current - previous) * 60.0 / seconds as f64)
    } else {
        Err(RateError::CounterReset)
    }
}

/// Rate of a 32-bit unsigned counter.
pub fn rate_u32(
    current: u32,
    now: DateTime<Utc>,
    previous: u32,
    previous_time: DateTime<Utc>,
    previous_rate: f64,
) -> Result<f64, RateError> {
    let seconds = window_secs(now, previous_time)?;
    let delta = current.wrapping_sub(previous).wrapping_mul(60);
    let rate = f64::from(delta) / seconds as f64;
    accept_unsigned(previous <= current, rate, previous_rate)
}

/// Rate of a 64-bit unsigned counter.
pub fn rate_u64(
    current: u64,
    now: DateTime<Utc>,
    previous: u64,
    previous_time: DateTime<Utc>,
    previous_rate: f64,
) -> Result<f64, RateError> {
    let seconds = window_secs(now, previous_time)?;
    let delta = current.wrapping_sub(previous).wrapping_mul(60);
    let rate = delta as f64 / seconds as f64;
    accept_unsigned(previous <= current, rate, previous_rate)
}

fn accept_unsigned(increased: bool, rate: f64, previous_rate: f64) -> Result<f64, RateError> {
    if increased || rate < previous_rate * WRAP_TOLERANCE_FACTOR {
        Ok(rate)
    } else {
        Err(RateError::CounterReset)
    }
}
