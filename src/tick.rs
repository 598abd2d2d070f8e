//! Time-Alignment Layer
//!
//! Pure functions that place instants on per-frequency sampling grids.
//!
//! # Components
//!
//! - [`Frequency`]: Ordered set of sampling frequencies (1 minute to 1 month)
//! - [`previous_tick`] / [`next_tick`]: Step one tick back or forward
//! - [`last_whole_tick`]: Most recent aligned tick at or before an instant
//! - [`following_tick`]: First aligned tick after an instant
//! - [`ticks_in`]: Every aligned tick inside a half-open window
//! - [`ReferenceZone`]: Fixed offset or named IANA zone the grids are laid out in
//!
//! Non-month grids share a weekly epoch (midnight of the most recent Sunday in
//! the reference timezone), so every hour tick is also a 15 minute tick, every
//! 12 hour tick is also an hour tick, and so on. Month grids start at 00:00 on
//! the first day of the month. In zones with daylight saving the weekly epoch
//! is re-anchored every Sunday, so a grid crossing an offset change returns to
//! local midnight at the next week boundary.

mod align;
mod frequency;
mod zone;

pub use align::{
    following_tick, is_aligned, last_whole_tick, next_tick, previous_tick, ticks_in,
    week_reference,
};
pub use frequency::Frequency;
pub use zone::{ReferenceZone, ZoneOffset};

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use thiserror::Error;

/// Errors raised by calendar arithmetic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TickError {
    /// Calendar arithmetic left the representable range.
    #[error("calendar arithmetic out of range for {frequency} at {at}")]
    OutOfRange {
        frequency: Frequency,
        at: DateTime<Utc>,
    },

    /// A local wall-clock time could not be resolved in the reference timezone.
    #[error("local time {0} cannot be resolved in the reference timezone")]
    UnresolvedLocalTime(NaiveDateTime),
}

/// Parse a reference timezone.
///
/// Accepts `UTC`, `Z`, a fixed offset such as `+10:00` / `-05:30`, or an IANA
/// zone name such as `Australia/Melbourne`.
///
/// # Examples
///
/// ```
/// use chrono::{DateTime, Utc};
/// use cloudmetrics::tick::parse_timezone;
///
/// let winter: DateTime<Utc> = "2024-07-01T00:00:00Z".parse().unwrap();
/// assert_eq!(parse_timezone("UTC").unwrap().offset_seconds_at(winter), 0);
/// assert_eq!(parse_timezone("+10:00").unwrap().offset_seconds_at(winter), 36_000);
/// assert_eq!(parse_timezone("Australia/Sydney").unwrap().offset_seconds_at(winter), 36_000);
/// assert!(parse_timezone("Mars/Olympus").is_err());
/// ```
pub fn parse_timezone(s: &str) -> Result<ReferenceZone, String> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("utc") || s.eq_ignore_ascii_case("z") {
        return Ok(ReferenceZone::utc());
    }
    if s.starts_with(['+', '-']) {
        return s
            .parse::<FixedOffset>()
            .map(ReferenceZone::Fixed)
            .map_err(|e| format!("invalid timezone offset '{}': {}", s, e));
    }
    s.parse::<chrono_tz::Tz>()
        .map(ReferenceZone::Named)
        .map_err(|e| format!("unknown timezone '{}': {}", s, e))
}
