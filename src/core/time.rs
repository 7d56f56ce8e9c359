//! Time sources and wire timestamp handling.
//!
//! All lease arithmetic happens on absolute UTC instants. The current time is
//! read through the [`Clock`] trait so expiry behavior can be driven
//! deterministically in tests.
//!
//! On the wire, instants are rendered as `YYYY-MM-DDTHH:MM:SS.ffffffZ`.
//! Callers may submit RFC 3339 strings with any offset, or naive strings,
//! which are interpreted as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use thiserror::Error;

/// Timestamp parse failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unparseable timestamp: {input:?}")]
pub struct TimeError {
    /// The rejected input.
    pub input: String,
}

/// Source of the current UTC instant.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced time source.
///
/// Starts at a fixed instant and only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at the given instant.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward (or backward, for negative deltas).
    pub fn advance(&self, delta: chrono::Duration) {
        let mut now = self.now.lock();
        *now += delta;
    }

    /// Jump to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock() = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Render an instant in the fixed wire format.
pub fn format_timestamp(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

const AWARE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a caller-supplied timestamp into an absolute UTC instant.
///
/// Offset-qualified strings are converted to UTC; naive strings are taken to
/// already be UTC. A bare date means midnight UTC.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, TimeError> {
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in AWARE_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(trimmed, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(TimeError {
        input: input.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn instant(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_format_fixed_width() {
        let t = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        assert_eq!(format_timestamp(&t), "2026-10-16T12:00:00.000000Z");
    }

    #[test]
    fn test_parse_aware_converts_to_utc() {
        let t = parse_timestamp("2026-10-16T14:00:00+02:00").unwrap();
        assert_eq!(t, instant("2026-10-16T12:00:00Z"));
    }

    #[test]
    fn test_parse_naive_is_utc() {
        let t = parse_timestamp("2026-10-16T12:00:00").unwrap();
        assert_eq!(t, instant("2026-10-16T12:00:00Z"));

        let t = parse_timestamp("2026-10-16 12:00:00.250000").unwrap();
        assert_eq!(t, instant("2026-10-16T12:00:00.25Z"));
    }

    #[test]
    fn test_parse_date_only() {
        let t = parse_timestamp("2026-10-16").unwrap();
        assert_eq!(t, instant("2026-10-16T00:00:00Z"));
    }

    #[test]
    fn test_parse_round_trips_wire_format() {
        let t = instant("2026-10-16T12:00:00.000001Z");
        assert_eq!(parse_timestamp(&format_timestamp(&t)).unwrap(), t);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_timestamp("next tuesday").unwrap_err();
        assert_eq!(err.input, "next tuesday");
    }

    #[test]
    fn test_manual_clock() {
        let start = instant("2026-10-16T12:00:00Z");
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(chrono::Duration::seconds(90));
        assert_eq!(clock.now(), instant("2026-10-16T12:01:30Z"));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
