//! Time input parsing shared by the CLI's `replay` subcommand: accepts either
//! an RFC3339 timestamp or a leading-`-` relative duration ("-1h", "-30m")
//! resolved against `now`.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::fmt;

#[derive(Debug)]
pub struct TimeParseError(String);

impl fmt::Display for TimeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not parse time {:?}: expected RFC3339 or a leading-'-' relative duration like -1h30m", self.0)
    }
}

impl std::error::Error for TimeParseError {}

/// Parse `input` as either:
/// - a relative duration, written as `-<number><unit>` repeated (`h`, `m`, `s`),
///   e.g. `-1h`, `-90m`, `-1h30m`, resolved as `now - duration`; or
/// - an absolute RFC3339 timestamp, e.g. `2024-01-01T00:00:00Z`.
pub fn parse_input_time(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, TimeParseError> {
    let trimmed = input.trim();
    if let Some(rest) = trimmed.strip_prefix('-') {
        let duration = parse_relative_duration(rest).ok_or_else(|| TimeParseError(input.to_string()))?;
        return Ok(now - duration);
    }

    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| TimeParseError(input.to_string()))
}

/// Parse a sequence of `<number><unit>` tokens (no leading sign) into a total
/// duration. Supported units: `h` (hours), `m` (minutes), `s` (seconds).
fn parse_relative_duration(spec: &str) -> Option<ChronoDuration> {
    if spec.is_empty() {
        return None;
    }
    let mut total = ChronoDuration::zero();
    let mut digits = String::new();
    for ch in spec.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        if digits.is_empty() {
            return None;
        }
        let value: i64 = digits.parse().ok()?;
        digits.clear();
        let unit = match ch {
            'h' => ChronoDuration::hours(value),
            'm' => ChronoDuration::minutes(value),
            's' => ChronoDuration::seconds(value),
            _ => return None,
        };
        total += unit;
    }
    if !digits.is_empty() {
        return None;
    }
    Some(total)
}
