//! Refresh interval parsing
//!
//! Intervals are written as a sequence of decimal numbers, each with a unit:
//! `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`. Examples: `30m`, `1h30m`,
//! `1.5h`, `90s`.
//!
//! The scheduler works in whole seconds. Anything shorter than a second
//! runs every second, and fractional seconds are dropped.

use std::fmt;
use std::time::Duration;

use super::SchedulerError;

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// Longest accepted interval, in nanoseconds
const MAX_NANOS: u128 = i64::MAX as u128;

/// Fraction digits beyond this are ignored
const MAX_FRACTION_DIGITS: usize = 18;

/// A validated refresh interval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshInterval {
    text: String,
    period: Duration,
}

impl RefreshInterval {
    pub fn parse(input: &str) -> Result<Self, SchedulerError> {
        let text = input.trim();
        if text.is_empty() {
            return Err(SchedulerError::EmptyInterval);
        }

        let invalid = |reason: String| SchedulerError::InvalidInterval {
            input: text.to_string(),
            reason,
        };

        let nanos = parse_nanos(text).map_err(invalid)?;
        if nanos == 0 {
            return Err(invalid("must be greater than zero".to_string()));
        }

        let seconds = (nanos / NANOS_PER_SECOND).max(1) as u64;
        Ok(Self {
            text: text.to_string(),
            period: Duration::from_secs(seconds),
        })
    }

    /// Time between fires
    pub fn period(&self) -> Duration {
        self.period
    }

    /// The interval as the caller wrote it
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for RefreshInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(NANOS_PER_SECOND),
        "m" => Some(60 * NANOS_PER_SECOND),
        "h" => Some(3_600 * NANOS_PER_SECOND),
        _ => None,
    }
}

fn split_digits(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

/// Total length in nanoseconds. A lone `0` is accepted here and rejected
/// by the caller as zero.
fn parse_nanos(text: &str) -> Result<u128, String> {
    let (negative, mut rest) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    if rest == "0" {
        return Ok(0);
    }
    if rest.is_empty() {
        return Err("missing value".to_string());
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let (whole, after) = split_digits(rest);
        let (fraction, after) = match after.strip_prefix('.') {
            Some(tail) => split_digits(tail),
            None => ("", after),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(format!("expected a number at {rest:?}"));
        }

        let unit_end = after
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after.len());
        let (unit, remainder) = after.split_at(unit_end);
        let scale = match unit_nanos(unit) {
            Some(scale) => scale,
            None if unit.is_empty() => return Err(format!("missing unit after {whole}")),
            None => return Err(format!("unknown unit {unit:?}")),
        };

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| "value out of range".to_string())?
        };
        let mut value = whole
            .checked_mul(scale)
            .ok_or_else(|| "value out of range".to_string())?;

        if !fraction.is_empty() {
            let digits = &fraction[..fraction.len().min(MAX_FRACTION_DIGITS)];
            let numerator: u128 = digits
                .parse()
                .map_err(|_| "value out of range".to_string())?;
            value += numerator * scale / 10u128.pow(digits.len() as u32);
        }

        total = total
            .checked_add(value)
            .filter(|t| *t <= MAX_NANOS)
            .ok_or_else(|| "value out of range".to_string())?;
        rest = remainder;
    }

    if negative && total > 0 {
        return Err("must be greater than zero".to_string());
    }
    Ok(total)
}
