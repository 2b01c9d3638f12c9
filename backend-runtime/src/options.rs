//! Parsers for the string→string configuration surface.
//!
//! Backends are configured from flat option maps; the helpers here turn the
//! common literal shapes into typed values with actionable error messages.

use std::time::Duration;

use crate::error::{Error, Result};

/// Parse a byte-size literal.
///
/// Accepts bare byte counts (`"327680"`) and decimal values with a binary
/// unit suffix (`"320kb"`, `"10mb"`, `"1gb"`), case-insensitive.
pub fn parse_byte_size(option: &str, value: &str) -> Result<u64> {
    let value = value.trim();
    let lower = value.to_ascii_lowercase();

    let (digits, multiplier) = if let Some(rest) = lower.strip_suffix("kb") {
        (rest, 1024u64)
    } else if let Some(rest) = lower.strip_suffix("mb") {
        (rest, 1024 * 1024)
    } else if let Some(rest) = lower.strip_suffix("gb") {
        (rest, 1024 * 1024 * 1024)
    } else if let Some(rest) = lower.strip_suffix('b') {
        (rest, 1)
    } else {
        (lower.as_str(), 1)
    };

    let digits = digits.trim();
    let number: u64 = digits.parse().map_err(|_| {
        Error::Config(format!(
            "Option '{}' expects a byte size (e.g. '10mb', '327680'), got '{}'",
            option, value
        ))
    })?;

    number.checked_mul(multiplier).ok_or_else(|| {
        Error::Config(format!("Option '{}' overflows a 64-bit byte count", option))
    })
}

/// Parse a duration literal.
///
/// Accepts `"100ms"`, `"30s"`, `"5m"`, `"2h"` and bare second counts
/// (`"30"`).
pub fn parse_duration(option: &str, value: &str) -> Result<Duration> {
    let value = value.trim();
    let lower = value.to_ascii_lowercase();

    let (digits, unit_ms) = if let Some(rest) = lower.strip_suffix("ms") {
        (rest, 1u64)
    } else if let Some(rest) = lower.strip_suffix('s') {
        (rest, 1000)
    } else if let Some(rest) = lower.strip_suffix('m') {
        (rest, 60 * 1000)
    } else if let Some(rest) = lower.strip_suffix('h') {
        (rest, 60 * 60 * 1000)
    } else {
        (lower.as_str(), 1000)
    };

    let digits = digits.trim();
    let number: u64 = digits.parse().map_err(|_| {
        Error::Config(format!(
            "Option '{}' expects a duration (e.g. '30s', '1500ms'), got '{}'",
            option, value
        ))
    })?;

    let millis = number.checked_mul(unit_ms).ok_or_else(|| {
        Error::Config(format!("Option '{}' overflows a millisecond count", option))
    })?;

    Ok(Duration::from_millis(millis))
}

/// Parse a positive integer count.
pub fn parse_count(option: &str, value: &str) -> Result<u32> {
    let number: u32 = value.trim().parse().map_err(|_| {
        Error::Config(format!(
            "Option '{}' expects a positive integer, got '{}'",
            option, value
        ))
    })?;

    if number == 0 {
        return Err(Error::Config(format!(
            "Option '{}' must be at least 1",
            option
        )));
    }

    Ok(number)
}
