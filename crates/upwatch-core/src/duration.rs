//! Duration literals of the condition language.
//!
//! Conditions compare duration-typed placeholders against literals like
//! `48h`, `1h30m` or `500ms`, and annotated condition output renders
//! resolved durations back in the same notation, so both directions live
//! here rather than behind a general-purpose formatting crate.

use std::time::Duration;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DurationParseError {
    #[error("invalid duration: {0}")]
    Invalid(String),

    #[error("unknown unit '{unit}' in duration: {input}")]
    UnknownUnit { unit: String, input: String },

    #[error("missing unit in duration: {0}")]
    MissingUnit(String),
}

/// Parses a duration literal: one or more `<number><unit>` groups, where
/// unit is one of `ns`, `us`, `µs`, `ms`, `s`, `m`, `h` and the number may
/// carry a fraction (`1.5h`).
///
/// A bare number without a unit is rejected (except `"0"`), which is what
/// lets the condition evaluator distinguish `500` (an integer) from `500ms`.
///
/// ```
/// use std::time::Duration;
/// use upwatch_core::duration::parse_duration;
///
/// assert_eq!(parse_duration("48h").unwrap(), Duration::from_secs(48 * 3600));
/// assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
/// assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
/// assert!(parse_duration("500").is_err());
/// ```
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(DurationParseError::Invalid(input.to_string()));
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    let mut total_nanos = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(DurationParseError::Invalid(input.to_string()));
        }
        let number: f64 = rest[..number_len]
            .parse()
            .map_err(|_| DurationParseError::Invalid(input.to_string()))?;
        rest = &rest[number_len..];
        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        let nanos_per_unit = match unit {
            "ns" => 1f64,
            "us" | "µs" => 1_000f64,
            "ms" => 1_000_000f64,
            "s" => 1_000_000_000f64,
            "m" => 60f64 * 1_000_000_000f64,
            "h" => 3_600f64 * 1_000_000_000f64,
            "" => return Err(DurationParseError::MissingUnit(input.to_string())),
            other => {
                return Err(DurationParseError::UnknownUnit {
                    unit: other.to_string(),
                    input: input.to_string(),
                })
            }
        };
        total_nanos += number * nanos_per_unit;
        rest = &rest[unit_len..];
    }
    Ok(Duration::from_nanos(total_nanos as u64))
}

/// Formats a duration in the literal notation, truncated to whole seconds
/// and with trailing zero components dropped: 336h0m0s renders as `336h`,
/// 1h30m0s as `1h30m`, but 1h0m15s keeps all three components.
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    if total_seconds == 0 {
        return "0s".to_string();
    }
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 || (hours > 0 && seconds > 0) {
        out.push_str(&format!("{minutes}m"));
    }
    if seconds > 0 || (hours == 0 && minutes == 0) {
        out.push_str(&format!("{seconds}s"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_and_compound_literals() {
        assert_eq!(parse_duration("300ms").unwrap(), Duration::from_millis(300));
        assert_eq!(parse_duration("2h45m").unwrap(), Duration::from_secs(9900));
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn rejects_unitless_and_garbage() {
        assert!(matches!(
            parse_duration("500"),
            Err(DurationParseError::MissingUnit(_))
        ));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("h").is_err());
        assert!(matches!(
            parse_duration("5d"),
            Err(DurationParseError::UnknownUnit { .. })
        ));
    }

    #[test]
    fn formats_with_zero_components_dropped() {
        assert_eq!(format_duration(Duration::from_secs(336 * 3600)), "336h");
        assert_eq!(format_duration(Duration::from_secs(5400)), "1h30m");
        assert_eq!(format_duration(Duration::from_secs(3615)), "1h0m15s");
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::from_millis(250)), "0s");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }
}
