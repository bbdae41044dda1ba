use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A duration given either as a shorthand string (`"30m"`, `"1h"`, `"2d"`)
/// or as raw milliseconds.
///
/// Configuration surfaces accept this instead of a bare `Duration` so that
/// serialized configs can use the human-friendly shorthand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationSpec {
    /// Raw milliseconds.
    Millis(u64),
    /// Shorthand string matching `^(\d+)(ms|s|m|h|d)$`.
    Shorthand(String),
}

impl DurationSpec {
    /// Resolve to a concrete [`Duration`].
    ///
    /// Invalid shorthand is a hard configuration error, never a silent
    /// default.
    pub fn resolve(&self) -> Result<Duration, DurationParseError> {
        match self {
            DurationSpec::Millis(ms) => Ok(Duration::from_millis(*ms)),
            DurationSpec::Shorthand(text) => parse_duration(text),
        }
    }
}

impl From<Duration> for DurationSpec {
    fn from(duration: Duration) -> Self {
        DurationSpec::Millis(duration.as_millis() as u64)
    }
}

impl From<&str> for DurationSpec {
    fn from(text: &str) -> Self {
        DurationSpec::Shorthand(text.to_string())
    }
}

impl FromStr for DurationSpec {
    type Err = DurationParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        // Validate eagerly so a bad spec fails where it is written.
        parse_duration(text)?;
        Ok(DurationSpec::Shorthand(text.to_string()))
    }
}

/// Error produced when a duration shorthand does not match
/// `^(\d+)(ms|s|m|h|d)$`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationParseError {
    input: String,
}

impl DurationParseError {
    /// The rejected input text.
    pub fn input(&self) -> &str {
        &self.input
    }
}

impl fmt::Display for DurationParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid duration {:?}: expected an integer followed by one of ms, s, m, h, d",
            self.input
        )
    }
}

impl std::error::Error for DurationParseError {}

/// Parse the shorthand grammar `^(\d+)(ms|s|m|h|d)$`.
pub fn parse_duration(text: &str) -> Result<Duration, DurationParseError> {
    let err = || DurationParseError {
        input: text.to_string(),
    };

    let digits_end = text
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(err)?;
    if digits_end == 0 {
        return Err(err());
    }

    let (digits, unit) = text.split_at(digits_end);
    let amount: u64 = digits.parse().map_err(|_| err())?;

    let millis = match unit {
        "ms" => amount,
        "s" => amount.saturating_mul(1_000),
        "m" => amount.saturating_mul(60_000),
        "h" => amount.saturating_mul(3_600_000),
        "d" => amount.saturating_mul(86_400_000),
        _ => return Err(err()),
    };

    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(30 * 60));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("2d").unwrap(), Duration::from_secs(2 * 86_400));
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in ["", "ms", "10", "10x", "10 m", "-5s", "1.5h", "m10"] {
            assert!(parse_duration(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn spec_resolves_millis_and_shorthand() {
        assert_eq!(
            DurationSpec::Millis(1500).resolve().unwrap(),
            Duration::from_millis(1500)
        );
        assert_eq!(
            DurationSpec::from("50ms").resolve().unwrap(),
            Duration::from_millis(50)
        );
        assert!(DurationSpec::from("soon").resolve().is_err());
    }

    #[test]
    fn spec_deserializes_untagged() {
        let ms: DurationSpec = serde_json::from_str("30000").unwrap();
        assert_eq!(ms, DurationSpec::Millis(30000));

        let shorthand: DurationSpec = serde_json::from_str("\"30m\"").unwrap();
        assert_eq!(shorthand, DurationSpec::Shorthand("30m".to_string()));
    }
}
