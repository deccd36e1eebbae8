// src/types.rs

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// How file fingerprints are computed when deciding staleness.
///
/// - `Timestamp`: modification time; an output older than any input is stale
///   (default, cheap).
/// - `Content`: blake3 digest of the file bytes; immune to `touch` and to
///   coarse timestamp resolution, but reads every tracked file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintMode {
    #[default]
    Timestamp,
    Content,
}

impl FromStr for FingerprintMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "timestamp" | "mtime" => Ok(FingerprintMode::Timestamp),
            "content" | "hash" => Ok(FingerprintMode::Content),
            other => Err(format!(
                "invalid fingerprint mode: {other} (expected \"timestamp\" or \"content\")"
            )),
        }
    }
}

/// Where run records and artifact records are kept between invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StateStorageMode {
    /// Store state in a file (`.builddag/state.json`).
    #[default]
    File,
    /// Keep state in memory only (lost on exit).
    Memory,
}

/// Parse a duration string such as `"500ms"`, `"30s"`, `"10m"` or `"1h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ))
        }
    };
    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration(" 10m "), Ok(Duration::from_secs(600)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    }

    #[test]
    fn rejects_missing_or_unknown_units() {
        assert!(parse_duration("15").is_err());
        assert!(parse_duration("3d").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("ms").is_err());
    }

    #[test]
    fn rejects_durations_that_overflow() {
        let err = parse_duration("99999999999999999h").unwrap_err();
        assert!(err.contains("too large"), "{err}");
        assert!(parse_duration("999999999999999999m").is_err());
        assert_eq!(
            parse_duration("18446744073709551615s"),
            Ok(Duration::from_secs(u64::MAX))
        );
    }

    #[test]
    fn fingerprint_mode_accepts_aliases() {
        assert_eq!("mtime".parse(), Ok(FingerprintMode::Timestamp));
        assert_eq!("Content".parse(), Ok(FingerprintMode::Content));
        assert!("sha".parse::<FingerprintMode>().is_err());
    }
}
