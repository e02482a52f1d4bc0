// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{RawScriptConfig, ScriptConfig};
use crate::errors::{ChoreError, Result};
use crate::supervise::ShutdownPolicy;

impl TryFrom<RawScriptConfig> for ScriptConfig {
    type Error = ChoreError;

    fn try_from(raw: RawScriptConfig) -> std::result::Result<Self, Self::Error> {
        let timeout = raw
            .timeout
            .as_deref()
            .map(|s| parse_named_duration("timeout", s))
            .transpose()?;
        if timeout == Some(Duration::ZERO) {
            return Err(ChoreError::ConfigError(
                "timeout must be greater than zero".to_string(),
            ));
        }

        let shutdown = validate_shutdown(&raw.shutdown.grace, &raw.shutdown.poll)?;

        Ok(ScriptConfig {
            network: raw.network,
            git: raw.git,
            timeout,
            sources: raw.sources,
            shutdown,
            path: None,
        })
    }
}

fn validate_shutdown(grace: &str, poll: &str) -> Result<ShutdownPolicy> {
    let grace = parse_named_duration("shutdown.grace", grace)?;
    let poll = parse_named_duration("shutdown.poll", poll)?;

    if poll.is_zero() {
        return Err(ChoreError::ConfigError(
            "shutdown.poll must be greater than zero".to_string(),
        ));
    }
    if poll >= grace {
        return Err(ChoreError::ConfigError(format!(
            "shutdown.poll ({poll:?}) must be shorter than shutdown.grace ({grace:?})"
        )));
    }

    Ok(ShutdownPolicy { grace, poll })
}

fn parse_named_duration(field: &str, value: &str) -> Result<Duration> {
    parse_duration(value).map_err(|e| ChoreError::ConfigError(format!("{field}: {e}")))
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => scaled_secs(value, 60),
        "h" => scaled_secs(value, 60 * 60),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}

fn scaled_secs(value: u64, factor: u64) -> std::result::Result<Duration, String> {
    value
        .checked_mul(factor)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration too large: {} * {}s", value, factor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::ShutdownSection;

    fn raw_with_shutdown(grace: &str, poll: &str) -> RawScriptConfig {
        RawScriptConfig {
            shutdown: ShutdownSection {
                grace: grace.to_string(),
                poll: poll.to_string(),
            },
            ..RawScriptConfig::default()
        }
    }

    #[test]
    fn parses_supported_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("3s"), Ok(Duration::from_secs(3)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    }

    #[test]
    fn rejects_bad_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("5d").is_err());
    }

    #[test]
    fn rejects_overflowing_durations() {
        assert!(parse_duration("6000000000000000h").is_err());
        assert!(parse_duration("400000000000000000m").is_err());
        assert_eq!(
            parse_duration("18446744073709551615s"),
            Ok(Duration::from_secs(u64::MAX))
        );
    }

    #[test]
    fn default_shutdown_section_matches_default_policy() {
        let cfg = ScriptConfig::try_from(RawScriptConfig::default()).unwrap();
        assert_eq!(cfg.shutdown, ShutdownPolicy::default());
    }

    #[test]
    fn poll_must_be_shorter_than_grace() {
        let err = ScriptConfig::try_from(raw_with_shutdown("50ms", "50ms")).unwrap_err();
        assert!(matches!(err, ChoreError::ConfigError(_)));

        let err = ScriptConfig::try_from(raw_with_shutdown("1s", "0ms")).unwrap_err();
        assert!(matches!(err, ChoreError::ConfigError(_)));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let raw = RawScriptConfig {
            timeout: Some("0s".to_string()),
            ..RawScriptConfig::default()
        };
        assert!(ScriptConfig::try_from(raw).is_err());
    }
}
