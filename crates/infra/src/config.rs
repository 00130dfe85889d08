//! Desk configuration loaded from environment variables.
//!
//! | Variable                        | Values               | Default |
//! |---------------------------------|----------------------|---------|
//! | `STONETRADE_FLOOR_PRICE_POLICY` | `warn`, `block`      | `warn`  |
//! | `STONETRADE_OFFER_TTL_DAYS`     | positive integer     | `30`    |
//! | `STONETRADE_LOG_FORMAT`         | `json`, `pretty`     | `json`  |

use chrono::Duration;
use thiserror::Error;

use stonetrade_observability::LogFormat;
use stonetrade_reconciliation::FloorPricePolicy;

pub const FLOOR_PRICE_POLICY_VAR: &str = "STONETRADE_FLOOR_PRICE_POLICY";
pub const OFFER_TTL_DAYS_VAR: &str = "STONETRADE_OFFER_TTL_DAYS";
pub const LOG_FORMAT_VAR: &str = "STONETRADE_LOG_FORMAT";

const DEFAULT_OFFER_TTL_DAYS: i64 = 30;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeskConfig {
    pub floor_price_policy: FloorPricePolicy,
    /// How long a new offer stays open before `sweep_expired` may cancel it.
    pub offer_ttl: Duration,
    pub log_format: LogFormat,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            floor_price_policy: FloorPricePolicy::Warn,
            offer_ttl: Duration::days(DEFAULT_OFFER_TTL_DAYS),
            log_format: LogFormat::Json,
        }
    }
}

impl DeskConfig {
    /// Install the process-wide tracing subscriber in the configured format.
    ///
    /// Only the first call in a process takes effect.
    pub fn init_observability(&self) {
        stonetrade_observability::init_with(self.log_format);
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let floor_price_policy = match lookup(FLOOR_PRICE_POLICY_VAR) {
            Some(raw) => parse_policy(&raw)?,
            None => {
                tracing::warn!("{FLOOR_PRICE_POLICY_VAR} not set; warning on under-floor offers");
                defaults.floor_price_policy
            }
        };

        let offer_ttl = match lookup(OFFER_TTL_DAYS_VAR) {
            Some(raw) => parse_ttl(&raw)?,
            None => {
                tracing::warn!("{OFFER_TTL_DAYS_VAR} not set; offers expire after {DEFAULT_OFFER_TTL_DAYS} days");
                defaults.offer_ttl
            }
        };

        let log_format = match lookup(LOG_FORMAT_VAR) {
            Some(raw) => raw
                .parse::<LogFormat>()
                .map_err(|reason| ConfigError::invalid(LOG_FORMAT_VAR, &raw, reason))?,
            None => defaults.log_format,
        };

        Ok(Self {
            floor_price_policy,
            offer_ttl,
            log_format,
        })
    }
}

fn parse_policy(raw: &str) -> Result<FloorPricePolicy, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "warn" => Ok(FloorPricePolicy::Warn),
        "block" => Ok(FloorPricePolicy::Block),
        _ => Err(ConfigError::invalid(FLOOR_PRICE_POLICY_VAR, raw, "expected warn or block")),
    }
}

fn parse_ttl(raw: &str) -> Result<Duration, ConfigError> {
    let days: i64 = raw
        .trim()
        .parse()
        .map_err(|e| ConfigError::invalid(OFFER_TTL_DAYS_VAR, raw, format!("{e}")))?;
    if days <= 0 {
        return Err(ConfigError::invalid(OFFER_TTL_DAYS_VAR, raw, "must be positive"));
    }
    Duration::try_days(days)
        .ok_or_else(|| ConfigError::invalid(OFFER_TTL_DAYS_VAR, raw, "out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn unset_variables_use_defaults() {
        let config = DeskConfig::from_lookup(|_| None).unwrap();

        assert_eq!(config, DeskConfig::default());
        assert_eq!(config.offer_ttl, Duration::days(30));
    }

    #[test]
    fn values_are_parsed() {
        let config = DeskConfig::from_lookup(lookup_from(&[
            (FLOOR_PRICE_POLICY_VAR, "Block"),
            (OFFER_TTL_DAYS_VAR, " 7 "),
            (LOG_FORMAT_VAR, "pretty"),
        ]))
        .unwrap();

        assert_eq!(config.floor_price_policy, FloorPricePolicy::Block);
        assert_eq!(config.offer_ttl, Duration::days(7));
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn observability_follows_the_configured_format() {
        let config = DeskConfig::from_lookup(lookup_from(&[(LOG_FORMAT_VAR, "pretty")])).unwrap();

        config.init_observability();
        config.init_observability();

        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let err = DeskConfig::from_lookup(lookup_from(&[(FLOOR_PRICE_POLICY_VAR, "ignore")])).unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { key: FLOOR_PRICE_POLICY_VAR, .. }));
    }

    #[test]
    fn non_positive_ttl_is_rejected() {
        for raw in ["0", "-3", "soon"] {
            let err = DeskConfig::from_lookup(lookup_from(&[(OFFER_TTL_DAYS_VAR, raw)])).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { key: OFFER_TTL_DAYS_VAR, .. }), "{raw}");
        }
    }
}
