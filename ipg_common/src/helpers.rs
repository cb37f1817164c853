use std::env;

use chrono::Duration;
use log::*;

/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Reads a boolean flag from the environment variable `name`.
pub fn env_flag(name: &str, default: bool) -> bool {
    parse_boolean_flag(env::var(name).ok(), default)
}

/// Reads a whole number of seconds from the environment variable `name`. Missing or invalid values log a message and
/// fall back to `default`.
pub fn env_seconds(name: &str, default: Duration) -> Duration {
    env_integer(name).map(Duration::seconds).unwrap_or_else(|| {
        debug!("🪛️ {name} is not set. Using the default value of {}s.", default.num_seconds());
        default
    })
}

/// Reads a whole number of minutes from the environment variable `name`, with the same fallback behaviour as
/// [`env_seconds`].
pub fn env_minutes(name: &str, default: Duration) -> Duration {
    env_integer(name).map(Duration::minutes).unwrap_or_else(|| {
        debug!("🪛️ {name} is not set. Using the default value of {} min.", default.num_minutes());
        default
    })
}

fn env_integer(name: &str) -> Option<i64> {
    let s = env::var(name).ok()?;
    match s.trim().parse::<i64>() {
        Ok(v) if v >= 0 => Some(v),
        Ok(v) => {
            warn!("🪛️ Negative value {v} for {name} is not allowed. Ignoring it.");
            None
        },
        Err(e) => {
            warn!("🪛️ Invalid configuration value for {name}. {e}");
            None
        },
    }
}

/// Splits a comma-separated list, trimming entries and dropping empty ones.
pub fn parse_list(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn boolean_flags() {
        assert!(parse_boolean_flag(Some("TRUE".into()), false));
        assert!(parse_boolean_flag(Some(" on ".into()), false));
        assert!(!parse_boolean_flag(Some("0".into()), true));
        assert!(parse_boolean_flag(Some("maybe".into()), true));
        assert!(!parse_boolean_flag(None, false));
    }

    #[test]
    fn lists() {
        assert_eq!(parse_list("coingecko, binance,,fixed "), vec!["coingecko", "binance", "fixed"]);
        assert!(parse_list(" , ").is_empty());
    }
}
