//! Configuration loading and management

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of key transitions kept in the history buffer
    pub history_size: usize,

    /// Delay before a held key starts auto-repeating
    pub key_repeat_delay: Duration,

    /// Interval between auto-repeat invocations
    pub key_repeat_interval: Duration,

    /// Treat the navigation variants of numpad keys as their digit keys
    pub stateless_numpad: bool,

    /// Load debug profiles instead of regular ones
    pub debug_profiles: bool,

    /// Id stamped on media keys this process injects
    pub process_id: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history_size: 100,
            key_repeat_delay: Duration::from_millis(500),
            key_repeat_interval: Duration::from_millis(20),
            stateless_numpad: false,
            debug_profiles: false,
            process_id: std::process::id() as usize,
        }
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(size) = parse::<usize>(&lookup, "HOTKEY_HISTORY_SIZE")? {
            anyhow::ensure!(size > 0, "HOTKEY_HISTORY_SIZE must be positive");
            config.history_size = size;
        }
        if let Some(ms) = parse::<u64>(&lookup, "HOTKEY_REPEAT_DELAY_MS")? {
            config.key_repeat_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>(&lookup, "HOTKEY_REPEAT_INTERVAL_MS")? {
            config.key_repeat_interval = Duration::from_millis(ms);
        }
        if let Some(flag) = parse_flag(&lookup, "HOTKEY_STATELESS_NUMPAD")? {
            config.stateless_numpad = flag;
        }
        if let Some(flag) = parse_flag(&lookup, "HOTKEY_DEBUG_PROFILES")? {
            config.debug_profiles = flag;
        }

        Ok(config)
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(name)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .with_context(|| format!("invalid value '{value}' for {name}"))
        })
        .transpose()
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<bool>> {
    let Some(value) = lookup(name) else {
        return Ok(None);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => anyhow::bail!("invalid flag '{value}' for {name}"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.history_size, 100);
        assert_eq!(config.key_repeat_delay, Duration::from_millis(500));
        assert_eq!(config.key_repeat_interval, Duration::from_millis(20));
        assert!(!config.stateless_numpad);
        assert!(!config.debug_profiles);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("HOTKEY_HISTORY_SIZE", "8"),
            ("HOTKEY_REPEAT_DELAY_MS", "250"),
            ("HOTKEY_STATELESS_NUMPAD", "yes"),
            ("HOTKEY_DEBUG_PROFILES", "1"),
        ]))
        .unwrap();
        assert_eq!(config.history_size, 8);
        assert_eq!(config.key_repeat_delay, Duration::from_millis(250));
        assert!(config.stateless_numpad);
        assert!(config.debug_profiles);
    }

    #[test]
    fn test_invalid_values() {
        let err = Config::from_lookup(lookup(&[("HOTKEY_REPEAT_INTERVAL_MS", "fast")])).unwrap_err();
        assert!(err.to_string().contains("HOTKEY_REPEAT_INTERVAL_MS"));

        assert!(Config::from_lookup(lookup(&[("HOTKEY_HISTORY_SIZE", "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[("HOTKEY_DEBUG_PROFILES", "maybe")])).is_err());
    }
}
