//! Runtime configuration from `DIREWOLF_`-prefixed environment variables.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Minimum retention window we accept; anything shorter makes the replay
/// snapshot useless to a newly connected display.
const MIN_RETENTION_SECONDS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Settings {
    /// Retention window for packets and RSSI samples, in seconds.
    pub history_retention_seconds: u64,
    /// Hard cap on each history's size to prevent unbounded growth.
    pub max_history_items: usize,
    /// Seconds between heartbeat events for idle SSE clients.
    pub sse_heartbeat_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            history_retention_seconds: 3600,
            max_history_items: 10_000,
            sse_heartbeat_seconds: 15,
        }
    }
}

impl Settings {
    /// Load settings from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Settings::default();
        let settings = Settings {
            history_retention_seconds: env_parse(
                "DIREWOLF_HISTORY_RETENTION_SECONDS",
                defaults.history_retention_seconds,
            )?,
            max_history_items: env_parse(
                "DIREWOLF_MAX_HISTORY_ITEMS",
                defaults.max_history_items,
            )?,
            sse_heartbeat_seconds: env_parse(
                "DIREWOLF_SSE_HEARTBEAT_SECONDS",
                defaults.sse_heartbeat_seconds,
            )?,
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.history_retention_seconds < MIN_RETENTION_SECONDS {
            bail!(
                "DIREWOLF_HISTORY_RETENTION_SECONDS must be at least {}, got {}",
                MIN_RETENTION_SECONDS,
                self.history_retention_seconds
            );
        }
        if self.max_history_items == 0 {
            bail!("DIREWOLF_MAX_HISTORY_ITEMS must be at least 1");
        }
        if self.sse_heartbeat_seconds == 0 {
            bail!("DIREWOLF_SSE_HEARTBEAT_SECONDS must be greater than 0");
        }
        Ok(())
    }

    pub fn retention_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.history_retention_seconds as i64)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.sse_heartbeat_seconds)
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("Failed to parse {} value {:?}", key, value)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "DIREWOLF_HISTORY_RETENTION_SECONDS",
            "DIREWOLF_MAX_HISTORY_ITEMS",
            "DIREWOLF_SSE_HEARTBEAT_SECONDS",
        ] {
            unsafe { std::env::remove_var(key) };
        }
    }

    #[test]
    #[serial]
    fn test_defaults_when_env_unset() {
        clear_env();
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.history_retention_seconds, 3600);
        assert_eq!(settings.max_history_items, 10_000);
        assert_eq!(settings.sse_heartbeat_seconds, 15);
    }

    #[test]
    #[serial]
    fn test_reads_overrides_from_env() {
        clear_env();
        unsafe {
            std::env::set_var("DIREWOLF_HISTORY_RETENTION_SECONDS", "120");
            std::env::set_var("DIREWOLF_MAX_HISTORY_ITEMS", "50");
        }
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.history_retention_seconds, 120);
        assert_eq!(settings.max_history_items, 50);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_rejects_retention_below_minimum() {
        clear_env();
        unsafe { std::env::set_var("DIREWOLF_HISTORY_RETENTION_SECONDS", "30") };
        assert!(Settings::from_env().is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_rejects_unparseable_value() {
        clear_env();
        unsafe { std::env::set_var("DIREWOLF_MAX_HISTORY_ITEMS", "lots") };
        assert!(Settings::from_env().is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_rejects_zero_heartbeat() {
        clear_env();
        unsafe { std::env::set_var("DIREWOLF_SSE_HEARTBEAT_SECONDS", "0") };
        assert!(Settings::from_env().is_err());
        clear_env();
    }
}
