// File: ./src/config.rs
// Handles configuration loading, saving, and defaults.
use crate::context::AppContext;
use crate::model::FireWindow;
use crate::storage::LocalStorage;
use anyhow::{Error, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

fn default_time() -> String {
    "09:00".to_string()
}
fn default_lead_mins() -> u32 {
    10
}
fn default_tick_secs() -> u64 {
    60
}
fn default_window_secs() -> u32 {
    crate::model::matcher::DEFAULT_FIRE_WINDOW_SECS
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Time given to a parsed date that came without one. Format "HH:MM".
    #[serde(default = "default_time")]
    pub default_time: String,

    /// Quick-created alarms ring this many minutes before the parsed time.
    #[serde(default = "default_lead_mins")]
    pub reminder_lead_mins: u32,

    #[serde(default = "default_tick_secs")]
    pub tick_interval_secs: u64,

    #[serde(default = "default_window_secs")]
    pub fire_window_secs: u32,

    /// Sleep to each minute boundary instead of polling. Drops the fire window.
    #[serde(default)]
    pub minute_aligned: bool,

    #[serde(default = "default_true")]
    pub notifications: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_time: default_time(),
            reminder_lead_mins: default_lead_mins(),
            tick_interval_secs: default_tick_secs(),
            fire_window_secs: default_window_secs(),
            minute_aligned: false,
            notifications: true,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load the configuration from disk using an explicit context.
    /// Returns a contextualized error if reading or parsing fails.
    pub fn load(ctx: &dyn AppContext) -> Result<Self> {
        let path = ctx.get_config_file_path()?;

        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found"));
        }

        let contents = fs::read_to_string(&path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;

        let config: Config = toml::from_str(&contents).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
        })?;

        Ok(config)
    }

    /// Like `load`, but a missing file yields the defaults.
    pub fn load_or_default(ctx: &dyn AppContext) -> Result<Self> {
        match Self::load(ctx) {
            Ok(cfg) => Ok(cfg),
            Err(e) if Self::is_missing_config_error(&e) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Whether `err` means the config file does not exist, as opposed to a
    /// syntax or permission problem. Checks the explicit message first, then
    /// any `io::ErrorKind::NotFound` in the error chain.
    pub fn is_missing_config_error(err: &Error) -> bool {
        if err.to_string().contains("Config file not found") {
            return true;
        }

        for cause in err.chain() {
            if let Some(io_err) = cause.downcast_ref::<std::io::Error>()
                && io_err.kind() == std::io::ErrorKind::NotFound
            {
                return true;
            }
        }

        false
    }

    pub fn save(&self, ctx: &dyn AppContext) -> Result<()> {
        let path = ctx.get_config_file_path()?;
        LocalStorage::with_lock(&path, || {
            let toml_str = toml::to_string_pretty(self)?;
            LocalStorage::atomic_write(&path, toml_str)?;
            Ok(())
        })?;
        Ok(())
    }

    /// Parsed `default_time`, falling back to 09:00 when malformed.
    pub fn default_time(&self) -> NaiveTime {
        NaiveTime::parse_from_str(&self.default_time, "%H:%M").unwrap_or_else(|_| {
            log::warn!(
                "Invalid default_time '{}' in config, using 09:00",
                self.default_time
            );
            crate::model::parser::default_time()
        })
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs.max(1))
    }

    pub fn fire_window(&self) -> FireWindow {
        if self.minute_aligned {
            FireWindow::WholeMinute
        } else {
            FireWindow::LeadingSeconds(self.fire_window_secs)
        }
    }

    pub fn log_level(&self) -> log::LevelFilter {
        self.log_level
            .parse::<log::LevelFilter>()
            .unwrap_or(log::LevelFilter::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TestContext;

    #[test]
    fn test_missing_file_is_detected() {
        let ctx = TestContext::new();
        let err = Config::load(&ctx).unwrap_err();
        assert!(Config::is_missing_config_error(&err));
        assert_eq!(Config::load_or_default(&ctx).unwrap(), Config::default());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let ctx = TestContext::new();
        let path = ctx.get_config_file_path().unwrap();
        fs::write(&path, "minute_aligned = true\ndefault_time = \"08:30\"\n").unwrap();

        let cfg = Config::load(&ctx).unwrap();
        assert!(cfg.minute_aligned);
        assert_eq!(cfg.reminder_lead_mins, 10);
        assert_eq!(cfg.fire_window(), FireWindow::WholeMinute);
        assert_eq!(cfg.default_time(), NaiveTime::from_hms_opt(8, 30, 0).unwrap());
    }

    #[test]
    fn test_syntax_error_is_not_missing() {
        let ctx = TestContext::new();
        let path = ctx.get_config_file_path().unwrap();
        fs::write(&path, "tick_interval_secs = [").unwrap();

        let err = Config::load(&ctx).unwrap_err();
        assert!(!Config::is_missing_config_error(&err));
        assert!(Config::load_or_default(&ctx).is_err());
    }

    #[test]
    fn test_save_round_trip() {
        let ctx = TestContext::new();
        let cfg = Config {
            reminder_lead_mins: 5,
            ..Config::default()
        };
        cfg.save(&ctx).unwrap();
        assert_eq!(Config::load(&ctx).unwrap(), cfg);
    }
}
