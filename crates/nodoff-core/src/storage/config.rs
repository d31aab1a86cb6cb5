//! TOML-based preferences.
//!
//! Stores the sleep-timer and progress preferences:
//! - Fade-out window and base volume
//! - Shake-to-extend recovery
//! - Quick-pick timer presets
//! - "Time adjusts with speed" flags
//! - Auto timer mode and daily window
//!
//! Configuration is stored at `~/.config/nodoff/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::collaborators::PreferencesStore;
use crate::error::{ConfigError, CoreError, Result};
use crate::timer::{AutoTimerMode, DailyWindow, TimeOfDay, TimerSelection};

/// Sleep timer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepTimerConfig {
    #[serde(default = "default_fade_out_window")]
    pub fade_out_window_secs: u64,
    #[serde(default = "default_base_volume")]
    pub base_volume: f64,
    #[serde(default = "default_true")]
    pub shake_recovery_enabled: bool,
    /// Quick-pick durations in minutes.
    #[serde(default = "default_presets")]
    pub presets_min: Vec<u64>,
}

/// Progress display configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressConfig {
    #[serde(default = "default_true")]
    pub apply_speed_to_elapsed: bool,
    #[serde(default = "default_true")]
    pub apply_speed_to_total_remaining: bool,
}

/// Auto timer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoTimerConfig {
    #[serde(default = "default_window_start")]
    pub window_start: TimeOfDay,
    #[serde(default = "default_window_end")]
    pub window_end: TimeOfDay,
    /// Kept last: it serializes as a TOML table.
    #[serde(default)]
    pub mode: AutoTimerMode,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/nodoff/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub sleep_timer: SleepTimerConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub auto_timer: AutoTimerConfig,
}

// Default functions
fn default_fade_out_window() -> u64 {
    30
}
fn default_base_volume() -> f64 {
    1.0
}
fn default_true() -> bool {
    true
}
fn default_presets() -> Vec<u64> {
    vec![5, 10, 15, 30, 45, 60]
}
fn default_window_start() -> TimeOfDay {
    DailyWindow::default().start
}
fn default_window_end() -> TimeOfDay {
    DailyWindow::default().end
}

impl Default for SleepTimerConfig {
    fn default() -> Self {
        Self {
            fade_out_window_secs: default_fade_out_window(),
            base_volume: default_base_volume(),
            shake_recovery_enabled: true,
            presets_min: default_presets(),
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            apply_speed_to_elapsed: true,
            apply_speed_to_total_remaining: true,
        }
    }
}

impl Default for AutoTimerConfig {
    fn default() -> Self {
        Self {
            window_start: default_window_start(),
            window_end: default_window_end(),
            mode: AutoTimerMode::Off,
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    /// Default location, `~/.config/nodoff/config.toml`.
    pub fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults there if it does not exist yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(err) => Err(CoreError::Io(err)),
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key, in memory only.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the result fails validation.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let volume = self.sleep_timer.base_volume;
        if !(0.0..=1.0).contains(&volume) {
            return Err(ConfigError::InvalidValue {
                key: "sleep_timer.base_volume".into(),
                message: format!("{volume} is outside 0.0..=1.0"),
            });
        }
        if self.sleep_timer.presets_min.iter().any(|m| *m == 0) {
            return Err(ConfigError::InvalidValue {
                key: "sleep_timer.presets_min".into(),
                message: "presets must be at least one minute".into(),
            });
        }
        Ok(())
    }

    pub fn auto_window(&self) -> DailyWindow {
        DailyWindow::new(self.auto_timer.window_start, self.auto_timer.window_end)
    }

    /// Quick picks: the configured durations followed by "end of chapter".
    pub fn presets(&self) -> Vec<TimerSelection> {
        self.sleep_timer
            .presets_min
            .iter()
            .map(|min| TimerSelection::Preset { secs: min.saturating_mul(60) })
            .chain(std::iter::once(TimerSelection::Chapters { count: 1 }))
            .collect()
    }
}

impl PreferencesStore for Config {
    fn fade_out_window_secs(&self) -> u64 {
        self.sleep_timer.fade_out_window_secs
    }

    fn base_volume_level(&self) -> f64 {
        self.sleep_timer.base_volume
    }

    fn shake_recovery_enabled(&self) -> bool {
        self.sleep_timer.shake_recovery_enabled
    }

    fn apply_speed_to_elapsed(&self) -> bool {
        self.progress.apply_speed_to_elapsed
    }

    fn apply_speed_to_total_remaining(&self) -> bool {
        self.progress.apply_speed_to_total_remaining
    }

    fn auto_timer_mode(&self) -> AutoTimerMode {
        self.auto_timer.mode
    }

    fn auto_timer_window(&self) -> DailyWindow {
        self.auto_window()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_default_values() {
        let cfg = Config::default();
        assert_eq!(cfg.sleep_timer.fade_out_window_secs, 30);
        assert_eq!(cfg.sleep_timer.base_volume, 1.0);
        assert!(cfg.sleep_timer.shake_recovery_enabled);
        assert!(cfg.progress.apply_speed_to_elapsed);
        assert_eq!(cfg.auto_timer.mode, AutoTimerMode::Off);
        assert_eq!(cfg.auto_timer.window_start.to_string(), "22:00");
        assert_eq!(cfg.auto_timer.window_end.to_string(), "06:00");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [sleep_timer]
            fade_out_window_secs = 10

            [auto_timer]
            window_start = "23:00"
            mode = { kind = "chapter_count", count = 2 }
            "#,
        )
        .unwrap();
        assert_eq!(cfg.sleep_timer.fade_out_window_secs, 10);
        assert_eq!(cfg.sleep_timer.base_volume, 1.0);
        assert_eq!(cfg.auto_timer.mode, AutoTimerMode::ChapterCount { count: 2 });
        assert_eq!(cfg.auto_timer.window_end.to_string(), "06:00");
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("sleep_timer.fade_out_window_secs").as_deref(), Some("30"));
        assert_eq!(cfg.get("auto_timer.window_start").as_deref(), Some("22:00"));
        assert_eq!(cfg.get("progress.apply_speed_to_elapsed").as_deref(), Some("true"));
        assert!(cfg.get("sleep_timer.missing_key").is_none());
    }

    #[test]
    fn set_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.set("sleep_timer.shake_recovery_enabled", "false").unwrap();
        cfg.set("sleep_timer.base_volume", "0.6").unwrap();
        cfg.set("auto_timer.window_end", "07:30").unwrap();
        cfg.set("auto_timer.mode", r#"{"kind":"duration","secs":1200}"#).unwrap();
        assert!(!cfg.sleep_timer.shake_recovery_enabled);
        assert_eq!(cfg.sleep_timer.base_volume, 0.6);
        assert_eq!(cfg.auto_timer.window_end.to_string(), "07:30");
        assert_eq!(cfg.auto_timer.mode, AutoTimerMode::Duration { secs: 1200 });
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("sleep_timer.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn set_rejects_invalid_values_and_keeps_old_state() {
        let mut cfg = Config::default();
        assert!(cfg.set("sleep_timer.shake_recovery_enabled", "maybe").is_err());
        assert!(cfg.set("sleep_timer.base_volume", "3").is_err());
        assert!(cfg.set("auto_timer.window_start", "25:00").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn load_from_writes_defaults_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.set("sleep_timer.fade_out_window_secs", "45").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().sleep_timer.fade_out_window_secs, 45);
    }

    #[test]
    fn load_from_rejects_out_of_range_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[sleep_timer]\nbase_volume = 2.0\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn presets_end_with_end_of_chapter() {
        let presets = Config::default().presets();
        assert_eq!(presets.first(), Some(&TimerSelection::Preset { secs: 300 }));
        assert_eq!(presets.last(), Some(&TimerSelection::Chapters { count: 1 }));
        assert_eq!(presets.len(), 7);
    }
}
