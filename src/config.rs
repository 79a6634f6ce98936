//! Application configuration.
//!
//! The configuration is loaded from a JSON file, either the path passed on
//! the command line (`--config <path>`) or the default location
//! `$XDG_CONFIG_HOME/wmsel/config.json` (`~/.config` when the variable is
//! unset). Every section falls back to compiled-in defaults, so a missing
//! or minimal `{}` file is valid.
//!
//! # Example
//!
//! ```json
//! {
//!   "emulator": {
//!     "program": "urxvt",
//!     "args": ["+sb", "-pe", "destroy_on_focus_out"]
//!   },
//!   "session": {
//!     "start_timeout_ms": 5000,
//!     "poll_interval_ms": 5
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Terminal emulator used to host the UI.
    #[serde(default)]
    pub emulator: EmulatorConfig,

    /// Emulator session timing settings.
    #[serde(default)]
    pub session: SessionConfig,
}

/// Terminal emulator selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmulatorConfig {
    /// Program to spawn. It must accept the urxvt-style flags `-pty-fd`,
    /// `-title` and `-geometry`.
    pub program: String,
    /// Extra arguments appended after the fixed ones.
    pub args: Vec<String>,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            program: "urxvt".to_owned(),
            // No scrollbar; the UI owns the whole window.
            args: vec!["+sb".to_owned()],
        }
    }
}

/// Emulator session timing settings.
///
/// All durations are in **milliseconds**.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// How long to wait for the emulator to attach to the pty before
    /// giving up and killing it (ms).
    pub start_timeout_ms: u64,
    /// Delay between readiness probes while waiting (ms).
    pub poll_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            start_timeout_ms: 5000,
            poll_interval_ms: 5,
        }
    }
}

impl SessionConfig {
    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Load from the default location; a missing file is not an error and
    /// yields the defaults.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    fn default_path() -> Option<PathBuf> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
        Some(base.join("wmsel").join("config.json"))
    }
}

/// Error from loading or parsing a configuration file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_full_config() {
        let json = r#"{
            "emulator": {
                "program": "xterm",
                "args": ["-fa", "Monospace"]
            },
            "session": {
                "start_timeout_ms": 1500,
                "poll_interval_ms": 10
            }
        }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.emulator.program, "xterm");
        assert_eq!(cfg.emulator.args, vec!["-fa", "Monospace"]);
        assert_eq!(cfg.session.start_timeout_ms, 1500);
        assert_eq!(cfg.session.poll_interval_ms, 10);
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let cfg: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.emulator.program, "urxvt");
        assert_eq!(cfg.emulator.args, vec!["+sb"]);
        assert_eq!(cfg.session.start_timeout_ms, 5000);
        assert_eq!(cfg.session.poll_interval_ms, 5);
    }

    #[test]
    fn deserialize_partial_emulator() {
        let json = r#"{ "emulator": { "program": "alacritty" } }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.emulator.program, "alacritty");
        // Args were not given, so the default applies.
        assert_eq!(cfg.emulator.args, EmulatorConfig::default().args);
    }

    #[test]
    fn unknown_top_level_keys_ignored() {
        let json = r#"{ "session": {}, "future_section": { "key": 42 } }"#;
        // Should not fail; unknown keys are silently ignored.
        let _cfg: Config = serde_json::from_str(json).unwrap();
    }

    #[test]
    fn millisecond_fields_convert_to_durations() {
        let session = SessionConfig {
            start_timeout_ms: 1500,
            poll_interval_ms: 7,
        };
        assert_eq!(session.start_timeout(), Duration::from_millis(1500));
        assert_eq!(session.poll_interval(), Duration::from_millis(7));
    }
}
