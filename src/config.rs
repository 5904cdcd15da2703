//! Application configuration.
//!
//! The configuration is a JSON file, by default
//! `$XDG_CONFIG_HOME/swipe-relay/config.json`.  The only tunables are the two
//! motion thresholds of the [`Interpreter`](crate::interpreter::Interpreter).
//!
//! # Example
//!
//! ```json
//! {
//!   "thresholds": {
//!     "first_motion": 25.0,
//!     "motion": 50.0
//!   }
//! }
//! ```

use crate::interpreter::Thresholds;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
///
/// Every field is optional: a minimal `{}` file is valid and falls back to
/// the compiled-in defaults.  Unknown keys are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Gesture interpreter thresholds.
    #[serde(default)]
    pub thresholds: Thresholds,
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
}

/// Resolve the config directory (`$XDG_CONFIG_HOME/swipe-relay`).
pub fn config_dir() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        format!("{}/.config", home)
    });
    PathBuf::from(base).join("swipe-relay")
}

/// Default config file path.
pub fn default_config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Error from loading or parsing a configuration file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn deserialize_full_config() {
        let json = r#"{
            "thresholds": {
                "first_motion": 10.0,
                "motion": 20.0
            }
        }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.thresholds.first_motion, 10.0);
        assert_eq!(cfg.thresholds.motion, 20.0);
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let cfg: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.thresholds.first_motion, 25.0);
        assert_eq!(cfg.thresholds.motion, 50.0);
    }

    #[test]
    fn deserialize_partial_thresholds() {
        let json = r#"{ "thresholds": { "motion": 80.0 } }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.thresholds.motion, 80.0);
        assert_eq!(cfg.thresholds.first_motion, Thresholds::default().first_motion);
    }

    #[test]
    fn unknown_top_level_keys_ignored() {
        let json = r#"{ "thresholds": {}, "future_section": { "key": 42 } }"#;
        let _cfg: Config = serde_json::from_str(json).unwrap();
    }

    #[test]
    fn load_from_file() {
        let path = std::env::temp_dir().join(format!(
            "swipe-relay-config-{}.json",
            std::process::id()
        ));
        {
            let mut f = std::fs::File::create(&path).unwrap();
            writeln!(f, r#"{{ "thresholds": {{ "first_motion": 12.5 }} }}"#).unwrap();
        }
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.thresholds.first_motion, 12.5);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn load_missing_file_is_error() {
        let err = Config::load(Path::new("/nonexistent/swipe-relay.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
