//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MBOXSCAN_CONFIG` (environment variable)
//! 2. `~/.config/mboxscan/config.toml` (Linux/macOS)
//!    `%APPDATA%\mboxscan\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::parser::mbox::{MAX_MESSAGE_SIZE, READ_BUFFER_SIZE};
use crate::search::PatternOptions;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Search defaults.
    pub search: SearchConfig,
    /// Performance tuning.
    pub performance: PerformanceConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Also write logs to `mboxscan.log` in the cache directory.
    pub log_to_file: bool,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// Search defaults, overridable on the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Case-insensitive matching unless `--case-sensitive` is given.
    pub ignore_case: bool,
    /// Treat patterns as literal strings.
    pub fixed_strings: bool,
}

/// Performance tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Read buffer size in bytes (default: 1048576 = 1 MB).
    pub read_buffer_size: usize,
    /// Maximum message size in bytes (default: 268435456 = 256 MB).
    pub max_message_size: usize,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_to_file: false,
            cache_dir: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            ignore_case: true,
            fixed_strings: false,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: READ_BUFFER_SIZE,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}

impl SearchConfig {
    /// Pattern options from the configured defaults.
    pub fn pattern_options(&self) -> PatternOptions {
        PatternOptions {
            ignore_case: self.ignore_case,
            literal: self.fixed_strings,
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MBOXSCAN_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mboxscan").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mboxscan")
}

/// File name of the log written when `general.log_to_file` is set.
pub const LOG_FILE_NAME: &str = "mboxscan.log";

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join(LOG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert!(!cfg.general.log_to_file);
        assert!(cfg.search.ignore_case);
        assert!(!cfg.search.fixed_strings);
        assert_eq!(cfg.performance.read_buffer_size, 1024 * 1024);
        assert_eq!(cfg.performance.max_message_size, 256 * 1024 * 1024);
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let mut cfg = Config::default();
        cfg.search.fixed_strings = true;
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert!(parsed.search.fixed_strings);
        assert_eq!(
            parsed.performance.read_buffer_size,
            cfg.performance.read_buffer_size
        );
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[search]
ignore_case = false

[performance]
read_buffer_size = 65536
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert!(!cfg.search.ignore_case);
        assert_eq!(cfg.performance.read_buffer_size, 65536);
        assert_eq!(cfg.performance.max_message_size, MAX_MESSAGE_SIZE);
        assert_eq!(cfg.general.log_level, "warn");
    }

    #[test]
    fn test_pattern_options_from_config() {
        let cfg = SearchConfig {
            ignore_case: false,
            fixed_strings: true,
        };
        let opts = cfg.pattern_options();
        assert!(!opts.ignore_case);
        assert!(opts.literal);
    }

    #[test]
    fn test_log_file_in_cache_dir_override() {
        let mut cfg = Config::default();
        cfg.general.cache_dir = Some(PathBuf::from("/tmp/mboxscan-test"));
        assert_eq!(
            log_file_path(&cfg),
            PathBuf::from("/tmp/mboxscan-test/mboxscan.log")
        );
    }
}
