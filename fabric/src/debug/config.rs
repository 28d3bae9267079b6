//! Logging configuration from environment variables

use std::path::PathBuf;

const DEFAULT_FILTER: &str = "fabric=info,warn";
const DEFAULT_LOG_FILE: &str = "fabric.log";

/// Logging configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// Log level filter (e.g., "fabric=debug,info")
    pub log_level: String,
    /// Directory for the rotating log file. `None` logs to stderr only.
    pub log_dir: Option<PathBuf>,
    /// File name prefix inside `log_dir`
    pub log_file_name: String,
    /// Emit JSON lines on stderr instead of the human-readable format
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_FILTER.to_string(),
            log_dir: None,
            log_file_name: DEFAULT_LOG_FILE.to_string(),
            json: false,
        }
    }
}

impl LogConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string()),
            log_dir: std::env::var("FABRIC_LOG_DIR").ok().map(PathBuf::from),
            log_file_name: std::env::var("FABRIC_LOG_FILE")
                .unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string()),
            json: std::env::var("FABRIC_LOG_JSON")
                .map(|v| v == "1")
                .unwrap_or(false),
        }
    }

    /// Path of today's log file, when file logging is enabled
    pub fn log_file(&self) -> Option<PathBuf> {
        self.log_dir.as_ref().map(|dir| dir.join(&self.log_file_name))
    }

    /// Check if debug logging is enabled
    pub fn is_debug_enabled(&self) -> bool {
        self.log_level.contains("debug") || self.log_level.contains("trace")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_log_to_stderr_only() {
        let config = LogConfig::default();
        assert!(config.log_dir.is_none());
        assert!(config.log_file().is_none());
        assert!(!config.is_debug_enabled());
    }

    #[test]
    fn test_log_file_joins_dir() {
        let config = LogConfig {
            log_dir: Some(PathBuf::from("logs")),
            ..LogConfig::default()
        };
        assert_eq!(config.log_file(), Some(PathBuf::from("logs/fabric.log")));
    }
}
