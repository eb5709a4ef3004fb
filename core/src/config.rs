//! Runtime configuration read from the environment.

use std::path::PathBuf;

use crate::error::ConfigError;
use crate::history::STORAGE_NAME;

pub const HISTORY_PATH_ENV: &str = "COURIER_HISTORY_PATH";
pub const JSON_LOGS_ENV: &str = "COURIER_JSON_LOGS";
pub const LOG_FILTER_ENV: &str = "RUST_LOG";

const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// File holding the persisted request history.
    pub history_path: PathBuf,
    /// `tracing_subscriber::EnvFilter` directive.
    pub log_filter: String,
    pub json_logs: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let history_path = match lookup(HISTORY_PATH_ENV).filter(|p| !p.is_empty()) {
            Some(path) => {
                let path = PathBuf::from(path);
                if path.file_name().is_none() {
                    return Err(ConfigError::InvalidHistoryPath { path });
                }
                path
            }
            None => default_history_path()?,
        };
        let log_filter = lookup(LOG_FILTER_ENV)
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        let json_logs = lookup(JSON_LOGS_ENV)
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        Ok(Self {
            history_path,
            log_filter,
            json_logs,
        })
    }
}

/// `<data dir>/courier/requestHistory.json`
pub fn default_history_path() -> Result<PathBuf, ConfigError> {
    dirs::data_dir()
        .map(|dir| dir.join("courier").join(format!("{STORAGE_NAME}.json")))
        .ok_or(ConfigError::NoDataDir)
}
