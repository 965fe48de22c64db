use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::CONDITION_LIMIT;

/// What the ingestion buffer does when it is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Wait until the next flush frees space
    Block,
    /// Evict the oldest queued record to make room
    DropOldest,
    /// Refuse the submission (HTTP 503)
    Reject,
}

fn default_api_port() -> u16 {
    3000
}

fn default_database_path() -> PathBuf {
    PathBuf::from("tmp/condition.sqlite")
}

fn default_max_connections() -> u32 {
    10
}

fn default_flush_interval_ms() -> u64 {
    1000
}

fn default_trend_interval_ms() -> u64 {
    5000
}

fn default_condition_page_limit() -> u32 {
    CONDITION_LIMIT
}

fn default_buffer_capacity() -> usize {
    100_000
}

fn default_overflow_policy() -> OverflowPolicy {
    OverflowPolicy::Block
}

fn default_user_header() -> String {
    "x-jia-user-id".to_string()
}

/// Service configuration file structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// API server port (default: 3000)
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// SQLite database file (default: tmp/condition.sqlite)
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Maximum pooled database connections (default: 10)
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Period of the buffer flush worker in milliseconds (default: 1000)
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// Period of the trend recomputation in milliseconds (default: 5000)
    #[serde(default = "default_trend_interval_ms")]
    pub trend_interval_ms: u64,
    /// Maximum conditions returned by the condition list endpoint (default: 20)
    #[serde(default = "default_condition_page_limit")]
    pub condition_page_limit: u32,
    /// Maximum records held by the ingestion buffer (default: 100000)
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// block, drop-oldest or reject (default: block)
    #[serde(default = "default_overflow_policy")]
    pub overflow_policy: OverflowPolicy,
    /// Request header carrying the user id validated upstream (default: x-jia-user-id)
    #[serde(default = "default_user_header")]
    pub user_header: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            database_path: default_database_path(),
            max_connections: default_max_connections(),
            flush_interval_ms: default_flush_interval_ms(),
            trend_interval_ms: default_trend_interval_ms(),
            condition_page_limit: default_condition_page_limit(),
            buffer_capacity: default_buffer_capacity(),
            overflow_policy: default_overflow_policy(),
            user_header: default_user_header(),
        }
    }
}

impl ServiceConfig {
    /// Read and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: ServiceConfig = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.flush_interval_ms == 0 {
            return Err("flush_interval_ms must be greater than 0".to_string());
        }
        if self.trend_interval_ms == 0 {
            return Err("trend_interval_ms must be greater than 0".to_string());
        }
        if self.trend_interval_ms < self.flush_interval_ms {
            return Err(format!(
                "trend_interval_ms ({}) must not be shorter than flush_interval_ms ({})",
                self.trend_interval_ms, self.flush_interval_ms
            ));
        }
        if self.condition_page_limit == 0 {
            return Err("condition_page_limit must be greater than 0".to_string());
        }
        if self.buffer_capacity == 0 {
            return Err("buffer_capacity must be greater than 0".to_string());
        }
        if self.max_connections == 0 {
            return Err("max_connections must be greater than 0".to_string());
        }
        if axum::http::HeaderName::from_bytes(self.user_header.as_bytes()).is_err() {
            return Err(format!("user_header '{}' is not a valid header name", self.user_header));
        }
        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn trend_interval(&self) -> Duration {
        Duration::from_millis(self.trend_interval_ms)
    }
}
