//! Ingestion configuration
//!
//! Where the CSV lives, how many workers load it, and the deadlines applied
//! to scheduled and manual refreshes.

use std::path::PathBuf;
use std::time::Duration;

use sales_common::{Result, SalesError};
use serde::{Deserialize, Serialize};

use crate::config::env_or;

pub const DEFAULT_CSV_FILE_PATH: &str = "./data/sales_data.csv";

pub const DEFAULT_WORKER_POOL_SIZE: usize = 10;

/// Ceiling for scheduled runs (10 minutes)
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 600;

/// Ceiling for runs started over HTTP (5 minutes)
pub const DEFAULT_MANUAL_TIMEOUT_SECS: u64 = 300;

pub const DEFAULT_LOG_LIMIT: usize = 10;

/// Main ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub csv_file_path: PathBuf,
    pub worker_pool_size: usize,
    pub run_timeout_secs: u64,
    pub manual_timeout_secs: u64,
    /// Interval of a job created at startup, if any
    pub refresh_interval: Option<String>,
    /// Default page size of the run log endpoint
    pub log_limit: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            csv_file_path: PathBuf::from(DEFAULT_CSV_FILE_PATH),
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
            run_timeout_secs: DEFAULT_RUN_TIMEOUT_SECS,
            manual_timeout_secs: DEFAULT_MANUAL_TIMEOUT_SECS,
            refresh_interval: None,
            log_limit: DEFAULT_LOG_LIMIT,
        }
    }
}

impl IngestConfig {
    /// Load ingestion configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let config = Self {
            csv_file_path: std::env::var("CSV_FILE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CSV_FILE_PATH)),
            worker_pool_size: env_or("WORKER_POOL_SIZE", DEFAULT_WORKER_POOL_SIZE),
            run_timeout_secs: env_or("REFRESH_RUN_TIMEOUT_SECS", DEFAULT_RUN_TIMEOUT_SECS),
            manual_timeout_secs: env_or("MANUAL_REFRESH_TIMEOUT_SECS", DEFAULT_MANUAL_TIMEOUT_SECS),
            refresh_interval: std::env::var("REFRESH_INTERVAL")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            log_limit: env_or("REFRESH_LOG_LIMIT", DEFAULT_LOG_LIMIT),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.worker_pool_size == 0 {
            return Err(SalesError::invalid_env("WORKER_POOL_SIZE", "0", "must be at least 1"));
        }
        if self.run_timeout_secs == 0 {
            return Err(SalesError::invalid_env(
                "REFRESH_RUN_TIMEOUT_SECS",
                "0",
                "must be greater than 0",
            ));
        }
        if self.manual_timeout_secs == 0 {
            return Err(SalesError::invalid_env(
                "MANUAL_REFRESH_TIMEOUT_SECS",
                "0",
                "must be greater than 0",
            ));
        }
        if self.csv_file_path.as_os_str().is_empty() {
            return Err(SalesError::Config("CSV_FILE_PATH cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn manual_timeout(&self) -> Duration {
        Duration::from_secs(self.manual_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "CSV_FILE_PATH",
        "WORKER_POOL_SIZE",
        "REFRESH_RUN_TIMEOUT_SECS",
        "MANUAL_REFRESH_TIMEOUT_SECS",
        "REFRESH_INTERVAL",
        "REFRESH_LOG_LIMIT",
    ];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = IngestConfig::from_env().unwrap();

        assert_eq!(config.csv_file_path, PathBuf::from("./data/sales_data.csv"));
        assert_eq!(config.worker_pool_size, 10);
        assert_eq!(config.run_timeout(), Duration::from_secs(600));
        assert_eq!(config.manual_timeout(), Duration::from_secs(300));
        assert_eq!(config.refresh_interval, None);
        assert_eq!(config.log_limit, 10);
    }

    #[test]
    #[serial]
    fn test_reads_overrides() {
        clear_env();
        std::env::set_var("CSV_FILE_PATH", "/srv/sales.csv");
        std::env::set_var("WORKER_POOL_SIZE", "3");
        std::env::set_var("REFRESH_INTERVAL", " 1h ");
        std::env::set_var("REFRESH_LOG_LIMIT", "many");

        let config = IngestConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.csv_file_path, PathBuf::from("/srv/sales.csv"));
        assert_eq!(config.worker_pool_size, 3);
        assert_eq!(config.refresh_interval.as_deref(), Some("1h"));
        assert_eq!(config.log_limit, DEFAULT_LOG_LIMIT);
    }

    #[test]
    #[serial]
    fn test_zero_workers_is_a_config_error() {
        clear_env();
        std::env::set_var("WORKER_POOL_SIZE", "0");

        let err = IngestConfig::from_env().unwrap_err();
        clear_env();

        assert!(matches!(err, SalesError::Config(_)));
        assert!(err.to_string().contains("WORKER_POOL_SIZE"));
    }
}
