//! Configuration management for fopgate
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use fopgate::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `FOPGATE__<section>__<key>`
//!
//! Examples:
//! - `FOPGATE__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `FOPGATE__SERVER__OPERATION_PREFIX=qn-`
//! - `FOPGATE__HANDLERS__UNZIP__MAX_FILE_COUNT=50`
//!
//! S3 credentials come only from `S3_ACCESS_KEY`/`S3_SECRET_KEY` (or the AWS
//! equivalents).
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/fopgate.toml`.
//! This can be overridden using the `FOPGATE_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    AmergeConfig, Config, FetchConfig, HandlersConfig, Html2ImageConfig, Html2PdfConfig,
    ImageCompConfig, MkzipConfig, RoundPicConfig, ServerConfig, StorageConfig, StorageProvider,
    UnzipConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`FOPGATE__*`)
    /// 2. TOML file (default: `config/fopgate.toml`)
    /// 3. Default values
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[server]\noperation_prefix = \"\"\n").unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.handlers.imagecomp.max_url_count, 1000);
    }

    #[test]
    fn test_validation_catches_oversized_payload() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[server]\nmax_payload_bytes = \"50MB\"\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::PayloadSizeExceedsLimit { .. })
        ));
    }

    #[test]
    fn test_full_config_example() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "0.0.0.0:8080"
request_timeout_secs = 45
max_payload_bytes = "256KB"
operation_prefix = "ufop-"

[storage]
provider = "local"
root = "/var/lib/fopgate"

[fetch]
connect_timeout_secs = 5
request_timeout_secs = 120
user_agent = "fopgate-test"

[handlers.mkzip]
max_file_count = 200
max_file_length = "50MB"

[handlers.unzip]
max_zip_file_length = "2GB"
max_file_count = 20
max_file_length = "200MB"

[handlers.amerge]
ffmpeg_path = "/usr/local/bin/ffmpeg"

[handlers.html2image]
max_page_size = "5MB"

[handlers.imagecomp]
max_url_count = 64
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();

        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.server.request_timeout_secs, 45);
        assert_eq!(config.server.max_payload_bytes, ByteSize::kib(256));
        assert_eq!(config.storage.root.to_string_lossy(), "/var/lib/fopgate");
        assert_eq!(config.fetch.user_agent, "fopgate-test");
        assert_eq!(config.handlers.mkzip.max_file_count, 200);
        assert_eq!(config.handlers.unzip.max_zip_file_length, ByteSize::gib(2));
        assert_eq!(config.handlers.html2image.max_page_size, ByteSize::mib(5));
        assert_eq!(config.handlers.imagecomp.max_url_count, 64);
        assert_eq!(config.handlers.html2pdf.max_copies, 10);
    }
}
