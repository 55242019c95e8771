//! Configuration for the extraction client and durable storage
//!
//! Values can be deserialized from any serde format or read from the
//! environment with [`LedgerConfig::from_env`].

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::{LedgerError, LedgerResult};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Extraction service connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Base URL of the extraction API, without trailing slash
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token sent with every request (optional)
    #[serde(default)]
    pub access_token: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            access_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ExtractionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_base_url() -> String {
    "http://localhost:3001/api".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

/// Durable storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the JSON snapshot files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl LedgerConfig {
    /// Build configuration from `LEDGER_*` environment variables, falling
    /// back to defaults for anything unset
    pub fn from_env() -> LedgerResult<Self> {
        let mut config = Self::default();

        if let Ok(url) = env::var("LEDGER_API_URL") {
            config.extraction.base_url = url;
        }
        config.extraction.access_token = env::var("LEDGER_ACCESS_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());
        if let Ok(raw) = env::var("LEDGER_EXTRACTION_TIMEOUT_SECS") {
            config.extraction.timeout_secs = raw.parse().map_err(|_| {
                LedgerError::Config(format!(
                    "LEDGER_EXTRACTION_TIMEOUT_SECS must be a whole number, got '{}'",
                    raw
                ))
            })?;
        }
        if let Ok(dir) = env::var("LEDGER_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for obviously unusable values
    pub fn validate(&self) -> LedgerResult<()> {
        let url = self.extraction.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(LedgerError::Config(format!(
                "Extraction base URL must be http(s), got '{}'",
                url
            )));
        }
        if self.extraction.timeout_secs == 0 {
            return Err(LedgerError::Config(
                "Extraction timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config: LedgerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.extraction.base_url, "http://localhost:3001/api");
        assert_eq!(config.extraction.timeout_secs, 60);
        assert!(config.extraction.access_token.is_none());
        assert_eq!(config.storage.data_dir, PathBuf::from("./data"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_document_keeps_other_defaults() {
        let config: LedgerConfig =
            serde_json::from_str(r#"{"extraction": {"access_token": "t0k"}}"#).unwrap();
        assert_eq!(config.extraction.access_token.as_deref(), Some("t0k"));
        assert_eq!(config.extraction.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = LedgerConfig::default();
        config.extraction.base_url = "ftp://example".to_string();
        assert!(matches!(config.validate(), Err(LedgerError::Config(_))));

        let mut config = LedgerConfig::default();
        config.extraction.timeout_secs = 0;
        assert!(config.validate().is_err());
    }
}
