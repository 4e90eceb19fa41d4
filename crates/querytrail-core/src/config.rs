//! Workflow configuration (querytrail.toml / querytrail.json)

use crate::descriptor::ConnectionDescriptor;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Usage extraction settings for one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageConfig {
    /// Number of days of query history to extract
    #[serde(default = "default_query_log_duration")]
    pub query_log_duration: u32,

    /// Upper bound on rows returned by dialects that support a result limit
    #[serde(default = "default_result_limit")]
    pub result_limit: u32,

    /// Read queries from a CSV file instead of the warehouse query history
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_log_file_path: Option<PathBuf>,
}

fn default_query_log_duration() -> u32 {
    1
}

fn default_result_limit() -> u32 {
    1000
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            query_log_duration: default_query_log_duration(),
            result_limit: default_result_limit(),
            query_log_file_path: None,
        }
    }
}

/// One ingestion source: which extractor to run and how to connect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    /// Extractor type, e.g. `snowflake-usage`
    #[serde(rename = "type")]
    pub source_type: String,

    /// Name of the service the extracted usage is attributed to
    pub service_name: String,

    /// Connection descriptor
    pub service_connection: ConnectionDescriptor,

    #[serde(default)]
    pub source_config: UsageConfig,
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub source: SourceConfig,
}

impl WorkflowConfig {
    /// Load config from a file; `.json` files are read as JSON, anything else as TOML
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_toml(&contents),
        }
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load config from JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}
