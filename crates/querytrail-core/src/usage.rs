//! Canonical usage record

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One historical query, normalized from a dialect's query log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    /// Statement category reported by the warehouse (SELECT, INSERT, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_type: Option<String>,

    /// Full SQL text
    pub query_text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    /// Logical database the query ran against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,

    /// First day of the extraction window
    pub analysis_date: NaiveDate,

    /// Whether the query was aborted before completing
    pub aborted: bool,

    /// Service the usage is attributed to
    pub service_name: String,

    /// Remaining dialect-specific columns
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
