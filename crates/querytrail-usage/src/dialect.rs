//! Dialect adapters for usage extraction
//!
//! A dialect knows which query-history statement to run for its warehouse
//! and how to interpret the rows it returns.

use crate::clickhouse::ClickhouseUsage;
use crate::error::UsageError;
use crate::snowflake::SnowflakeUsage;
use querytrail_core::{Row, ServiceType, TimeWindow};

/// How a dialect enumerates and switches logical databases
#[derive(Debug, Clone, Copy)]
pub struct DatabaseEnumeration {
    /// Statement listing databases
    pub list_sql: &'static str,

    /// Column position of the database name in the listing
    pub name_index: usize,

    /// Builds the statement switching the session to a database
    pub use_statement: fn(&str) -> String,
}

/// Query-history extraction for one warehouse dialect
pub trait UsageDialect: Send + Sync {
    /// Workflow source type, e.g. `snowflake-usage`
    fn source_type(&self) -> &'static str;

    /// Connection variant this dialect accepts
    fn service_type(&self) -> ServiceType;

    /// Adjust the extraction window before the statement is rendered
    fn adjust_window(&self, window: TimeWindow) -> TimeWindow {
        window
    }

    /// Query-history statement for `window`
    fn usage_statement(&self, window: &TimeWindow, result_limit: u32) -> String;

    /// Per-database iteration, used when the connection names no database
    fn database_enumeration(&self) -> Option<DatabaseEnumeration> {
        None
    }

    /// Database a row is attributed to
    ///
    /// Defaults to the row's `database_name`, falling back to the database
    /// the connection is currently on.
    fn get_database(&self, row: &Row, active_database: Option<&str>) -> Option<String> {
        row.get_str("database_name")
            .filter(|name| !name.is_empty())
            .or_else(|| active_database.map(str::to_string))
    }

    /// Whether a row describes an aborted query
    fn get_aborted_status(&self, row: &Row) -> bool {
        row.get_bool("aborted").unwrap_or(false)
    }
}

/// Dialect for a workflow source type
pub fn dialect_for(source_type: &str) -> Result<Box<dyn UsageDialect>, UsageError> {
    let dialect: Box<dyn UsageDialect> = match source_type.to_ascii_lowercase().as_str() {
        "snowflake-usage" => Box::new(SnowflakeUsage),
        "clickhouse-usage" => Box::new(ClickhouseUsage),
        _ => return Err(UsageError::UnknownSourceType(source_type.to_string())),
    };
    Ok(dialect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dialect_for() {
        assert_eq!(dialect_for("snowflake-usage").unwrap().service_type(), ServiceType::Snowflake);
        assert_eq!(dialect_for("Clickhouse-Usage").unwrap().service_type(), ServiceType::Clickhouse);
        assert!(matches!(
            dialect_for("redshift-usage"),
            Err(UsageError::UnknownSourceType(name)) if name == "redshift-usage"
        ));
    }

    struct Plain;

    impl UsageDialect for Plain {
        fn source_type(&self) -> &'static str {
            "plain-usage"
        }

        fn service_type(&self) -> ServiceType {
            ServiceType::Postgres
        }

        fn usage_statement(&self, _window: &TimeWindow, _result_limit: u32) -> String {
            "SELECT 1".to_string()
        }
    }

    #[test]
    fn test_default_get_database() {
        let with_name = Row::from_pairs([("database_name", json!("SALES"))]);
        let empty = Row::from_pairs([("database_name", json!(""))]);
        let missing = Row::from_pairs([("query_text", json!("select 1"))]);

        assert_eq!(Plain.get_database(&with_name, Some("OTHER")).as_deref(), Some("SALES"));
        assert_eq!(Plain.get_database(&empty, Some("OTHER")).as_deref(), Some("OTHER"));
        assert_eq!(Plain.get_database(&missing, None), None);
    }

    #[test]
    fn test_default_aborted_status() {
        assert!(Plain.get_aborted_status(&Row::from_pairs([("aborted", json!(true))])));
        assert!(!Plain.get_aborted_status(&Row::from_pairs([("aborted", json!(0))])));
        assert!(!Plain.get_aborted_status(&Row::from_pairs([("query_text", json!("x"))])));
    }
}
