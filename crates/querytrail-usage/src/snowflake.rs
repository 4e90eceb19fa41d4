//! Snowflake query history
//!
//! Reads `information_schema.query_history` by end-time range. When the
//! connection names no database, every database returned by
//! `SHOW DATABASES` is visited in turn.
//!
//! Reference: https://docs.snowflake.com/en/sql-reference/functions/query_history

use crate::dialect::{DatabaseEnumeration, UsageDialect};
use querytrail_core::{Row, ServiceType, TimeWindow};

/// Snowflake usage dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct SnowflakeUsage;

impl SnowflakeUsage {
    /// Marker Snowflake reports in the end time of queries that never finished
    pub const ABORTED_MARKER: &'static str = "1969";
}

fn use_database(name: &str) -> String {
    format!("USE DATABASE {}", name)
}

impl UsageDialect for SnowflakeUsage {
    fn source_type(&self) -> &'static str {
        "snowflake-usage"
    }

    fn service_type(&self) -> ServiceType {
        ServiceType::Snowflake
    }

    /// Query history is keyed by end time, so the window runs one day longer
    fn adjust_window(&self, window: TimeWindow) -> TimeWindow {
        window.extended_by_days(1)
    }

    fn usage_statement(&self, window: &TimeWindow, result_limit: u32) -> String {
        format!(
            r#"
            select query_type, query_text, user_name, database_name, schema_name,
                start_time::varchar as start_time, end_time::varchar as end_time
            from table(information_schema.query_history(
                end_time_range_start => to_timestamp_ltz('{}'),
                end_time_range_end => to_timestamp_ltz('{}'),
                RESULT_LIMIT => {}))
            "#,
            window.start_sql(),
            window.end_sql(),
            result_limit
        )
    }

    fn database_enumeration(&self) -> Option<DatabaseEnumeration> {
        Some(DatabaseEnumeration {
            list_sql: "SHOW DATABASES",
            name_index: 1,
            use_statement: use_database,
        })
    }

    fn get_aborted_status(&self, row: &Row) -> bool {
        row.get_str("end_time")
            .map(|end_time| end_time.contains(Self::ABORTED_MARKER))
            .unwrap_or(false)
    }
}
