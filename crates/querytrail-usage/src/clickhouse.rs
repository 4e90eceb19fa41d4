//! ClickHouse query history
//!
//! Reads `system.query_log`, skipping queries that failed and queries against
//! the system tables themselves.
//!
//! Reference: https://clickhouse.com/docs/en/operations/system-tables/query_log

use crate::dialect::UsageDialect;
use querytrail_core::{value_to_string, Row, ServiceType, TimeWindow};
use serde_json::Value;

/// Database used when a query touched zero or several databases
pub const DEFAULT_DATABASE: &str = "default";

/// ClickHouse usage dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct ClickhouseUsage;

impl UsageDialect for ClickhouseUsage {
    fn source_type(&self) -> &'static str {
        "clickhouse-usage"
    }

    fn service_type(&self) -> ServiceType {
        ServiceType::Clickhouse
    }

    fn usage_statement(&self, window: &TimeWindow, _result_limit: u32) -> String {
        format!(
            r#"
            SELECT
                query_start_time AS start_time,
                query_start_time + toIntervalMillisecond(query_duration_ms) AS end_time,
                databases AS database_name,
                user AS user_name,
                FALSE AS aborted,
                query_id,
                query AS query_text,
                databases AS schema_name,
                tables
            FROM system.query_log
            WHERE start_time BETWEEN '{}' AND '{}'
              AND `type` NOT IN ('ExceptionBeforeStart', 'ExceptionWhileProcessing')
              AND query NOT LIKE '%system.%'
              AND query NOT LIKE '%query_log%'
            "#,
            window.start_sql(),
            window.end_sql()
        )
    }

    /// `databases` is an array column; a query is attributed to its database
    /// only when it touched exactly one
    fn get_database(&self, row: &Row, _active_database: Option<&str>) -> Option<String> {
        let names = match row.get("database_name") {
            None | Some(Value::Null) => return Some(DEFAULT_DATABASE.to_string()),
            Some(Value::Array(items)) => items.iter().map(value_to_string).collect(),
            Some(Value::String(text)) if text.trim().is_empty() => {
                return Some(DEFAULT_DATABASE.to_string())
            }
            Some(Value::String(text)) => parse_list_literal(text),
            Some(_) => None,
        };

        match names {
            Some(mut names) if names.len() == 1 => names.pop(),
            Some(_) => Some(DEFAULT_DATABASE.to_string()),
            None => {
                tracing::warn!(
                    "Unreadable database list {:?}; attributing query to '{}'",
                    row.get("database_name"),
                    DEFAULT_DATABASE
                );
                Some(DEFAULT_DATABASE.to_string())
            }
        }
    }
}

/// Parse a list literal such as `['finance']` or `["a", "b"]`
///
/// Returns `None` when the text is not a list of quoted strings.
pub fn parse_list_literal(text: &str) -> Option<Vec<String>> {
    if let Ok(items) = serde_json::from_str::<Vec<String>>(text) {
        return Some(items);
    }

    let inner = text.trim().strip_prefix('[')?.strip_suffix(']')?;
    let mut items = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let Some(quote) = chars.next() else {
            break;
        };
        if quote != '\'' && quote != '"' {
            return None;
        }

        let mut item = String::new();
        loop {
            match chars.next()? {
                '\\' => item.push(chars.next()?),
                c if c == quote => break,
                c => item.push(c),
            }
        }
        items.push(item);

        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            Some(',') | None => {}
            Some(_) => return None,
        }
    }

    Some(items)
}
