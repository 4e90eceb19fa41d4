//! Test fixtures for usage extraction

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use querytrail_core::{Row, SourceConfig, TimeWindow, UsageConfig};
use serde_json::{json, Value};

/// Source config for `source_type` over the given connection JSON
pub fn source_config(source_type: &str, connection: Value) -> SourceConfig {
    SourceConfig {
        source_type: source_type.to_string(),
        service_name: "warehouse".to_string(),
        service_connection: serde_json::from_value(connection)
            .expect("fixture connection should deserialize"),
        source_config: UsageConfig::default(),
    }
}

/// Snowflake account without a database
pub fn snowflake_account() -> SourceConfig {
    source_config(
        "snowflake-usage",
        json!({
            "type": "Snowflake",
            "username": "loader",
            "password": "pw",
            "account": "xy12345.us-east-1",
            "warehouse": "COMPUTE_WH"
        }),
    )
}

/// Snowflake account pinned to one database
pub fn snowflake_database(database: &str) -> SourceConfig {
    source_config(
        "snowflake-usage",
        json!({
            "type": "Snowflake",
            "username": "loader",
            "password": "pw",
            "account": "xy12345.us-east-1",
            "warehouse": "COMPUTE_WH",
            "database": database
        }),
    )
}

pub fn clickhouse() -> SourceConfig {
    source_config(
        "clickhouse-usage",
        json!({
            "type": "Clickhouse",
            "username": "default",
            "hostPort": "localhost:8123"
        }),
    )
}

/// One-day window ending 2024-03-10
pub fn window() -> TimeWindow {
    TimeWindow::for_duration(1, Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap())
}

/// A `SHOW DATABASES` result; the name sits in the second column
pub fn show_databases(names: &[&str]) -> Vec<Row> {
    names
        .iter()
        .map(|name| {
            Row::from_pairs([
                ("created_on", json!("2024-01-01 00:00:00")),
                ("name", json!(name)),
                ("owner", json!("SYSADMIN")),
            ])
        })
        .collect()
}

/// A Snowflake query history row
pub fn snowflake_query(text: &str, database: Option<&str>, end_time: &str) -> Row {
    Row::from_pairs([
        ("QUERY_TYPE", json!("SELECT")),
        ("QUERY_TEXT", json!(text)),
        ("USER_NAME", json!("ALICE")),
        ("DATABASE_NAME", database.map_or(Value::Null, |db| json!(db))),
        ("SCHEMA_NAME", json!("PUBLIC")),
        ("START_TIME", json!("2024-03-09 10:00:00.000 -0800")),
        ("END_TIME", json!(end_time)),
    ])
}

/// A ClickHouse query_log row with `databases` rendered as a list literal
pub fn clickhouse_query(text: &str, databases: &str) -> Row {
    Row::from_pairs([
        ("start_time", json!("2024-03-09 10:00:00")),
        ("end_time", json!("2024-03-09 10:00:01")),
        ("database_name", json!(databases)),
        ("user_name", json!("default")),
        ("aborted", json!(0)),
        ("query_id", json!("6a1f")),
        ("query_text", json!(text)),
        ("schema_name", json!(databases)),
        ("tables", json!("[]")),
    ])
}
