//! Test fixtures for connection resolution
//!
//! Descriptors are built from the same camelCase JSON a workflow file would
//! carry, so the tests exercise deserialization defaults as well.

#![allow(dead_code)]

use querytrail_core::ConnectionDescriptor;
use serde_json::{json, Value};

/// Parse a descriptor from JSON, panicking on invalid fixtures
pub fn descriptor(value: Value) -> ConnectionDescriptor {
    serde_json::from_value(value).expect("fixture descriptor should deserialize")
}

/// Postgres warehouse used in the end-to-end examples
pub fn sales_postgres() -> ConnectionDescriptor {
    descriptor(json!({
        "type": "Postgres",
        "username": "alice",
        "password": "s3cr3t",
        "hostPort": "db:5432",
        "database": "sales",
        "connectionOptions": { "sslmode": "require" }
    }))
}

/// Snowflake account without a database, as used for multi-database runs
pub fn snowflake_account() -> ConnectionDescriptor {
    descriptor(json!({
        "type": "Snowflake",
        "username": "loader",
        "password": "pw",
        "account": "xy12345.us-east-1",
        "warehouse": "COMPUTE_WH"
    }))
}

/// Every variant that uses the shared URL builder, with a username and no password
pub fn shared_builder_descriptors() -> Vec<(&'static str, ConnectionDescriptor)> {
    [
        ("Mysql", "mysql+pymysql"),
        ("Postgres", "postgresql+psycopg2"),
        ("Redshift", "redshift+psycopg2"),
        ("MariaDB", "mysql+pymysql"),
        ("Salesforce", "salesforce"),
        ("Clickhouse", "clickhouse+http"),
        ("SingleStore", "mysql+pymysql"),
        ("Db2", "db2+ibm_db"),
        ("Vertica", "vertica+vertica_python"),
        ("Mssql", "mssql+pytds"),
        ("Oracle", "oracle+cx_oracle"),
        ("Hive", "hive"),
    ]
    .into_iter()
    .map(|(service_type, scheme)| {
        (
            scheme,
            descriptor(json!({
                "type": service_type,
                "username": "user",
                "hostPort": "host:1234"
            })),
        )
    })
    .collect()
}

/// One descriptor per URL-capable variant
pub fn all_url_descriptors() -> Vec<ConnectionDescriptor> {
    let mut descriptors: Vec<ConnectionDescriptor> = shared_builder_descriptors()
        .into_iter()
        .map(|(_, d)| d)
        .collect();

    descriptors.extend([
        descriptor(json!({ "type": "SQLite" })),
        descriptor(json!({
            "type": "Trino",
            "hostPort": "localhost:443",
            "username": "username",
            "password": "pass",
            "catalog": "catalog",
            "params": { "param": "value" }
        })),
        descriptor(json!({
            "type": "Presto",
            "hostPort": "presto:8080",
            "username": "admin",
            "catalog": "hive",
            "database": "web logs"
        })),
        descriptor(json!({
            "type": "Databricks",
            "hostPort": "1.1.1.1:443",
            "token": "KlivDTACWXKmZVfN1qIM"
        })),
        snowflake_account(),
        descriptor(json!({ "type": "BigQuery", "projectId": "my-project" })),
        descriptor(json!({
            "type": "AzureSQL",
            "hostPort": "srv.database.windows.net:1433",
            "username": "admin",
            "password": "pw",
            "database": "my db"
        })),
        descriptor(json!({
            "type": "Athena",
            "awsConfig": { "awsAccessKeyId": "AKIA", "awsSecretAccessKey": "abc", "awsRegion": "us-east-1" },
            "s3StagingDir": "s3://bucket/results/",
            "workgroup": "primary"
        })),
        descriptor(json!({ "type": "Druid", "hostPort": "localhost:8082" })),
        descriptor(json!({
            "type": "PinotDB",
            "hostPort": "localhost:8099",
            "pinotControllerHost": "http://localhost:9000/"
        })),
        sales_postgres(),
    ]);

    descriptors
}
