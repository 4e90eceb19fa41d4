//! ClickHouse driver over the HTTP interface
//!
//! Statements are POSTed with `default_format=JSON`, so queries that return
//! rows come back as `{"meta": [...], "data": [...]}` while statements without
//! a result set (e.g. `USE`) return an empty body.
//!
//! Reference: https://clickhouse.com/docs/en/interfaces/http

use crate::args::DriverArgs;
use crate::connection::{ConnectError, Connection, RowCursor};
use crate::uri::UriParts;

#[cfg(feature = "clickhouse")]
use crate::connection::VecCursor;

#[cfg(feature = "clickhouse")]
use querytrail_core::Row;

#[cfg(feature = "clickhouse")]
use serde::Deserialize;

#[cfg(feature = "clickhouse")]
use serde_json::{Map, Value};

#[cfg(feature = "clickhouse")]
use std::sync::Arc;

#[cfg(not(feature = "clickhouse"))]
use crate::connection::not_compiled;

const DEFAULT_PORT: u16 = 8123;

/// Open ClickHouse HTTP session
pub struct ClickhouseConnection {
    #[cfg(feature = "clickhouse")]
    client: reqwest::Client,

    /// `http(s)://host:port/`
    endpoint: String,

    user: Option<String>,
    password: Option<String>,
    database: Option<String>,
}

impl ClickhouseConnection {
    /// Connect using the parts of a resolved `clickhouse+http://` URI
    ///
    /// Only the HTTP driver is supported; `clickhouse+native` is rejected.
    /// Recognized options: `protocol=https` in the URI query string.
    #[cfg(feature = "clickhouse")]
    pub async fn connect(parts: &UriParts, args: &DriverArgs) -> Result<Self, ConnectError> {
        if let Some(driver) = parts.driver.as_deref().filter(|d| *d != "http") {
            return Err(ConnectError::UnsupportedDriver(format!("clickhouse+{}", driver)));
        }

        let client = match &args.http_session {
            Some(session) => session.build_client()?,
            None => reqwest::Client::new(),
        };

        let protocol = match parts.param("protocol") {
            Some("https") => "https",
            _ => "http",
        };
        let endpoint = format!(
            "{}://{}:{}/",
            protocol,
            parts.host,
            parts.port.unwrap_or(DEFAULT_PORT)
        );

        Ok(Self {
            client,
            endpoint,
            user: parts.username.clone(),
            password: parts.password.clone(),
            database: parts.path.clone(),
        })
    }

    #[cfg(not(feature = "clickhouse"))]
    pub async fn connect(_parts: &UriParts, _args: &DriverArgs) -> Result<Self, ConnectError> {
        Err(not_compiled("ClickHouse", "clickhouse"))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl Connection for ClickhouseConnection {
    fn backend(&self) -> &'static str {
        "ClickHouse"
    }

    #[cfg(feature = "clickhouse")]
    async fn execute(&mut self, sql: &str) -> Result<Box<dyn RowCursor>, ConnectError> {
        tracing::debug!("Executing on ClickHouse {}: {}", self.endpoint, sql);

        let mut query = vec![("default_format", "JSON")];
        if let Some(database) = &self.database {
            query.push(("database", database.as_str()));
        }

        let mut request = self.client.post(&self.endpoint).query(&query).body(sql.to_string());
        if let Some(user) = &self.user {
            request = request.header("X-ClickHouse-User", user);
        }
        if let Some(password) = &self.password {
            request = request.header("X-ClickHouse-Key", password);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ConnectError::NetworkError(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ConnectError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_failure(status, body));
        }

        Ok(Box::new(VecCursor::new(parse_body(&body)?)))
    }

    #[cfg(not(feature = "clickhouse"))]
    async fn execute(&mut self, _sql: &str) -> Result<Box<dyn RowCursor>, ConnectError> {
        Err(not_compiled("ClickHouse", "clickhouse"))
    }
}

#[cfg(feature = "clickhouse")]
fn classify_failure(status: reqwest::StatusCode, body: String) -> ConnectError {
    let message = format!("ClickHouse returned {}: {}", status, body.trim());
    if body.contains("AUTHENTICATION_FAILED") || status == reqwest::StatusCode::UNAUTHORIZED {
        ConnectError::AuthenticationError(message)
    } else if body.contains("ACCESS_DENIED") {
        ConnectError::PermissionDenied(message)
    } else {
        ConnectError::QueryError(message)
    }
}

#[cfg(feature = "clickhouse")]
#[derive(Debug, Deserialize)]
struct JsonOutput {
    meta: Vec<JsonColumn>,

    #[serde(default)]
    data: Vec<Map<String, Value>>,
}

#[cfg(feature = "clickhouse")]
#[derive(Debug, Deserialize)]
struct JsonColumn {
    name: String,
}

/// Rows of a `FORMAT JSON` body; an empty body has no rows
#[cfg(feature = "clickhouse")]
fn parse_body(body: &str) -> Result<Vec<Row>, ConnectError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let output: JsonOutput = serde_json::from_str(body)
        .map_err(|e| ConnectError::InvalidResponse(format!("Malformed ClickHouse JSON output: {}", e)))?;

    let columns: Arc<[String]> = output
        .meta
        .iter()
        .map(|c| c.name.clone())
        .collect::<Vec<_>>()
        .into();

    Ok(output
        .data
        .into_iter()
        .map(|mut record| {
            let values = columns
                .iter()
                .map(|name| record.remove(name).unwrap_or(Value::Null))
                .collect();
            Row::new(columns.clone(), values)
        })
        .collect())
}
