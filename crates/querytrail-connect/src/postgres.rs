//! PostgreSQL / Redshift driver
//!
//! Connects with `tokio-postgres`. TLS is negotiated through native-tls when
//! the URI carries `sslmode=require` (or a `verify-*` mode).
//!
//! Rows are streamed with `query_raw`, so large query histories are never
//! buffered in full.

use crate::args::DriverArgs;
use crate::connection::{ConnectError, Connection, RowCursor};
use crate::uri::UriParts;
use querytrail_core::Row;

#[cfg(feature = "postgres")]
use futures::StreamExt;

#[cfg(feature = "postgres")]
use native_tls::TlsConnector;

#[cfg(feature = "postgres")]
use postgres_native_tls::MakeTlsConnector;

#[cfg(feature = "postgres")]
use serde_json::Value;

#[cfg(feature = "postgres")]
use std::{pin::Pin, sync::Arc, time::Duration};

#[cfg(feature = "postgres")]
use tokio_postgres::{config::SslMode, types::Type, Client, Config as PgConfig, NoTls, RowStream};

#[cfg(not(feature = "postgres"))]
use crate::connection::not_compiled;

const DEFAULT_PORT: u16 = 5432;

/// Open PostgreSQL connection
pub struct PostgresConnection {
    #[cfg(feature = "postgres")]
    client: Client,

    /// `host:port`, for error messages
    address: String,
}

impl PostgresConnection {
    /// Connect using the parts of a resolved URI
    ///
    /// Recognized driver arguments: `connect_timeout` (seconds).
    #[cfg(feature = "postgres")]
    pub async fn connect(parts: &UriParts, args: &DriverArgs) -> Result<Self, ConnectError> {
        let port = parts.port.unwrap_or(DEFAULT_PORT);
        let address = format!("{}:{}", parts.host, port);

        let mut config = PgConfig::new();
        config.host(&parts.host).port(port);
        if let Some(user) = &parts.username {
            config.user(user);
        }
        if let Some(password) = &parts.password {
            config.password(password);
        }
        if let Some(database) = &parts.path {
            config.dbname(database);
        }
        if let Some(application_name) = parts.param("application_name") {
            config.application_name(application_name);
        }
        if let Some(timeout) = args.arguments.get("connect_timeout").and_then(|v| v.as_u64()) {
            config.connect_timeout(Duration::from_secs(timeout));
        }

        let use_tls = matches!(
            parts.param("sslmode"),
            Some("require") | Some("verify-ca") | Some("verify-full")
        );

        let client = if use_tls {
            config.ssl_mode(SslMode::Require);
            let connector = TlsConnector::builder().build().map_err(|e| {
                ConnectError::ConfigError(format!("Failed to create TLS connector: {}", e))
            })?;
            let tls = MakeTlsConnector::new(connector);

            let (client, connection) = config.connect(tls).await.map_err(|e| {
                connect_error(&address, e)
            })?;

            let address_clone = address.clone();
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!("PostgreSQL TLS connection error ({}): {}", address_clone, e);
                }
            });
            client
        } else {
            let (client, connection) = config.connect(NoTls).await.map_err(|e| {
                connect_error(&address, e)
            })?;

            let address_clone = address.clone();
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!("PostgreSQL connection error ({}): {}", address_clone, e);
                }
            });
            client
        };

        Ok(Self { client, address })
    }

    #[cfg(not(feature = "postgres"))]
    pub async fn connect(_parts: &UriParts, _args: &DriverArgs) -> Result<Self, ConnectError> {
        Err(not_compiled("PostgreSQL", "postgres"))
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[cfg(feature = "postgres")]
fn connect_error(address: &str, e: tokio_postgres::Error) -> ConnectError {
    let message = e.to_string();
    if message.contains("password authentication failed") {
        ConnectError::AuthenticationError(format!("{}: {}", address, message))
    } else {
        ConnectError::NetworkError(format!("Failed to connect to PostgreSQL at {}: {}", address, message))
    }
}

#[async_trait::async_trait]
impl Connection for PostgresConnection {
    fn backend(&self) -> &'static str {
        "Postgres"
    }

    #[cfg(feature = "postgres")]
    async fn execute(&mut self, sql: &str) -> Result<Box<dyn RowCursor>, ConnectError> {
        tracing::debug!("Executing on {}: {}", self.address, sql);

        let params: [&(dyn tokio_postgres::types::ToSql + Sync); 0] = [];
        let stream = self.client.query_raw(sql, params).await.map_err(|e| {
            let message = e.to_string();
            if message.contains("permission denied") {
                ConnectError::PermissionDenied(message)
            } else {
                ConnectError::QueryError(message)
            }
        })?;

        Ok(Box::new(PostgresCursor {
            stream: Box::pin(stream),
            columns: None,
        }))
    }

    #[cfg(not(feature = "postgres"))]
    async fn execute(&mut self, _sql: &str) -> Result<Box<dyn RowCursor>, ConnectError> {
        Err(not_compiled("PostgreSQL", "postgres"))
    }
}

/// Streams rows from a `query_raw` result
#[cfg(feature = "postgres")]
struct PostgresCursor {
    stream: Pin<Box<RowStream>>,

    /// Column names, taken from the first row
    columns: Option<Arc<[String]>>,
}

#[cfg(feature = "postgres")]
#[async_trait::async_trait]
impl RowCursor for PostgresCursor {
    async fn next_row(&mut self) -> Result<Option<Row>, ConnectError> {
        let Some(next) = self.stream.next().await else {
            return Ok(None);
        };
        let pg_row = next.map_err(|e| ConnectError::QueryError(e.to_string()))?;

        let columns = self
            .columns
            .get_or_insert_with(|| {
                pg_row
                    .columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect::<Vec<_>>()
                    .into()
            })
            .clone();

        let values = (0..pg_row.len())
            .map(|idx| pg_value(&pg_row, idx))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Row::new(columns, values)))
    }
}

/// Convert one PostgreSQL column value to JSON
#[cfg(feature = "postgres")]
fn pg_value(row: &tokio_postgres::Row, idx: usize) -> Result<Value, ConnectError> {
    let column = &row.columns()[idx];

    let value = match *column.type_() {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx).map(|v| v.map(Value::from)),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx).map(|v| v.map(Value::from)),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx).map(|v| v.map(Value::from)),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx).map(|v| v.map(Value::from)),
        Type::OID => row.try_get::<_, Option<u32>>(idx).map(|v| v.map(Value::from)),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)
            .map(|v| v.map(|f| Value::from(f64::from(f)))),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx).map(|v| v.map(Value::from)),
        Type::TIMESTAMP => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(idx)
            .map(|v| v.map(|ts| Value::from(ts.to_string()))),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)
            .map(|v| v.map(|ts| Value::from(ts.to_rfc3339()))),
        Type::DATE => row
            .try_get::<_, Option<chrono::NaiveDate>>(idx)
            .map(|v| v.map(|d| Value::from(d.to_string()))),
        Type::JSON | Type::JSONB => row.try_get::<_, Option<Value>>(idx),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY | Type::NAME_ARRAY => row
            .try_get::<_, Option<Vec<Option<String>>>>(idx)
            .map(|v| v.map(Value::from)),
        _ => match row.try_get::<_, Option<String>>(idx) {
            Ok(v) => Ok(v.map(Value::from)),
            Err(_) => {
                tracing::debug!(
                    "Unsupported PostgreSQL type {} for column {}; returning null",
                    column.type_(),
                    column.name()
                );
                Ok(None)
            }
        },
    };

    value
        .map(|v| v.unwrap_or(Value::Null))
        .map_err(|e| ConnectError::InvalidResponse(format!("Column {}: {}", column.name(), e)))
}
