//! Acquirer backed by the compiled-in database drivers

use crate::bigquery::BigQueryConnection;
use crate::clickhouse::ClickhouseConnection;
use crate::connection::{ConnectError, Connection, ConnectionAcquirer};
use crate::postgres::PostgresConnection;
use crate::resolver::ResolvedConnection;
use crate::snowflake::SnowflakeConnection;
use crate::trino::TrinoConnection;
use crate::uri::UriParts;

/// Opens real connections, choosing the driver from the URI scheme
///
/// Driver support is selected with Cargo features:
/// - `postgres` - PostgreSQL and Redshift
/// - `snowflake` - Snowflake
/// - `bigquery` - Google BigQuery
/// - `trino` - Trino
/// - `clickhouse` - ClickHouse over HTTP
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverAcquirer;

impl DriverAcquirer {
    pub fn new() -> Self {
        Self
    }

    /// Whether a driver for `dialect` exists at all (compiled in or not)
    pub fn knows_dialect(dialect: &str) -> bool {
        matches!(
            dialect,
            "postgresql" | "postgres" | "redshift" | "snowflake" | "bigquery" | "trino" | "clickhouse"
        )
    }
}

#[async_trait::async_trait]
impl ConnectionAcquirer for DriverAcquirer {
    async fn acquire(&self, resolved: &ResolvedConnection) -> Result<Box<dyn Connection>, ConnectError> {
        let dialect = resolved.dialect();
        if !Self::knows_dialect(dialect) {
            return Err(ConnectError::UnsupportedDriver(dialect.to_string()));
        }

        let parts = UriParts::parse(&resolved.uri)?;
        tracing::debug!("Opening {} connection to {}", parts.dialect, resolved.redacted_uri());

        let connection: Box<dyn Connection> = match parts.dialect.as_str() {
            "postgresql" | "postgres" | "redshift" => {
                Box::new(PostgresConnection::connect(&parts, &resolved.args).await?)
            }
            "snowflake" => Box::new(SnowflakeConnection::connect(&parts, &resolved.args).await?),
            "bigquery" => Box::new(BigQueryConnection::connect(&parts, &resolved.args).await?),
            "trino" => Box::new(TrinoConnection::connect(&parts, &resolved.args).await?),
            "clickhouse" => Box::new(ClickhouseConnection::connect(&parts, &resolved.args).await?),
            other => return Err(ConnectError::UnsupportedDriver(other.to_string())),
        };

        Ok(connection)
    }
}
