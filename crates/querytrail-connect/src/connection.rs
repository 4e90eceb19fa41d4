//! Driver boundary: connections, cursors and acquirers

use crate::resolver::ResolvedConnection;
use querytrail_core::Row;
use std::collections::VecDeque;

/// Errors raised by drivers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("No driver available for scheme '{0}'")]
    UnsupportedDriver(String),
}

/// Forward-only cursor over statement results
///
/// Dropping the cursor releases the statement.
#[async_trait::async_trait]
pub trait RowCursor: Send {
    /// Next row, or `None` once the result is exhausted
    async fn next_row(&mut self) -> Result<Option<Row>, ConnectError>;
}

/// An open connection to a database
#[async_trait::async_trait]
pub trait Connection: Send {
    /// Driver name (e.g., "Postgres", "Snowflake")
    fn backend(&self) -> &'static str;

    /// Execute a statement and return a cursor over its rows
    async fn execute(&mut self, sql: &str) -> Result<Box<dyn RowCursor>, ConnectError>;

    /// Round-trip a trivial statement
    async fn test_connection(&mut self) -> Result<(), ConnectError> {
        let mut cursor = self.execute("SELECT 1").await?;
        while cursor.next_row().await?.is_some() {}
        Ok(())
    }
}

/// Opens connections for resolved URIs
#[async_trait::async_trait]
pub trait ConnectionAcquirer: Send + Sync {
    async fn acquire(&self, resolved: &ResolvedConnection) -> Result<Box<dyn Connection>, ConnectError>;
}

/// Cursor over rows already held in memory
#[derive(Debug, Default)]
pub struct VecCursor {
    rows: VecDeque<Row>,
}

impl VecCursor {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows: rows.into() }
    }

    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

#[async_trait::async_trait]
impl RowCursor for VecCursor {
    async fn next_row(&mut self) -> Result<Option<Row>, ConnectError> {
        Ok(self.rows.pop_front())
    }
}

/// Error for a backend left out of the build
pub(crate) fn not_compiled(backend: &str, feature: &str) -> ConnectError {
    ConnectError::ConfigError(format!(
        "{} support not compiled. Rebuild with: cargo build --features {}",
        backend, feature
    ))
}
