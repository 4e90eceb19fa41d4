//! Mock driver for testing
//!
//! Connections answer statements from a script instead of a live database.
//! It's useful for:
//! - Unit testing usage extraction without credentials
//! - Simulating database switches and mid-run failures
//! - Demos of the CLI
//!
//! ## Usage
//!
//! ```rust,ignore
//! use querytrail_connect::{MockAcquirer, MockConnection};
//! use querytrail_core::Row;
//!
//! let acquirer = MockAcquirer::new();
//! acquirer
//!     .push_connection(MockConnection::new().with_response("SHOW DATABASES", rows))
//!     .await;
//!
//! let resolved = querytrail_connect::resolve(&descriptor)?;
//! let mut conn = acquirer.acquire(&resolved).await?;
//! let mut cursor = conn.execute("SHOW DATABASES").await?;
//! ```
//!
//! Every statement executed by any connection handed out by one acquirer is
//! appended to a shared log, and every acquisition records its redacted URI.

use crate::connection::{ConnectError, Connection, ConnectionAcquirer, RowCursor, VecCursor};
use crate::resolver::ResolvedConnection;
use querytrail_core::Row;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared, ordered record of executed statements
pub type StatementLog = Arc<Mutex<Vec<String>>>;

/// Scripted connection
///
/// Statements are matched against scripted prefixes, case-insensitively and
/// ignoring leading whitespace; the longest matching prefix wins. Unmatched
/// statements return no rows.
#[derive(Clone)]
pub struct MockConnection {
    responses: Vec<(String, Vec<Row>)>,
    errors: Vec<(String, ConnectError)>,
    log: StatementLog,
    latency_ms: u64,
    backend_name: &'static str,
}

impl MockConnection {
    pub fn new() -> Self {
        Self {
            responses: Vec::new(),
            errors: Vec::new(),
            log: Arc::new(Mutex::new(Vec::new())),
            latency_ms: 0,
            backend_name: "Mock",
        }
    }

    /// Rows returned for statements starting with `prefix`
    pub fn with_response(mut self, prefix: impl Into<String>, rows: Vec<Row>) -> Self {
        self.responses.push((prefix.into(), rows));
        self
    }

    /// Error returned for statements starting with `prefix`
    ///
    /// Errors take precedence over responses.
    pub fn with_error(mut self, prefix: impl Into<String>, error: ConnectError) -> Self {
        self.errors.push((prefix.into(), error));
        self
    }

    /// Delay every statement by `latency_ms`
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Backend name reported by `backend()`
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.backend_name = name;
        self
    }

    /// Record statements into `log` instead of a private one
    pub fn with_log(mut self, log: StatementLog) -> Self {
        self.log = log;
        self
    }

    /// Statements executed so far
    pub async fn statements(&self) -> Vec<String> {
        self.log.lock().await.clone()
    }

    fn longest_match<'a, T>(script: &'a [(String, T)], sql: &str) -> Option<&'a T> {
        let normalized = sql.trim_start().to_ascii_lowercase();
        script
            .iter()
            .filter(|(prefix, _)| normalized.starts_with(&prefix.to_ascii_lowercase()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, value)| value)
    }
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Connection for MockConnection {
    fn backend(&self) -> &'static str {
        self.backend_name
    }

    async fn execute(&mut self, sql: &str) -> Result<Box<dyn RowCursor>, ConnectError> {
        if self.latency_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.latency_ms)).await;
        }

        self.log.lock().await.push(sql.to_string());

        if let Some(error) = Self::longest_match(&self.errors, sql) {
            return Err(error.clone());
        }

        let rows = Self::longest_match(&self.responses, sql)
            .cloned()
            .unwrap_or_default();
        Ok(Box::new(VecCursor::new(rows)))
    }
}

/// Scripted acquirer
///
/// Hands out queued connections (or failures) in order; once the queue is
/// empty, every acquisition gets a copy of the default connection.
pub struct MockAcquirer {
    queue: Mutex<VecDeque<Result<MockConnection, ConnectError>>>,
    default_connection: MockConnection,
    statements: StatementLog,
    acquisitions: Arc<Mutex<Vec<String>>>,
}

impl MockAcquirer {
    pub fn new() -> Self {
        let statements: StatementLog = Arc::new(Mutex::new(Vec::new()));
        Self {
            queue: Mutex::new(VecDeque::new()),
            default_connection: MockConnection::new().with_log(statements.clone()),
            statements,
            acquisitions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Connection cloned for acquisitions once the queue runs dry
    pub fn with_default_connection(mut self, connection: MockConnection) -> Self {
        self.default_connection = connection.with_log(self.statements.clone());
        self
    }

    /// Queue a connection for the next acquisition
    pub async fn push_connection(&self, connection: MockConnection) {
        let connection = connection.with_log(self.statements.clone());
        self.queue.lock().await.push_back(Ok(connection));
    }

    /// Queue a failed acquisition
    pub async fn push_failure(&self, error: ConnectError) {
        self.queue.lock().await.push_back(Err(error));
    }

    /// Statements executed across every handed-out connection
    pub async fn statements(&self) -> Vec<String> {
        self.statements.lock().await.clone()
    }

    /// Redacted URIs of every acquisition attempt, in order
    pub async fn acquisitions(&self) -> Vec<String> {
        self.acquisitions.lock().await.clone()
    }
}

impl Default for MockAcquirer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ConnectionAcquirer for MockAcquirer {
    async fn acquire(&self, resolved: &ResolvedConnection) -> Result<Box<dyn Connection>, ConnectError> {
        self.acquisitions.lock().await.push(resolved.redacted_uri());

        let next = self.queue.lock().await.pop_front();
        match next {
            Some(Ok(connection)) => Ok(Box::new(connection)),
            Some(Err(error)) => Err(error),
            None => Ok(Box::new(self.default_connection.clone())),
        }
    }
}
