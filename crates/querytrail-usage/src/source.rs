//! Usage extraction engine
//!
//! A [`UsageSource`] holds everything decided up front (dialect, window,
//! rendered statement). [`UsageSource::extract`] opens a connection and
//! returns a [`UsageExtract`], a pull-based sequence of rows:
//!
//! - with a query log file configured, rows come from the file;
//! - when the dialect can enumerate databases and the connection names none,
//!   each database is visited in listing order, switching the session and
//!   re-acquiring the connection before running the usage statement;
//! - otherwise the usage statement runs once.
//!
//! The sequence ends after the last row or the first error.

use crate::dialect::{dialect_for, DatabaseEnumeration, UsageDialect};
use crate::error::UsageError;
use crate::query_log::QueryLogReader;
use chrono::Utc;
use querytrail_connect::{resolve, ConnectError, Connection, ConnectionAcquirer, RowCursor};
use querytrail_core::{value_to_string, ConnectionDescriptor, Row, SourceConfig, TimeWindow, UsageRecord};
use std::collections::VecDeque;

/// Columns mapped onto named [`UsageRecord`] fields
const RECORD_COLUMNS: &[&str] = &[
    "query_type",
    "query_text",
    "user_name",
    "database_name",
    "schema_name",
    "start_time",
    "end_time",
    "aborted",
];

/// A configured usage extraction for one source
pub struct UsageSource {
    config: SourceConfig,
    dialect: Box<dyn UsageDialect>,
    window: TimeWindow,
    statement: String,
}

impl UsageSource {
    /// Source covering the last `queryLogDuration` days
    pub fn new(config: SourceConfig, dialect: Box<dyn UsageDialect>) -> Result<Self, UsageError> {
        let window = TimeWindow::for_duration(config.source_config.query_log_duration, Utc::now());
        Self::with_window(config, dialect, window)
    }

    /// Source whose dialect is picked from the configured source type
    pub fn from_config(config: SourceConfig) -> Result<Self, UsageError> {
        let dialect = dialect_for(&config.source_type)?;
        Self::new(config, dialect)
    }

    /// Source covering an explicit window
    ///
    /// Fails with [`UsageError::InvalidSource`] when the connection is not of
    /// the dialect's type.
    pub fn with_window(
        config: SourceConfig,
        dialect: Box<dyn UsageDialect>,
        window: TimeWindow,
    ) -> Result<Self, UsageError> {
        let actual = config.service_connection.service_type();
        let expected = dialect.service_type();
        if actual != expected {
            return Err(UsageError::InvalidSource { expected, actual });
        }

        let window = dialect.adjust_window(window);
        let statement = dialect.usage_statement(&window, config.source_config.result_limit);

        Ok(Self {
            config,
            dialect,
            window,
            statement,
        })
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn dialect(&self) -> &dyn UsageDialect {
        self.dialect.as_ref()
    }

    /// Window after dialect adjustment
    pub fn window(&self) -> &TimeWindow {
        &self.window
    }

    /// Rendered usage statement
    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// Start extracting
    ///
    /// Resolves and acquires the initial connection unless rows come from a
    /// query log file. No statement runs until the first row is pulled.
    pub async fn extract<'a>(
        &'a self,
        acquirer: &'a dyn ConnectionAcquirer,
    ) -> Result<UsageExtract<'a>, UsageError> {
        let descriptor = self.config.service_connection.clone();

        if let Some(path) = &self.config.source_config.query_log_file_path {
            tracing::info!("Reading usage from query log {}", path.display());
            return Ok(UsageExtract {
                source: self,
                acquirer,
                descriptor,
                connection: None,
                state: ExtractState::QueryLog(QueryLogReader::open(path)?),
            });
        }

        let resolved = resolve(&descriptor)?;
        tracing::debug!("Connecting to {}", resolved.redacted_uri());
        let connection = acquirer
            .acquire(&resolved)
            .await
            .map_err(UsageError::Connection)?;

        Ok(UsageExtract {
            source: self,
            acquirer,
            descriptor,
            connection: Some(connection),
            state: ExtractState::Start,
        })
    }

    /// Normalize a raw row into a usage record
    ///
    /// Rows without query text are skipped.
    pub fn to_record(&self, row: &Row, active_database: Option<&str>) -> Option<UsageRecord> {
        let Some(query_text) = row.get_str("query_text").filter(|text| !text.is_empty()) else {
            tracing::warn!("Skipping usage row without query text");
            return None;
        };

        let extra = row
            .iter()
            .filter(|(column, _)| {
                !RECORD_COLUMNS
                    .iter()
                    .any(|mapped| mapped.eq_ignore_ascii_case(column))
            })
            .map(|(column, value)| (column.to_ascii_lowercase(), value.clone()))
            .collect();

        Some(UsageRecord {
            query_type: row.get_str("query_type"),
            query_text,
            user_name: row.get_str("user_name"),
            database_name: self.dialect.get_database(row, active_database),
            schema_name: row.get_str("schema_name"),
            start_time: row.get_str("start_time"),
            end_time: row.get_str("end_time"),
            analysis_date: self.window.analysis_date(),
            aborted: self.dialect.get_aborted_status(row),
            service_name: self.config.service_name.clone(),
            extra,
        })
    }
}

enum ExtractState {
    /// Connected, nothing executed yet
    Start,

    /// Single usage statement in flight
    Streaming(Box<dyn RowCursor>),

    /// Visiting databases in listing order
    PerDatabase {
        enumeration: DatabaseEnumeration,
        pending: VecDeque<String>,
        cursor: Option<Box<dyn RowCursor>>,
    },

    QueryLog(QueryLogReader),

    Done,
}

/// Pull-based sequence of usage rows
///
/// Not restartable: once it has ended (or failed) it stays ended.
pub struct UsageExtract<'a> {
    source: &'a UsageSource,
    acquirer: &'a dyn ConnectionAcquirer,

    /// Descriptor for the database currently being read
    descriptor: ConnectionDescriptor,

    connection: Option<Box<dyn Connection>>,
    state: ExtractState,
}

impl<'a> UsageExtract<'a> {
    /// Database the current connection is on, if the descriptor names one
    pub fn active_database(&self) -> Option<&str> {
        self.descriptor.database()
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, ExtractState::Done)
    }

    /// Next raw row
    pub async fn next_raw(&mut self) -> Result<Option<Row>, UsageError> {
        let next = self.advance().await;
        if !matches!(next, Ok(Some(_))) {
            self.state = ExtractState::Done;
            self.connection = None;
        }
        next
    }

    /// Next normalized record
    pub async fn next_record(&mut self) -> Result<Option<UsageRecord>, UsageError> {
        while let Some(row) = self.next_raw().await? {
            if let Some(record) = self.source.to_record(&row, self.descriptor.database()) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Drain the remaining records
    pub async fn collect_records(mut self) -> Result<Vec<UsageRecord>, UsageError> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record().await? {
            records.push(record);
        }
        Ok(records)
    }

    async fn advance(&mut self) -> Result<Option<Row>, UsageError> {
        loop {
            match &mut self.state {
                ExtractState::Done => return Ok(None),

                ExtractState::QueryLog(reader) => return reader.next_row(),

                ExtractState::Start => {
                    let enumeration = self
                        .source
                        .dialect
                        .database_enumeration()
                        .filter(|_| self.descriptor.database().is_none());

                    self.state = match enumeration {
                        Some(enumeration) => {
                            let names = self.list_databases(&enumeration).await?;
                            ExtractState::PerDatabase {
                                enumeration,
                                pending: names.into(),
                                cursor: None,
                            }
                        }
                        None => {
                            let connection = open_connection(&mut self.connection)?;
                            let cursor = connection
                                .execute(&self.source.statement)
                                .await
                                .map_err(|e| extraction_error(self.descriptor.database(), e))?;
                            ExtractState::Streaming(cursor)
                        }
                    };
                }

                ExtractState::Streaming(cursor) => {
                    return cursor
                        .next_row()
                        .await
                        .map_err(|e| extraction_error(self.descriptor.database(), e));
                }

                ExtractState::PerDatabase {
                    enumeration,
                    pending,
                    cursor,
                } => {
                    if let Some(current) = cursor {
                        match current
                            .next_row()
                            .await
                            .map_err(|e| extraction_error(self.descriptor.database(), e))?
                        {
                            Some(row) => return Ok(Some(row)),
                            None => *cursor = None,
                        }
                    }

                    let Some(name) = pending.pop_front() else {
                        return Ok(None);
                    };

                    let use_sql = (enumeration.use_statement)(&name);
                    run_to_completion(open_connection(&mut self.connection)?, &use_sql)
                        .await
                        .map_err(|e| extraction_error(Some(&name), e))?;
                    tracing::info!("Ingesting from database: {}", name);

                    self.descriptor = self.descriptor.with_database(name.as_str());
                    let resolved = resolve(&self.descriptor)?;
                    let mut replacement = self
                        .acquirer
                        .acquire(&resolved)
                        .await
                        .map_err(UsageError::Connection)?;

                    let next = replacement
                        .execute(&self.source.statement)
                        .await
                        .map_err(|e| extraction_error(Some(&name), e))?;
                    self.connection = Some(replacement);
                    *cursor = Some(next);
                }
            }
        }
    }

    /// Names from the dialect's database listing, read in full
    async fn list_databases(&mut self, enumeration: &DatabaseEnumeration) -> Result<Vec<String>, UsageError> {
        let connection = open_connection(&mut self.connection)?;
        let mut cursor = connection
            .execute(enumeration.list_sql)
            .await
            .map_err(|e| extraction_error(None, e))?;

        let mut names = Vec::new();
        while let Some(row) = cursor.next_row().await.map_err(|e| extraction_error(None, e))? {
            match row.get_index(enumeration.name_index).and_then(value_to_string) {
                Some(name) if !name.is_empty() => names.push(name),
                _ => tracing::warn!(
                    "Skipping database listing row without a name at column {}",
                    enumeration.name_index
                ),
            }
        }

        tracing::debug!("Found {} databases", names.len());
        Ok(names)
    }
}

fn open_connection(connection: &mut Option<Box<dyn Connection>>) -> Result<&mut Box<dyn Connection>, UsageError> {
    connection
        .as_mut()
        .ok_or_else(|| UsageError::Connection(ConnectError::ConfigError("connection already closed".to_string())))
}

/// Execute a statement and drain its result
async fn run_to_completion(connection: &mut Box<dyn Connection>, sql: &str) -> Result<(), ConnectError> {
    let mut cursor = connection.execute(sql).await?;
    while cursor.next_row().await?.is_some() {}
    Ok(())
}

fn extraction_error(database: Option<&str>, source: ConnectError) -> UsageError {
    UsageError::Extraction {
        database: database.map(str::to_string),
        source,
    }
}
