//! Query log files
//!
//! A CSV export of query history can stand in for the warehouse: the header
//! names the columns (`query_text`, `database_name`, `user_name`, ...) and
//! every record becomes one row. Empty cells are read as null.

use crate::error::UsageError;
use querytrail_core::Row;
use serde_json::Value;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Lazily reads rows from a query log CSV file
pub struct QueryLogReader {
    path: PathBuf,
    reader: csv::Reader<File>,
    columns: Arc<[String]>,
    record: csv::StringRecord,
}

impl QueryLogReader {
    pub fn open(path: &Path) -> Result<Self, UsageError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_path(path)
            .map_err(|e| query_log_error(path, e))?;

        let columns: Arc<[String]> = reader
            .headers()
            .map_err(|e| query_log_error(path, e))?
            .iter()
            .map(str::to_string)
            .collect::<Vec<_>>()
            .into();

        if !columns.iter().any(|c| c.eq_ignore_ascii_case("query_text")) {
            return Err(UsageError::QueryLog {
                path: path.to_path_buf(),
                message: "missing required column 'query_text'".to_string(),
            });
        }

        tracing::debug!("Reading query log {} ({} columns)", path.display(), columns.len());

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            columns,
            record: csv::StringRecord::new(),
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Next record, or `None` at end of file
    pub fn next_row(&mut self) -> Result<Option<Row>, UsageError> {
        let has_record = self
            .reader
            .read_record(&mut self.record)
            .map_err(|e| query_log_error(&self.path, e))?;
        if !has_record {
            return Ok(None);
        }

        let values = self
            .record
            .iter()
            .map(|cell| {
                if cell.is_empty() {
                    Value::Null
                } else {
                    Value::from(cell)
                }
            })
            .collect();

        Ok(Some(Row::new(self.columns.clone(), values)))
    }
}

fn query_log_error(path: &Path, e: csv::Error) -> UsageError {
    UsageError::QueryLog {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}
