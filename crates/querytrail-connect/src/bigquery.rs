//! BigQuery driver
//!
//! ## Authentication
//!
//! 1. Service account JSON file (`credentials_path` driver argument)
//! 2. Application Default Credentials (ADC) otherwise
//!
//! The project comes from the resolved `bigquery://<project>` URI.
//!
//! Reference: https://cloud.google.com/bigquery/docs/reference/rest/v2/jobs/query

use crate::args::DriverArgs;
use crate::connection::{ConnectError, Connection, RowCursor};
use crate::uri::UriParts;

#[cfg(feature = "bigquery")]
use crate::connection::VecCursor;

#[cfg(feature = "bigquery")]
use gcp_bigquery_client::{
    model::{query_request::QueryRequest, query_response::ResultSet},
    Client as BigQueryClient,
};

#[cfg(feature = "bigquery")]
use querytrail_core::Row;

#[cfg(feature = "bigquery")]
use serde_json::Value;

#[cfg(feature = "bigquery")]
use std::sync::Arc;

#[cfg(not(feature = "bigquery"))]
use crate::connection::not_compiled;

/// Driver argument naming a service account key file
pub const CREDENTIALS_PATH_ARG: &str = "credentials_path";

/// Open BigQuery client bound to one project
pub struct BigQueryConnection {
    #[cfg(feature = "bigquery")]
    client: BigQueryClient,

    project_id: String,
}

impl BigQueryConnection {
    #[cfg(feature = "bigquery")]
    pub async fn connect(parts: &UriParts, args: &DriverArgs) -> Result<Self, ConnectError> {
        let project_id = parts.host.clone();
        if project_id.is_empty() {
            return Err(ConnectError::ConfigError(
                "BigQuery connection has no project id".to_string(),
            ));
        }

        let client = match args.get_str(CREDENTIALS_PATH_ARG) {
            Some(key_path) => BigQueryClient::from_service_account_key_file(key_path)
                .await
                .map_err(|e| ConnectError::AuthenticationError(format!(
                    "Failed to read service account key file '{}': {}",
                    key_path, e
                )))?,
            None => BigQueryClient::from_application_default_credentials()
                .await
                .map_err(|e| ConnectError::AuthenticationError(format!(
                    "Failed to authenticate with ADC: {}. \
                     Ensure GOOGLE_APPLICATION_CREDENTIALS is set or run 'gcloud auth application-default login'",
                    e
                )))?,
        };

        Ok(Self { client, project_id })
    }

    #[cfg(not(feature = "bigquery"))]
    pub async fn connect(_parts: &UriParts, _args: &DriverArgs) -> Result<Self, ConnectError> {
        Err(not_compiled("BigQuery", "bigquery"))
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }
}

#[async_trait::async_trait]
impl Connection for BigQueryConnection {
    fn backend(&self) -> &'static str {
        "BigQuery"
    }

    #[cfg(feature = "bigquery")]
    async fn execute(&mut self, sql: &str) -> Result<Box<dyn RowCursor>, ConnectError> {
        tracing::debug!("Executing on BigQuery project {}: {}", self.project_id, sql);

        let response = self
            .client
            .job()
            .query(&self.project_id, QueryRequest::new(sql))
            .await
            .map_err(|e| {
                let err_str = e.to_string();
                if err_str.contains("Access Denied") || err_str.contains("Permission") {
                    ConnectError::PermissionDenied(err_str)
                } else {
                    ConnectError::QueryError(err_str)
                }
            })?;

        let mut rs = ResultSet::new_from_query_response(response);
        let names = rs.column_names();
        let columns: Arc<[String]> = names.clone().into();

        let mut rows = Vec::new();
        while rs.next_row() {
            let mut values = Vec::with_capacity(names.len());
            for name in &names {
                let value = rs
                    .get_string_by_name(name)
                    .map_err(|e| ConnectError::InvalidResponse(format!("Failed to get {}: {}", name, e)))?;
                values.push(value.map(Value::from).unwrap_or(Value::Null));
            }
            rows.push(Row::new(columns.clone(), values));
        }

        Ok(Box::new(VecCursor::new(rows)))
    }

    #[cfg(not(feature = "bigquery"))]
    async fn execute(&mut self, _sql: &str) -> Result<Box<dyn RowCursor>, ConnectError> {
        Err(not_compiled("BigQuery", "bigquery"))
    }
}
