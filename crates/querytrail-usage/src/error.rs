//! Usage extraction errors

use querytrail_connect::{ConnectError, ResolveError};
use querytrail_core::ServiceType;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error("Invalid source: expected a {expected} connection, but got {actual}")]
    InvalidSource {
        expected: ServiceType,
        actual: ServiceType,
    },

    #[error("Unknown usage source type '{0}'")]
    UnknownSourceType(String),

    #[error("Failed to resolve connection: {0}")]
    Resolution(#[from] ResolveError),

    #[error("Failed to connect: {0}")]
    Connection(#[source] ConnectError),

    #[error(
        "Extraction failed for database {}: {source}",
        .database.as_deref().unwrap_or("<connection default>")
    )]
    Extraction {
        database: Option<String>,
        #[source]
        source: ConnectError,
    },

    #[error("Failed to read query log {}: {message}", .path.display())]
    QueryLog { path: PathBuf, message: String },
}
