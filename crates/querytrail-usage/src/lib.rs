//! querytrail usage extraction
//!
//! Pulls query history out of a warehouse and normalizes it into
//! [`UsageRecord`](querytrail_core::UsageRecord)s.
//!
//! ```rust,ignore
//! let source = UsageSource::from_config(config.source)?;
//! let records = source.extract(&DriverAcquirer::new()).await?.collect_records().await?;
//! ```

pub mod error;
pub mod dialect;
pub mod snowflake;
pub mod clickhouse;
pub mod query_log;
pub mod source;

pub use error::UsageError;
pub use dialect::{dialect_for, DatabaseEnumeration, UsageDialect};
pub use snowflake::SnowflakeUsage;
pub use clickhouse::ClickhouseUsage;
pub use query_log::QueryLogReader;
pub use source::{UsageExtract, UsageSource};
