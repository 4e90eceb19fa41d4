//! Connection URL resolution and database drivers
//!
//! Turns connection descriptors into driver URIs and keyword arguments, and
//! opens connections through a small driver boundary ([`ConnectionAcquirer`],
//! [`Connection`], [`RowCursor`]).
//!
//! ## Features
//!
//! Enable driver support via Cargo features:
//! - `postgres` - PostgreSQL/Redshift support
//! - `snowflake` - Snowflake support
//! - `bigquery` - Google BigQuery support
//! - `trino` - Trino support
//! - `clickhouse` - ClickHouse (HTTP) support
//! - `all-warehouses` - All drivers
//!
//! ## Example
//!
//! ```rust,ignore
//! use querytrail_connect::{resolve, ConnectionAcquirer, DriverAcquirer};
//!
//! let resolved = resolve(&descriptor)?;
//! println!("{}", resolved.redacted_uri());
//!
//! let mut conn = DriverAcquirer::new().acquire(&resolved).await?;
//! conn.test_connection().await?;
//! ```

pub mod args;
pub mod connection;
pub mod resolver;
pub mod uri;
pub mod url;
pub mod driver;
pub mod mock;
pub mod postgres;
pub mod snowflake;
pub mod bigquery;
pub mod trino;
pub mod clickhouse;

pub use args::{connection_args, DriverArgs, HttpSession};
pub use connection::{ConnectError, Connection, ConnectionAcquirer, RowCursor, VecCursor};
pub use resolver::{resolve, ResolveError, ResolvedConnection};
pub use url::connection_url;
pub use driver::DriverAcquirer;
pub use mock::{MockAcquirer, MockConnection};
