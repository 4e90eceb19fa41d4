//! querytrail core
//!
//! Domain model shared by every querytrail crate: the connection descriptor
//! for each supported database dialect, workflow configuration, the
//! driver-neutral row shape, and the canonical usage record.

pub mod secret;
pub mod descriptor;
pub mod config;
pub mod row;
pub mod usage;
pub mod window;

pub use secret::SecretValue;
pub use descriptor::{ConnectionDescriptor, ConnectionOptions, ConnectionArguments, DriverScheme, ServiceType};
pub use config::{WorkflowConfig, SourceConfig, UsageConfig, ConfigError};
pub use row::{Row, value_to_string};
pub use usage::UsageRecord;
pub use window::TimeWindow;
