//! Descriptor resolution
//!
//! Turns a [`ConnectionDescriptor`] into the URI and driver arguments needed
//! to open a connection. Resolution is pure: no I/O, and the descriptor is
//! never modified.

use crate::args::{connection_args, DriverArgs};
use crate::url::connection_url;
use querytrail_core::{ConnectionDescriptor, ServiceType};
use std::fmt;
use url::Url;

/// Errors raised while building a connection URL
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("Connection URL build not implemented for type {service_type}: {details}")]
    UnsupportedConnectionType {
        service_type: ServiceType,
        details: String,
    },

    #[error("{service_type} connection sets both {first} and {second}; only one may be given")]
    ConflictingFields {
        service_type: ServiceType,
        first: &'static str,
        second: &'static str,
    },

    #[error("{service_type} connection is missing required field {field}")]
    MissingField {
        service_type: ServiceType,
        field: &'static str,
    },
}

/// A connection URI plus driver arguments, ready for acquisition
#[derive(Clone, PartialEq)]
pub struct ResolvedConnection {
    pub uri: String,
    pub args: DriverArgs,
}

impl ResolvedConnection {
    pub fn new(uri: impl Into<String>, args: DriverArgs) -> Self {
        Self {
            uri: uri.into(),
            args,
        }
    }

    /// URI scheme without the driver suffix, e.g. `postgresql` for
    /// `postgresql+psycopg2://...`
    pub fn dialect(&self) -> &str {
        let scheme = self.uri.split("://").next().unwrap_or_default();
        scheme.split('+').next().unwrap_or(scheme)
    }

    /// URI with the password segment masked, safe to log
    pub fn redacted_uri(&self) -> String {
        redact_uri(&self.uri)
    }
}

impl fmt::Debug for ResolvedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConnection")
            .field("uri", &self.redacted_uri())
            .field("args", &self.args)
            .finish()
    }
}

/// URI with the password masked
///
/// Well-formed URIs are rewritten through [`Url`]. URIs it rejects or reads
/// without a password (Athena embeds unencoded secret keys) fall back to
/// masking between the first `:` and the last `@` of the userinfo.
pub fn redact_uri(uri: &str) -> String {
    match Url::parse(uri) {
        Ok(mut parsed) if parsed.password().is_some() => {
            if parsed.set_password(Some("***")).is_ok() {
                parsed.to_string()
            } else {
                mask_userinfo(uri)
            }
        }
        _ => mask_userinfo(uri),
    }
}

fn mask_userinfo(uri: &str) -> String {
    let Some(authority_start) = uri.find("://").map(|i| i + 3) else {
        return uri.to_string();
    };
    let rest = &uri[authority_start..];
    let limit = rest.find('?').unwrap_or(rest.len());

    let Some(at) = rest[..limit].rfind('@') else {
        return uri.to_string();
    };
    let Some(colon) = rest[..at].find(':') else {
        return uri.to_string();
    };

    format!(
        "{}{}:***{}",
        &uri[..authority_start],
        &rest[..colon],
        &rest[at..]
    )
}

/// Resolve a descriptor into its URI and driver arguments
pub fn resolve(descriptor: &ConnectionDescriptor) -> Result<ResolvedConnection, ResolveError> {
    let uri = connection_url(descriptor)?;
    let args = connection_args(descriptor);
    Ok(ResolvedConnection { uri, args })
}
