//! Driver argument resolution

use querytrail_core::{ConnectionArguments, ConnectionDescriptor};
use serde::Serialize;
use std::collections::BTreeMap;

#[cfg(any(feature = "trino", feature = "clickhouse"))]
use crate::connection::ConnectError;

/// Reserved argument key for the injected HTTP session
pub const HTTP_SESSION_KEY: &str = "http_session";

/// Keyword arguments handed to the driver alongside the URI
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DriverArgs {
    pub arguments: ConnectionArguments,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_session: Option<HttpSession>,
}

impl DriverArgs {
    pub fn from_arguments(arguments: ConnectionArguments) -> Self {
        Self {
            arguments,
            http_session: None,
        }
    }

    /// String-valued argument, if present
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }
}

/// A pre-configured outbound HTTP session
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct HttpSession {
    /// Proxy URL keyed by target scheme (`http`, `https`, `all`)
    pub proxies: BTreeMap<String, String>,
}

impl HttpSession {
    pub fn with_proxies(proxies: BTreeMap<String, String>) -> Self {
        Self { proxies }
    }

    /// Build an HTTP client routed through the configured proxies
    #[cfg(any(feature = "trino", feature = "clickhouse"))]
    pub fn build_client(&self) -> Result<reqwest::Client, ConnectError> {
        let mut builder = reqwest::Client::builder();

        for (scheme, url) in &self.proxies {
            let proxy = match scheme.as_str() {
                "http" => reqwest::Proxy::http(url),
                "https" => reqwest::Proxy::https(url),
                "all" => reqwest::Proxy::all(url),
                other => {
                    return Err(ConnectError::ConfigError(format!(
                        "Unsupported proxy scheme '{}'",
                        other
                    )))
                }
            }
            .map_err(|e| ConnectError::ConfigError(format!("Invalid proxy '{}': {}", url, e)))?;
            builder = builder.proxy(proxy);
        }

        builder
            .build()
            .map_err(|e| ConnectError::ConfigError(format!("Failed to build HTTP client: {}", e)))
    }
}

/// Driver arguments for a descriptor
///
/// Generally the configured `connectionArguments` (or nothing). Trino with
/// proxies gets an [`HttpSession`] injected; an explicit `http_session`
/// argument is dropped in its favor.
pub fn connection_args(descriptor: &ConnectionDescriptor) -> DriverArgs {
    let arguments = descriptor.connection_arguments().cloned().unwrap_or_default();

    match descriptor {
        ConnectionDescriptor::Trino(conn) => match conn.proxies.as_ref().filter(|p| !p.is_empty()) {
            Some(proxies) => {
                let mut arguments = arguments;
                if arguments.remove(HTTP_SESSION_KEY).is_some() {
                    tracing::warn!(
                        "Ignoring explicit '{}' connection argument; proxies are configured",
                        HTTP_SESSION_KEY
                    );
                }
                DriverArgs {
                    arguments,
                    http_session: Some(HttpSession::with_proxies(proxies.clone())),
                }
            }
            None => DriverArgs::from_arguments(arguments),
        },
        _ => DriverArgs::from_arguments(arguments),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use querytrail_core::descriptor::{PostgresConnection, TrinoConnection, TrinoScheme};
    use serde_json::json;

    fn trino(proxies: Option<BTreeMap<String, String>>, arguments: Option<ConnectionArguments>) -> ConnectionDescriptor {
        ConnectionDescriptor::Trino(TrinoConnection {
            scheme: TrinoScheme::Trino,
            username: Some("username".into()),
            password: None,
            host_port: "localhost:443".into(),
            catalog: "catalog".into(),
            database: None,
            params: None,
            proxies,
            connection_options: None,
            connection_arguments: arguments,
        })
    }

    #[test]
    fn test_default_args_are_empty() {
        let descriptor = ConnectionDescriptor::Postgres(PostgresConnection::new("db:5432"));
        assert_eq!(connection_args(&descriptor), DriverArgs::default());
    }

    #[test]
    fn test_arguments_pass_through() {
        let mut arguments = ConnectionArguments::new();
        arguments.insert("connect_timeout".into(), json!(10));

        let mut conn = PostgresConnection::new("db:5432");
        conn.connection_arguments = Some(arguments.clone());
        let args = connection_args(&ConnectionDescriptor::Postgres(conn));

        assert_eq!(args.arguments, arguments);
        assert!(args.http_session.is_none());
    }

    #[test]
    fn test_trino_proxies_inject_session() {
        let proxies = BTreeMap::from([
            ("http".to_string(), "http_proxy".to_string()),
            ("https".to_string(), "https_proxy".to_string()),
        ]);
        let args = connection_args(&trino(Some(proxies.clone()), None));

        assert_eq!(args.http_session, Some(HttpSession::with_proxies(proxies)));
        assert!(args.arguments.is_empty());
    }

    #[test]
    fn test_trino_session_replaces_explicit_argument() {
        let mut arguments = ConnectionArguments::new();
        arguments.insert(HTTP_SESSION_KEY.into(), json!("mine"));
        arguments.insert("verify".into(), json!(false));

        let proxies = BTreeMap::from([("https".to_string(), "https_proxy".to_string())]);
        let args = connection_args(&trino(Some(proxies), Some(arguments)));

        assert!(args.http_session.is_some());
        assert!(!args.arguments.contains_key(HTTP_SESSION_KEY));
        assert_eq!(args.arguments.get("verify"), Some(&json!(false)));
    }

    #[test]
    fn test_trino_without_proxies() {
        let args = connection_args(&trino(None, None));
        assert!(args.http_session.is_none());
    }
}
