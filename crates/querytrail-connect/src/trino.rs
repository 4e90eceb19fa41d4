//! Trino driver over the HTTP statement protocol
//!
//! A statement is POSTed to `/v1/statement`; results are then paged through
//! `nextUri`. Pages are fetched only once the rows of the previous page have
//! been consumed.
//!
//! Proxies configured on the descriptor arrive as the injected HTTP session
//! and are applied to the client.
//!
//! Reference: https://trino.io/docs/current/develop/client-protocol.html

use crate::args::DriverArgs;
use crate::connection::{ConnectError, Connection, RowCursor};
use crate::uri::UriParts;

#[cfg(feature = "trino")]
use querytrail_core::Row;

#[cfg(feature = "trino")]
use serde::Deserialize;

#[cfg(feature = "trino")]
use serde_json::Value;

#[cfg(feature = "trino")]
use std::{collections::VecDeque, sync::Arc};

#[cfg(not(feature = "trino"))]
use crate::connection::not_compiled;

/// Open Trino session
pub struct TrinoConnection {
    #[cfg(feature = "trino")]
    client: reqwest::Client,

    /// `http(s)://host:port`
    base_url: String,

    user: String,
    password: Option<String>,
    catalog: Option<String>,
    schema: Option<String>,
}

impl TrinoConnection {
    /// Connect using the parts of a resolved `trino://` URI
    ///
    /// Recognized driver arguments: `http_scheme` (`http` or `https`; defaults
    /// to `https` on port 443), `user` (overrides the URI username).
    #[cfg(feature = "trino")]
    pub async fn connect(parts: &UriParts, args: &DriverArgs) -> Result<Self, ConnectError> {
        let client = match &args.http_session {
            Some(session) => session.build_client()?,
            None => reqwest::Client::new(),
        };

        let http_scheme = args.get_str("http_scheme").unwrap_or(match parts.port {
            Some(443) => "https",
            _ => "http",
        });

        let user = args
            .get_str("user")
            .map(str::to_string)
            .or_else(|| parts.username.clone())
            .ok_or_else(|| ConnectError::ConfigError("Trino connection has no user".to_string()))?;

        Ok(Self {
            client,
            base_url: format!("{}://{}", http_scheme, parts.host_port()),
            user,
            password: parts.password.clone().filter(|p| !p.is_empty()),
            catalog: parts.path.clone(),
            schema: parts.param("schema").map(str::to_string),
        })
    }

    #[cfg(not(feature = "trino"))]
    pub async fn connect(_parts: &UriParts, _args: &DriverArgs) -> Result<Self, ConnectError> {
        Err(not_compiled("Trino", "trino"))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Apply session headers and credentials to a request
    #[cfg(feature = "trino")]
    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut request = request.header("X-Trino-User", &self.user);
        if let Some(catalog) = &self.catalog {
            request = request.header("X-Trino-Catalog", catalog);
        }
        if let Some(schema) = &self.schema {
            request = request.header("X-Trino-Schema", schema);
        }
        match &self.password {
            Some(password) => request.basic_auth(&self.user, Some(password)),
            None => request,
        }
    }
}

#[async_trait::async_trait]
impl Connection for TrinoConnection {
    fn backend(&self) -> &'static str {
        "Trino"
    }

    #[cfg(feature = "trino")]
    async fn execute(&mut self, sql: &str) -> Result<Box<dyn RowCursor>, ConnectError> {
        tracing::debug!("Executing on Trino {}: {}", self.base_url, sql);

        let request = self
            .client
            .post(format!("{}/v1/statement", self.base_url))
            .body(sql.to_string());
        let page = fetch_page(self.authorize(request)).await?;

        let mut cursor = TrinoCursor {
            client: self.client.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            columns: None,
            buffered: VecDeque::new(),
            next_uri: None,
        };
        cursor.absorb(page)?;
        Ok(Box::new(cursor))
    }

    #[cfg(not(feature = "trino"))]
    async fn execute(&mut self, _sql: &str) -> Result<Box<dyn RowCursor>, ConnectError> {
        Err(not_compiled("Trino", "trino"))
    }
}

/// One response of the statement protocol
#[cfg(feature = "trino")]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryPage {
    #[serde(default)]
    next_uri: Option<String>,

    #[serde(default)]
    columns: Option<Vec<QueryColumn>>,

    #[serde(default)]
    data: Option<Vec<Vec<Value>>>,

    #[serde(default)]
    error: Option<QueryFailure>,
}

#[cfg(feature = "trino")]
#[derive(Debug, Deserialize)]
struct QueryColumn {
    name: String,
}

#[cfg(feature = "trino")]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryFailure {
    message: String,

    #[serde(default)]
    error_name: Option<String>,
}

#[cfg(feature = "trino")]
async fn fetch_page(request: reqwest::RequestBuilder) -> Result<QueryPage, ConnectError> {
    let response = request
        .send()
        .await
        .map_err(|e| ConnectError::NetworkError(e.to_string()))?;

    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(ConnectError::AuthenticationError(format!("Trino returned {}", status)));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ConnectError::QueryError(format!("Trino returned {}: {}", status, body)));
    }

    response
        .json::<QueryPage>()
        .await
        .map_err(|e| ConnectError::InvalidResponse(format!("Malformed Trino response: {}", e)))
}

/// Lazily pages through a running Trino query
#[cfg(feature = "trino")]
struct TrinoCursor {
    client: reqwest::Client,
    user: String,
    password: Option<String>,
    columns: Option<Arc<[String]>>,
    buffered: VecDeque<Vec<Value>>,
    next_uri: Option<String>,
}

#[cfg(feature = "trino")]
impl TrinoCursor {
    fn absorb(&mut self, page: QueryPage) -> Result<(), ConnectError> {
        if let Some(error) = page.error {
            let message = match error.error_name {
                Some(name) => format!("{}: {}", name, error.message),
                None => error.message,
            };
            return Err(if message.contains("Access Denied") {
                ConnectError::PermissionDenied(message)
            } else {
                ConnectError::QueryError(message)
            });
        }

        if self.columns.is_none() {
            if let Some(columns) = page.columns {
                self.columns = Some(columns.into_iter().map(|c| c.name).collect::<Vec<_>>().into());
            }
        }
        if let Some(data) = page.data {
            self.buffered.extend(data);
        }
        self.next_uri = page.next_uri;
        Ok(())
    }
}

#[cfg(feature = "trino")]
#[async_trait::async_trait]
impl RowCursor for TrinoCursor {
    async fn next_row(&mut self) -> Result<Option<Row>, ConnectError> {
        loop {
            if let Some(values) = self.buffered.pop_front() {
                let columns = self.columns.clone().ok_or_else(|| {
                    ConnectError::InvalidResponse("Trino returned data before columns".to_string())
                })?;
                return Ok(Some(Row::new(columns, values)));
            }

            let Some(next_uri) = self.next_uri.take() else {
                return Ok(None);
            };

            let mut request = self.client.get(&next_uri).header("X-Trino-User", &self.user);
            if let Some(password) = &self.password {
                request = request.basic_auth(&self.user, Some(password));
            }
            let page = fetch_page(request).await?;
            self.absorb(page)?;
        }
    }
}
