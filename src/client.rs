//! HTTP client for the CodeAlive REST API.
//!
//! [`CodeAliveClient::request`] is the single path every call takes:
//!
//! - attaches `Authorization: Bearer <key>` and `Content-Type: application/json`,
//! - URL-encodes query parameters, repeating the key for list values
//!   (`Names=a&Names=b`),
//! - JSON-encodes the body if one is given,
//! - decodes a non-empty response body as JSON (an empty body yields `{}`),
//! - maps failures to [`CodeAliveError`] without ever retrying.
//!
//! # Endpoints
//!
//! | Method | Path | Used by |
//! |--------|------|---------|
//! | `GET`  | `/api/datasources/alive` | [`crate::datasources`], key verification |
//! | `GET`  | `/api/datasources/all` | [`crate::datasources`] |
//! | `GET`  | `/api/search` | [`crate::search`] |
//! | `POST` | `/api/chat/completions` | [`crate::chat`] |

use reqwest::blocking::Client;
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;

use crate::config::Config;
use crate::credentials::{Credential, CredentialResolver};
use crate::error::{CodeAliveError, Result};

/// A query parameter value. `Many` is sent as one `name=value` pair per item.
#[derive(Debug, Clone)]
pub enum QueryValue {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::One(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::One(value)
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(values: Vec<String>) -> Self {
        QueryValue::Many(values)
    }
}

/// Flatten named parameters into ordered `(name, value)` pairs.
pub fn expand_query(params: &[(&str, QueryValue)]) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (name, value) in params {
        match value {
            QueryValue::One(v) => pairs.push((name.to_string(), v.clone())),
            QueryValue::Many(vs) => {
                pairs.extend(vs.iter().map(|v| (name.to_string(), v.clone())));
            }
        }
    }
    pairs
}

/// Authenticated, blocking client bound to one base URL.
pub struct CodeAliveClient {
    http: Client,
    base_url: String,
    credential: Credential,
}

impl CodeAliveClient {
    /// Build a client with an already-resolved credential.
    pub fn new(credential: Credential, base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("codealive/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CodeAliveError::ConnectionFailed {
                base_url: base_url.clone(),
                reason: root_cause(&e),
            })?;

        Ok(Self {
            http,
            base_url,
            credential,
        })
    }

    /// Resolve the credential (explicit key, env, OS store) and build a
    /// client from the configuration.
    pub fn from_config(config: &Config, explicit_key: Option<String>) -> Result<Self> {
        let credential =
            CredentialResolver::standard(explicit_key, config.credentials.os_store).resolve()?;
        Self::new(
            credential,
            config.base_url(),
            Duration::from_secs(config.api.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue one request and decode the JSON response.
    pub fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, QueryValue)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%method, %url, "sending request");

        let mut req = self
            .http
            .request(method, &url)
            .header("Authorization", format!("Bearer {}", self.credential.expose()))
            .header("Content-Type", "application/json");

        if !query.is_empty() {
            req = req.query(&expand_query(query));
        }
        if let Some(body) = body {
            req = req.body(body.to_string());
        }

        let response = req.send().map_err(|e| self.connection_failed(&e))?;
        let status = response.status();
        let text = response.text().map_err(|e| self.connection_failed(&e))?;
        tracing::debug!(status = status.as_u16(), bytes = text.len(), "response received");

        if !status.is_success() {
            return Err(CodeAliveError::from_status(
                status.as_u16(),
                &text,
                &self.base_url,
            ));
        }

        if text.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_str(&text).map_err(|e| CodeAliveError::InvalidResponse(e.to_string()))
    }

    pub fn get(&self, path: &str, query: &[(&str, QueryValue)]) -> Result<Value> {
        self.request(Method::GET, path, query, None)
    }

    pub fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.request(Method::POST, path, &[], Some(body))
    }

    fn connection_failed(&self, err: &reqwest::Error) -> CodeAliveError {
        CodeAliveError::ConnectionFailed {
            base_url: self.base_url.clone(),
            reason: root_cause(err),
        }
    }
}

/// Innermost error message, e.g. `Connection refused (os error 111)`.
fn root_cause(err: &(dyn std::error::Error + 'static)) -> String {
    let mut current = err;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}

/// Check a key by listing ready data sources with the short verification
/// timeout. Returns the number of data sources visible to the key.
pub fn verify_key(api_key: &str, base_url: &str, timeout: Duration) -> Result<usize> {
    let client = CodeAliveClient::new(Credential::new(api_key), base_url, timeout)?;
    let value = client.get("/api/datasources/alive", &[])?;
    Ok(value.as_array().map(|items| items.len()).unwrap_or(0))
}
