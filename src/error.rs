//! Error taxonomy for the CodeAlive client.
//!
//! Every variant renders as human-actionable text. The CLI prints these
//! messages verbatim, and agents relay them to the user as-is.
//!
//! | Variant | Trigger |
//! |---------|---------|
//! | [`CodeAliveError::CredentialNotFound`] | no credential source yielded a key |
//! | [`CodeAliveError::InvalidArgument`] | violated precondition, checked before any request |
//! | [`CodeAliveError::AuthenticationFailed`] | HTTP 401 |
//! | [`CodeAliveError::AccessDenied`] | HTTP 403 |
//! | [`CodeAliveError::NotFound`] | HTTP 404 |
//! | [`CodeAliveError::RateLimited`] | HTTP 429 |
//! | [`CodeAliveError::ServerError`] | HTTP 5xx |
//! | [`CodeAliveError::RequestFailed`] | any other HTTP 4xx |
//! | [`CodeAliveError::ConnectionFailed`] | transport-level failure or timeout |
//! | [`CodeAliveError::InvalidResponse`] | success status with a body that is not JSON |

use thiserror::Error;

use crate::config::DEFAULT_BASE_URL;

#[derive(Error, Debug)]
pub enum CodeAliveError {
    #[error(
        "CodeAlive API key not configured.\n\n\
         Run the interactive setup:\n  codealive setup\n\n\
         Or set the key manually:\n  export CODEALIVE_API_KEY=\"your_key\"\n\n\
         Get your API key at: {url}/settings/api-keys",
        url = DEFAULT_BASE_URL
    )]
    CredentialNotFound,

    #[error("{0}")]
    InvalidArgument(String),

    #[error(
        "Authentication failed (401){detail}. Your API key may be invalid or expired. \
         Get a new key at: {base_url}/settings/api-keys"
    )]
    AuthenticationFailed { detail: String, base_url: String },

    #[error(
        "Access denied (403): {message}. Your API key may lack permissions for this operation."
    )]
    AccessDenied { message: String },

    #[error("Not found (404): {message}")]
    NotFound { message: String },

    #[error("Rate limit exceeded (429). Please wait before retrying.")]
    RateLimited,

    #[error(
        "Server error ({status}): {message}. The CodeAlive service may be temporarily unavailable."
    )]
    ServerError { status: u16, message: String },

    #[error("API request failed ({status}): {message}")]
    RequestFailed { status: u16, message: String },

    #[error(
        "Cannot connect to {base_url}: {reason}. \
         Check your network connection and CODEALIVE_BASE_URL setting."
    )]
    ConnectionFailed { base_url: String, reason: String },

    #[error("Invalid JSON in API response: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, CodeAliveError>;

impl CodeAliveError {
    /// Map a non-success HTTP status and its response body to an error.
    ///
    /// The server's own message is taken from the JSON `message` field,
    /// then `error`, then the raw body text.
    pub fn from_status(status: u16, body: &str, base_url: &str) -> Self {
        let message = extract_error_message(body);
        match status {
            401 => {
                let detail = if message.trim().is_empty() {
                    String::new()
                } else {
                    format!(": {}", message)
                };
                CodeAliveError::AuthenticationFailed {
                    detail,
                    base_url: base_url.to_string(),
                }
            }
            403 => CodeAliveError::AccessDenied { message },
            404 => CodeAliveError::NotFound { message },
            429 => CodeAliveError::RateLimited,
            s if s >= 500 => CodeAliveError::ServerError { status: s, message },
            s => CodeAliveError::RequestFailed { status: s, message },
        }
    }

    /// Whether a later retry by the caller might succeed.
    ///
    /// The client itself never retries.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CodeAliveError::RateLimited
                | CodeAliveError::ServerError { .. }
                | CodeAliveError::ConnectionFailed { .. }
        )
    }

    /// HTTP status behind this error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            CodeAliveError::AuthenticationFailed { .. } => Some(401),
            CodeAliveError::AccessDenied { .. } => Some(403),
            CodeAliveError::NotFound { .. } => Some(404),
            CodeAliveError::RateLimited => Some(429),
            CodeAliveError::ServerError { status, .. }
            | CodeAliveError::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn extract_error_message(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(json) => ["message", "error"]
            .iter()
            .filter_map(|key| json.get(*key))
            .find_map(|v| match v {
                serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
                serde_json::Value::Null | serde_json::Value::String(_) => None,
                other => Some(other.to_string()),
            })
            .unwrap_or_else(|| body.to_string()),
        Err(_) => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://app.codealive.ai";

    #[test]
    fn test_401_mentions_status_and_settings_path() {
        let err = CodeAliveError::from_status(401, r#"{"message":"token expired"}"#, BASE);
        let msg = err.to_string();
        assert!(msg.contains("401"));
        assert!(msg.contains("token expired"));
        assert!(msg.contains("https://app.codealive.ai/settings/api-keys"));
    }

    #[test]
    fn test_401_without_body_has_no_detail() {
        let msg = CodeAliveError::from_status(401, "", BASE).to_string();
        assert!(msg.starts_with("Authentication failed (401). "));
    }

    #[test]
    fn test_message_falls_back_to_error_then_body() {
        let err = CodeAliveError::from_status(404, r#"{"error":"no such repo"}"#, BASE);
        assert_eq!(err.to_string(), "Not found (404): no such repo");

        let err = CodeAliveError::from_status(404, "plain text", BASE);
        assert_eq!(err.to_string(), "Not found (404): plain text");
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            CodeAliveError::from_status(403, "{}", BASE),
            CodeAliveError::AccessDenied { .. }
        ));
        assert!(matches!(
            CodeAliveError::from_status(429, "", BASE),
            CodeAliveError::RateLimited
        ));
        assert!(matches!(
            CodeAliveError::from_status(503, "down", BASE),
            CodeAliveError::ServerError { status: 503, .. }
        ));
        assert!(matches!(
            CodeAliveError::from_status(422, "bad", BASE),
            CodeAliveError::RequestFailed { status: 422, .. }
        ));
    }

    #[test]
    fn test_transient_flags() {
        assert!(CodeAliveError::RateLimited.is_transient());
        assert!(CodeAliveError::from_status(502, "", BASE).is_transient());
        assert!(!CodeAliveError::from_status(401, "", BASE).is_transient());
        assert!(!CodeAliveError::CredentialNotFound.is_transient());
    }

    #[test]
    fn test_server_error_text() {
        let msg = CodeAliveError::from_status(500, r#"{"message":"boom"}"#, BASE).to_string();
        assert_eq!(
            msg,
            "Server error (500): boom. The CodeAlive service may be temporarily unavailable."
        );
    }
}
