//! Wire types exchanged with the CodeAlive API.
//!
//! Parsing is lenient throughout: missing, null or mistyped fields take
//! empty defaults and unknown fields are kept, so a server-side schema
//! change never hides an entry from the CLI.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Kind of indexed entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DataSourceType {
    Repository,
    Workspace,
    #[default]
    #[serde(other)]
    Other,
}

/// Deserialize a field, falling back to its default on null or a wrong type.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// An indexed repository or workspace, as reported by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    #[serde(default, deserialize_with = "lenient")]
    pub name: String,
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub kind: DataSourceType,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Fields this client does not interpret, preserved for `--json` output.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DataSource {
    /// `true` when the server reports the source ready for use.
    ///
    /// A missing state counts as ready; only explicit other states do not.
    pub fn is_alive(&self) -> bool {
        match self.state.as_deref() {
            None | Some("") | Some("Alive") => true,
            Some(_) => false,
        }
    }
}

/// Search strategy requested from the server. Passed through uninterpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SearchMode {
    /// Let the server choose.
    #[default]
    Auto,
    /// Lower latency, possibly lower recall.
    Fast,
    /// Cross-repository, more expensive search.
    Deep,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Auto => "auto",
            SearchMode::Fast => "fast",
            SearchMode::Deep => "deep",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One search match, normalized from whichever field names the server used.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHit {
    pub path: Option<String>,
    pub start_line: Option<i64>,
    pub end_line: Option<i64>,
    pub source: Option<String>,
    pub kind: String,
    pub identifier: String,
    pub score: Option<f64>,
    pub snippet: String,
}

impl SearchHit {
    /// `path`, `path:start` or `path:start-end`; line numbers <= 0 are dropped.
    pub fn location(&self) -> Option<String> {
        let path = self.path.as_deref().filter(|p| !p.is_empty())?;
        match (self.start_line, self.end_line) {
            (Some(start), Some(end)) if start > 0 && end > 0 && end != start => {
                Some(format!("{}:{}-{}", path, start, end))
            }
            (Some(start), _) if start > 0 => Some(format!("{}:{}", path, start)),
            _ => Some(path.to_string()),
        }
    }
}

/// Result of one chat call.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    /// Assistant message content; empty when the response shape was unexpected.
    pub answer: String,
    /// Id to pass back to continue the conversation.
    pub conversation_id: Option<String>,
    pub raw_response: Value,
}
