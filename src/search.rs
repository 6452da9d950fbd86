//! Semantic code search.
//!
//! The server decides ranking; results are rendered in the order received.
//! Response shapes vary, so [`parse_hits`] accepts a bare list, a
//! `{"results": [...]}` envelope or a single object, and maps several
//! candidate field names onto each [`SearchHit`] field.

use anyhow::Result;
use serde_json::Value;

use crate::client::{CodeAliveClient, QueryValue};
use crate::config::Config;
use crate::error::CodeAliveError;
use crate::models::{SearchHit, SearchMode};

pub const SEARCH_PATH: &str = "/api/search";

/// Run a search against one or more data sources.
///
/// Fails with [`CodeAliveError::InvalidArgument`] before any request when
/// `data_sources` is empty.
pub fn search(
    client: &CodeAliveClient,
    query: &str,
    data_sources: &[String],
    mode: SearchMode,
    include_content: bool,
) -> crate::Result<Value> {
    if data_sources.is_empty() {
        return Err(CodeAliveError::InvalidArgument(
            "At least one data source is required. Run `codealive datasources` to see available sources."
                .to_string(),
        ));
    }

    client.get(
        SEARCH_PATH,
        &[
            ("Query", query.into()),
            ("Mode", mode.as_str().into()),
            ("IncludeContent", include_content.to_string().into()),
            ("Names", QueryValue::Many(data_sources.to_vec())),
        ],
    )
}

// ============ Tolerant parsing ============

const PATH_KEYS: &[&str] = &["filePath", "file", "path"];
const START_LINE_KEYS: &[&str] = &["startLine", "lineNumber"];
const END_LINE_KEYS: &[&str] = &["endLine"];
const SCORE_KEYS: &[&str] = &["score", "relevance"];
const SNIPPET_KEYS: &[&str] = &["snippet", "content", "code"];

/// Items of a search response, whatever its envelope.
pub fn result_items(response: &Value) -> Vec<&Value> {
    match response {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) if map.is_empty() => Vec::new(),
        Value::Object(map) => match map.get("results") {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(_) => Vec::new(),
            None => vec![response],
        },
        _ => Vec::new(),
    }
}

/// Normalize a search response into hits, preserving server order.
pub fn parse_hits(response: &Value) -> Vec<SearchHit> {
    result_items(response).into_iter().map(parse_hit).collect()
}

fn parse_hit(item: &Value) -> SearchHit {
    let location = item.get("location");
    let range = location.and_then(|l| l.get("range"));

    let identifier = str_field(item, "identifier").unwrap_or_default();

    let path = location
        .and_then(|l| str_field(l, "path"))
        .or_else(|| first_str(item, PATH_KEYS))
        .or_else(|| path_from_identifier(&identifier));

    let start_line = range
        .and_then(|r| r.get("start"))
        .and_then(|s| line_field(s, "line"))
        .or_else(|| first_line(item, START_LINE_KEYS));
    let end_line = range
        .and_then(|r| r.get("end"))
        .and_then(|e| line_field(e, "line"))
        .or_else(|| first_line(item, END_LINE_KEYS));

    let source = match item.get("dataSource") {
        Some(Value::Object(ds)) => ds.get("name").and_then(Value::as_str).map(str::to_string),
        Some(Value::String(name)) => Some(name.clone()),
        _ => None,
    };

    let score = SCORE_KEYS
        .iter()
        .find_map(|key| item.get(*key).and_then(Value::as_f64));

    SearchHit {
        path,
        start_line,
        end_line,
        source: source.filter(|s| !s.is_empty()),
        kind: str_field(item, "kind").unwrap_or_default(),
        identifier,
        score,
        snippet: first_str(item, SNIPPET_KEYS).unwrap_or_default(),
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn first_str(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| str_field(value, key))
}

/// Line numbers of zero count as absent, so the next candidate key is tried.
fn line_field(value: &Value, key: &str) -> Option<i64> {
    value.get(key).and_then(Value::as_i64).filter(|n| *n != 0)
}

fn first_line(value: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| line_field(value, key))
}

/// Chunk identifiers look like `repo::path::chunk_id`.
fn path_from_identifier(identifier: &str) -> Option<String> {
    let mut parts = identifier.split("::");
    let _repo = parts.next()?;
    parts
        .next()
        .filter(|p| !p.is_empty())
        .map(str::to_string)
}

// ============ Rendering ============

/// Render hits as compact blocks followed by a result count.
pub fn render_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No results found.".to_string();
    }

    let mut out = Vec::new();
    for (idx, hit) in hits.iter().enumerate() {
        out.push(format!("\n--- Result #{} [{}] ---", idx + 1, hit.kind));

        if let Some(loc) = hit.location() {
            out.push(format!("  File: {}", loc));
        }

        // Chunk identifiers are opaque numbers; only symbols are worth showing.
        if !hit.identifier.is_empty() && hit.kind != "Chunk" {
            let short_id = hit.identifier.rsplit("::").next().unwrap_or(&hit.identifier);
            if Some(short_id) != hit.path.as_deref() {
                out.push(format!("  Symbol: {}", short_id));
            }
        }

        if let Some(ref source) = hit.source {
            out.push(format!("  Source: {}", source));
        }
        if let Some(score) = hit.score {
            out.push(format!("  Relevance: {:.2}", score));
        }

        let snippet = hit.snippet.trim();
        if !snippet.is_empty() {
            out.push(format!("\n```\n{}\n```", snippet));
        }
    }

    out.push(format!("\n({} results)", hits.len()));
    out.join("\n")
}

/// Render a raw search response.
pub fn render_response(response: &Value) -> String {
    render_hits(&parse_hits(response))
}

/// CLI entry point for `codealive search`.
pub fn run_search(
    config: &Config,
    api_key: Option<String>,
    query: &str,
    data_sources: &[String],
    mode: SearchMode,
    include_content: bool,
) -> Result<()> {
    if data_sources.is_empty() {
        // Same precondition as `search`, checked before credentials are resolved.
        return Err(CodeAliveError::InvalidArgument(
            "At least one data source is required. Run `codealive datasources` to see available sources."
                .to_string(),
        )
        .into());
    }

    let client = CodeAliveClient::from_config(config, api_key)?;

    eprintln!("Searching for: '{}'", query);
    eprintln!("Data sources: {}", data_sources.join(", "));
    eprintln!("Mode: {}", mode);
    if include_content {
        eprintln!("Include content: yes");
    }
    eprintln!();

    let response = search(&client, query, data_sources, mode, include_content)?;
    println!("{}", render_response(&response));

    Ok(())
}
