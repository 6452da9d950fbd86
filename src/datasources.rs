//! Listing indexed repositories and workspaces.
//!
//! `alive_only` selects between two server endpoints; the client never
//! filters or merges the lists itself.

use anyhow::Result;
use serde_json::Value;

use crate::client::CodeAliveClient;
use crate::config::{Config, DEFAULT_BASE_URL};
use crate::models::{DataSource, DataSourceType};

pub const ALIVE_PATH: &str = "/api/datasources/alive";
pub const ALL_PATH: &str = "/api/datasources/all";

/// Fetch the raw data source list, in server order.
pub fn fetch_data_sources(client: &CodeAliveClient, alive_only: bool) -> crate::Result<Value> {
    let path = if alive_only { ALIVE_PATH } else { ALL_PATH };
    client.get(path, &[])
}

/// Fetch and parse data sources, in server order.
pub fn list_data_sources(
    client: &CodeAliveClient,
    alive_only: bool,
) -> crate::Result<Vec<DataSource>> {
    let value = fetch_data_sources(client, alive_only)?;
    Ok(parse_data_sources(&value))
}

/// Every object entry becomes a [`DataSource`]; bad field values fall back
/// to defaults instead of dropping the entry. Non-object entries are skipped.
pub fn parse_data_sources(value: &Value) -> Vec<DataSource> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter(|item| item.is_object())
                .filter_map(|item| match serde_json::from_value(item.clone()) {
                    Ok(ds) => Some(ds),
                    Err(e) => {
                        tracing::warn!(error = %e, "unreadable data source entry");
                        None
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Human-readable listing, workspaces first.
pub fn render_data_sources(sources: &[DataSource]) -> String {
    if sources.is_empty() {
        return format!(
            "No data sources found.\nAdd repositories at {}",
            DEFAULT_BASE_URL
        );
    }

    let rule = "=".repeat(80);
    let thin = "-".repeat(80);
    let mut out = Vec::new();
    out.push(format!("\nAvailable Data Sources ({} total)\n", sources.len()));
    out.push(rule.clone());

    let workspaces: Vec<&DataSource> = sources
        .iter()
        .filter(|ds| ds.kind == DataSourceType::Workspace)
        .collect();
    let repos: Vec<&DataSource> = sources
        .iter()
        .filter(|ds| ds.kind == DataSourceType::Repository)
        .collect();

    if !workspaces.is_empty() {
        out.push("\nWORKSPACES (search across multiple repos)".to_string());
        out.push(thin.clone());
        for ws in workspaces {
            out.push(format!("\n  {}{}", display_name(ws), status_suffix(ws)));
            out.push(format!("     {}", description(ws)));
        }
    }

    if !repos.is_empty() {
        out.push("\n\nREPOSITORIES".to_string());
        out.push(thin);
        for repo in repos {
            out.push(format!("\n  {}{}", display_name(repo), status_suffix(repo)));
            out.push(format!("     {}", description(repo)));
            if let Some(url) = repo.url.as_deref().filter(|u| !u.is_empty()) {
                out.push(format!("     {}", url));
            }
        }
    }

    out.push(format!("\n{}", rule));
    out.push("\nUsage:".to_string());
    out.push("   - Use names with `codealive search` and `codealive chat`".to_string());
    out.push("   - Workspaces search ALL repos in the workspace".to_string());
    out.push("   - Combine multiple data sources for broader search".to_string());
    out.push("\nExamples:".to_string());
    out.push("   codealive search 'auth logic' my-backend".to_string());
    out.push("   codealive chat 'How does caching work?' workspace:platform-team".to_string());

    out.join("\n")
}

fn display_name(ds: &DataSource) -> &str {
    if ds.name.is_empty() {
        "Unknown"
    } else {
        &ds.name
    }
}

fn description(ds: &DataSource) -> &str {
    ds.description
        .as_deref()
        .filter(|d| !d.is_empty())
        .unwrap_or("No description")
}

fn status_suffix(ds: &DataSource) -> String {
    match ds.state.as_deref() {
        Some(state) if !state.is_empty() && state != "Alive" => format!(" [{}]", state),
        _ => String::new(),
    }
}

/// CLI entry point for `codealive datasources`.
pub fn run_datasources(
    config: &Config,
    api_key: Option<String>,
    all: bool,
    json: bool,
) -> Result<()> {
    let client = CodeAliveClient::from_config(config, api_key)?;
    let value = fetch_data_sources(&client, !all)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", render_data_sources(&parse_data_sources(&value)));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Vec<DataSource> {
        parse_data_sources(&json!([
            {"name": "backend", "type": "Repository", "description": "API server",
             "url": "https://git.example.com/backend", "state": "Alive"},
            {"name": "platform-team", "type": "Workspace", "description": "All services"},
            {"name": "frontend", "type": "Repository", "state": "Processing"}
        ]))
    }

    #[test]
    fn test_parse_preserves_order() {
        let names: Vec<String> = sample().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["backend", "platform-team", "frontend"]);
    }

    #[test]
    fn test_parse_keeps_entries_with_null_or_mistyped_fields() {
        let sources = parse_data_sources(&json!([
            {"name": "a", "type": "Repository"},
            {"name": "b", "type": null},
            {"name": null, "type": "Workspace"},
            {"name": "c", "type": "Repository", "description": 42}
        ]));
        assert_eq!(sources.len(), 4);
        assert_eq!(sources[1].kind, DataSourceType::Other);
        assert_eq!(sources[2].name, "");
        assert_eq!(sources[2].kind, DataSourceType::Workspace);
        assert_eq!(sources[3].description, None);

        let text = render_data_sources(&sources);
        assert!(text.contains("(4 total)"));
        assert!(text.contains("\n  Unknown\n"));
        assert!(text.contains("\n  c\n     No description"));
    }

    #[test]
    fn test_parse_non_list_is_empty() {
        assert!(parse_data_sources(&json!({})).is_empty());
    }

    #[test]
    fn test_render_groups_workspaces_first() {
        let text = render_data_sources(&sample());
        let ws = text.find("WORKSPACES").unwrap();
        let repos = text.find("REPOSITORIES").unwrap();
        assert!(ws < repos);
        assert!(text.contains("(3 total)"));
    }

    #[test]
    fn test_render_state_and_url() {
        let text = render_data_sources(&sample());
        assert!(text.contains("frontend [Processing]"));
        assert!(!text.contains("backend [Alive]"));
        assert!(text.contains("https://git.example.com/backend"));
        assert!(text.contains("No description"));
    }

    #[test]
    fn test_render_empty() {
        let text = render_data_sources(&[]);
        assert!(text.starts_with("No data sources found."));
    }
}
