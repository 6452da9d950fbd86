//! Two-step exploration workflows: one search, then one chat.
//!
//! The query prefix selects the workflow; unprefixed queries use
//! `understand`. Each workflow is a fixed pair of calls with no branching
//! on what the search returns.
//!
//! | Mode | Search query | Search mode | Content | Heading |
//! |------|--------------|-------------|---------|---------|
//! | `understand` | the topic | auto | no | EXPLANATION |
//! | `dependency` | usage and imports of the library | auto | yes | DEPENDENCY ANALYSIS |
//! | `pattern` | different implementations | deep | yes | PATTERN ANALYSIS |
//! | `implement` | similar features | auto | no | IMPLEMENTATION GUIDE |
//! | `debug` | related code | auto | yes | DEBUG ANALYSIS |
//!
//! ```text
//! "pattern:error handling"
//!        │
//!        ▼
//!  ExploreMode::parse ──► search(synthesized query) ──► top 5 locations
//!        │
//!        └──────────────► chat(templated prompt) ─────► answer
//! ```

use anyhow::Result;
use serde_json::Value;
use std::fmt;

use crate::client::CodeAliveClient;
use crate::config::Config;
use crate::error::CodeAliveError;
use crate::models::{ChatReply, SearchMode};
use crate::search::parse_hits;

/// Number of search locations shown before the answer.
pub const TOP_LOCATIONS: usize = 5;

/// The two remote capabilities a workflow needs.
pub trait ContextEngine {
    fn search(
        &self,
        query: &str,
        data_sources: &[String],
        mode: SearchMode,
        include_content: bool,
    ) -> crate::Result<Value>;

    fn chat(&self, question: &str, data_sources: &[String]) -> crate::Result<ChatReply>;
}

impl ContextEngine for CodeAliveClient {
    fn search(
        &self,
        query: &str,
        data_sources: &[String],
        mode: SearchMode,
        include_content: bool,
    ) -> crate::Result<Value> {
        crate::search::search(self, query, data_sources, mode, include_content)
    }

    fn chat(&self, question: &str, data_sources: &[String]) -> crate::Result<ChatReply> {
        crate::chat::chat(self, question, data_sources, None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExploreMode {
    Understand,
    Dependency,
    Pattern,
    Implement,
    Debug,
}

impl ExploreMode {
    pub const ALL: [ExploreMode; 5] = [
        ExploreMode::Understand,
        ExploreMode::Dependency,
        ExploreMode::Pattern,
        ExploreMode::Implement,
        ExploreMode::Debug,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExploreMode::Understand => "understand",
            ExploreMode::Dependency => "dependency",
            ExploreMode::Pattern => "pattern",
            ExploreMode::Implement => "implement",
            ExploreMode::Debug => "debug",
        }
    }

    /// Split `mode:rest` into a mode and the trimmed rest.
    ///
    /// The prefix match ignores case. Without a known prefix the whole
    /// query is returned unchanged under `Understand`.
    pub fn parse(query: &str) -> (ExploreMode, String) {
        for mode in Self::ALL {
            let prefix = format!("{}:", mode.as_str());
            let matches = query
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(&prefix));
            if matches {
                return (mode, query[prefix.len()..].trim().to_string());
            }
        }
        (ExploreMode::Understand, query.to_string())
    }

    fn title(&self) -> &'static str {
        match self {
            ExploreMode::Understand => "UNDERSTAND",
            ExploreMode::Dependency => "DEPENDENCY DEEP-DIVE",
            ExploreMode::Pattern => "PATTERN DISCOVERY",
            ExploreMode::Implement => "IMPLEMENTATION GUIDE",
            ExploreMode::Debug => "DEBUG INVESTIGATION",
        }
    }

    fn topic_label(&self) -> &'static str {
        match self {
            ExploreMode::Understand => "Topic",
            ExploreMode::Dependency => "Library",
            ExploreMode::Pattern => "Pattern",
            ExploreMode::Implement => "Feature to implement",
            ExploreMode::Debug => "Issue",
        }
    }

    /// Heading printed above the chat answer.
    pub fn heading(&self) -> &'static str {
        match self {
            ExploreMode::Understand => "EXPLANATION",
            ExploreMode::Dependency => "DEPENDENCY ANALYSIS",
            ExploreMode::Pattern => "PATTERN ANALYSIS",
            ExploreMode::Implement => "IMPLEMENTATION GUIDE",
            ExploreMode::Debug => "DEBUG ANALYSIS",
        }
    }

    pub fn search_mode(&self) -> SearchMode {
        match self {
            ExploreMode::Pattern => SearchMode::Deep,
            _ => SearchMode::Auto,
        }
    }

    pub fn include_content(&self) -> bool {
        matches!(
            self,
            ExploreMode::Dependency | ExploreMode::Pattern | ExploreMode::Debug
        )
    }

    /// Query sent to search for `topic`.
    pub fn search_query(&self, topic: &str) -> String {
        match self {
            ExploreMode::Understand => topic.to_string(),
            ExploreMode::Dependency => format!(
                "How is {} used? Show me import statements and usage examples",
                topic
            ),
            ExploreMode::Pattern => format!("Show me different implementations of {}", topic),
            ExploreMode::Implement => {
                format!("Similar features to {}, existing implementations", topic)
            }
            ExploreMode::Debug => format!("Code related to {}", topic),
        }
    }

    /// Question sent to chat for `topic`.
    pub fn prompt(&self, topic: &str) -> String {
        match self {
            ExploreMode::Understand => format!(
                "Based on the search results for '{}', explain how this works in the codebase. \
                 Focus on architecture, key components, and data flow.",
                topic
            ),
            ExploreMode::Dependency => format!(
                "About the library/dependency '{}':\n\
                 1. How does it work internally?\n\
                 2. What are the common usage patterns in this codebase?\n\
                 3. What are best practices and potential gotchas?\n\
                 4. How do other projects in the ecosystem use it?",
                topic
            ),
            ExploreMode::Pattern => format!(
                "Analyze the different implementations of '{}' found in the codebase:\n\
                 1. What are the common patterns?\n\
                 2. What are the variations?\n\
                 3. Which approach is recommended and why?\n\
                 4. Are there any anti-patterns to avoid?",
                topic
            ),
            ExploreMode::Implement => format!(
                "I need to implement '{}'. Based on the codebase:\n\
                 1. What similar features exist that I can learn from?\n\
                 2. What are the architectural patterns I should follow?\n\
                 3. What components/services do I need to integrate with?\n\
                 4. What are the key considerations (security, performance, testing)?\n\
                 5. What's the recommended approach to implement this?",
                topic
            ),
            ExploreMode::Debug => format!(
                "Help me debug: '{}'\n\
                 1. What code is likely involved?\n\
                 2. What could be causing this issue?\n\
                 3. What should I check first?\n\
                 4. What are common mistakes related to this?\n\
                 5. How can I trace and fix this issue?",
                topic
            ),
        }
    }
}

impl fmt::Display for ExploreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one exploration produced.
#[derive(Debug, Clone)]
pub struct ExploreReport {
    pub mode: ExploreMode,
    pub topic: String,
    pub data_sources: Vec<String>,
    /// `path:line` for the first [`TOP_LOCATIONS`] search hits.
    pub locations: Vec<String>,
    pub answer: String,
}

/// Run the workflow selected by `raw_query`'s prefix.
pub fn explore(
    engine: &dyn ContextEngine,
    raw_query: &str,
    data_sources: &[String],
) -> crate::Result<ExploreReport> {
    explore_with(engine, raw_query, data_sources, &mut |_| {})
}

/// Same as [`explore`], but hands the search-only report (empty `answer`)
/// to `on_search` before the chat call starts.
pub fn explore_with(
    engine: &dyn ContextEngine,
    raw_query: &str,
    data_sources: &[String],
    on_search: &mut dyn FnMut(&ExploreReport),
) -> crate::Result<ExploreReport> {
    if data_sources.is_empty() {
        return Err(CodeAliveError::InvalidArgument(
            "At least one data source is required. Run `codealive datasources` to see available sources."
                .to_string(),
        ));
    }

    let (mode, topic) = ExploreMode::parse(raw_query);
    tracing::debug!(%mode, %topic, "exploring");

    let results = engine.search(
        &mode.search_query(&topic),
        data_sources,
        mode.search_mode(),
        mode.include_content(),
    )?;
    let mut report = ExploreReport {
        mode,
        topic,
        data_sources: data_sources.to_vec(),
        locations: top_locations(&results, TOP_LOCATIONS),
        answer: String::new(),
    };
    on_search(&report);

    let reply = engine.chat(&mode.prompt(&report.topic), data_sources)?;
    report.answer = reply.answer;
    Ok(report)
}

/// `path:line` for the first `limit` hits; `Unknown` and `?` fill gaps.
pub fn top_locations(results: &Value, limit: usize) -> Vec<String> {
    parse_hits(results)
        .into_iter()
        .take(limit)
        .map(|hit| {
            let path = hit
                .path
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| "Unknown".to_string());
            let line = hit
                .start_line
                .filter(|l| *l > 0)
                .map(|l| l.to_string())
                .unwrap_or_else(|| "?".to_string());
            format!("{}:{}", path, line)
        })
        .collect()
}

pub fn render_report(report: &ExploreReport) -> String {
    format!("{}\n\n{}", render_header(report), render_answer(report))
}

/// Banner, mode, topic and the located code, everything known after search.
pub fn render_header(report: &ExploreReport) -> String {
    let rule = "=".repeat(80);
    let mut out = Vec::new();

    out.push(format!("\n{}\nCodeAlive Explorer\n{}\n", rule, rule));
    out.push(format!("Mode: {}", report.mode.title()));
    out.push(format!("{}: {}", report.mode.topic_label(), report.topic));
    out.push(format!("Data sources: {}", report.data_sources.join(", ")));
    out.push(String::new());

    out.push("Found relevant locations:".to_string());
    if report.locations.is_empty() {
        out.push("   (none)".to_string());
    }
    for (idx, loc) in report.locations.iter().enumerate() {
        out.push(format!("   {}. {}", idx + 1, loc));
    }

    out.join("\n")
}

pub fn render_answer(report: &ExploreReport) -> String {
    let rule = "=".repeat(80);
    let mut out = Vec::new();
    out.push(rule.clone());
    out.push(format!("{}:", report.mode.heading()));
    out.push(rule.clone());
    out.push(report.answer.clone());
    out.push(rule);

    out.join("\n")
}

/// CLI entry point for `codealive explore`.
pub fn run_explore(
    config: &Config,
    api_key: Option<String>,
    query: &str,
    mut data_sources: Vec<String>,
    workspaces: &[String],
) -> Result<()> {
    data_sources.extend(workspaces.iter().map(|ws| format!("workspace:{}", ws)));
    if data_sources.is_empty() {
        return Err(CodeAliveError::InvalidArgument(
            "At least one data source is required. Run `codealive datasources` to see available sources."
                .to_string(),
        )
        .into());
    }

    let client = CodeAliveClient::from_config(config, api_key)?;
    let report = explore_with(&client, query, &data_sources, &mut |partial| {
        println!("{}\n", render_header(partial));
    })?;
    println!("{}", render_answer(&report));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Search {
            query: String,
            mode: SearchMode,
            include_content: bool,
        },
        Chat {
            question: String,
        },
    }

    struct FakeEngine {
        calls: RefCell<Vec<Call>>,
        results: Value,
        chat_fails: bool,
    }

    impl FakeEngine {
        fn new(results: Value) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                results,
                chat_fails: false,
            }
        }
    }

    impl ContextEngine for FakeEngine {
        fn search(
            &self,
            query: &str,
            _data_sources: &[String],
            mode: SearchMode,
            include_content: bool,
        ) -> crate::Result<Value> {
            self.calls.borrow_mut().push(Call::Search {
                query: query.to_string(),
                mode,
                include_content,
            });
            Ok(self.results.clone())
        }

        fn chat(&self, question: &str, _data_sources: &[String]) -> crate::Result<ChatReply> {
            self.calls.borrow_mut().push(Call::Chat {
                question: question.to_string(),
            });
            if self.chat_fails {
                return Err(CodeAliveError::from_status(500, "boom", "http://test"));
            }
            Ok(ChatReply {
                answer: "the answer".to_string(),
                conversation_id: None,
                raw_response: json!({}),
            })
        }
    }

    fn sources() -> Vec<String> {
        vec!["backend".to_string()]
    }

    #[test]
    fn test_parse_prefixes() {
        assert_eq!(
            ExploreMode::parse("dependency: lodash debounce"),
            (ExploreMode::Dependency, "lodash debounce".to_string())
        );
        assert_eq!(
            ExploreMode::parse("PATTERN:error handling"),
            (ExploreMode::Pattern, "error handling".to_string())
        );
        assert_eq!(
            ExploreMode::parse("how does auth work"),
            (ExploreMode::Understand, "how does auth work".to_string())
        );
        assert_eq!(
            ExploreMode::parse("debugging: x"),
            (ExploreMode::Understand, "debugging: x".to_string())
        );
    }

    #[test]
    fn test_parse_handles_multibyte_query() {
        let (mode, topic) = ExploreMode::parse("ü");
        assert_eq!(mode, ExploreMode::Understand);
        assert_eq!(topic, "ü");
    }

    #[test]
    fn test_search_then_chat_once_each() {
        let engine = FakeEngine::new(json!([]));
        explore(&engine, "implement:rate limiting", &sources()).unwrap();
        let calls = engine.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[0], Call::Search { .. }));
        assert!(matches!(calls[1], Call::Chat { .. }));
    }

    #[test]
    fn test_mode_parameters() {
        let cases = [
            ("understand:auth", "auth", SearchMode::Auto, false),
            (
                "dependency:axios",
                "How is axios used? Show me import statements and usage examples",
                SearchMode::Auto,
                true,
            ),
            (
                "pattern:retries",
                "Show me different implementations of retries",
                SearchMode::Deep,
                true,
            ),
            (
                "implement:caching",
                "Similar features to caching, existing implementations",
                SearchMode::Auto,
                false,
            ),
            ("debug:slow queries", "Code related to slow queries", SearchMode::Auto, true),
        ];

        for (raw, expected_query, expected_mode, expected_content) in cases {
            let engine = FakeEngine::new(json!([]));
            explore(&engine, raw, &sources()).unwrap();
            assert_eq!(
                engine.calls.borrow()[0],
                Call::Search {
                    query: expected_query.to_string(),
                    mode: expected_mode,
                    include_content: expected_content,
                },
                "{}",
                raw
            );
        }
    }

    #[test]
    fn test_prompt_embeds_topic() {
        let engine = FakeEngine::new(json!([]));
        explore(&engine, "understand:user sessions", &sources()).unwrap();
        match &engine.calls.borrow()[1] {
            Call::Chat { question } => {
                assert!(question.starts_with("Based on the search results for 'user sessions'"))
            }
            other => panic!("unexpected call {:?}", other),
        };
    }

    #[test]
    fn test_top_locations_capped_with_placeholders() {
        let items: Vec<Value> = (1..=7)
            .map(|i| json!({"filePath": format!("f{}.rs", i), "startLine": i}))
            .chain(std::iter::once(json!({"kind": "Chunk"})))
            .collect();
        let locs = top_locations(&json!(items), TOP_LOCATIONS);
        assert_eq!(locs.len(), 5);
        assert_eq!(locs[0], "f1.rs:1");

        let locs = top_locations(&json!({"results": [{"kind": "Chunk"}]}), TOP_LOCATIONS);
        assert_eq!(locs, vec!["Unknown:?"]);
    }

    #[test]
    fn test_empty_sources_rejected_before_calls() {
        let engine = FakeEngine::new(json!([]));
        let err = explore(&engine, "debug:x", &[]).unwrap_err();
        assert!(matches!(err, CodeAliveError::InvalidArgument(_)));
        assert!(engine.calls.borrow().is_empty());
    }

    #[test]
    fn test_render_report() {
        let engine = FakeEngine::new(json!([{"filePath": "src/lib.rs", "startLine": 3}]));
        let report = explore(&engine, "debug:panic on start", &sources()).unwrap();
        let text = render_report(&report);
        assert!(text.contains("Mode: DEBUG INVESTIGATION"));
        assert!(text.contains("Issue: panic on start"));
        assert!(text.contains("   1. src/lib.rs:3"));
        assert!(text.contains("DEBUG ANALYSIS:"));
        assert!(text.contains("the answer"));
    }

    #[test]
    fn test_locations_reported_before_chat_failure() {
        let mut engine = FakeEngine::new(json!([{"filePath": "db/pool.rs", "startLine": 12}]));
        engine.chat_fails = true;

        let mut headers = Vec::new();
        let result = explore_with(&engine, "debug:slow queries", &sources(), &mut |partial| {
            assert!(partial.answer.is_empty());
            headers.push(render_header(partial));
        });

        assert!(result.is_err());
        assert_eq!(engine.calls.borrow().len(), 2);
        assert_eq!(headers.len(), 1);
        assert!(headers[0].contains("   1. db/pool.rs:12"));
        assert!(!headers[0].contains("DEBUG ANALYSIS:"));
    }

    #[test]
    fn test_report_is_header_then_answer() {
        let engine = FakeEngine::new(json!([]));
        let report = explore(&engine, "how does auth work", &sources()).unwrap();
        assert_eq!(
            render_report(&report),
            format!("{}\n\n{}", render_header(&report), render_answer(&report))
        );
        assert!(render_header(&report).ends_with("   (none)"));
        assert!(render_answer(&report).contains("EXPLANATION:\n"));
    }
}
