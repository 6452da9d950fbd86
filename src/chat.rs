//! Codebase Q&A against the chat completions endpoint.
//!
//! A call either starts a conversation over a set of data sources or
//! continues an existing one by id. When both are supplied the
//! conversation id wins and the data sources are not sent.

use anyhow::Result;
use serde_json::{json, Value};

use crate::client::CodeAliveClient;
use crate::config::Config;
use crate::error::CodeAliveError;
use crate::models::ChatReply;

pub const CHAT_PATH: &str = "/api/chat/completions";

/// Build the request body. Streaming is always disabled.
pub fn build_chat_body(
    question: &str,
    data_sources: &[String],
    conversation_id: Option<&str>,
) -> crate::Result<Value> {
    let conversation_id = conversation_id.filter(|id| !id.trim().is_empty());

    let mut body = json!({
        "messages": [{"role": "user", "content": question}],
        "stream": false,
    });

    match conversation_id {
        Some(id) => {
            body["conversationId"] = json!(id);
        }
        None if !data_sources.is_empty() => {
            body["names"] = json!(data_sources);
        }
        None => {
            return Err(CodeAliveError::InvalidArgument(
                "Either data sources or a conversation id is required. \
                 Run `codealive datasources` to see available sources."
                    .to_string(),
            ));
        }
    }

    Ok(body)
}

/// Ask a question and return the answer with the conversation id to reuse.
pub fn chat(
    client: &CodeAliveClient,
    question: &str,
    data_sources: &[String],
    conversation_id: Option<&str>,
) -> crate::Result<ChatReply> {
    let body = build_chat_body(question, data_sources, conversation_id)?;
    let response = client.post(CHAT_PATH, &body)?;
    Ok(parse_chat_response(response))
}

/// Extract the first choice's content and the conversation id.
///
/// Unexpected shapes degrade to an empty answer and no id.
pub fn parse_chat_response(response: Value) -> ChatReply {
    let answer = response
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let conversation_id = match response.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    ChatReply {
        answer,
        conversation_id,
        raw_response: response,
    }
}

/// Answer framed by rules, plus the follow-up hint when an id came back.
pub fn render_reply(reply: &ChatReply) -> String {
    let rule = "=".repeat(80);
    let mut out = format!("{}\n{}\n{}", rule, reply.answer, rule);
    if let Some(ref id) = reply.conversation_id {
        out.push_str(&format!(
            "\n\nConversation ID: {}\n   Use --continue {} to ask follow-up questions",
            id, id
        ));
    }
    out
}

/// CLI entry point for `codealive chat`.
pub fn run_chat(
    config: &Config,
    api_key: Option<String>,
    question: &str,
    data_sources: &[String],
    conversation_id: Option<&str>,
) -> Result<()> {
    // Fail on a bad argument combination before touching credentials.
    build_chat_body(question, data_sources, conversation_id)?;

    let client = CodeAliveClient::from_config(config, api_key)?;

    eprintln!("Question: {}", question);
    match conversation_id {
        Some(id) => eprintln!("Continuing conversation: {}", id),
        None => eprintln!("Analyzing: {}", data_sources.join(", ")),
    }
    eprintln!();
    eprintln!("Thinking...");
    eprintln!();

    let reply = chat(&client, question, data_sources, conversation_id)?;
    println!("{}", render_reply(&reply));

    Ok(())
}
