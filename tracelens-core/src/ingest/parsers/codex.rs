//! OpenAI Codex CLI JSONL parser
//!
//! Parses rollout logs from `~/.codex/sessions/YYYY/MM/DD/rollout-*.jsonl`.
//!
//! Every line is an envelope `{timestamp, type, payload}`. The envelope is
//! decoded first, then [`decode_record`] turns it into a [`CodexRecord`], one
//! variant per payload family, with anything unfamiliar routed to
//! [`CodexRecord::Other`].
//!
//! `event_msg` payloads of type `user_message`, `agent_message` and
//! `agent_reasoning` repeat content already present as `response_item`
//! records and are not emitted.

use crate::error::Result;
use crate::format::{
    char_len, format_tool_input, maybe_parse_json, output_indicates_error, stringify_value,
    summarize_text, summarize_tool_call, summarize_tool_output, Render,
};
use crate::ingest::decoder::decode_file;
use crate::ingest::parser::{ParseContext, ParseResult, TranscriptParser};
use crate::types::{Event, EventKind, SchemaFamily, ToolCall, ToolResult};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

/// Parser for OpenAI Codex CLI rollout logs.
#[derive(Default)]
pub struct CodexParser;

impl CodexParser {
    pub fn new() -> Self {
        Self
    }
}

// ============================================
// Raw JSONL record types (serde deserialization)
// ============================================

/// Top-level envelope for Codex JSONL records.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawEvent {
    timestamp: Option<String>,
    #[serde(rename = "type")]
    event_type: Option<String>,
    payload: Value,
}

/// Session metadata payload (first record in file).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SessionMeta {
    id: Option<String>,
    cwd: Option<String>,
    originator: Option<String>,
    cli_version: Option<String>,
    model_provider: Option<String>,
    source: Option<Value>,
}

/// Per-turn settings.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct TurnContext {
    cwd: Option<String>,
    model: Option<String>,
    effort: Option<String>,
    approval_policy: Option<String>,
    sandbox_policy: Option<SandboxPolicy>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SandboxPolicy {
    #[serde(rename = "type")]
    mode: Option<String>,
}

/// `response_item` payloads, dispatched on `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseItem {
    Message {
        #[serde(default)]
        role: Option<String>,
        #[serde(default)]
        content: Value,
    },
    FunctionCall {
        #[serde(default = "unknown_tool")]
        name: String,
        #[serde(default)]
        arguments: Value,
        #[serde(default)]
        call_id: Option<String>,
    },
    CustomToolCall {
        #[serde(default = "unknown_tool")]
        name: String,
        #[serde(default)]
        input: Value,
        #[serde(default)]
        call_id: Option<String>,
    },
    FunctionCallOutput {
        #[serde(default)]
        call_id: Option<String>,
        #[serde(default)]
        output: Value,
    },
    CustomToolCallOutput {
        #[serde(default)]
        call_id: Option<String>,
        #[serde(default)]
        output: Value,
    },
    Reasoning {
        #[serde(default)]
        summary: Vec<Value>,
        #[serde(default)]
        content: Value,
        #[serde(default)]
        encrypted_content: Option<String>,
    },
    GhostSnapshot {
        #[serde(default)]
        ghost_commit: Value,
    },
    #[serde(other)]
    Other,
}

fn unknown_tool() -> String {
    "unknown".to_string()
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct TokenCount {
    info: Option<TokenInfo>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct TokenInfo {
    total_token_usage: Option<TokenUsage>,
    last_token_usage: Option<TokenUsage>,
    model_context_window: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
struct TokenUsage {
    input_tokens: u64,
    cached_input_tokens: u64,
    output_tokens: u64,
    reasoning_output_tokens: u64,
    total_tokens: u64,
}

impl TokenUsage {
    fn describe(&self, label: &str) -> String {
        format!(
            "{}: input_tokens={}, cached_input_tokens={}, output_tokens={}, reasoning_output_tokens={}, total_tokens={}",
            label,
            self.input_tokens,
            self.cached_input_tokens,
            self.output_tokens,
            self.reasoning_output_tokens,
            self.total_tokens
        )
    }
}

/// A decoded Codex record.
#[derive(Debug)]
enum CodexRecord {
    SessionMeta(SessionMeta),
    TurnContext(TurnContext),
    Response(ResponseItem),
    TokenCount(TokenCount),
    /// `event_msg` mirror of a `response_item`
    Mirror,
    /// Any other `event_msg`, kept as a named lifecycle notice
    Notice { name: String, payload: Value },
    /// History was compacted to fit the context window
    Compacted { message: Option<String> },
    Other,
}

/// Explicit decoder per record family; shape mismatches become `Other`.
fn decode_record(raw: RawEvent) -> CodexRecord {
    fn payload_as<T: for<'de> Deserialize<'de>>(payload: Value) -> Option<T> {
        serde_json::from_value(payload).ok()
    }

    match raw.event_type.as_deref() {
        Some("session_meta") => payload_as(raw.payload)
            .map(CodexRecord::SessionMeta)
            .unwrap_or(CodexRecord::Other),
        Some("turn_context") => payload_as(raw.payload)
            .map(CodexRecord::TurnContext)
            .unwrap_or(CodexRecord::Other),
        Some("response_item") => match payload_as::<ResponseItem>(raw.payload) {
            Some(ResponseItem::Other) | None => CodexRecord::Other,
            Some(item) => CodexRecord::Response(item),
        },
        Some("event_msg") => {
            let name = raw
                .payload
                .get("type")
                .and_then(|t| t.as_str())
                .unwrap_or("event_msg")
                .to_string();
            match name.as_str() {
                "token_count" => payload_as(raw.payload)
                    .map(CodexRecord::TokenCount)
                    .unwrap_or(CodexRecord::Other),
                "user_message" | "agent_message" | "agent_reasoning" => CodexRecord::Mirror,
                _ => CodexRecord::Notice {
                    name,
                    payload: raw.payload,
                },
            }
        }
        Some("compacted") => CodexRecord::Compacted {
            message: raw
                .payload
                .get("message")
                .and_then(|m| m.as_str())
                .filter(|m| !m.trim().is_empty())
                .map(str::to_string),
        },
        _ => CodexRecord::Other,
    }
}

// ============================================
// Helper functions
// ============================================

/// Concatenate `input_text` / `output_text` parts of a message.
fn extract_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter(|item| {
                matches!(
                    item.get("type").and_then(|t| t.as_str()),
                    Some("input_text") | Some("output_text") | Some("text")
                )
            })
            .filter_map(|item| item.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}

fn extract_reasoning_text(summary: &[Value], content: &Value, encrypted: bool) -> String {
    let mut parts: Vec<String> = Vec::new();
    for item in summary {
        match item {
            Value::String(s) => parts.push(s.clone()),
            Value::Object(map) => {
                if let Some(text) = map
                    .get("text")
                    .or_else(|| map.get("summary_text"))
                    .and_then(|t| t.as_str())
                {
                    parts.push(text.to_string());
                }
            }
            _ => {}
        }
    }
    match content {
        Value::Null => {}
        Value::Array(_) => parts.push(extract_text(content)),
        other => parts.push(stringify_value(other)),
    }
    if encrypted {
        parts.push("(encrypted_content present)".to_string());
    }
    parts
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Tool arguments as structured JSON when they arrive as an embedded string.
fn decode_arguments(arguments: Value) -> Value {
    match arguments {
        Value::String(s) => maybe_parse_json(&s),
        other => other,
    }
}

/// Tool output text and, when the payload reports one, its exit code.
fn tool_output(output: &Value) -> (String, Option<i64>) {
    match output {
        Value::String(s) => {
            // Newer CLIs wrap output as an embedded JSON object
            if let Value::Object(map) = maybe_parse_json(s) {
                if let Some(text) = map.get("output").and_then(|o| o.as_str()) {
                    let code = map
                        .get("metadata")
                        .and_then(|m| m.get("exit_code"))
                        .and_then(|c| c.as_i64());
                    return (text.to_string(), code);
                }
            }
            (s.clone(), None)
        }
        Value::Object(map) => match map.get("output").and_then(|o| o.as_str()) {
            Some(text) => {
                let code = map
                    .get("metadata")
                    .and_then(|m| m.get("exit_code"))
                    .and_then(|c| c.as_i64());
                (text.to_string(), code)
            }
            None => (stringify_value(output), None),
        },
        other => (stringify_value(other), None),
    }
}

fn lifecycle(
    name: &str,
    timestamp: Option<String>,
    summary: String,
    detail: String,
    render: &Render,
) -> Event {
    Event::new(
        EventKind::Lifecycle,
        timestamp,
        render.summary(&summary),
        render.detail(&detail),
    )
    .with_event_type(name)
}

fn session_meta_event(meta: &SessionMeta, ts: Option<String>, render: &Render) -> Event {
    let mut pieces = vec!["session_meta".to_string()];
    if let Some(id) = &meta.id {
        pieces.push(format!("id={}", crate::format::take_chars(id, 8)));
    }
    if let Some(cwd) = &meta.cwd {
        pieces.push(format!("cwd={}", cwd));
    }

    let source = meta.source.as_ref().map(|s| match s {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    });
    let detail = [
        ("id", meta.id.clone()),
        ("cwd", meta.cwd.clone()),
        ("originator", meta.originator.clone()),
        ("cli_version", meta.cli_version.clone()),
        ("model_provider", meta.model_provider.clone()),
        ("source", source),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.map(|v| format!("{}: {}", key, v)))
    .collect::<Vec<_>>()
    .join("\n");

    lifecycle("session_meta", ts, pieces.join(" "), detail, render)
}

fn turn_context_event(turn: &TurnContext, ts: Option<String>, render: &Render) -> Event {
    let mut pieces = vec!["turn_context".to_string()];
    if let Some(cwd) = &turn.cwd {
        pieces.push(format!("cwd={}", cwd));
    }
    if let Some(model) = &turn.model {
        pieces.push(format!("model={}", model));
    }

    let sandbox = turn.sandbox_policy.as_ref().and_then(|s| s.mode.clone());
    let detail = [
        ("cwd", turn.cwd.clone()),
        ("model", turn.model.clone()),
        ("effort", turn.effort.clone()),
        ("approval_policy", turn.approval_policy.clone()),
        ("sandbox", sandbox),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.map(|v| format!("{}: {}", key, v)))
    .collect::<Vec<_>>()
    .join("\n");

    lifecycle("turn_context", ts, pieces.join(" "), detail, render)
}

fn token_count_event(info: Option<&TokenInfo>, ts: Option<String>, render: &Render) -> Event {
    let mut summary = vec!["token_count".to_string()];
    let mut detail = Vec::new();
    if let Some(info) = info {
        if let Some(total) = &info.total_token_usage {
            summary.push(format!("total={}", total.total_tokens));
            detail.push(total.describe("total"));
        }
        if let Some(last) = &info.last_token_usage {
            summary.push(format!("last={}", last.total_tokens));
            detail.push(last.describe("last"));
        }
        if let Some(window) = info.model_context_window {
            detail.push(format!("context_window={}", window));
        }
    }
    lifecycle("token_count", ts, summary.join(" "), detail.join("\n"), render)
}

fn classify_response(item: ResponseItem, ts: Option<String>, render: &Render) -> Option<Event> {
    match item {
        ResponseItem::Message { role, content } => {
            let text = extract_text(&content);
            let role = role.unwrap_or_default();
            let kind = if role == "user" {
                EventKind::User
            } else {
                EventKind::Text
            };
            let mut event = Event::new(kind, ts, render.summary(&text), render.detail(&text))
                .with_text_len(char_len(&text));
            if !role.is_empty() {
                event = event.with_role(role);
            }
            Some(event)
        }
        ResponseItem::FunctionCall {
            name,
            arguments,
            call_id,
        }
        | ResponseItem::CustomToolCall {
            name,
            input: arguments,
            call_id,
        } => {
            let input = decode_arguments(arguments);
            Some(
                Event::new(
                    EventKind::ToolUse,
                    ts,
                    summarize_tool_call(&name, &input, render.summary_chars),
                    render.detail(&format_tool_input(&input)),
                )
                .with_role("assistant")
                .with_tool(ToolCall {
                    id: call_id,
                    name,
                    input,
                }),
            )
        }
        ResponseItem::FunctionCallOutput { call_id, output }
        | ResponseItem::CustomToolCallOutput { call_id, output } => {
            let (text, exit_code) = tool_output(&output);
            let is_error = match exit_code {
                Some(code) => code != 0,
                None => output_indicates_error(&text),
            };
            let summary = match exit_code {
                Some(code) if !text.contains("Exit code") => summarize_text(
                    &format!("exit={} {}", code, summarize_tool_output(&text, render.summary_chars)),
                    render.summary_chars,
                ),
                _ => summarize_tool_output(&text, render.summary_chars),
            };
            let detail = render.detail(&text);
            Some(
                Event::new(EventKind::ToolResult, ts, summary, detail.clone())
                    .with_text_len(char_len(&text))
                    .with_result(ToolResult {
                        call_id,
                        content: detail,
                        full_length: char_len(&text),
                        is_error,
                    }),
            )
        }
        ResponseItem::Reasoning {
            summary,
            content,
            encrypted_content,
        } => {
            let text = extract_reasoning_text(&summary, &content, encrypted_content.is_some());
            let headline = if text.is_empty() { "reasoning" } else { &text };
            Some(
                Event::new(
                    EventKind::Thinking,
                    ts,
                    render.summary(headline),
                    render.detail(&text),
                )
                .with_role("assistant")
                .with_text_len(char_len(&text)),
            )
        }
        ResponseItem::GhostSnapshot { ghost_commit } => Some(lifecycle(
            "ghost_snapshot",
            ts,
            "ghost_snapshot".to_string(),
            summarize_text(&stringify_value(&ghost_commit), 200),
            render,
        )),
        ResponseItem::Other => None,
    }
}

impl TranscriptParser for CodexParser {
    fn family(&self) -> SchemaFamily {
        SchemaFamily::Codex
    }

    fn parse(&self, ctx: &ParseContext) -> Result<ParseResult> {
        let decoded = decode_file::<RawEvent>(ctx.path, SchemaFamily::Codex)?;

        let mut result = ParseResult {
            warnings: decoded.warnings,
            unrecognized: decoded.unrecognized,
            ..Default::default()
        };
        // Codex reports cumulative totals; only the latest snapshot counts.
        let mut latest_total: Option<TokenUsage> = None;

        for line in decoded.records {
            let ts = line.record.timestamp.clone().filter(|t| !t.trim().is_empty());
            match decode_record(line.record) {
                CodexRecord::SessionMeta(meta) => {
                    if result.session_id.is_none() {
                        result.session_id = meta.id.clone();
                    }
                    if result.project_path.is_none() {
                        result.project_path = meta.cwd.clone();
                    }
                    if result.cli_version.is_none() {
                        result.cli_version = meta.cli_version.clone();
                    }
                    result
                        .events
                        .push(session_meta_event(&meta, ts, &ctx.render));
                }
                CodexRecord::TurnContext(turn) => {
                    if turn.model.is_some() {
                        result.model = turn.model.clone();
                        result.cloud_stats.model = turn.model.clone();
                    }
                    if result.project_path.is_none() {
                        result.project_path = turn.cwd.clone();
                    }
                    result
                        .events
                        .push(turn_context_event(&turn, ts, &ctx.render));
                }
                CodexRecord::Response(item) => {
                    if let ResponseItem::Message {
                        role: Some(role),
                        content,
                    } = &item
                    {
                        if role == "user" {
                            result.user_messages.push(vec![extract_text(content)]);
                        }
                    }
                    if let Some(event) = classify_response(item, ts, &ctx.render) {
                        result.events.push(event);
                    }
                }
                CodexRecord::TokenCount(count) => {
                    if let Some(info) = &count.info {
                        result.cloud_stats.usage_snapshots += 1;
                        if let Some(total) = &info.total_token_usage {
                            latest_total = Some(total.clone());
                        }
                    }
                    result
                        .events
                        .push(token_count_event(count.info.as_ref(), ts, &ctx.render));
                }
                CodexRecord::Mirror => {}
                CodexRecord::Notice { name, payload } => {
                    let detail = summarize_text(&stringify_value(&payload), 200);
                    result
                        .events
                        .push(lifecycle(&name, ts, name.clone(), detail, &ctx.render));
                }
                CodexRecord::Compacted { message } => {
                    let summary = match &message {
                        Some(m) => format!("compacted: {}", m),
                        None => "compacted".to_string(),
                    };
                    let detail = message.unwrap_or_default();
                    result
                        .events
                        .push(lifecycle("compacted", ts, summary, detail, &ctx.render));
                }
                CodexRecord::Other => {
                    tracing::debug!(line = line.line, path = %ctx.path.display(), "Unrecognized record");
                    result.unrecognized += 1;
                }
            }
        }

        if let Some(total) = latest_total {
            let stats = &mut result.cloud_stats;
            stats.input_tokens = total.input_tokens.saturating_sub(total.cached_input_tokens);
            stats.cache_read_tokens = total.cached_input_tokens;
            stats.output_tokens = total.output_tokens;
            stats.reasoning_output_tokens = total.reasoning_output_tokens;
        }

        if result.session_id.is_none() {
            result.session_id = self.extract_session_id(ctx.path);
        }

        // Codex has no summary record; the first real prompt titles the session.
        result.title = result
            .user_messages
            .iter()
            .flatten()
            .map(String::as_str)
            .find(|text| !text.trim().is_empty() && !crate::timeline::is_boilerplate(text))
            .map(|text| summarize_text(text, 70));

        tracing::debug!(
            path = %ctx.path.display(),
            events = result.events.len(),
            warnings = result.warnings.len(),
            "Parsed Codex rollout"
        );

        Ok(result)
    }

    fn extract_session_id(&self, file_path: &Path) -> Option<String> {
        // Filename format: rollout-2025-11-24T19-33-35-019ab86e-1e83-75b0-b2d7-d335492e7026.jsonl
        let stem = file_path.file_stem()?.to_str()?;
        let parts: Vec<&str> = stem.split('-').collect();
        if parts.len() < 5 {
            return None;
        }
        let tail = &parts[parts.len() - 5..];
        let shape_ok = tail
            .iter()
            .zip([8usize, 4, 4, 4, 12])
            .all(|(part, len)| part.len() == len && part.chars().all(|c| c.is_ascii_hexdigit()));
        shape_ok.then(|| tail.join("-"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn parse_lines(lines: &[&str]) -> ParseResult {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        CodexParser::new()
            .parse(&ParseContext::new(file.path(), Render::default()))
            .unwrap()
    }

    #[test]
    fn test_session_meta_and_turn_context() {
        let result = parse_lines(&[
            r#"{"timestamp":"2025-11-24T19:33:35.000Z","type":"session_meta","payload":{"id":"019ab86e-1e83-75b0-b2d7-d335492e7026","cwd":"/work","originator":"codex_cli_rs","cli_version":"0.63.0","model_provider":"openai"}}"#,
            r#"{"timestamp":"2025-11-24T19:33:36.000Z","type":"turn_context","payload":{"cwd":"/work","model":"gpt-5","effort":"high","approval_policy":"on-request","sandbox_policy":{"type":"workspace-write"}}}"#,
        ]);

        assert_eq!(result.events.len(), 2);
        assert_eq!(
            result.events[0].summary,
            "session_meta id=019ab86e cwd=/work"
        );
        assert!(result.events[0].detail.contains("cli_version: 0.63.0"));
        assert_eq!(result.events[1].event_type.as_deref(), Some("turn_context"));
        assert!(result.events[1].detail.contains("sandbox: workspace-write"));
        assert_eq!(result.cli_version.as_deref(), Some("0.63.0"));
        assert_eq!(result.model.as_deref(), Some("gpt-5"));
        assert_eq!(result.project_path.as_deref(), Some("/work"));
    }

    #[test]
    fn test_messages_and_title() {
        let result = parse_lines(&[
            r#"{"timestamp":"2025-11-24T19:34:00.000Z","type":"response_item","payload":{"type":"message","role":"user","content":[{"type":"input_text","text":"<environment_context>cwd</environment_context>"}]}}"#,
            r#"{"timestamp":"2025-11-24T19:34:01.000Z","type":"response_item","payload":{"type":"message","role":"user","content":[{"type":"input_text","text":"Add a retry to the fetcher"}]}}"#,
            r#"{"timestamp":"2025-11-24T19:34:02.000Z","type":"event_msg","payload":{"type":"user_message","message":"Add a retry to the fetcher"}}"#,
            r#"{"timestamp":"2025-11-24T19:34:09.000Z","type":"response_item","payload":{"type":"message","role":"assistant","content":[{"type":"output_text","text":"Done."}]}}"#,
        ]);

        let kinds: Vec<_> = result.events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::User, EventKind::User, EventKind::Text]);
        assert_eq!(result.title.as_deref(), Some("Add a retry to the fetcher"));
    }

    #[test]
    fn test_function_call_and_output() {
        let result = parse_lines(&[
            r#"{"timestamp":"2025-11-24T19:35:00.000Z","type":"response_item","payload":{"type":"function_call","name":"shell","arguments":"{\"command\":[\"bash\",\"-lc\",\"cargo test\"],\"workdir\":\"/work\"}","call_id":"call_1"}}"#,
            r#"{"timestamp":"2025-11-24T19:35:04.000Z","type":"response_item","payload":{"type":"function_call_output","call_id":"call_1","output":"Exit code: 101\nWall time: 3.2 seconds\nOutput:\nerror[E0425]: cannot find value\n"}}"#,
        ]);

        let call = &result.events[0];
        assert_eq!(call.kind, EventKind::ToolUse);
        assert_eq!(call.tool.as_ref().unwrap().input["workdir"], "/work");
        assert_eq!(call.summary, "shell: command=bash -lc cargo test");

        let output = &result.events[1];
        assert_eq!(output.kind, EventKind::ToolResult);
        assert_eq!(output.summary, "exit=101 error[E0425]: cannot find value");
        let res = output.result.as_ref().unwrap();
        assert!(res.is_error);
        assert_eq!(res.call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_structured_output_uses_exit_code_metadata() {
        let result = parse_lines(&[
            r#"{"type":"response_item","payload":{"type":"function_call_output","call_id":"c","output":"{\"output\":\"all good\",\"metadata\":{\"exit_code\":0}}"}}"#,
            r#"{"type":"response_item","payload":{"type":"custom_tool_call_output","call_id":"d","output":{"output":"patch failed","metadata":{"exit_code":1}}}}"#,
        ]);
        assert!(!result.events[0].is_error());
        assert_eq!(result.events[0].summary, "exit=0 all good");
        assert!(result.events[1].is_error());
    }

    #[test]
    fn test_custom_tool_call_keeps_raw_input() {
        let result = parse_lines(&[
            r#"{"type":"response_item","payload":{"type":"custom_tool_call","name":"apply_patch","call_id":"p1","input":"*** Begin Patch\n*** Update File: src/lib.rs\n*** End Patch"}}"#,
        ]);
        let tool = result.events[0].tool.as_ref().unwrap();
        assert_eq!(tool.name, "apply_patch");
        assert!(tool.input.as_str().unwrap().contains("Update File"));
    }

    #[test]
    fn test_reasoning_and_lifecycle_notices() {
        let result = parse_lines(&[
            r#"{"type":"response_item","payload":{"type":"reasoning","summary":[{"type":"summary_text","text":"**Planning the fix**"}],"content":null,"encrypted_content":"gAAA"}}"#,
            r#"{"type":"response_item","payload":{"type":"ghost_snapshot","ghost_commit":{"id":"abc"}}}"#,
            r#"{"type":"event_msg","payload":{"type":"task_started","model_context_window":272000}}"#,
            r#"{"type":"event_msg","payload":{"type":"agent_reasoning","text":"dup"}}"#,
        ]);

        assert_eq!(result.events.len(), 3);
        assert_eq!(result.events[0].kind, EventKind::Thinking);
        assert_eq!(
            result.events[0].detail,
            "**Planning the fix**\n(encrypted_content present)"
        );
        assert_eq!(result.events[1].event_type.as_deref(), Some("ghost_snapshot"));
        assert_eq!(result.events[2].event_type.as_deref(), Some("task_started"));
        assert_eq!(result.events[2].kind, EventKind::Lifecycle);
    }

    #[test]
    fn test_token_count_snapshots() {
        let result = parse_lines(&[
            r#"{"type":"event_msg","payload":{"type":"token_count","info":{"total_token_usage":{"input_tokens":1000,"cached_input_tokens":400,"output_tokens":50,"reasoning_output_tokens":20,"total_tokens":1050},"last_token_usage":{"input_tokens":1000,"cached_input_tokens":400,"output_tokens":50,"reasoning_output_tokens":20,"total_tokens":1050}}}}"#,
            r#"{"type":"event_msg","payload":{"type":"token_count","info":{"total_token_usage":{"input_tokens":3000,"cached_input_tokens":2000,"output_tokens":80,"reasoning_output_tokens":30,"total_tokens":3080}}}}"#,
            r#"{"type":"event_msg","payload":{"type":"token_count","info":null}}"#,
        ]);

        assert_eq!(result.events.len(), 3);
        assert_eq!(result.events[0].summary, "token_count total=1050 last=1050");
        let stats = &result.cloud_stats;
        assert_eq!(stats.usage_snapshots, 2);
        assert_eq!(stats.input_tokens, 1000);
        assert_eq!(stats.cache_read_tokens, 2000);
        assert_eq!(stats.output_tokens, 80);
        assert_eq!(stats.reasoning_output_tokens, 30);
    }

    #[test]
    fn test_unknown_records_are_counted() {
        let result = parse_lines(&[
            r#"{"type":"response_item","payload":{"type":"web_search_call"}}"#,
            r#"{"type":"session_meta","payload":"not an object"}"#,
            r#"{"type":"ghost_record","payload":{}}"#,
        ]);
        assert!(result.events.is_empty());
        assert_eq!(result.unrecognized, 3);
    }

    #[test]
    fn test_compacted_is_lifecycle() {
        let result = parse_lines(&[
            r#"{"timestamp":"2025-11-24T19:40:00.000Z","type":"compacted","payload":{"message":"Summary of earlier turns"}}"#,
            r#"{"type":"compacted","payload":{"message":""}}"#,
        ]);

        assert_eq!(result.unrecognized, 0);
        assert_eq!(result.events.len(), 2);
        assert!(result.events.iter().all(|e| e.kind == EventKind::Lifecycle));
        assert_eq!(result.events[0].event_type.as_deref(), Some("compacted"));
        assert_eq!(result.events[0].summary, "compacted: Summary of earlier turns");
        assert_eq!(result.events[0].detail, "Summary of earlier turns");
        assert_eq!(result.events[1].summary, "compacted");
    }

    #[test]
    fn test_extract_session_id() {
        let parser = CodexParser::new();
        let path = PathBuf::from(
            "/home/u/.codex/sessions/2025/11/24/rollout-2025-11-24T19-33-35-019ab86e-1e83-75b0-b2d7-d335492e7026.jsonl",
        );
        assert_eq!(
            parser.extract_session_id(&path),
            Some("019ab86e-1e83-75b0-b2d7-d335492e7026".to_string())
        );
        assert_eq!(parser.extract_session_id(Path::new("/tmp/notes.jsonl")), None);
    }
}
