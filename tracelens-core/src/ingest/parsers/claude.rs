//! Claude Code JSONL parser
//!
//! Parses session transcripts from `~/.claude/projects/[encoded-path]/*.jsonl`
//! and the per-agent transcripts stored next to them.
//!
//! # Record shapes
//!
//! Every line carries a `type`. `user` and `assistant` records wrap a
//! `message` whose `content` is either a plain string or an array of blocks
//! (`text`, `thinking`, `tool_use`, `tool_result`, `image`). One record may
//! therefore expand into several events.
//!
//! `system` records become lifecycle events named after their `subtype`;
//! `summary` records title the session. Bookkeeping records such as
//! `file-history-snapshot` are ignored, and any other type is counted as
//! unrecognized.
//!
//! # Sidechains
//!
//! Older transcripts inline subagent records into the main file with
//! `isSidechain: true`. Those agents also have their own files, so sidechain
//! records are skipped when parsing the orchestrator.

use crate::error::Result;
use crate::format::{
    char_len, format_tool_input, output_indicates_error, render_result_content,
    summarize_tool_call, summarize_tool_output, Render,
};
use crate::ingest::decoder::decode_file;
use crate::ingest::parser::{ParseContext, ParseResult, TranscriptParser};
use crate::types::{CloudStats, Event, EventKind, SchemaFamily, ToolCall, ToolResult};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Directory name hook logs are written to.
pub const HOOK_LOG_DIR: &str = ".claude-logs";

/// Parser for Claude Code JSONL transcripts.
pub struct ClaudeParser {
    root: Option<PathBuf>,
}

impl ClaudeParser {
    /// Create a new parser with the default root path (~/.claude).
    pub fn new() -> Self {
        Self {
            root: dirs::home_dir().map(|h| h.join(".claude")),
        }
    }

    /// Create a parser with a custom root path.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root: Some(root) }
    }
}

impl Default for ClaudeParser {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================
// Raw JSONL record types (serde deserialization)
// ============================================

/// One line of a Claude Code transcript, dispatched on `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClaudeRecord {
    #[serde(rename = "user")]
    User(MessageRecord),
    #[serde(rename = "assistant")]
    Assistant(MessageRecord),
    #[serde(rename = "system")]
    System(SystemRecord),
    #[serde(rename = "summary")]
    Summary(SummaryRecord),
    #[serde(rename = "file-history-snapshot", alias = "queue-operation")]
    Bookkeeping,
    #[serde(other)]
    Other,
}

/// Uses `#[serde(default)]` liberally to handle missing fields gracefully.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct MessageRecord {
    session_id: Option<String>,
    timestamp: Option<String>,
    cwd: Option<String>,
    version: Option<String>,
    is_sidechain: Option<bool>,
    agent_id: Option<String>,
    request_id: Option<String>,
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawMessage {
    model: Option<String>,
    id: Option<String>,
    content: Option<Value>,
    usage: Option<RawUsage>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawUsage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
    cache_creation_input_tokens: Option<u64>,
    cache_read_input_tokens: Option<u64>,
    service_tier: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct SystemRecord {
    session_id: Option<String>,
    timestamp: Option<String>,
    cwd: Option<String>,
    subtype: Option<String>,
    content: Option<String>,
    is_sidechain: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SummaryRecord {
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    ToolUse {
        #[serde(default)]
        id: String,
        #[serde(default = "unknown_tool")]
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        #[serde(default)]
        tool_use_id: String,
        #[serde(default)]
        content: Value,
        is_error: Option<bool>,
    },
    Image,
    // Catch-all for unknown block types
    #[serde(other)]
    Unknown,
}

fn unknown_tool() -> String {
    "unknown".to_string()
}

/// Non-empty timestamps only; an empty string is as good as missing.
fn timestamp_of(raw: &Option<String>) -> Option<String> {
    raw.as_ref().filter(|t| !t.trim().is_empty()).cloned()
}

// ============================================
// Classification
// ============================================

/// Metadata harvested while walking the records of one file.
#[derive(Default)]
struct Harvest {
    counted_messages: HashSet<String>,
}

impl Harvest {
    fn record_identity(&self, result: &mut ParseResult, record: &MessageRecord) {
        if result.session_id.is_none() {
            result.session_id = record.session_id.clone();
        }
        if result.agent_id.is_none() {
            result.agent_id = record.agent_id.clone();
        }
        if result.project_path.is_none() {
            result.project_path = record.cwd.clone();
        }
        if result.cli_version.is_none() {
            result.cli_version = record.version.clone();
        }
    }

    /// Streamed responses repeat the same message (and its usage) across
    /// several records; usage is counted once per message id.
    fn record_usage(&mut self, stats: &mut CloudStats, record: &MessageRecord) {
        if let Some(request_id) = &record.request_id {
            stats.request_ids.insert(request_id.clone());
        }

        let Some(message) = &record.message else {
            return;
        };
        if stats.model.is_none() {
            stats.model = message.model.clone();
        }

        let first_sighting = match &message.id {
            Some(id) => {
                stats.message_ids.insert(id.clone());
                self.counted_messages.insert(id.clone())
            }
            None => true,
        };
        if !first_sighting {
            return;
        }

        if let Some(usage) = &message.usage {
            stats.input_tokens += usage.input_tokens.unwrap_or(0);
            stats.output_tokens += usage.output_tokens.unwrap_or(0);
            stats.cache_creation_tokens += usage.cache_creation_input_tokens.unwrap_or(0);
            stats.cache_read_tokens += usage.cache_read_input_tokens.unwrap_or(0);
            if stats.service_tier.is_none() {
                stats.service_tier = usage.service_tier.clone();
            }
        }
    }
}

fn text_event(is_user: bool, timestamp: Option<String>, text: &str, render: &Render) -> Event {
    let (kind, role) = if is_user {
        (EventKind::User, "user")
    } else {
        (EventKind::Text, "assistant")
    };
    Event::new(kind, timestamp, render.summary(text), render.detail(text))
        .with_role(role)
        .with_text_len(char_len(text))
}

/// Full text segments of a user message, ignoring tool results and images.
fn user_text_segments(content: &Value) -> Vec<String> {
    let items = match content {
        Value::String(text) => return vec![text.clone()],
        Value::Array(items) => items,
        _ => return Vec::new(),
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(text) => Some(text.clone()),
            Value::Object(map) => {
                let typed_text = map.get("type").and_then(|t| t.as_str()) == Some("text");
                if typed_text || !map.contains_key("type") {
                    map.get("text").and_then(|t| t.as_str()).map(str::to_string)
                } else {
                    None
                }
            }
            _ => None,
        })
        .collect()
}

/// Expand a message's content into events.
fn classify_content(
    content: &Value,
    is_user: bool,
    timestamp: Option<String>,
    render: &Render,
) -> Vec<Event> {
    let mut events = Vec::new();

    let items = match content {
        Value::String(text) => {
            if !text.trim().is_empty() {
                events.push(text_event(is_user, timestamp, text, render));
            }
            return events;
        }
        Value::Array(items) => items,
        _ => return events,
    };

    for item in items {
        match item {
            Value::String(text) => {
                if !text.trim().is_empty() {
                    events.push(text_event(is_user, timestamp.clone(), text, render));
                }
            }
            Value::Object(map) if !map.contains_key("type") => {
                // Untyped `{text}` objects behave like text blocks
                if let Some(text) = map.get("text").and_then(|t| t.as_str()) {
                    if !text.trim().is_empty() {
                        events.push(text_event(is_user, timestamp.clone(), text, render));
                    }
                }
            }
            Value::Object(_) => {
                let block: ContentBlock = match serde_json::from_value(item.clone()) {
                    Ok(b) => b,
                    Err(e) => {
                        tracing::debug!(error = %e, "Skipping malformed content block");
                        continue;
                    }
                };
                if let Some(event) = classify_block(block, is_user, timestamp.clone(), render) {
                    events.push(event);
                }
            }
            _ => {}
        }
    }

    events
}

fn classify_block(
    block: ContentBlock,
    is_user: bool,
    timestamp: Option<String>,
    render: &Render,
) -> Option<Event> {
    match block {
        ContentBlock::Text { text } => {
            if text.trim().is_empty() {
                return None;
            }
            Some(text_event(is_user, timestamp, &text, render))
        }
        ContentBlock::Thinking { thinking } => {
            if thinking.trim().is_empty() {
                return None;
            }
            Some(
                Event::new(
                    EventKind::Thinking,
                    timestamp,
                    render.summary(&thinking),
                    render.detail(&thinking),
                )
                .with_role("assistant")
                .with_text_len(char_len(&thinking)),
            )
        }
        ContentBlock::ToolUse { id, name, input } => {
            let summary = summarize_tool_call(&name, &input, render.summary_chars);
            let detail = render.detail(&format_tool_input(&input));
            Some(
                Event::new(EventKind::ToolUse, timestamp, summary, detail)
                    .with_role("assistant")
                    .with_tool(ToolCall {
                        id: Some(id).filter(|id| !id.is_empty()),
                        name,
                        input,
                    }),
            )
        }
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => {
            let output = render_result_content(&content);
            let is_error = is_error.unwrap_or_else(|| output_indicates_error(&output));
            let detail = render.detail(&output);
            Some(
                Event::new(
                    EventKind::ToolResult,
                    timestamp,
                    summarize_tool_output(&output, render.summary_chars),
                    detail.clone(),
                )
                .with_role("user")
                .with_text_len(char_len(&output))
                .with_result(ToolResult {
                    call_id: Some(tool_use_id).filter(|id| !id.is_empty()),
                    content: detail,
                    full_length: char_len(&output),
                    is_error,
                }),
            )
        }
        ContentBlock::Image | ContentBlock::Unknown => None,
    }
}

impl TranscriptParser for ClaudeParser {
    fn family(&self) -> SchemaFamily {
        SchemaFamily::Claude
    }

    fn parse(&self, ctx: &ParseContext) -> Result<ParseResult> {
        let decoded = decode_file::<ClaudeRecord>(ctx.path, SchemaFamily::Claude)?;

        let mut result = ParseResult {
            warnings: decoded.warnings,
            unrecognized: decoded.unrecognized,
            ..Default::default()
        };
        let mut harvest = Harvest::default();

        for line in decoded.records {
            match line.record {
                ClaudeRecord::User(record) | ClaudeRecord::Assistant(record)
                    if !ctx.is_subagent && record.is_sidechain.unwrap_or(false) =>
                {
                    tracing::trace!(line = line.line, "Skipping sidechain record in main transcript");
                }
                ClaudeRecord::User(record) => {
                    harvest.record_identity(&mut result, &record);
                    if let Some(request_id) = &record.request_id {
                        result.cloud_stats.request_ids.insert(request_id.clone());
                    }
                    let content = record.message.as_ref().and_then(|m| m.content.as_ref());
                    result
                        .user_messages
                        .push(content.map(user_text_segments).unwrap_or_default());
                    if let Some(content) = content {
                        let ts = timestamp_of(&record.timestamp);
                        result
                            .events
                            .extend(classify_content(content, true, ts, &ctx.render));
                    }
                }
                ClaudeRecord::Assistant(record) => {
                    harvest.record_identity(&mut result, &record);
                    harvest.record_usage(&mut result.cloud_stats, &record);
                    if result.model.is_none() {
                        result.model = record.message.as_ref().and_then(|m| m.model.clone());
                    }
                    if let Some(content) = record.message.as_ref().and_then(|m| m.content.as_ref()) {
                        let ts = timestamp_of(&record.timestamp);
                        result
                            .events
                            .extend(classify_content(content, false, ts, &ctx.render));
                    }
                }
                ClaudeRecord::System(record) => {
                    if !ctx.is_subagent && record.is_sidechain.unwrap_or(false) {
                        continue;
                    }
                    if result.session_id.is_none() {
                        result.session_id = record.session_id.clone();
                    }
                    if result.project_path.is_none() {
                        result.project_path = record.cwd.clone();
                    }
                    let Some(content) = record.content.as_deref().filter(|c| !c.trim().is_empty())
                    else {
                        continue;
                    };
                    let subtype = record.subtype.clone().unwrap_or_else(|| "system".to_string());
                    result.events.push(
                        Event::new(
                            EventKind::Lifecycle,
                            timestamp_of(&record.timestamp),
                            ctx.render.summary(&format!("{}: {}", subtype, content)),
                            ctx.render.detail(content),
                        )
                        .with_role("system")
                        .with_event_type(subtype),
                    );
                }
                ClaudeRecord::Summary(record) => {
                    if let Some(summary) = record.summary.filter(|s| !s.trim().is_empty()) {
                        result.title = Some(summary);
                    }
                }
                ClaudeRecord::Bookkeeping => {}
                ClaudeRecord::Other => {
                    tracing::debug!(line = line.line, path = %ctx.path.display(), "Unrecognized record type");
                    result.unrecognized += 1;
                }
            }
        }

        if result.session_id.is_none() {
            result.session_id = self.extract_session_id(ctx.path);
        }

        tracing::debug!(
            path = %ctx.path.display(),
            events = result.events.len(),
            warnings = result.warnings.len(),
            "Parsed Claude transcript"
        );

        Ok(result)
    }

    fn extract_session_id(&self, file_path: &Path) -> Option<String> {
        let stem = file_path.file_stem()?.to_str()?;
        Some(stem.to_string())
    }

    fn hook_log_dirs(&self, project_path: Option<&str>) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        if let Some(project) = project_path.filter(|p| !p.is_empty()) {
            dirs.push(PathBuf::from(project).join(HOOK_LOG_DIR));
        }
        if let Some(root) = &self.root {
            dirs.push(root.join(HOOK_LOG_DIR));
        }
        dirs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse_lines(lines: &[&str]) -> ParseResult {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        let parser = ClaudeParser::with_root(PathBuf::from("/tmp/claude"));
        parser
            .parse(&ParseContext::new(file.path(), Render::default()))
            .unwrap()
    }

    #[test]
    fn test_string_content_by_record_type() {
        let result = parse_lines(&[
            r#"{"type":"user","sessionId":"s1","cwd":"/work","timestamp":"2025-01-01T10:00:00Z","message":{"role":"user","content":"fix the build"}}"#,
            r#"{"type":"assistant","timestamp":"2025-01-01T10:00:05Z","message":{"role":"assistant","content":"On it."}}"#,
        ]);

        assert_eq!(result.events.len(), 2);
        assert_eq!(result.events[0].kind, EventKind::User);
        assert_eq!(result.events[0].summary, "fix the build");
        assert_eq!(result.events[1].kind, EventKind::Text);
        assert_eq!(result.session_id.as_deref(), Some("s1"));
        assert_eq!(result.project_path.as_deref(), Some("/work"));
    }

    #[test]
    fn test_block_content_expands_into_events() {
        let result = parse_lines(&[
            r#"{"type":"assistant","timestamp":"2025-01-01T10:00:00Z","message":{"model":"claude-opus-4","id":"msg_1","content":[{"type":"thinking","thinking":"consider the options"},{"type":"text","text":"Running tests"},{"type":"tool_use","id":"toolu_1","name":"Bash","input":{"command":"cargo test"}},{"type":"image","source":{"type":"base64","media_type":"image/png","data":"..."}},{"type":"server_widget"}]}}"#,
        ]);

        let kinds: Vec<_> = result.events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::Thinking, EventKind::Text, EventKind::ToolUse]
        );
        let tool = result.events[2].tool.as_ref().unwrap();
        assert_eq!(tool.id.as_deref(), Some("toolu_1"));
        assert_eq!(tool.input["command"], "cargo test");
        assert_eq!(result.events[2].summary, "Bash: command=cargo test");
        assert_eq!(result.model.as_deref(), Some("claude-opus-4"));
    }

    #[test]
    fn test_bare_strings_and_untyped_text_objects() {
        let result = parse_lines(&[
            r#"{"type":"user","message":{"content":["first", {"text":"second"}, "   "]}}"#,
        ]);
        assert_eq!(result.events.len(), 2);
        assert!(result.events.iter().all(|e| e.kind == EventKind::User));
        assert!(result.events.iter().all(|e| e.timestamp.is_none()));
    }

    #[test]
    fn test_user_messages_keep_full_text() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in [
            r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":"ok"}]}}"#,
            r#"{"type":"user","message":{"content":[{"type":"text","text":"Search the codebase"},{"type":"image"}]}}"#,
            r#"{"type":"assistant","message":{"content":"done"}}"#,
        ] {
            writeln!(file, "{}", line).unwrap();
        }
        let render = Render {
            max_detail_chars: 3,
            ..Render::default()
        };
        let result = ClaudeParser::with_root(PathBuf::from("/tmp/claude"))
            .parse(&ParseContext::new(file.path(), render))
            .unwrap();

        assert_eq!(
            result.user_messages,
            vec![Vec::<String>::new(), vec!["Search the codebase".to_string()]]
        );
        let prompt = result.events.iter().find(|e| e.kind == EventKind::User).unwrap();
        assert!(prompt.detail.starts_with("Sea\n"));
    }

    #[test]
    fn test_tool_result_error_flag_and_heuristic() {
        let result = parse_lines(&[
            r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":"Exit code: 1\nboom"}]}}"#,
            r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t2","content":"Exit code: 1","is_error":false}]}}"#,
            r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t3","content":[{"type":"text","text":"file body"}],"is_error":true}]}}"#,
        ]);

        let results: Vec<_> = result
            .events
            .iter()
            .map(|e| e.result.as_ref().unwrap())
            .collect();
        assert!(results[0].is_error);
        assert!(!results[1].is_error);
        assert!(results[2].is_error);
        assert_eq!(results[2].content, "file body");
        assert_eq!(results[2].call_id.as_deref(), Some("t3"));
    }

    #[test]
    fn test_system_and_summary_records() {
        let result = parse_lines(&[
            r#"{"type":"summary","summary":"Fix flaky test","leafUuid":"u1"}"#,
            r#"{"type":"system","subtype":"compact_boundary","content":"Conversation compacted","timestamp":"2025-01-01T11:00:00Z"}"#,
            r#"{"type":"system","subtype":"informational"}"#,
            r#"{"type":"file-history-snapshot","snapshot":{}}"#,
            r#"{"type":"mystery","x":1}"#,
        ]);

        assert_eq!(result.title.as_deref(), Some("Fix flaky test"));
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events[0].kind, EventKind::Lifecycle);
        assert_eq!(result.events[0].event_type.as_deref(), Some("compact_boundary"));
        assert_eq!(result.unrecognized, 1);
    }

    #[test]
    fn test_usage_counted_once_per_message() {
        let result = parse_lines(&[
            r#"{"type":"assistant","requestId":"req_1","message":{"id":"msg_1","model":"claude-opus-4","content":[{"type":"text","text":"a"}],"usage":{"input_tokens":10,"output_tokens":5,"cache_read_input_tokens":100,"service_tier":"standard"}}}"#,
            r#"{"type":"assistant","requestId":"req_1","message":{"id":"msg_1","content":[{"type":"tool_use","id":"t","name":"Read","input":{}}],"usage":{"input_tokens":10,"output_tokens":5,"cache_read_input_tokens":100}}}"#,
            r#"{"type":"assistant","requestId":"req_2","message":{"id":"msg_2","content":"b","usage":{"input_tokens":1,"output_tokens":2}}}"#,
        ]);

        let stats = &result.cloud_stats;
        assert_eq!(stats.input_tokens, 11);
        assert_eq!(stats.output_tokens, 7);
        assert_eq!(stats.cache_read_tokens, 100);
        assert_eq!(stats.request_ids.len(), 2);
        assert_eq!(stats.message_ids.len(), 2);
        assert_eq!(stats.service_tier.as_deref(), Some("standard"));
    }

    #[test]
    fn test_sidechain_records_skipped_in_main_only() {
        let line = r#"{"type":"user","isSidechain":true,"agentId":"a1","message":{"content":"side"}}"#;

        let main = parse_lines(&[line]);
        assert!(main.events.is_empty());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", line).unwrap();
        let parser = ClaudeParser::with_root(PathBuf::from("/tmp/claude"));
        let agent = parser
            .parse(&ParseContext::new(file.path(), Render::default()).subagent())
            .unwrap();
        assert_eq!(agent.events.len(), 1);
        assert_eq!(agent.agent_id.as_deref(), Some("a1"));
    }

    #[test]
    fn test_session_id_falls_back_to_file_stem() {
        let parser = ClaudeParser::new();
        let path = PathBuf::from("/path/b4749c81-937a-4bd4-b62c-9d78905f0975.jsonl");
        assert_eq!(
            parser.extract_session_id(&path),
            Some("b4749c81-937a-4bd4-b62c-9d78905f0975".to_string())
        );
    }

    #[test]
    fn test_hook_log_dirs_prefer_project() {
        let parser = ClaudeParser::with_root(PathBuf::from("/home/u/.claude"));
        let dirs = parser.hook_log_dirs(Some("/work/app"));
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/work/app/.claude-logs"),
                PathBuf::from("/home/u/.claude/.claude-logs"),
            ]
        );
        assert_eq!(parser.hook_log_dirs(None).len(), 1);
    }

    #[test]
    fn test_family() {
        assert_eq!(ClaudeParser::new().family(), SchemaFamily::Claude);
    }
}
