//! Deterministic session digest.
//!
//! A digest is a bounded Markdown reduction of a [`Session`], meant to be
//! pasted into a fresh session to resume work. It is computed purely from the
//! session value: the same session always yields byte-identical text.

use crate::config::DigestConfig;
use crate::format::{
    char_len, collapse_whitespace, format_count, scalar_text, shorten_path, take_chars,
};
use crate::timeline::is_boilerplate;
use crate::types::{EventKind, Session, TimelineEvent, MAIN_AGENT_ID};
use serde_json::Value;
use std::collections::HashSet;

/// Roles listed in the header before the roster is cut.
const ROSTER_ROLES: usize = 5;
const COMMAND_CHARS: usize = 100;
const ERROR_CHARS: usize = 200;
const LAST_THINKING_CHARS: usize = 300;
const PATH_CHARS: usize = 60;

/// Argument keys naming a file a tool touched.
const PATH_KEYS: &[&str] = &["file_path", "path", "notebook_path"];

/// Tools whose path arguments are writes.
const MODIFYING_TOOLS: &[&str] = &["Edit", "MultiEdit", "Write", "NotebookEdit"];

/// Patch header prefixes naming the file an `apply_patch` input touches.
const PATCH_MARKERS: &[&str] = &["*** Add File: ", "*** Update File: ", "*** Delete File: "];

/// `text` cut at `max` characters with newlines flattened, `...` marking a cut.
fn excerpt(text: &str, max: usize) -> String {
    let mut out = collapse_whitespace(take_chars(text, max));
    if char_len(text) > max {
        out.push_str("...");
    }
    out
}

/// Markdown block quote of `text`, first `max` characters.
fn quote(text: &str, max: usize) -> String {
    format!("> {}", take_chars(text.trim(), max).replace('\n', "\n> "))
}

fn is_prompt(item: &TimelineEvent) -> bool {
    item.event.kind == EventKind::User
        && item.agent_id == MAIN_AGENT_ID
        && !item.event.detail.trim().is_empty()
        && !is_boilerplate(&item.event.detail)
}

fn command_of(input: &Value) -> Option<String> {
    let command = input.get("command")?;
    let text = scalar_text(command);
    let text = text.trim();
    (!text.is_empty()).then(|| take_chars(text, COMMAND_CHARS).to_string())
}

/// Files a tool call wrote, with the tool name to show beside each.
fn files_of(item: &TimelineEvent) -> Vec<String> {
    let event = &item.event;
    let (Some(name), Some(input)) = (event.tool_name(), event.tool_input()) else {
        return Vec::new();
    };

    let mut files = Vec::new();
    if MODIFYING_TOOLS.contains(&name) {
        files.extend(
            PATH_KEYS
                .iter()
                .filter_map(|key| input.get(*key).and_then(Value::as_str))
                .filter(|p| !p.is_empty())
                .take(1)
                .map(str::to_string),
        );
    }

    let texts: Vec<&str> = match input {
        Value::String(s) => vec![s.as_str()],
        Value::Object(map) => map.values().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    for text in texts {
        for line in text.lines() {
            if let Some(path) = PATCH_MARKERS.iter().find_map(|m| line.strip_prefix(m)) {
                let path = path.trim();
                if !path.is_empty() {
                    files.push(path.to_string());
                }
            }
        }
    }
    files
}

/// Render the digest for a built session.
pub fn generate_digest(session: &Session, config: &DigestConfig) -> String {
    let timeline = &session.timeline;
    let mut lines: Vec<String> = Vec::new();

    // Header
    lines.push(format!("# Session Digest: {}", session.short_id()));
    lines.push(String::new());
    lines.push(format!(
        "**Project:** {}",
        session.project_path.as_deref().unwrap_or("unknown")
    ));
    let duration = session
        .duration_minutes
        .map(|d| d.to_string())
        .unwrap_or_else(|| "?".to_string());
    lines.push(format!("**Duration:** {} minutes", duration));
    if let Some(model) = &session.model {
        lines.push(format!("**Model:** {}", model));
    }
    let roster: Vec<&str> = session
        .agents
        .iter()
        .take(ROSTER_ROLES)
        .map(|a| a.role.as_str())
        .collect();
    lines.push(format!(
        "**Agents:** {} ({})",
        session.agents.len(),
        roster.join(", ")
    ));
    lines.push(String::new());

    // Usage
    if let Some(cloud) = &session.cloud_stats {
        let payload = &session.payload_summary;
        lines.push("## Cloud Transmission Summary".to_string());
        lines.push(String::new());
        lines.push(format!(
            "- **Model:** {}",
            cloud.model.as_deref().unwrap_or("unknown")
        ));
        lines.push(format!("- **API Requests:** {}", cloud.api_requests));
        lines.push(format!(
            "- **Total Tokens:** {} input / {} output",
            format_count(cloud.input_tokens),
            format_count(cloud.output_tokens)
        ));
        lines.push(format!(
            "- **Estimated Cost:** ${:.2}",
            cloud.estimated_cost_usd
        ));
        lines.push(format!(
            "- **Files Sent:** {} files ({} chars)",
            payload.files_sent.len(),
            format_count(payload.total_content_chars as u64)
        ));
        lines.push(String::new());
    }

    // Prompts
    let prompts: Vec<&TimelineEvent> = timeline.iter().filter(|e| is_prompt(e)).collect();
    if !prompts.is_empty() {
        lines.push("## User Prompts (chronological)".to_string());
        lines.push(String::new());
        for (i, prompt) in prompts.iter().take(config.max_prompts).enumerate() {
            lines.push(format!(
                "{}. \"{}\"",
                i + 1,
                excerpt(&prompt.event.detail, config.prompt_chars)
            ));
        }
        if prompts.len() > config.max_prompts {
            lines.push(format!(
                "   ... and {} more prompts",
                prompts.len() - config.max_prompts
            ));
        }
        lines.push(String::new());
    }

    // Reasoning, longest first; the stable sort keeps timeline order on ties
    let thinking: Vec<&TimelineEvent> = timeline
        .iter()
        .filter(|e| e.event.kind == EventKind::Thinking && !e.event.detail.trim().is_empty())
        .collect();
    if !thinking.is_empty() {
        let mut ranked = thinking.clone();
        ranked.sort_by(|a, b| b.event.text_len.cmp(&a.event.text_len));
        lines.push("## Key Thinking/Decisions".to_string());
        lines.push(String::new());
        for block in ranked.iter().take(config.thinking_blocks) {
            lines.push(format!(
                "- {}",
                excerpt(&block.event.detail, config.thinking_chars)
            ));
        }
        lines.push(String::new());
    }

    // Commands
    let mut seen = HashSet::new();
    let commands: Vec<String> = timeline
        .iter()
        .filter(|e| e.event.kind == EventKind::ToolUse)
        .filter_map(|e| e.event.tool_input().and_then(command_of))
        .filter(|c| seen.insert(c.clone()))
        .take(config.max_commands)
        .collect();
    if !commands.is_empty() {
        lines.push("## Commands Run".to_string());
        lines.push(String::new());
        lines.extend(commands.iter().map(|c| format!("- `{}`", c)));
        lines.push(String::new());
    }

    // Files
    let mut seen = HashSet::new();
    let mut files: Vec<(String, &str)> = Vec::new();
    for item in timeline.iter().filter(|e| e.event.kind == EventKind::ToolUse) {
        let tool = item.event.tool_name().unwrap_or("unknown");
        for path in files_of(item) {
            if files.len() < config.max_files && seen.insert(path.clone()) {
                files.push((path, tool));
            }
        }
    }
    if !files.is_empty() {
        lines.push("## Files Modified".to_string());
        lines.push(String::new());
        lines.extend(
            files
                .iter()
                .map(|(path, tool)| format!("- {} ({})", shorten_path(path, PATH_CHARS), tool)),
        );
        lines.push(String::new());
    }

    // Errors
    let errors: Vec<&TimelineEvent> = timeline
        .iter()
        .filter(|e| matches!(e.event.kind, EventKind::ToolUse | EventKind::PostToolUse))
        .filter(|e| e.event.is_error())
        .take(config.max_errors)
        .collect();
    if !errors.is_empty() {
        lines.push("## Errors Encountered".to_string());
        lines.push(String::new());
        for err in errors {
            let content = err
                .event
                .result
                .as_ref()
                .map(|r| r.content.as_str())
                .unwrap_or_default();
            lines.push(format!(
                "- **{}**: {}",
                err.event.tool_name().unwrap_or("unknown"),
                collapse_whitespace(take_chars(content, ERROR_CHARS))
            ));
        }
        lines.push(String::new());
    }

    // Tail
    lines.push("## Where It Left Off".to_string());
    lines.push(String::new());
    if let Some(last) = prompts.last() {
        lines.push("**Last user request:**".to_string());
        lines.push(quote(&last.event.detail, config.tail_chars));
        lines.push(String::new());
    }
    let last_response = timeline.iter().rev().find(|e| {
        e.event.kind == EventKind::Text
            && e.agent_id == MAIN_AGENT_ID
            && !e.event.detail.trim().is_empty()
    });
    if let Some(response) = last_response {
        lines.push("**Last assistant response:**".to_string());
        lines.push(quote(&response.event.detail, config.tail_chars));
        lines.push(String::new());
    }
    if let Some(last) = thinking.last() {
        lines.push("**Last thinking:**".to_string());
        lines.push(quote(&last.event.detail, LAST_THINKING_CHARS));
        lines.push(String::new());
    }

    lines.join("\n")
}
