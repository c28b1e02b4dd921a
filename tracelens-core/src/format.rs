//! Text rendering helpers shared by the classifiers, the digest and the CLI.
//!
//! Everything here counts in `char`s, never bytes, so truncation can not split
//! a UTF-8 sequence.

use crate::config::TimelineConfig;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Placeholder summary for empty text.
pub const NO_SUMMARY: &str = "(no summary)";

/// Argument keys that best describe a tool call, in preference order.
const SUMMARY_KEYS: &[&str] = &[
    "command",
    "file_path",
    "path",
    "pattern",
    "query",
    "url",
    "uri",
    "description",
];

/// Keys listed first when rendering tool arguments as detail text.
const DETAIL_KEYS: &[&str] = &[
    "command",
    "url",
    "file_path",
    "path",
    "uri",
    "workdir",
    "timeout_ms",
    "justification",
];

fn exit_code_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)exit code:?\s*(\d+)").expect("valid exit code regex"))
}

/// Summary and detail bounds applied to every classified event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Render {
    pub summary_chars: usize,
    /// 0 means unbounded
    pub max_detail_chars: usize,
}

impl Default for Render {
    fn default() -> Self {
        Self {
            summary_chars: 120,
            max_detail_chars: 0,
        }
    }
}

impl From<&TimelineConfig> for Render {
    fn from(config: &TimelineConfig) -> Self {
        Self {
            summary_chars: config.summary_chars,
            max_detail_chars: config.max_detail_chars,
        }
    }
}

impl Render {
    pub fn summary(&self, text: &str) -> String {
        summarize_text(text, self.summary_chars)
    }

    pub fn detail(&self, text: &str) -> String {
        truncate_text(text, self.max_detail_chars)
    }
}

/// Number of characters in `text`.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// First `max` characters of `text`.
pub fn take_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Last `max` characters of `text`.
pub fn last_chars(text: &str, max: usize) -> &str {
    let len = char_len(text);
    if len <= max {
        return text;
    }
    match text.char_indices().nth(len - max) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

/// Collapse every whitespace run into a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Single-line rendering bounded to `max_len` characters.
///
/// Text longer than the bound is cut and suffixed with `...` so the result is
/// exactly `max_len` characters long.
pub fn summarize_text(text: &str, max_len: usize) -> String {
    let cleaned = collapse_whitespace(text);
    if cleaned.is_empty() {
        return NO_SUMMARY.to_string();
    }
    if char_len(&cleaned) <= max_len {
        return cleaned;
    }
    let keep = max_len.saturating_sub(3);
    format!("{}...", take_chars(&cleaned, keep))
}

/// Cap `text` at `max_chars` characters, appending a truncation marker.
///
/// A cap of 0 leaves the text untouched.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return text.to_string();
    }
    let len = char_len(text);
    if len <= max_chars {
        return text.to_string();
    }
    format!(
        "{}\n...[truncated {} chars]",
        take_chars(text, max_chars),
        len - max_chars
    )
}

/// Shorten a path for display, keeping its tail.
pub fn shorten_path(path: &str, max: usize) -> String {
    if char_len(path) <= max {
        return path.to_string();
    }
    format!("...{}", last_chars(path, max.saturating_sub(3)))
}

/// Render a JSON value as text: strings verbatim, everything else pretty-printed.
pub fn stringify_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Decode a string that looks like an embedded JSON object or array.
///
/// Anything else, including a string that fails to decode, is returned as a
/// JSON string unchanged.
pub fn maybe_parse_json(raw: &str) -> Value {
    let stripped = raw.trim();
    if stripped.starts_with('{') || stripped.starts_with('[') {
        if let Ok(value) = serde_json::from_str(stripped) {
            return value;
        }
    }
    Value::String(raw.to_string())
}

/// Flatten tool result content into text.
///
/// Content arrives either as a string or as an array of `{type: "text"}`
/// blocks; other shapes are rendered as JSON.
pub fn render_result_content(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let texts: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(map) => map
                        .get("text")
                        .and_then(|t| t.as_str())
                        .map(|t| t.to_string()),
                    _ => None,
                })
                .collect();
            if texts.is_empty() && !items.is_empty() {
                stringify_value(content)
            } else {
                texts.join("\n")
            }
        }
        other => stringify_value(other),
    }
}

/// Render an argument value inline: strings verbatim, arrays space-joined.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(scalar_text)
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

/// `name: key=value` for the most descriptive argument of a tool call.
pub fn summarize_tool_call(name: &str, input: &Value, max_len: usize) -> String {
    let args = match input {
        Value::Object(map) => SUMMARY_KEYS
            .iter()
            .find_map(|key| map.get(*key).map(|v| format!("{}={}", key, scalar_text(v)))),
        Value::Null => None,
        other => Some(stringify_value(other)),
    };

    match args {
        Some(args) if !collapse_whitespace(&args).is_empty() => {
            summarize_text(&format!("{}: {}", name, args), max_len)
        }
        _ => summarize_text(name, max_len),
    }
}

/// Multi-line rendering of tool arguments, descriptive keys first.
pub fn format_tool_input(input: &Value) -> String {
    match input {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by_key(|k| {
                let rank = DETAIL_KEYS
                    .iter()
                    .position(|p| p == k)
                    .unwrap_or(DETAIL_KEYS.len());
                (rank, (*k).clone())
            });
            keys.iter()
                .map(|k| format!("{}: {}", k, scalar_text(&map[k.as_str()])))
                .collect::<Vec<_>>()
                .join("\n")
        }
        Value::Array(items) => items
            .iter()
            .map(scalar_text)
            .collect::<Vec<_>>()
            .join("\n"),
        other => stringify_value(other),
    }
}

/// Process exit code reported inside free-text tool output.
pub fn exit_code(output: &str) -> Option<u32> {
    exit_code_regex()
        .captures(output)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Fallback error heuristic for tool output without an explicit flag.
pub fn output_indicates_error(output: &str) -> bool {
    matches!(exit_code(output), Some(code) if code != 0)
}

/// `exit=N` plus the first meaningful output line.
pub fn summarize_tool_output(output: &str, max_len: usize) -> String {
    if output.trim().is_empty() {
        return NO_SUMMARY.to_string();
    }

    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let first_line = match lines.iter().position(|l| *l == "Output:") {
        Some(idx) => lines.get(idx + 1).copied(),
        None => lines.first().copied(),
    };

    let mut pieces = Vec::new();
    if let Some(code) = exit_code(output) {
        pieces.push(format!("exit={}", code));
    }
    if let Some(line) = first_line {
        pieces.push(line.to_string());
    }
    summarize_text(&pieces.join(" "), max_len)
}

/// Format a token count with thousands separators.
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Parse a transcript or hook timestamp.
///
/// Accepts RFC 3339 (`2025-01-01T10:00:00.123Z`) and zone-less
/// `YYYY-MM-DDTHH:MM:SS[.f]` as written by hook logs, read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Minutes between two timestamps, rounded to one decimal.
///
/// `None` when either bound is missing or unparseable, or when the bounds are
/// inverted.
pub fn duration_minutes(start: Option<&str>, end: Option<&str>) -> Option<f64> {
    let start = parse_timestamp(start?)?;
    let end = parse_timestamp(end?)?;
    let seconds = end.signed_duration_since(start).num_milliseconds() as f64 / 1000.0;
    if seconds < 0.0 {
        return None;
    }
    Some((seconds / 60.0 * 10.0).round() / 10.0)
}

/// Format a timestamp as relative time (e.g., "2m ago").
pub fn format_relative_time(ts: DateTime<Utc>) -> String {
    let now = Utc::now();
    let duration = now.signed_duration_since(ts);

    if duration.num_seconds() < 0 {
        "just now".to_string()
    } else if duration.num_seconds() < 60 {
        format!("{}s ago", duration.num_seconds())
    } else if duration.num_minutes() < 60 {
        format!("{}m ago", duration.num_minutes())
    } else if duration.num_hours() < 24 {
        format!("{}h ago", duration.num_hours())
    } else if duration.num_days() < 7 {
        format!("{}d ago", duration.num_days())
    } else {
        ts.format("%b %d").to_string()
    }
}
