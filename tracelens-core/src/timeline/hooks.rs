//! Hook lifecycle log discovery and parsing.
//!
//! Hook scripts write lifecycle signals to their own log files, named after
//! the moment the log was opened (`YYYYMMDD_HHMMSS.log`). Nothing in those
//! logs names the transcript they belong to, so a log is matched to a session
//! by time alone: the newest log opened within a symmetric window of the
//! session start wins. This is a best-effort heuristic, not a join.
//!
//! Each line follows `[HH:MM:SS] [agent] EventType(param): details`. Lines
//! outside that grammar, or naming an event outside [`HOOK_EVENTS`], are
//! skipped.

use crate::error::Result;
use crate::format::{char_len, parse_timestamp, Render};
use crate::types::{Event, EventKind, EventSource, ToolCall, ToolResult};
use chrono::{Duration, NaiveDateTime};
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Hook event names merged into the timeline.
pub const HOOK_EVENTS: &[&str] = &[
    "SessionStart",
    "SessionEnd",
    "Stop",
    "SubagentStop",
    "PreCompact",
    "Notify",
    "Notification",
    "Permission",
    "PostToolUse",
];

const POST_TOOL_USE: &str = "PostToolUse";
const AGENTS_LOG_SUFFIX: &str = "-agents.log";
const FILENAME_FORMAT: &str = "%Y%m%d_%H%M%S";

fn hook_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\[(\d{2}:\d{2}:\d{2})\]\s+\[([^\]]+)\]\s+(\w+)(?:\(([^)]+)\))?:\s*(.*)$")
            .expect("valid hook line regex")
    })
}

/// A hook log matched to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookLogMatch {
    /// Main lifecycle log
    pub primary: PathBuf,
    /// Sibling `<stem>-agents.log`, when present
    pub secondary: Option<PathBuf>,
    /// `YYYY-MM-DD` taken from the filename, used to date each line
    pub log_date: String,
}

/// Whether a hook detail string reports a failure.
///
/// Hook logs carry no structured status, so this is a case-insensitive
/// substring check for "error".
pub fn is_error_detail(details: &str) -> bool {
    details.to_lowercase().contains("error")
}

/// Timestamp encoded in a hook log filename.
pub fn log_timestamp(path: &Path) -> Option<NaiveDateTime> {
    let stem = path.file_stem()?.to_str()?;
    NaiveDateTime::parse_from_str(stem, FILENAME_FORMAT).ok()
}

/// Candidate main logs in `dir`, newest first by name.
fn candidate_logs(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut logs: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                return false;
            };
            name.ends_with(".log") && !name.ends_with(AGENTS_LOG_SUFFIX) && !name.starts_with('.')
        })
        .collect();
    logs.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
    logs
}

/// Find the hook log whose filename timestamp lies within `window` of
/// `session_start`, searching `dirs` in order.
///
/// The session start is compared on its own wall clock, ignoring any zone
/// offset, as hook filenames carry none.
pub fn find_hook_log(dirs: &[PathBuf], session_start: &str, window: Duration) -> Option<HookLogMatch> {
    let start = parse_timestamp(session_start)?.naive_local();

    for dir in dirs {
        if !dir.is_dir() {
            continue;
        }

        for log in candidate_logs(dir) {
            let Some(opened) = log_timestamp(&log) else {
                continue;
            };
            let diff = start.signed_duration_since(opened);
            if diff.abs() > window {
                continue;
            }

            let Some(stem) = log.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let sibling = dir.join(format!("{}{}", stem, AGENTS_LOG_SUFFIX));
            let log_date = opened.format("%Y-%m-%d").to_string();

            tracing::debug!(log = %log.display(), "Matched hook log to session");
            return Some(HookLogMatch {
                secondary: sibling.exists().then_some(sibling),
                primary: log,
                log_date,
            });
        }
    }

    None
}

/// Parse one hook log line into an event.
pub fn parse_hook_line(line: &str, log_date: &str, render: &Render) -> Option<Event> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('=') {
        return None;
    }

    let caps = hook_line_regex().captures(line)?;
    let time = caps.get(1)?.as_str();
    let event_type = caps.get(3)?.as_str();
    if !HOOK_EVENTS.contains(&event_type) {
        return None;
    }
    let param = caps.get(4).map(|m| m.as_str());
    let details = caps.get(5).map(|m| m.as_str().trim()).unwrap_or_default();
    let timestamp = Some(format!("{}T{}", log_date, time));

    let event = if event_type == POST_TOOL_USE {
        let tool = param.unwrap_or("unknown");
        let headline = if details.is_empty() {
            tool.to_string()
        } else {
            format!("{}: {}", tool, details)
        };
        Event::new(
            EventKind::PostToolUse,
            timestamp,
            render.summary(&headline),
            render.detail(details),
        )
        .with_tool(ToolCall {
            id: None,
            name: tool.to_string(),
            input: serde_json::Value::Null,
        })
        .with_result(ToolResult {
            call_id: None,
            content: render.detail(details),
            full_length: char_len(details),
            is_error: is_error_detail(details),
        })
    } else {
        let name = match param {
            Some(p) => format!("{}({})", event_type, p),
            None => event_type.to_string(),
        };
        let headline = if details.is_empty() {
            name
        } else {
            format!("{}: {}", name, details)
        };
        Event::new(
            EventKind::Lifecycle,
            timestamp,
            render.summary(&headline),
            render.detail(details),
        )
    };

    Some(
        event
            .with_event_type(event_type)
            .with_source(EventSource::Hook)
            .with_text_len(char_len(details)),
    )
}

/// Parse every recognized line of a hook log.
pub fn parse_hook_log(path: &Path, log_date: &str, render: &Render) -> Result<Vec<Event>> {
    let reader = BufReader::new(File::open(path)?);
    let mut events = Vec::new();

    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Unreadable hook log line");
                continue;
            }
        };
        if let Some(event) = parse_hook_line(&line, log_date, render) {
            events.push(event);
        }
    }

    Ok(events)
}
