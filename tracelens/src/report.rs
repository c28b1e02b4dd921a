//! Plain-text renderings of sessions for the terminal.

use std::path::Path;

use tracelens_core::discovery::SessionSummary;
use tracelens_core::format::{format_count, format_relative_time, parse_timestamp, take_chars};
use tracelens_core::Session;

const SUMMARY_CHARS: usize = 40;
const PROJECT_CHARS: usize = 28;
const PROMPT_PREVIEW_CHARS: usize = 80;

/// One row per session, newest first.
pub fn format_session_list(sessions: &[SessionSummary], home: Option<&Path>) -> String {
    if sessions.is_empty() {
        return "No sessions found.".to_string();
    }

    let mut lines = vec![
        format!("{:<12} {:>8}  {:<30} {:<10} Summary", "ID", "Duration", "Project", "Modified"),
        "-".repeat(100),
    ];

    for s in sessions {
        let id = take_chars(&s.id, 8);
        let duration = match s.duration_minutes {
            Some(d) if d >= 0.5 => format!("{:.0}m", d),
            _ => "?".to_string(),
        };
        let project = s
            .project_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| shorten_project(p, home))
            .unwrap_or_else(|| "(unknown)".to_string());
        let summary = match s.title.as_deref().map(str::trim) {
            Some(t) if t.chars().count() > SUMMARY_CHARS => {
                format!("{}...", take_chars(t, SUMMARY_CHARS))
            }
            Some(t) if !t.is_empty() => t.to_string(),
            _ => "(no summary)".to_string(),
        };
        let modified = format_relative_time(s.modified_at);

        lines.push(format!(
            "{:<12} {:>8}  {:<30} {:<10} {}",
            id, duration, project, modified, summary
        ));
    }

    lines.join("\n")
}

/// `~` for the home directory, then keep the tail of long paths.
fn shorten_project(project: &str, home: Option<&Path>) -> String {
    let mut project = project.to_string();
    if let Some(home) = home.and_then(|h| h.to_str()).filter(|h| !h.is_empty()) {
        project = project.replace(home, "~");
    }
    let len = project.chars().count();
    if len > PROJECT_CHARS {
        let tail: String = project.chars().skip(len - (PROJECT_CHARS - 3)).collect();
        project = format!("...{}", tail);
    }
    project
}

/// Token usage plus the event and tool counters of the timeline.
pub fn format_stats(session: &Session) -> String {
    let mut lines = vec![format!("Session: {}", session.short_id())];

    match &session.cloud_stats {
        Some(cloud) => {
            let model = cloud
                .model
                .as_deref()
                .or(session.model.as_deref())
                .unwrap_or("unknown");
            lines.push(format!("Model: {}", model));
            lines.push(format!("API Requests: {}", cloud.api_requests));
            lines.push(String::new());
            lines.push("Tokens:".to_string());
            lines.push(format!("  Input: {}", format_count(cloud.input_tokens)));
            lines.push(format!("  Output: {}", format_count(cloud.output_tokens)));
            lines.push(format!(
                "  Cache Creation: {}",
                format_count(cloud.cache_creation_tokens)
            ));
            lines.push(format!(
                "  Cache Read: {}",
                format_count(cloud.cache_read_tokens)
            ));
            if cloud.reasoning_output_tokens > 0 {
                lines.push(format!(
                    "  Reasoning: {}",
                    format_count(cloud.reasoning_output_tokens)
                ));
            }
            lines.push(String::new());
            lines.push(format!("Estimated Cost: ${:.4}", cloud.estimated_cost_usd));
            lines.push(format!(
                "Service Tier: {}",
                cloud.service_tier.as_deref().unwrap_or("unknown")
            ));
        }
        None => {
            lines.push(format!(
                "Model: {}",
                session.model.as_deref().unwrap_or("unknown")
            ));
            lines.push("No usage telemetry recorded.".to_string());
        }
    }

    let stats = &session.stats;
    lines.push(String::new());
    lines.push(format!(
        "Events: {} across {} agent(s)",
        stats.total_events, stats.total_agents
    ));
    for (kind, count) in &stats.event_counts {
        lines.push(format!("  {:<16} {:>6}", kind.as_str(), count));
    }

    if !stats.tool_counts.is_empty() {
        lines.push(String::new());
        lines.push(format!("Tool calls: {}", stats.total_tool_calls));
        let mut tools: Vec<_> = stats.tool_counts.iter().collect();
        tools.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (name, count) in tools {
            lines.push(format!("  {:<16} {:>6}", name, count));
        }
    }

    lines.push(String::new());
    lines.push(format!("Hook events: {}", stats.hook_events));
    lines.push(format!("Skipped warmup agents: {}", stats.skipped_warmup));
    lines.push(format!("Orphaned results: {}", stats.orphaned_results));
    lines.push(format!(
        "Unrecognized records: {}",
        stats.unrecognized_records
    ));
    lines.push(format!("Warnings: {}", stats.warning_count));

    lines.join("\n")
}

/// Files and prompts that were sent to the model.
pub fn format_payload(session: &Session) -> String {
    let payload = &session.payload_summary;
    let mut lines = vec![format!(
        "Files sent to cloud ({}):",
        payload.files_sent.len()
    )];

    if payload.files_sent.is_empty() {
        lines.push("  (none)".to_string());
    }
    for file in &payload.files_sent {
        let time = file
            .timestamp
            .as_deref()
            .and_then(parse_timestamp)
            .map(|dt| format!(" @ {}", dt.format("%H:%M:%S")))
            .unwrap_or_default();
        lines.push(format!(
            "  - {} ({} chars){}",
            file.path,
            format_count(file.size_chars as u64),
            time
        ));
    }

    lines.push(String::new());
    lines.push(format!("User prompts ({}):", payload.user_prompts.len()));
    if payload.user_prompts.is_empty() {
        lines.push("  (none)".to_string());
    }
    for (i, prompt) in payload.user_prompts.iter().enumerate() {
        let mut text = take_chars(&prompt.text, PROMPT_PREVIEW_CHARS).replace('\n', " ");
        if prompt.text.chars().count() > PROMPT_PREVIEW_CHARS {
            text.push_str("...");
        }
        lines.push(format!(
            "  {}. \"{}\" ({} chars)",
            i + 1,
            text,
            format_count(prompt.full_length as u64)
        ));
    }

    let total = payload.total_content_chars;
    lines.push(String::new());
    lines.push(format!(
        "Total content: {} chars ({:.1} KB)",
        format_count(total as u64),
        total as f64 / 1024.0
    ));

    lines.join("\n")
}

/// Stderr line describing what was built.
pub fn progress_line(session: &Session) -> String {
    format!(
        "Built {} session {}: {} events from {} agent(s), {} hook event(s), {} warning(s)",
        session.family.display_name(),
        session.short_id(),
        session.stats.total_events,
        session.stats.total_agents,
        session.stats.hook_events,
        session.warnings.len()
    )
}
