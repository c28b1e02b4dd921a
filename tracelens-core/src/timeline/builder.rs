//! Session building: files in, one ordered [`Session`] out.
//!
//! The builder is the only writer of the merged timeline. Each file is parsed
//! and assembled on its own, then the per-agent results are reduced here:
//! events are attributed and ordered, usage accumulators are merged, and the
//! aggregate counters are computed in a single pass over the final order.

use super::agent::{assemble_orchestrator, assemble_subagent, Assembled};
use super::hooks::{find_hook_log, parse_hook_log};
use crate::config::{Config, MissingTimestamps};
use crate::format::{char_len, duration_minutes, take_chars, Render};
use crate::ingest::{parse_file, ParseResult, TranscriptParser};
use crate::types::{
    Agent, AgentRole, CloudStats, Event, EventKind, EventSource, FileSent, ParseWarning,
    PayloadSummary, PromptSent, Session, SessionStats, TimelineEvent, MAIN_AGENT_ID,
};
use chrono::Duration;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Longest prompt preview kept in the payload summary.
const PROMPT_PREVIEW_CHARS: usize = 200;

/// Tool results shorter than this are not counted as transmitted content.
const CONTENT_RESULT_THRESHOLD: usize = 100;

/// Builds sessions for one transcript family.
///
/// ```rust,ignore
/// let parser = parser_for(SchemaFamily::Claude, &config.sources);
/// let session = SessionBuilder::new(parser.as_ref(), &config).build(&main, &agents);
/// ```
pub struct SessionBuilder<'a> {
    parser: &'a dyn TranscriptParser,
    config: &'a Config,
    merge_hooks: bool,
}

impl<'a> SessionBuilder<'a> {
    pub fn new(parser: &'a dyn TranscriptParser, config: &'a Config) -> Self {
        Self {
            parser,
            config,
            merge_hooks: config.hooks.enabled,
        }
    }

    /// Skip hook log discovery regardless of configuration.
    pub fn without_hooks(mut self) -> Self {
        self.merge_hooks = false;
        self
    }

    fn render(&self) -> Render {
        Render::from(&self.config.timeline)
    }

    /// Build a session from its main transcript and spawned-agent transcripts.
    ///
    /// Unreadable files become warnings. The result always has an
    /// orchestrator, even when `main` could not be read.
    pub fn build(&self, main: &Path, agent_files: &[PathBuf]) -> Session {
        let render = self.render();
        let mut warnings: Vec<ParseWarning> = Vec::new();
        let mut cloud = CloudStats::default();
        let mut unrecognized = 0;
        let mut orphaned_results = 0;
        let mut skipped_warmup = 0;

        // Orchestrator
        let main_parsed = match parse_file(self.parser, main, false, render) {
            Ok(parsed) => parsed,
            Err(warning) => {
                warnings.push(warning);
                ParseResult::default()
            }
        };
        let ParseResult {
            events: main_events,
            user_messages: main_user_messages,
            session_id,
            project_path,
            title,
            model,
            cli_version,
            cloud_stats: main_cloud,
            warnings: main_warnings,
            unrecognized: main_unrecognized,
            ..
        } = main_parsed;
        warnings.extend(main_warnings);
        cloud.merge(&main_cloud);
        unrecognized += main_unrecognized;

        let (orchestrator, orphans) = assemble_orchestrator(Some(main), &main_user_messages, main_events);
        orphaned_results += orphans;
        let mut agents = vec![orchestrator];

        // Spawned agents, in input order
        let mut project_path = project_path;
        for file in agent_files {
            let parsed = match parse_file(self.parser, file, true, render) {
                Ok(parsed) => parsed,
                Err(warning) => {
                    warnings.push(warning);
                    continue;
                }
            };
            warnings.extend(parsed.warnings);
            cloud.merge(&parsed.cloud_stats);
            unrecognized += parsed.unrecognized;
            if project_path.is_none() {
                project_path = parsed.project_path;
            }

            match assemble_subagent(file, parsed.agent_id, &parsed.user_messages, parsed.events) {
                Assembled::Kept {
                    agent,
                    orphaned_results: orphans,
                } => {
                    orphaned_results += orphans;
                    agents.push(agent);
                }
                Assembled::Warmup => skipped_warmup += 1,
            }
        }

        let mut timeline: Vec<TimelineEvent> = agents.iter().flat_map(attribute).collect();

        // Hook events, matched against the transcript start
        let mut hook_logs = Vec::new();
        let (transcript_start, _) = bounds(&timeline);
        if self.merge_hooks {
            if let Some(start) = transcript_start.as_deref() {
                let (logs, hook_events) =
                    self.merge_hook_events(start, project_path.as_deref(), render, &mut warnings);
                hook_logs = logs;
                timeline.extend(hook_events.into_iter().map(|event| TimelineEvent {
                    agent_id: MAIN_AGENT_ID.to_string(),
                    agent_role: AgentRole::Orchestrator,
                    event,
                }));
            }
        }

        let timeline = order(timeline, self.config.timeline.missing_timestamps);
        let (start_time, end_time) = bounds(&timeline);
        let duration_minutes = duration_minutes(start_time.as_deref(), end_time.as_deref());

        let mut stats = compute_stats(&agents, &timeline);
        stats.skipped_warmup = skipped_warmup;
        stats.orphaned_results = orphaned_results;
        stats.unrecognized_records = unrecognized;
        stats.warning_count = warnings.len();

        cloud.finalize(&self.config.pricing);
        let model = model.or_else(|| cloud.model.clone());
        let cloud_stats = cloud.has_usage().then_some(cloud);

        let payload_summary = payload_summary(&agents, &timeline);

        let title = title.or_else(|| {
            agents
                .first()
                .map(|a| a.first_prompt.clone())
                .filter(|p| !p.is_empty())
        });
        let id = session_id.unwrap_or_else(|| {
            main.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown")
                .to_string()
        });

        tracing::info!(
            session = %id,
            family = %self.parser.family(),
            agents = agents.len(),
            skipped_warmup,
            events = timeline.len(),
            hook_events = stats.hook_events,
            warnings = warnings.len(),
            "Built session"
        );

        Session {
            id,
            family: self.parser.family(),
            file: main.to_path_buf(),
            project_path,
            title,
            model,
            cli_version,
            start_time,
            end_time,
            duration_minutes,
            agents,
            timeline,
            stats,
            cloud_stats,
            payload_summary,
            hook_logs,
            warnings,
        }
    }

    fn merge_hook_events(
        &self,
        session_start: &str,
        project: Option<&str>,
        render: Render,
        warnings: &mut Vec<ParseWarning>,
    ) -> (Vec<PathBuf>, Vec<Event>) {
        let mut dirs = self.parser.hook_log_dirs(project);
        dirs.extend(self.config.hooks.extra_dirs.iter().cloned());

        let Some(window) = Duration::try_hours(self.config.hooks.window_hours) else {
            tracing::warn!(
                window_hours = self.config.hooks.window_hours,
                "Hook window out of range, not merging hook logs"
            );
            return (Vec::new(), Vec::new());
        };
        let Some(found) = find_hook_log(&dirs, session_start, window) else {
            tracing::debug!(start = session_start, "No hook log within window");
            return (Vec::new(), Vec::new());
        };

        let events = match parse_hook_log(&found.primary, &found.log_date, &render) {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(path = %found.primary.display(), error = %e, "Skipping unreadable hook log");
                warnings.push(ParseWarning {
                    path: found.primary.clone(),
                    line: None,
                    message: e.to_string(),
                });
                return (Vec::new(), Vec::new());
            }
        };

        tracing::info!(
            log = %found.primary.display(),
            events = events.len(),
            "Merged hook events"
        );

        let mut logs = vec![found.primary];
        if let Some(secondary) = found.secondary {
            tracing::debug!(log = %secondary.display(), "Agent hook log present, not merged");
            logs.push(secondary);
        }
        (logs, events)
    }
}

fn attribute(agent: &Agent) -> impl Iterator<Item = TimelineEvent> + '_ {
    agent.trace.iter().map(move |event| TimelineEvent {
        agent_id: agent.id.clone(),
        agent_role: agent.role,
        event: event.clone(),
    })
}

/// Stable order on the raw timestamp string.
///
/// Comparison is lexicographic, which is only sound while every producer
/// writes the same fixed-width ISO-8601 shape. Equal keys keep insertion
/// order: orchestrator, then subagents in input order, then hook events.
fn order(mut timeline: Vec<TimelineEvent>, missing: MissingTimestamps) -> Vec<TimelineEvent> {
    if missing == MissingTimestamps::Exclude {
        timeline.retain(|e| e.event.timestamp.is_some());
    }
    // `None` orders before every `Some`, placing untimed events first
    timeline.sort_by(|a, b| a.event.timestamp.cmp(&b.event.timestamp));
    timeline
}

fn bounds(timeline: &[TimelineEvent]) -> (Option<String>, Option<String>) {
    let mut start: Option<&str> = None;
    let mut end: Option<&str> = None;
    for ts in timeline.iter().filter_map(|e| e.event.timestamp.as_deref()) {
        if start.map_or(true, |s| ts < s) {
            start = Some(ts);
        }
        if end.map_or(true, |e| ts > e) {
            end = Some(ts);
        }
    }
    (start.map(str::to_string), end.map(str::to_string))
}

/// Aggregate counters in one pass over the ordered timeline.
fn compute_stats(agents: &[Agent], timeline: &[TimelineEvent]) -> SessionStats {
    let mut stats = SessionStats {
        total_agents: agents.len(),
        total_events: timeline.len(),
        total_tool_calls: agents.iter().map(|a| a.tool_call_count).sum(),
        ..Default::default()
    };

    for item in timeline {
        let event = &item.event;
        *stats.event_counts.entry(event.kind).or_default() += 1;
        *stats
            .source_counts
            .entry(event.source.as_str().to_string())
            .or_default() += 1;
        *stats
            .agent_event_counts
            .entry(item.agent_id.clone())
            .or_default() += 1;

        if event.source == EventSource::Hook {
            stats.hook_events += 1;
        }
        if event.kind == EventKind::ToolUse {
            *stats.tools_by_agent.entry(item.agent_id.clone()).or_default() += 1;
            if let Some(name) = event.tool_name() {
                *stats.tool_counts.entry(name.to_string()).or_default() += 1;
            }
        }
    }

    stats
}

/// What content was sent to the model: files read, prompts typed and the
/// bulk of tool output.
fn payload_summary(agents: &[Agent], timeline: &[TimelineEvent]) -> PayloadSummary {
    let mut seen = HashSet::new();
    let mut files_sent = Vec::new();
    for item in timeline {
        let event = &item.event;
        if event.kind != EventKind::ToolUse || event.tool_name() != Some("Read") {
            continue;
        }
        let Some(path) = event
            .tool_input()
            .and_then(|input| input.get("file_path"))
            .and_then(|v| v.as_str())
            .filter(|p| !p.is_empty())
        else {
            continue;
        };
        if !seen.insert(path.to_string()) {
            continue;
        }
        let size_chars = event
            .result
            .as_ref()
            .map(|r| {
                if r.full_length > 0 {
                    r.full_length
                } else {
                    char_len(&r.content)
                }
            })
            .unwrap_or(0);
        files_sent.push(FileSent {
            path: path.to_string(),
            size_chars,
            timestamp: event.timestamp.clone(),
        });
    }

    let user_prompts = agents
        .iter()
        .filter(|a| a.is_orchestrator())
        .flat_map(|a| a.trace.iter())
        .filter(|e| e.kind == EventKind::User && !e.detail.trim().is_empty())
        .map(|e| PromptSent {
            text: take_chars(&e.detail, PROMPT_PREVIEW_CHARS).to_string(),
            full_length: e.text_len,
            timestamp: e.timestamp.clone(),
        })
        .collect();

    let total_content_chars = agents
        .iter()
        .flat_map(|a| a.trace.iter())
        .map(|e| {
            let prompt = if e.kind == EventKind::User { e.text_len } else { 0 };
            let output = e
                .result
                .as_ref()
                .map(|r| r.full_length)
                .filter(|len| *len > CONTENT_RESULT_THRESHOLD)
                .unwrap_or(0);
            prompt + output
        })
        .sum();

    PayloadSummary {
        files_sent,
        user_prompts,
        total_content_chars,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ToolCall, ToolResult};
    use serde_json::json;

    fn timed(agent: &str, ts: Option<&str>, summary: &str) -> TimelineEvent {
        TimelineEvent {
            agent_id: agent.to_string(),
            agent_role: AgentRole::Orchestrator,
            event: Event::new(EventKind::Text, ts.map(str::to_string), summary, summary),
        }
    }

    #[test]
    fn test_order_is_stable_and_puts_untimed_first() {
        let timeline = vec![
            timed("main", Some("2025-01-01T10:00:02Z"), "b"),
            timed("main", None, "untimed"),
            timed("agent-1", Some("2025-01-01T10:00:01Z"), "a"),
            timed("main", Some("2025-01-01T10:00:02Z"), "c"),
        ];

        let ordered = order(timeline, MissingTimestamps::Earliest);
        let summaries: Vec<_> = ordered.iter().map(|e| e.event.summary.as_str()).collect();
        assert_eq!(summaries, vec!["untimed", "a", "b", "c"]);
    }

    #[test]
    fn test_order_can_exclude_untimed() {
        let timeline = vec![
            timed("main", None, "untimed"),
            timed("main", Some("2025-01-01T10:00:00Z"), "kept"),
        ];
        let ordered = order(timeline, MissingTimestamps::Exclude);
        assert_eq!(ordered.len(), 1);
        assert_eq!(ordered[0].event.summary, "kept");
    }

    #[test]
    fn test_stats_single_pass() {
        let call = Event::new(EventKind::ToolUse, Some("t2".into()), "Bash", "").with_tool(ToolCall {
            id: Some("c1".into()),
            name: "Bash".into(),
            input: json!({"command": "ls"}),
        });
        let agent = Agent {
            id: MAIN_AGENT_ID.into(),
            role: AgentRole::Orchestrator,
            file: None,
            parent: None,
            start_time: None,
            end_time: None,
            first_prompt: String::new(),
            trace: vec![call.clone()],
            tool_call_count: 1,
        };
        let timeline = vec![
            timed("main", Some("t1"), "hi"),
            TimelineEvent {
                agent_id: "main".into(),
                agent_role: AgentRole::Orchestrator,
                event: call,
            },
            TimelineEvent {
                agent_id: "main".into(),
                agent_role: AgentRole::Orchestrator,
                event: Event::new(EventKind::Lifecycle, Some("t3".into()), "Stop", "")
                    .with_source(EventSource::Hook),
            },
        ];

        let stats = compute_stats(&[agent], &timeline);

        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.total_tool_calls, 1);
        assert_eq!(stats.hook_events, 1);
        assert_eq!(stats.count(EventKind::ToolUse), 1);
        assert_eq!(stats.source_counts.get("hook"), Some(&1));
        assert_eq!(stats.source_counts.get("transcript"), Some(&2));
        assert_eq!(stats.tools_by_agent.get("main"), Some(&1));
        assert_eq!(stats.tool_counts.get("Bash"), Some(&1));
    }

    #[test]
    fn test_payload_summary_counts_distinct_reads() {
        let read = |path: &str, len: usize| {
            Event::new(EventKind::ToolUse, Some("t".into()), "Read", "")
                .with_tool(ToolCall {
                    id: Some(path.into()),
                    name: "Read".into(),
                    input: json!({"file_path": path}),
                })
                .with_result(ToolResult {
                    call_id: Some(path.into()),
                    content: "x".repeat(len),
                    full_length: len,
                    is_error: false,
                })
        };
        let prompt = Event::new(EventKind::User, Some("t0".into()), "fix it", "fix it").with_text_len(6);
        let trace = vec![prompt, read("/a.rs", 500), read("/a.rs", 500), read("/b.rs", 50)];
        let agent = Agent {
            id: MAIN_AGENT_ID.into(),
            role: AgentRole::Orchestrator,
            file: None,
            parent: None,
            start_time: None,
            end_time: None,
            first_prompt: "fix it".into(),
            trace: trace.clone(),
            tool_call_count: 3,
        };
        let timeline: Vec<_> = attribute(&agent).collect();

        let payload = payload_summary(&[agent], &timeline);

        assert_eq!(payload.files_sent.len(), 2);
        assert_eq!(payload.files_sent[0].size_chars, 500);
        assert_eq!(payload.user_prompts.len(), 1);
        assert_eq!(payload.user_prompts[0].full_length, 6);
        assert_eq!(payload.total_content_chars, 6 + 500 + 500);
    }

    #[test]
    fn test_out_of_range_hook_window_skips_merge() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("s1.jsonl");
        std::fs::write(
            &main,
            r#"{"type":"user","timestamp":"2025-01-01T10:00:00Z","message":{"content":"hello"}}"#,
        )
        .unwrap();

        let mut config = Config::default();
        config.hooks.window_hours = i64::MAX;
        config.hooks.extra_dirs = vec![dir.path().to_path_buf()];
        let parser = crate::ingest::ClaudeParser::with_root(dir.path().join(".claude"));

        let session = SessionBuilder::new(&parser, &config).build(&main, &[]);

        assert_eq!(session.timeline.len(), 1);
        assert!(session.hook_logs.is_empty());
        assert_eq!(session.stats.hook_events, 0);
    }
}
