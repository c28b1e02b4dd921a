//! Agent assembly: one parsed file becomes one [`Agent`].
//!
//! Subagents are checked for warmup runs and given a role inferred from
//! their first substantive prompt. The orchestrator is never filtered and
//! never has its role inferred.
//!
//! Both checks read the untruncated user text the parser collects per
//! record, not the bounded event details.

use super::correlate::correlate;
use crate::format::take_chars;
use crate::types::{Agent, AgentRole, Event, EventKind, MAIN_AGENT_ID};
use std::path::{Path, PathBuf};

/// First-message texts that mark an agent as a readiness check.
pub const WARMUP_PHRASES: &[&str] = &["warmup", "warmup..."];

/// Case-insensitive substrings of injected instructions and CLI chatter.
pub const BOILERPLATE_MARKERS: &[&str] = &[
    "<environment_context>",
    "agents.md",
    "<instructions>",
    "skills are discovered",
    "trigger rules",
    "## skills",
    "<command-name>",
    "<local-command-stdout>",
    "caveat: the messages below were generated",
];

/// Longest `first_prompt` kept on an agent.
const FIRST_PROMPT_CHARS: usize = 200;

/// Keyword vocabulary per role, checked in order.
const ROLE_KEYWORDS: &[(AgentRole, &[&str])] = &[
    (AgentRole::Explore, &["explore", "codebase", "search"]),
    (AgentRole::Plan, &["plan", "design", "architect"]),
    (
        AgentRole::Guide,
        &["claude-code-guide", "documentation", "how to"],
    ),
    (AgentRole::GeneralPurpose, &["general", "research"]),
];

/// True when `text` looks like injected instructions rather than a prompt.
pub fn is_boilerplate(text: &str) -> bool {
    let lower = text.to_lowercase();
    BOILERPLATE_MARKERS.iter().any(|m| lower.contains(m))
}

/// True when `text`, trimmed and case-folded, is exactly a warmup phrase.
pub fn is_warmup_text(text: &str) -> bool {
    let folded = text.trim().to_lowercase();
    WARMUP_PHRASES.iter().any(|p| folded == *p)
}

/// Whether a subagent is a warmup run.
///
/// Only the first user record is inspected, even when it carries nothing
/// but tool results. Any of its text segments may hold the phrase.
pub fn is_warmup(user_messages: &[Vec<String>]) -> bool {
    user_messages
        .first()
        .is_some_and(|segments| segments.iter().any(|t| is_warmup_text(t)))
}

/// First user text that is not blank, a warmup phrase or boilerplate.
pub fn first_prompt(user_messages: &[Vec<String>]) -> String {
    user_messages
        .iter()
        .flatten()
        .map(String::as_str)
        .find(|t| !t.trim().is_empty() && !is_warmup_text(t) && !is_boilerplate(t))
        .map(|t| take_chars(t.trim(), FIRST_PROMPT_CHARS).to_string())
        .unwrap_or_default()
}

/// Role implied by a subagent's first prompt.
pub fn infer_role(prompt: &str) -> AgentRole {
    let lower = prompt.to_lowercase();
    ROLE_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(role, _)| *role)
        .unwrap_or(AgentRole::Subagent)
}

/// Outcome of assembling one subagent file.
#[derive(Debug)]
pub enum Assembled {
    Kept {
        agent: Agent,
        orphaned_results: usize,
    },
    /// Discarded as a warmup run; none of its events survive
    Warmup,
}

fn bounds(events: &[Event]) -> (Option<String>, Option<String>) {
    let mut timestamps = events.iter().filter_map(|e| e.timestamp.as_deref());
    let Some(first) = timestamps.next() else {
        return (None, None);
    };
    let (min, max) = timestamps.fold((first, first), |(lo, hi), ts| {
        (lo.min(ts), hi.max(ts))
    });
    (Some(min.to_string()), Some(max.to_string()))
}

fn build(
    id: String,
    role: AgentRole,
    file: Option<PathBuf>,
    parent: Option<String>,
    first_prompt: String,
    events: Vec<Event>,
) -> (Agent, usize) {
    let correlated = correlate(events);
    let (start_time, end_time) = bounds(&correlated.events);
    let tool_call_count = correlated
        .events
        .iter()
        .filter(|e| e.kind == EventKind::ToolUse)
        .count();

    let agent = Agent {
        id,
        role,
        file,
        parent,
        start_time,
        end_time,
        first_prompt,
        trace: correlated.events,
        tool_call_count,
    };
    (agent, correlated.orphaned_results)
}

/// Assemble the orchestrator. It is always kept, even when empty.
pub fn assemble_orchestrator(
    file: Option<&Path>,
    user_messages: &[Vec<String>],
    events: Vec<Event>,
) -> (Agent, usize) {
    let prompt = first_prompt(user_messages);
    build(
        MAIN_AGENT_ID.to_string(),
        AgentRole::Orchestrator,
        file.map(Path::to_path_buf),
        None,
        prompt,
        events,
    )
}

/// Assemble a spawned agent, or discard it as a warmup run.
///
/// The id is the in-stream agent id when present, else the file stem.
pub fn assemble_subagent(
    file: &Path,
    agent_id: Option<String>,
    user_messages: &[Vec<String>],
    events: Vec<Event>,
) -> Assembled {
    if is_warmup(user_messages) {
        tracing::debug!(path = %file.display(), "Discarding warmup agent");
        return Assembled::Warmup;
    }

    let id = agent_id
        .filter(|id| !id.is_empty())
        .or_else(|| {
            file.file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| "subagent".to_string());
    let prompt = first_prompt(user_messages);
    let role = infer_role(&prompt);

    let (agent, orphaned_results) = build(
        id,
        role,
        Some(file.to_path_buf()),
        Some(MAIN_AGENT_ID.to_string()),
        prompt,
        events,
    );
    Assembled::Kept {
        agent,
        orphaned_results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(ts: &str, text: &str) -> Event {
        Event::new(EventKind::User, Some(ts.to_string()), text, text)
    }

    fn messages(records: &[&[&str]]) -> Vec<Vec<String>> {
        records
            .iter()
            .map(|r| r.iter().map(|t| t.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_warmup_subagent_is_discarded() {
        let events = vec![
            user("2025-01-01T10:00:00Z", "  Warmup  "),
            Event::new(EventKind::Text, None, "ready", "ready"),
        ];
        assert!(matches!(
            assemble_subagent(
                Path::new("agent-1.jsonl"),
                None,
                &messages(&[&["  Warmup  "]]),
                events
            ),
            Assembled::Warmup
        ));
    }

    #[test]
    fn test_warmup_check_only_inspects_first_user_record() {
        assert!(!is_warmup(&messages(&[
            &["Search the codebase for retries"],
            &["warmup"],
        ])));
        assert!(is_warmup(&messages(&[&["warmup..."]])));
        assert!(!is_warmup(&messages(&[&["warmup the cache"]])));
        assert!(!is_warmup(&[]));
    }

    #[test]
    fn test_warmup_in_any_segment_of_first_record() {
        assert!(is_warmup(&messages(&[&["<system-reminder>", "Warmup"]])));
    }

    #[test]
    fn test_tool_result_record_ends_warmup_check() {
        // A leading record with no text still counts as the first user record.
        assert!(!is_warmup(&messages(&[&[], &["warmup"]])));
        assert!(!is_warmup(&messages(&[&["   "], &["warmup"]])));
    }

    #[test]
    fn test_classification_ignores_truncated_details() {
        // Event details cut to a few characters must not hide the prompt.
        let events = vec![user("2025-01-01T10:00:00Z", "Sea")];
        let Assembled::Kept { agent, .. } = assemble_subagent(
            Path::new("/p/agent-x.jsonl"),
            None,
            &messages(&[&["Search the codebase for retries"]]),
            events,
        ) else {
            panic!("agent should be kept");
        };
        assert_eq!(agent.role, AgentRole::Explore);
        assert_eq!(agent.first_prompt, "Search the codebase for retries");
        assert_eq!(agent.trace[0].detail, "Sea");

        let truncated_warmup = vec![user("2025-01-01T10:00:00Z", "war")];
        assert!(matches!(
            assemble_subagent(
                Path::new("/p/agent-w.jsonl"),
                None,
                &messages(&[&["warmup"]]),
                truncated_warmup
            ),
            Assembled::Warmup
        ));
    }

    #[test]
    fn test_orchestrator_warmup_is_kept() {
        let (agent, orphaned) = assemble_orchestrator(
            Some(Path::new("main.jsonl")),
            &messages(&[&["warmup"]]),
            vec![user("2025-01-01T10:00:00Z", "warmup")],
        );
        assert_eq!(agent.id, MAIN_AGENT_ID);
        assert_eq!(agent.role, AgentRole::Orchestrator);
        assert_eq!(agent.trace.len(), 1);
        assert_eq!(agent.first_prompt, "");
        assert_eq!(orphaned, 0);
    }

    #[test]
    fn test_role_inference() {
        assert_eq!(infer_role("Explore the auth module"), AgentRole::Explore);
        assert_eq!(infer_role("Design a migration PLAN"), AgentRole::Plan);
        assert_eq!(infer_role("Find documentation for hooks"), AgentRole::Guide);
        assert_eq!(infer_role("General cleanup of crates"), AgentRole::GeneralPurpose);
        // Substring matching: "research" contains "search"
        assert_eq!(infer_role("Research crate options"), AgentRole::Explore);
        assert_eq!(infer_role("Fix the failing test"), AgentRole::Subagent);
        assert_eq!(infer_role(""), AgentRole::Subagent);
    }

    #[test]
    fn test_subagent_identity_and_bounds() {
        let events = vec![
            user("2025-01-01T10:05:00Z", "<environment_context>x</environment_context>"),
            user("2025-01-01T10:00:00Z", "Search for usages of retry()"),
            Event::new(EventKind::Text, Some("2025-01-01T10:09:00Z".into()), "found", "found"),
        ];
        let user_messages = messages(&[
            &["<environment_context>x</environment_context>"],
            &["Search for usages of retry()"],
        ]);

        let Assembled::Kept { agent, .. } =
            assemble_subagent(Path::new("/p/agent-a1b2.jsonl"), None, &user_messages, events)
        else {
            panic!("agent should be kept");
        };

        assert_eq!(agent.id, "agent-a1b2");
        assert_eq!(agent.parent.as_deref(), Some(MAIN_AGENT_ID));
        assert_eq!(agent.role, AgentRole::Explore);
        assert_eq!(agent.first_prompt, "Search for usages of retry()");
        assert_eq!(agent.start_time.as_deref(), Some("2025-01-01T10:00:00Z"));
        assert_eq!(agent.end_time.as_deref(), Some("2025-01-01T10:09:00Z"));
    }

    #[test]
    fn test_in_stream_agent_id_wins() {
        let Assembled::Kept { agent, .. } = assemble_subagent(
            Path::new("/p/agent-file.jsonl"),
            Some("a1b2c3".into()),
            &messages(&[&["Plan the rollout"]]),
            vec![user("2025-01-01T10:00:00Z", "Plan the rollout")],
        ) else {
            panic!("agent should be kept");
        };
        assert_eq!(agent.id, "a1b2c3");
        assert_eq!(agent.role, AgentRole::Plan);
    }

    #[test]
    fn test_first_prompt_is_bounded() {
        let long = "x".repeat(500);
        assert_eq!(first_prompt(&messages(&[&[&long]])).chars().count(), 200);
    }

    #[test]
    fn test_first_prompt_skips_empty_records() {
        let user_messages = messages(&[&[], &["warmup", "  "], &["Plan the rollout"]]);
        assert_eq!(first_prompt(&user_messages), "Plan the rollout");
    }

    #[test]
    fn test_boilerplate_detection() {
        assert!(is_boilerplate("# AGENTS.md instructions for /work"));
        assert!(is_boilerplate("<command-name>/clear</command-name>"));
        assert!(!is_boilerplate("Please add logging"));
    }
}
