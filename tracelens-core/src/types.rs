//! Core domain types for tracelens
//!
//! These types are the canonical shape every transcript family is normalized
//! into before it reaches the timeline.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Session** | One interaction between a human and an orchestrating agent |
//! | **Agent** | One actor in a session, backed by exactly one transcript file |
//! | **Event** | One classified unit of activity inside an agent's trace |
//! | **Timeline** | All agents' events plus merged hook events, globally ordered |
//! | **Hook log** | A lifecycle log written independently of the transcripts |
//!
//! An [`Event`] is produced by a parser and knows nothing about which agent it
//! belongs to. Attribution happens when the timeline is built, which wraps it
//! in a [`TimelineEvent`].

use crate::config::PricingConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

/// Identifier of the orchestrator agent in every session.
pub const MAIN_AGENT_ID: &str = "main";

// ============================================
// Schema families
// ============================================

/// The two transcript schema families the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaFamily {
    /// Chat transcripts: `type` + nested `message.content` (Claude Code)
    Claude,
    /// Structured logs: `type` + `payload` (Codex CLI)
    Codex,
}

impl SchemaFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaFamily::Claude => "claude",
            SchemaFamily::Codex => "codex",
        }
    }

    /// Returns the display name for this family
    pub fn display_name(&self) -> &'static str {
        match self {
            SchemaFamily::Claude => "Claude Code",
            SchemaFamily::Codex => "Codex",
        }
    }
}

impl fmt::Display for SchemaFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SchemaFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "claude" | "claude_code" | "claude-code" => Ok(SchemaFamily::Claude),
            "codex" => Ok(SchemaFamily::Codex),
            _ => Err(format!("unknown transcript family: {}", s)),
        }
    }
}

// ============================================
// Events
// ============================================

/// Canonical event taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Text authored by the human (or the spawning agent, for subagents)
    User,
    /// Model reasoning, kept apart from visible text
    Thinking,
    /// Visible model response
    Text,
    /// Request to invoke a tool
    ToolUse,
    /// Outcome of a tool call; folded into its `ToolUse` before the timeline
    ToolResult,
    /// Hook-reported completion of a tool
    PostToolUse,
    /// Session control signals (start, stop, compaction, context, ...)
    Lifecycle,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::User => "user",
            EventKind::Thinking => "thinking",
            EventKind::Text => "text",
            EventKind::ToolUse => "tool_use",
            EventKind::ToolResult => "tool_result",
            EventKind::PostToolUse => "post_tool_use",
            EventKind::Lifecycle => "lifecycle",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which subsystem produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    /// Decoded from a JSONL transcript
    Transcript,
    /// Parsed from a hook lifecycle log
    Hook,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::Transcript => "transcript",
            EventSource::Hook => "hook",
        }
    }
}

/// A tool invocation as recorded in the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call identifier used to correlate the result
    pub id: Option<String>,
    pub name: String,
    /// Arguments verbatim (decoded from an embedded string when possible)
    pub input: serde_json::Value,
}

/// The outcome attached to a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Call identifier this result answers (absent for hook events)
    pub call_id: Option<String>,
    /// Rendered output (may be truncated)
    pub content: String,
    /// Character length of the output before truncation
    pub full_length: usize,
    pub is_error: bool,
}

/// One classified unit of activity inside a single agent's trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// ISO-8601 timestamp exactly as it appeared in the source
    pub timestamp: Option<String>,
    pub kind: EventKind,
    pub source: EventSource,
    /// Single-line, bounded rendering
    pub summary: String,
    /// Longer rendering, optionally capped
    pub detail: String,
    /// Declared author role of the underlying message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Lifecycle signal name (`SessionStart`, `session_meta`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolResult>,
    /// Character length of the raw text before any truncation
    #[serde(default)]
    pub text_len: usize,
}

impl Event {
    /// Create a transcript event.
    pub fn new(
        kind: EventKind,
        timestamp: Option<String>,
        summary: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            kind,
            source: EventSource::Transcript,
            summary: summary.into(),
            detail: detail.into(),
            role: None,
            event_type: None,
            tool: None,
            result: None,
            text_len: 0,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn with_tool(mut self, tool: ToolCall) -> Self {
        self.tool = Some(tool);
        self
    }

    pub fn with_result(mut self, result: ToolResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_text_len(mut self, text_len: usize) -> Self {
        self.text_len = text_len;
        self
    }

    pub fn with_source(mut self, source: EventSource) -> Self {
        self.source = source;
        self
    }

    pub fn tool_name(&self) -> Option<&str> {
        self.tool.as_ref().map(|t| t.name.as_str())
    }

    pub fn tool_input(&self) -> Option<&serde_json::Value> {
        self.tool.as_ref().map(|t| &t.input)
    }

    /// True when the attached result reports a failure.
    pub fn is_error(&self) -> bool {
        self.result.as_ref().map(|r| r.is_error).unwrap_or(false)
    }
}

/// An event attributed to the agent that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub agent_id: String,
    pub agent_role: AgentRole,
    #[serde(flatten)]
    pub event: Event,
}

// ============================================
// Agents
// ============================================

/// Role of an agent within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentRole {
    /// The main transcript; never inferred
    Orchestrator,
    Explore,
    Plan,
    Guide,
    GeneralPurpose,
    /// Spawned agent whose prompt matched no known vocabulary
    Subagent,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Orchestrator => "orchestrator",
            AgentRole::Explore => "explore",
            AgentRole::Plan => "plan",
            AgentRole::Guide => "guide",
            AgentRole::GeneralPurpose => "general-purpose",
            AgentRole::Subagent => "subagent",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One actor in a session, assembled from one transcript file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub role: AgentRole,
    /// Transcript this agent was read from
    pub file: Option<PathBuf>,
    /// Spawning agent (always the orchestrator for subagents)
    pub parent: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    /// First substantive prompt, bounded
    pub first_prompt: String,
    /// Correlated events in file order
    pub trace: Vec<Event>,
    pub tool_call_count: usize,
}

impl Agent {
    pub fn is_orchestrator(&self) -> bool {
        self.role == AgentRole::Orchestrator
    }
}

// ============================================
// Diagnostics
// ============================================

/// A recoverable problem encountered while reading input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    pub path: PathBuf,
    /// 1-based line number, when the problem is tied to a line
    pub line: Option<usize>,
    pub message: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}: {}", self.path.display(), line, self.message),
            None => write!(f, "{}: {}", self.path.display(), self.message),
        }
    }
}

// ============================================
// Usage accounting
// ============================================

/// Token usage and request rollup for transcripts that carry telemetry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudStats {
    pub model: Option<String>,
    pub service_tier: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    pub reasoning_output_tokens: u64,
    pub request_ids: BTreeSet<String>,
    pub message_ids: BTreeSet<String>,
    /// Usage snapshots seen for sources without request identifiers
    #[serde(default)]
    pub usage_snapshots: usize,
    pub api_requests: usize,
    pub estimated_cost_usd: f64,
}

impl CloudStats {
    /// True once any usage telemetry has been recorded.
    pub fn has_usage(&self) -> bool {
        self.model.is_some()
            || self.input_tokens > 0
            || self.output_tokens > 0
            || !self.request_ids.is_empty()
            || self.usage_snapshots > 0
    }

    /// Fold another accumulator into this one. The first model and service
    /// tier seen win.
    pub fn merge(&mut self, other: &CloudStats) {
        if self.model.is_none() {
            self.model = other.model.clone();
        }
        if self.service_tier.is_none() {
            self.service_tier = other.service_tier.clone();
        }
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cache_creation_tokens += other.cache_creation_tokens;
        self.cache_read_tokens += other.cache_read_tokens;
        self.reasoning_output_tokens += other.reasoning_output_tokens;
        self.request_ids.extend(other.request_ids.iter().cloned());
        self.message_ids.extend(other.message_ids.iter().cloned());
        self.usage_snapshots += other.usage_snapshots;
    }

    /// Compute derived fields: request count and estimated cost.
    pub fn finalize(&mut self, pricing: &PricingConfig) {
        self.api_requests = if self.request_ids.is_empty() {
            self.usage_snapshots
        } else {
            self.request_ids.len()
        };

        let per_mtok = |tokens: u64, price: f64| tokens as f64 / 1_000_000.0 * price;
        let cost = per_mtok(self.input_tokens, pricing.input_per_mtok)
            + per_mtok(self.output_tokens, pricing.output_per_mtok)
            + per_mtok(self.cache_read_tokens, pricing.cache_read_per_mtok)
            + per_mtok(self.cache_creation_tokens, pricing.cache_write_per_mtok);
        self.estimated_cost_usd = (cost * 10_000.0).round() / 10_000.0;
    }
}

/// A file whose content was read into the model context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSent {
    pub path: String,
    pub size_chars: usize,
    pub timestamp: Option<String>,
}

/// A human prompt sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSent {
    /// Preview, bounded to 200 characters
    pub text: String,
    pub full_length: usize,
    pub timestamp: Option<String>,
}

/// What content left the machine during the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayloadSummary {
    pub files_sent: Vec<FileSent>,
    pub user_prompts: Vec<PromptSent>,
    pub total_content_chars: usize,
}

// ============================================
// Session
// ============================================

/// Aggregate counters computed in one pass over the final timeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_agents: usize,
    pub skipped_warmup: usize,
    pub total_events: usize,
    pub total_tool_calls: usize,
    /// Tool results with no matching call, dropped during correlation
    pub orphaned_results: usize,
    /// Well-formed records whose shape matched no known variant
    pub unrecognized_records: usize,
    pub hook_events: usize,
    pub event_counts: BTreeMap<EventKind, usize>,
    pub source_counts: BTreeMap<String, usize>,
    pub agent_event_counts: BTreeMap<String, usize>,
    pub tools_by_agent: BTreeMap<String, usize>,
    pub tool_counts: BTreeMap<String, usize>,
    pub warning_count: usize,
}

impl SessionStats {
    pub fn count(&self, kind: EventKind) -> usize {
        self.event_counts.get(&kind).copied().unwrap_or(0)
    }
}

/// A fully built session: the aggregate root of the engine's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub family: SchemaFamily,
    /// Main transcript path
    pub file: PathBuf,
    pub project_path: Option<String>,
    /// Transcript-provided title or first substantive prompt
    pub title: Option<String>,
    pub model: Option<String>,
    pub cli_version: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub duration_minutes: Option<f64>,
    pub agents: Vec<Agent>,
    pub timeline: Vec<TimelineEvent>,
    pub stats: SessionStats,
    pub cloud_stats: Option<CloudStats>,
    pub payload_summary: PayloadSummary,
    /// Hook logs whose events were merged (primary first)
    pub hook_logs: Vec<PathBuf>,
    pub warnings: Vec<ParseWarning>,
}

impl Session {
    /// First eight characters of the session id.
    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(8) {
            Some((idx, _)) => &self.id[..idx],
            None => &self.id,
        }
    }

    pub fn orchestrator(&self) -> Option<&Agent> {
        self.agents.iter().find(|a| a.is_orchestrator())
    }
}
