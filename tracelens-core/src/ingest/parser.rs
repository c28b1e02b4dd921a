//! Parser trait abstraction
//!
//! Each transcript family implements [`TranscriptParser`] to turn one file into
//! classified, unattributed [`Event`]s plus whatever session metadata the
//! family carries.
//!
//! ## Design Principles
//!
//! 1. **Resilience**: malformed lines become warnings, unknown shapes are
//!    counted, neither aborts the file
//! 2. **Verbatim**: timestamps and tool arguments are kept exactly as written
//! 3. **Per-file**: a parser never looks at another file's state, so agents can
//!    be parsed independently and merged afterwards
//! 4. **Extensible**: a new family only requires implementing this trait

use crate::error::Result;
use crate::format::Render;
use crate::types::{CloudStats, Event, ParseWarning, SchemaFamily};
use std::path::{Path, PathBuf};

/// Context passed to a parser for one file.
pub struct ParseContext<'a> {
    /// Path to the transcript
    pub path: &'a Path,
    /// Whether the file belongs to a spawned agent rather than the orchestrator
    pub is_subagent: bool,
    /// Summary and detail bounds
    pub render: Render,
}

impl<'a> ParseContext<'a> {
    pub fn new(path: &'a Path, render: Render) -> Self {
        Self {
            path,
            is_subagent: false,
            render,
        }
    }

    pub fn subagent(mut self) -> Self {
        self.is_subagent = true;
        self
    }
}

/// Result of parsing one transcript file.
#[derive(Debug, Default)]
pub struct ParseResult {
    /// Classified events in file order, tool results not yet folded
    pub events: Vec<Event>,
    /// Unbounded text segments of each user record, in file order. A record
    /// that carries only tool results has no segments but is still listed.
    pub user_messages: Vec<Vec<String>>,
    /// First in-stream session identifier
    pub session_id: Option<String>,
    /// First in-stream agent identifier (subagent files)
    pub agent_id: Option<String>,
    /// Working directory the agent ran in
    pub project_path: Option<String>,
    /// Transcript-provided title
    pub title: Option<String>,
    pub model: Option<String>,
    pub cli_version: Option<String>,
    /// Usage telemetry accumulated from this file only
    pub cloud_stats: CloudStats,
    /// Warnings encountered during parsing (non-fatal)
    pub warnings: Vec<ParseWarning>,
    /// Well-formed records that matched no known shape
    pub unrecognized: usize,
}

/// Trait implemented by all transcript parsers.
///
/// ## Example
///
/// ```rust,ignore
/// use tracelens_core::ingest::{ParseContext, TranscriptParser};
///
/// let parser = ClaudeParser::new();
/// let result = parser.parse(&ParseContext::new(path, Render::default()))?;
/// ```
pub trait TranscriptParser: Send + Sync {
    /// Which schema family this parser handles
    fn family(&self) -> SchemaFamily;

    /// Parse one transcript file.
    ///
    /// ## Error Handling
    ///
    /// - Individual line failures are recorded in [`ParseResult::warnings`]
    ///   and never returned as errors
    /// - Only failing to open the file returns `Err`
    fn parse(&self, ctx: &ParseContext) -> Result<ParseResult>;

    /// Extract session ID from the transcript file path.
    fn extract_session_id(&self, file_path: &Path) -> Option<String>;

    /// Directories that may hold hook lifecycle logs for this family, in
    /// precedence order.
    fn hook_log_dirs(&self, _project_path: Option<&str>) -> Vec<PathBuf> {
        Vec::new()
    }
}
