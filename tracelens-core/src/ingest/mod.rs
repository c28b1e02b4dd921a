//! Ingestion layer for parsing transcript files
//!
//! This module turns raw transcript lines into classified, unattributed
//! [`Event`](crate::types::Event)s. Attribution to agents, tool correlation and
//! ordering happen afterwards in [`timeline`](crate::timeline).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌─────────────────┐
//! │  JSONL file     │ ──► │  decoder         │ ──► │ TranscriptParser│ ──► ParseResult
//! │ (one per agent) │     │  (line → record) │     │ ├─ ClaudeParser │
//! └─────────────────┘     └──────────────────┘     │ └─ CodexParser  │
//!                                                  └─────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tracelens_core::ingest::{parse_file, parser_for};
//!
//! let parser = parser_for(SchemaFamily::Claude, &config.sources);
//! match parse_file(parser.as_ref(), &path, false, Render::default()) {
//!     Ok(parsed) => println!("{} events", parsed.events.len()),
//!     Err(warning) => eprintln!("skipped: {}", warning),
//! }
//! ```

pub mod decoder;
mod parser;
pub mod parsers;

pub use parser::{ParseContext, ParseResult, TranscriptParser};
pub use parsers::{parser_for, ClaudeParser, CodexParser};

use crate::format::Render;
use crate::types::ParseWarning;
use std::path::Path;

/// Parse one file, turning an unreadable file into a warning.
///
/// A session is still worth building when one of its files can not be read,
/// so the caller records the warning and moves on.
pub fn parse_file(
    parser: &dyn TranscriptParser,
    path: &Path,
    is_subagent: bool,
    render: Render,
) -> std::result::Result<ParseResult, ParseWarning> {
    let mut ctx = ParseContext::new(path, render);
    if is_subagent {
        ctx = ctx.subagent();
    }

    parser.parse(&ctx).map_err(|e| {
        tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable transcript");
        ParseWarning {
            path: path.to_path_buf(),
            line: None,
            message: e.to_string(),
        }
    })
}
