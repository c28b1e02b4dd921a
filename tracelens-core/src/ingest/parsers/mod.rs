//! Family-specific transcript parsers
//!
//! Each supported schema family has a parser module that implements
//! the [`TranscriptParser`](super::TranscriptParser) trait.
//!
//! | Family | Module | Source |
//! |--------|--------|--------|
//! | Claude | [`claude`] | Claude Code chat transcripts |
//! | Codex | [`codex`] | Codex CLI rollout logs |

mod claude;
mod codex;

pub use claude::{ClaudeParser, HOOK_LOG_DIR};
pub use codex::CodexParser;

use super::TranscriptParser;
use crate::config::SourceOverrides;
use crate::types::SchemaFamily;

/// Get the parser for a schema family.
pub fn parser_for(family: SchemaFamily, sources: &SourceOverrides) -> Box<dyn TranscriptParser> {
    match family {
        SchemaFamily::Claude => Box::new(ClaudeParser::with_root(sources.claude_home())),
        SchemaFamily::Codex => Box::new(CodexParser::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parser_for_each_family() {
        let sources = SourceOverrides::default();
        assert_eq!(
            parser_for(SchemaFamily::Claude, &sources).family(),
            SchemaFamily::Claude
        );
        assert_eq!(
            parser_for(SchemaFamily::Codex, &sources).family(),
            SchemaFamily::Codex
        );
    }

    #[test]
    fn test_parser_for_uses_claude_home_override() {
        let sources = SourceOverrides {
            claude_home: Some(PathBuf::from("/data/claude")),
            codex_home: None,
        };
        let parser = parser_for(SchemaFamily::Claude, &sources);
        assert_eq!(
            parser.hook_log_dirs(None),
            vec![PathBuf::from("/data/claude/.claude-logs")]
        );
        assert!(parser_for(SchemaFamily::Codex, &sources)
            .hook_log_dirs(Some("/work"))
            .is_empty());
    }
}
