//! Error types for tracelens-core

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the tracelens-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid glob pattern during discovery
    #[error("invalid search pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// No transcripts found at all
    #[error("no session files found in {}", .0.display())]
    NoSessions(PathBuf),

    /// Session not found
    #[error("session not found: {0}")]
    SessionNotFound(String),
}

/// Result type alias for tracelens-core
pub type Result<T> = std::result::Result<T, Error>;
