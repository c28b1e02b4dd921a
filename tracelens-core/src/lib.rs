//! # tracelens-core
//!
//! Core library for tracelens - a timeline unification engine for AI coding
//! agent transcripts.
//!
//! This library provides:
//! - Domain types for sessions, agents and events
//! - Parsers for Claude Code and Codex transcripts
//! - Tool correlation, warmup filtering and hook log merging
//! - A deterministic Markdown digest
//! - Session discovery, configuration and logging
//!
//! ## Architecture
//!
//! Data flows through three stages:
//! - **Ingest:** each transcript file is decoded line by line and classified
//!   into unattributed events
//! - **Timeline:** events are folded per agent, attributed, merged with hook
//!   lifecycle events and globally ordered into a [`Session`]
//! - **Digest:** the session is reduced to bounded text
//!
//! ## Example
//!
//! ```rust,no_run
//! use tracelens_core::discovery::{locator_for, SessionQuery};
//! use tracelens_core::ingest::parser_for;
//! use tracelens_core::{generate_digest, Config, SchemaFamily, SessionBuilder};
//!
//! let config = Config::load().expect("failed to load config");
//! let locator = locator_for(SchemaFamily::Claude, &config.sources, None);
//! let files = locator.find(&SessionQuery::Latest).expect("no session");
//!
//! let parser = parser_for(files.family, &config.sources);
//! let session = SessionBuilder::new(parser.as_ref(), &config).build(&files.main, &files.agents);
//! println!("{}", generate_digest(&session, &config.digest));
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use digest::generate_digest;
pub use error::{Error, Result};
pub use timeline::SessionBuilder;
pub use types::*;

// Public modules
pub mod config;
pub mod digest;
pub mod discovery;
pub mod error;
pub mod format;
pub mod ingest;
pub mod logging;
pub mod timeline;
pub mod types;
