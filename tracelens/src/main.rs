//! tracelens - unified timelines for AI coding-agent sessions
//!
//! Locates a Claude Code or Codex session on disk, merges its transcripts and
//! hook logs into one ordered timeline, and prints it as JSON, a resumable
//! digest, usage stats or a payload listing.

mod report;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracelens_core::config::home_dir;
use tracelens_core::discovery::{locator_for, SessionLocator, SessionQuery, SessionSummary};
use tracelens_core::ingest::parser_for;
use tracelens_core::{generate_digest, Config, SchemaFamily, SessionBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// The full session as pretty-printed JSON
    Json,
    /// Markdown digest for resuming work in a new session
    Digest,
    /// Token usage, cost estimate and event counters
    Stats,
    /// Files and prompts sent to the model
    Payload,
}

#[derive(Parser)]
#[command(name = "tracelens")]
#[command(about = "Unified timelines and resumable digests for AI coding-agent sessions")]
#[command(version)]
struct Args {
    /// Session ID prefix or path fragment (defaults to the latest session)
    session: Option<String>,

    /// Use the most recently modified session
    #[arg(long, conflicts_with = "session")]
    latest: bool,

    /// List sessions with summaries instead of building one
    #[arg(long)]
    list: bool,

    /// Transcript family: claude or codex
    #[arg(long, default_value = "claude")]
    source: SchemaFamily,

    /// Project directory whose Claude sessions to search (defaults to the
    /// current directory)
    #[arg(long)]
    project: Option<PathBuf>,

    /// Override the Claude Code data directory
    #[arg(long, value_name = "DIR")]
    claude_home: Option<PathBuf>,

    /// Override the Codex data directory
    #[arg(long, value_name = "DIR")]
    codex_home: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Bound event details to N characters (0 keeps them whole)
    #[arg(long, value_name = "N")]
    max_chars: Option<usize>,

    /// Do not merge hook lifecycle logs
    #[arg(long)]
    no_hooks: bool,

    /// Maximum number of sessions shown by --list
    #[arg(long, default_value_t = 20)]
    limit: usize,

    /// Write output to a file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    out_file: Option<PathBuf>,

    /// Print every parse warning and log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();

    let mut config = Config::load().context("failed to load configuration")?;
    apply_overrides(&mut config, &args);

    let _log_guard =
        tracelens_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!(source = %args.source, list = args.list, "tracelens starting");

    let project = match (&args.project, args.source) {
        (Some(project), _) => Some(project.clone()),
        (None, SchemaFamily::Claude) => std::env::current_dir().ok(),
        (None, SchemaFamily::Codex) => None,
    };
    let locator = locator_for(args.source, &config.sources, project.as_deref());

    let output = if args.list {
        list_sessions(&args, &config, locator.as_ref())?
    } else {
        build_output(&args, &config, locator.as_ref())?
    };

    match &args.out_file {
        Some(path) => {
            fs::write(path, &output)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Written to {}", path.display());
        }
        None => println!("{}", output),
    }

    Ok(())
}

/// Command-line flags win over the config file.
fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(dir) = &args.claude_home {
        config.sources.claude_home = Some(dir.clone());
    }
    if let Some(dir) = &args.codex_home {
        config.sources.codex_home = Some(dir.clone());
    }
    if let Some(max_chars) = args.max_chars {
        config.timeline.max_detail_chars = max_chars;
    }
    if args.no_hooks {
        config.hooks.enabled = false;
    }
    if args.verbose {
        config.logging.level = "debug".to_string();
    }
}

fn build_output(args: &Args, config: &Config, locator: &dyn SessionLocator) -> Result<String> {
    let query = match &args.session {
        Some(id) if !args.latest => SessionQuery::Id(id.clone()),
        _ => SessionQuery::Latest,
    };
    let files = locator.find(&query).context("failed to locate session")?;

    let main_name = files
        .main
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    eprintln!("Analyzing session: {}", main_name);
    eprintln!("Found {} agent file(s)", files.agents.len());

    let parser = parser_for(files.family, &config.sources);
    let session = SessionBuilder::new(parser.as_ref(), config).build(&files.main, &files.agents);

    eprintln!("{}", report::progress_line(&session));
    if let Some(log) = session.hook_logs.first() {
        eprintln!(
            "Integrated {} hook events from {}",
            session.stats.hook_events,
            log.display()
        );
    }
    if args.verbose {
        for warning in &session.warnings {
            eprintln!("Warning: {}", warning);
        }
    }

    let output = match args.format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&session).context("failed to serialize session")?
        }
        OutputFormat::Digest => generate_digest(&session, &config.digest),
        OutputFormat::Stats => report::format_stats(&session),
        OutputFormat::Payload => report::format_payload(&session),
    };
    Ok(output)
}

/// Build each listed session without hooks; only its header fields are shown.
fn list_sessions(args: &Args, config: &Config, locator: &dyn SessionLocator) -> Result<String> {
    let files = locator.list().context("failed to list sessions")?;

    let parser = parser_for(locator.family(), &config.sources);
    let builder = SessionBuilder::new(parser.as_ref(), config).without_hooks();

    let summaries: Vec<SessionSummary> = files
        .iter()
        .take(args.limit)
        .map(|f| SessionSummary::new(&builder.build(&f.main, &f.agents), f.modified_at))
        .collect();

    tracing::info!(
        found = files.len(),
        shown = summaries.len(),
        "Listed sessions"
    );

    match args.format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&summaries).context("failed to serialize session list")
        }
        _ => Ok(report::format_session_list(&summaries, Some(&home_dir()))),
    }
}
