//! Session file discovery
//!
//! Finds the main transcript of a session and the spawned-agent transcripts
//! that belong to it. Discovery is the only place that knows each family's
//! on-disk layout:
//!
//! | Family | Layout |
//! |--------|--------|
//! | Claude | `<claude_home>/projects/<encoded cwd>/<session>.jsonl`, subagents in `<session>/subagents/` or `agent-*.jsonl` |
//! | Codex | `<codex_home>/sessions/YYYY/MM/DD/rollout-<ts>-<uuid>.jsonl`, no subagents |
//!
//! A missing root, an empty search or a query that matches nothing is the one
//! hard failure of the engine: there is nothing to analyze.

use crate::error::{Error, Result};
use crate::ingest::{CodexParser, TranscriptParser};
use crate::types::{SchemaFamily, Session};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Leading records scanned when checking which session a root-level agent
/// file belongs to.
const AGENT_HEADER_LINES: usize = 5;

/// Which session to locate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionQuery {
    /// Most recently modified session
    Latest,
    /// Session whose id starts with, or whose path contains, the given text
    Id(String),
}

/// Files making up one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFiles {
    pub family: SchemaFamily,
    /// Identifier derived from the filename
    pub id: String,
    pub main: PathBuf,
    /// Spawned-agent transcripts, oldest first
    pub agents: Vec<PathBuf>,
    pub modified_at: DateTime<Utc>,
}

/// One line of a session listing.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub family: SchemaFamily,
    pub file: PathBuf,
    pub project_path: Option<String>,
    pub title: Option<String>,
    pub start_time: Option<String>,
    pub duration_minutes: Option<f64>,
    pub modified_at: DateTime<Utc>,
}

impl SessionSummary {
    pub fn new(session: &Session, modified_at: DateTime<Utc>) -> Self {
        Self {
            id: session.id.clone(),
            family: session.family,
            file: session.file.clone(),
            project_path: session.project_path.clone(),
            title: session.title.clone(),
            start_time: session.start_time.clone(),
            duration_minutes: session.duration_minutes,
            modified_at,
        }
    }
}

/// Finds session files for one family.
pub trait SessionLocator {
    fn family(&self) -> SchemaFamily;

    /// All sessions, newest first.
    fn list(&self) -> Result<Vec<SessionFiles>>;

    /// The session matching `query`.
    fn find(&self, query: &SessionQuery) -> Result<SessionFiles> {
        let sessions = self.list()?;
        select(sessions, query)
    }
}

fn select(sessions: Vec<SessionFiles>, query: &SessionQuery) -> Result<SessionFiles> {
    match query {
        SessionQuery::Latest => sessions
            .into_iter()
            .next()
            .ok_or_else(|| Error::SessionNotFound("latest".to_string())),
        SessionQuery::Id(needle) => {
            let mut matches: Vec<SessionFiles> = sessions
                .into_iter()
                .filter(|s| {
                    s.id.starts_with(needle.as_str())
                        || s.main.to_string_lossy().contains(needle.as_str())
                })
                .collect();
            if matches.len() > 1 {
                tracing::warn!(
                    query = %needle,
                    matches = matches.len(),
                    "Ambiguous session id; using the most recent match"
                );
            }
            if matches.is_empty() {
                return Err(Error::SessionNotFound(needle.clone()));
            }
            Ok(matches.remove(0))
        }
    }
}

fn modified_at(path: &Path) -> DateTime<Utc> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::from)
        .unwrap_or_else(|_| DateTime::<Utc>::from(std::time::UNIX_EPOCH))
}

/// Paths matching `pattern` under `dir`, with `dir` escaped so that glob
/// metacharacters in directory names match literally.
fn glob_in(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let full = format!("{}/{}", escaped.trim_end_matches('/'), pattern);
    Ok(glob::glob(&full)?.flatten().collect())
}

/// Newest first; ties broken by path so listings are stable.
fn newest_first(sessions: &mut [SessionFiles]) {
    sessions.sort_by(|a, b| {
        b.modified_at
            .cmp(&a.modified_at)
            .then_with(|| a.main.cmp(&b.main))
    });
}

// ============================================
// Claude
// ============================================

/// Encode a working directory the way Claude Code names project directories.
pub fn encode_project_path(path: &str) -> String {
    path.replace(['/', '.'], "-")
}

/// Locates Claude Code sessions under `<claude_home>/projects`.
pub struct ClaudeLocator {
    root: PathBuf,
    project: Option<PathBuf>,
}

impl ClaudeLocator {
    pub fn new(claude_home: impl Into<PathBuf>) -> Self {
        Self {
            root: claude_home.into(),
            project: None,
        }
    }

    /// Prefer sessions recorded for this working directory.
    pub fn with_project(mut self, project: impl Into<PathBuf>) -> Self {
        self.project = Some(project.into());
        self
    }

    fn projects_dir(&self) -> PathBuf {
        self.root.join("projects")
    }

    /// Project directory for the configured working directory, if recorded.
    fn project_dir(&self) -> Option<PathBuf> {
        let project = self.project.as_ref()?;
        let encoded = encode_project_path(&project.to_string_lossy());
        let projects = self.projects_dir();

        let direct = projects.join(&encoded);
        if direct.is_dir() {
            return Some(direct);
        }
        let dashed = projects.join(format!("-{}", encoded.trim_start_matches('-')));
        dashed.is_dir().then_some(dashed)
    }

    fn all_project_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut dirs: Vec<PathBuf> = std::fs::read_dir(self.projects_dir())?
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();
        Ok(dirs)
    }

    fn sessions_in(&self, dir: &Path) -> Result<Vec<SessionFiles>> {
        let mut sessions = Vec::new();
        for main in glob_in(dir, "*.jsonl")? {
            let Some(stem) = main.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            if stem.starts_with("agent-") {
                continue;
            }
            sessions.push(SessionFiles {
                family: SchemaFamily::Claude,
                agents: self.agent_files(dir, &stem)?,
                modified_at: modified_at(&main),
                id: stem,
                main,
            });
        }
        Ok(sessions)
    }

    /// Spawned-agent transcripts of session `session_id` in `dir`, oldest first.
    fn agent_files(&self, dir: &Path, session_id: &str) -> Result<Vec<PathBuf>> {
        let mut agents = glob_in(&dir.join(session_id).join("subagents"), "*.jsonl")?;

        for candidate in glob_in(dir, "agent-*.jsonl")? {
            if agent_session_id(&candidate).as_deref() == Some(session_id) {
                agents.push(candidate);
            }
        }

        agents.sort_by(|a, b| modified_at(a).cmp(&modified_at(b)).then_with(|| a.cmp(b)));
        agents.dedup();
        Ok(agents)
    }
}

/// `sessionId` named by the leading records of an agent transcript.
fn agent_session_id(path: &Path) -> Option<String> {
    let reader = BufReader::new(File::open(path).ok()?);
    reader
        .lines()
        .take(AGENT_HEADER_LINES)
        .map_while(|l| l.ok())
        .filter_map(|line| serde_json::from_str::<serde_json::Value>(&line).ok())
        .find_map(|value| {
            value
                .get("sessionId")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
}

impl SessionLocator for ClaudeLocator {
    fn family(&self) -> SchemaFamily {
        SchemaFamily::Claude
    }

    /// Sessions of the configured project, falling back to every project
    /// when it has none.
    fn list(&self) -> Result<Vec<SessionFiles>> {
        let projects = self.projects_dir();
        if !projects.is_dir() {
            return Err(Error::NoSessions(projects));
        }

        let mut sessions = match self.project_dir() {
            Some(dir) => self.sessions_in(&dir)?,
            None => Vec::new(),
        };
        if sessions.is_empty() {
            tracing::debug!(root = %projects.display(), "Searching all projects");
            for dir in self.all_project_dirs()? {
                sessions.extend(self.sessions_in(&dir)?);
            }
        }

        if sessions.is_empty() {
            return Err(Error::NoSessions(projects));
        }
        newest_first(&mut sessions);
        Ok(sessions)
    }

    /// A session id that is not in the configured project is looked up in
    /// every project.
    fn find(&self, query: &SessionQuery) -> Result<SessionFiles> {
        let local = self.list()?;
        match select(local, query) {
            Err(Error::SessionNotFound(_)) if self.project_dir().is_some() => {
                let mut all = Vec::new();
                for dir in self.all_project_dirs()? {
                    all.extend(self.sessions_in(&dir)?);
                }
                newest_first(&mut all);
                select(all, query)
            }
            other => other,
        }
    }
}

// ============================================
// Codex
// ============================================

/// Locates Codex rollouts under `<codex_home>/sessions`.
pub struct CodexLocator {
    root: PathBuf,
}

impl CodexLocator {
    pub fn new(codex_home: impl Into<PathBuf>) -> Self {
        Self {
            root: codex_home.into(),
        }
    }

    fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }
}

impl SessionLocator for CodexLocator {
    fn family(&self) -> SchemaFamily {
        SchemaFamily::Codex
    }

    fn list(&self) -> Result<Vec<SessionFiles>> {
        let dir = self.sessions_dir();
        if !dir.is_dir() {
            return Err(Error::NoSessions(dir));
        }

        let parser = CodexParser::new();
        let mut sessions: Vec<SessionFiles> = glob_in(&dir, "**/rollout-*.jsonl")?
            .into_iter()
            .map(|main| SessionFiles {
                family: SchemaFamily::Codex,
                id: parser.extract_session_id(&main).unwrap_or_else(|| {
                    main.file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default()
                }),
                agents: Vec::new(),
                modified_at: modified_at(&main),
                main,
            })
            .collect();

        if sessions.is_empty() {
            return Err(Error::NoSessions(dir));
        }
        newest_first(&mut sessions);
        Ok(sessions)
    }
}

/// Locator for a family, rooted at the configured home directories.
pub fn locator_for(
    family: SchemaFamily,
    sources: &crate::config::SourceOverrides,
    project: Option<&Path>,
) -> Box<dyn SessionLocator> {
    match family {
        SchemaFamily::Claude => {
            let locator = ClaudeLocator::new(sources.claude_home());
            match project {
                Some(p) => Box::new(locator.with_project(p)),
                None => Box::new(locator),
            }
        }
        SchemaFamily::Codex => Box::new(CodexLocator::new(sources.codex_home())),
    }
}
