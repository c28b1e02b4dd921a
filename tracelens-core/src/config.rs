//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/tracelens/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/tracelens/` (~/.config/tracelens/)
//! - State/Logs: `$XDG_STATE_HOME/tracelens/` (~/.local/state/tracelens/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
pub fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Transcript root overrides
    #[serde(default)]
    pub sources: SourceOverrides,

    /// Event rendering and ordering
    #[serde(default)]
    pub timeline: TimelineConfig,

    /// Hook log merging
    #[serde(default)]
    pub hooks: HooksConfig,

    /// Digest section limits
    #[serde(default)]
    pub digest: DigestConfig,

    /// Per-million-token prices for the cost estimate
    #[serde(default)]
    pub pricing: PricingConfig,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

/// Override paths for transcript roots
#[derive(Debug, Deserialize, Default, Clone)]
pub struct SourceOverrides {
    /// Override for `~/.claude`
    pub claude_home: Option<PathBuf>,
    /// Override for `~/.codex`
    pub codex_home: Option<PathBuf>,
}

impl SourceOverrides {
    pub fn claude_home(&self) -> PathBuf {
        self.claude_home
            .clone()
            .unwrap_or_else(|| home_dir().join(".claude"))
    }

    pub fn codex_home(&self) -> PathBuf {
        self.codex_home
            .clone()
            .unwrap_or_else(|| home_dir().join(".codex"))
    }
}

/// Where events without a timestamp land in the timeline.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MissingTimestamps {
    /// Sort before every timestamped event
    #[default]
    Earliest,
    /// Drop from the timeline (agents keep them in their traces)
    Exclude,
}

/// Event rendering and ordering configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TimelineConfig {
    /// Cap for event detail text; 0 means unbounded
    #[serde(default)]
    pub max_detail_chars: usize,

    /// Bound for single-line summaries
    #[serde(default = "default_summary_chars")]
    pub summary_chars: usize,

    #[serde(default)]
    pub missing_timestamps: MissingTimestamps,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            max_detail_chars: 0,
            summary_chars: default_summary_chars(),
            missing_timestamps: MissingTimestamps::default(),
        }
    }
}

fn default_summary_chars() -> usize {
    120
}

/// Widest accepted hook correlation window: one year.
pub const MAX_WINDOW_HOURS: i64 = 24 * 366;

/// Hook log merging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HooksConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Symmetric window around the session start, in hours
    #[serde(default = "default_window_hours")]
    pub window_hours: i64,

    /// Directories searched after the parser's own candidates
    #[serde(default)]
    pub extra_dirs: Vec<PathBuf>,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_hours: default_window_hours(),
            extra_dirs: vec![],
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_window_hours() -> i64 {
    24
}

/// Digest section limits
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DigestConfig {
    pub max_prompts: usize,
    pub prompt_chars: usize,
    pub thinking_blocks: usize,
    pub thinking_chars: usize,
    pub max_commands: usize,
    pub max_files: usize,
    pub max_errors: usize,
    pub tail_chars: usize,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            max_prompts: 10,
            prompt_chars: 300,
            thinking_blocks: 5,
            thinking_chars: 400,
            max_commands: 15,
            max_files: 15,
            max_errors: 5,
            tail_chars: 500,
        }
    }
}

/// Per-million-token prices in USD
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PricingConfig {
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
    pub cache_read_per_mtok: f64,
    pub cache_write_per_mtok: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            input_per_mtok: 15.0,
            output_per_mtok: 75.0,
            cache_read_per_mtok: 1.50,
            cache_write_per_mtok: 18.75,
        }
    }
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the pipeline misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.timeline.summary_chars < 4 {
            return Err(Error::Config(
                "timeline.summary_chars must be at least 4".to_string(),
            ));
        }
        if !(0..=MAX_WINDOW_HOURS).contains(&self.hooks.window_hours) {
            return Err(Error::Config(format!(
                "hooks.window_hours must be between 0 and {}",
                MAX_WINDOW_HOURS
            )));
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/tracelens/config.toml` (~/.config/tracelens/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("tracelens").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/tracelens/` (~/.local/state/tracelens/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("tracelens")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/tracelens/tracelens.log` (~/.local/state/tracelens/tracelens.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("tracelens.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
