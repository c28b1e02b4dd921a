use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const CLAUDE_SESSION: &str = "5e55107d-7a3c-4b1e-9f00-00000000c0de";
const CLAUDE_PROJECT: &str = "/work/tracelens-fixture";
const CODEX_ROLLOUT: &str =
    "rollout-2025-11-24T19-33-35-019ab86e-1e83-75b0-b2d7-d335492e7026.jsonl";

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        seed_claude_fixture(&home);
        seed_codex_fixture(&home);

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_config,
            xdg_state,
        }
    }
}

fn fixture_dir(family: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../tracelens-core/tests/fixtures")
        .join(family)
}

fn copy_fixture(source: &Path, target: &Path) {
    fs::create_dir_all(target.parent().expect("missing fixture parent"))
        .expect("failed to create fixture directories");
    fs::copy(source, target).expect("failed to copy fixture");
}

fn seed_claude_fixture(home: &Path) {
    let source = fixture_dir("claude-code");
    let project = home.join(".claude/projects/-work-tracelens-fixture");
    for name in [
        format!("{}.jsonl", CLAUDE_SESSION),
        "agent-a1b2c3.jsonl".to_string(),
        "agent-warmup.jsonl".to_string(),
    ] {
        copy_fixture(&source.join(&name), &project.join(&name));
    }

    let hooks = fixture_dir("hooks");
    let log_dir = home.join(".claude/.claude-logs");
    for name in ["20251231_113235.log", "20251231_113235-agents.log"] {
        copy_fixture(&hooks.join(name), &log_dir.join(name));
    }
}

fn seed_codex_fixture(home: &Path) {
    copy_fixture(
        &fixture_dir("codex").join(CODEX_ROLLOUT),
        &home.join(".codex/sessions/2025/11/24").join(CODEX_ROLLOUT),
    );
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("tracelens"));

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute tracelens: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "tracelens {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

fn run_ok(env: &CliTestEnv, args: &[&str]) -> (String, String) {
    let output = run_bin(env, args);
    assert_success(args, &output);
    (
        String::from_utf8_lossy(&output.stdout).into_owned(),
        String::from_utf8_lossy(&output.stderr).into_owned(),
    )
}

#[test]
fn digest_for_latest_claude_session() {
    let env = CliTestEnv::new();
    let args = ["--latest", "--project", CLAUDE_PROJECT, "--format", "digest"];

    let (stdout, stderr) = run_ok(&env, &args);

    assert!(stderr.contains(&format!("Analyzing session: {}.jsonl", CLAUDE_SESSION)));
    assert!(stderr.contains("Found 2 agent file(s)"));
    assert!(stderr.contains("Integrated 5 hook events"));

    assert!(stdout.starts_with("# Session Digest: 5e55107d"));
    assert!(stdout.contains("**Project:** /work/tracelens-fixture"));
    assert!(stdout.contains("Add retry logic to the HTTP client"));
    assert!(stdout.contains("- `cargo test -p client`"));
    assert!(stdout.contains("- **Bash**: Error: exit 101"));
}

#[test]
fn json_output_by_id_prefix() {
    let env = CliTestEnv::new();
    let args = ["5e55", "--project", CLAUDE_PROJECT, "--format", "json"];

    let (stdout, _) = run_ok(&env, &args);
    let session: serde_json::Value =
        serde_json::from_str(&stdout).expect("stdout should be a JSON session");

    assert_eq!(session["id"], CLAUDE_SESSION);
    assert_eq!(session["family"], "claude");
    assert_eq!(session["stats"]["skipped_warmup"], 1);
    assert_eq!(session["stats"]["hook_events"], 5);
    assert_eq!(session["agents"].as_array().map(Vec::len), Some(2));
    assert_eq!(session["timeline"][0]["event_type"], "SessionStart");
}

#[test]
fn no_hooks_and_out_file() {
    let env = CliTestEnv::new();
    let out_file = env.home.join("session.json");
    let out = out_file.to_string_lossy().into_owned();
    let args = [
        "--latest",
        "--project",
        CLAUDE_PROJECT,
        "--no-hooks",
        "--out-file",
        out.as_str(),
    ];

    let (stdout, stderr) = run_ok(&env, &args);

    assert!(stdout.trim().is_empty());
    assert!(stderr.contains("Written to"));
    let written = fs::read_to_string(&out_file).expect("output file should exist");
    let session: serde_json::Value = serde_json::from_str(&written).expect("valid JSON");
    assert_eq!(session["stats"]["hook_events"], 0);
    assert_eq!(session["hook_logs"].as_array().map(Vec::len), Some(0));
}

#[test]
fn list_shows_claude_sessions() {
    let env = CliTestEnv::new();
    let args = ["--list", "--project", CLAUDE_PROJECT];

    let (stdout, _) = run_ok(&env, &["--list", "--project", CLAUDE_PROJECT, "--format", "digest"]);
    assert!(stdout.starts_with("ID "));
    assert!(stdout.contains("5e55107d"));
    assert!(stdout.contains("HTTP client retry logic"));

    let (json, _) = run_ok(&env, &args);
    let rows: serde_json::Value = serde_json::from_str(&json).expect("list should be JSON");
    let rows = rows.as_array().expect("list should be an array");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], CLAUDE_SESSION);
    assert_eq!(rows[0]["project_path"], CLAUDE_PROJECT);
}

#[test]
fn stats_and_payload_formats() {
    let env = CliTestEnv::new();

    let (stats, _) = run_ok(
        &env,
        &["--latest", "--project", CLAUDE_PROJECT, "--format", "stats"],
    );
    assert!(stats.contains("Session: 5e55107d"));
    assert!(stats.contains("Model: claude-opus-4-1"));
    assert!(stats.contains("API Requests: 5"));
    assert!(stats.contains("  Input: 2,600"));
    assert!(stats.contains("Skipped warmup agents: 1"));

    let (payload, _) = run_ok(
        &env,
        &["--latest", "--project", CLAUDE_PROJECT, "--format", "payload"],
    );
    assert!(payload.contains("Files sent to cloud (1):"));
    assert!(payload.contains("User prompts (2):"));
    assert!(payload.contains("Total content: 465 chars"));
}

#[test]
fn codex_source_builds_latest_rollout() {
    let env = CliTestEnv::new();
    let args = ["--source", "codex", "--format", "digest"];

    let (stdout, stderr) = run_ok(&env, &args);

    assert!(stderr.contains(&format!("Analyzing session: {}", CODEX_ROLLOUT)));
    assert!(stdout.starts_with("# Session Digest: 019ab86e"));
    assert!(stdout.contains("Fix the flaky date parsing test"));
    assert!(stdout.contains("- src/dates.rs (apply_patch)"));
}

#[test]
fn unknown_session_fails() {
    let env = CliTestEnv::new();
    let output = run_bin(&env, &["no-such-session", "--project", CLAUDE_PROJECT]);

    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to locate session"));
    assert!(stderr.contains("no-such-session"));
}

#[test]
fn missing_codex_home_fails() {
    let env = CliTestEnv::new();
    let empty = env.home.join("empty-codex");
    let empty = empty.to_string_lossy().into_owned();

    let output = run_bin(&env, &["--source", "codex", "--codex-home", empty.as_str()]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no session files found"));
}
