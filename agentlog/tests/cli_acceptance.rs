use agentlog_core::{AgentKind, Database};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const CODEX_UUID: &str = "019ab86e-1e83-75b0-b2d7-d335492e7026";

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        seed_codex_fixture(&home);
        seed_claude_fixture(&home);

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
        }
    }

    fn db_path(&self) -> PathBuf {
        self.xdg_data.join("agentlog/sessions.db")
    }
}

fn core_fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../agentlog-core/tests/fixtures")
        .join(name)
}

fn seed_codex_fixture(home: &Path) {
    let target = home
        .join(".codex/sessions/2025/11/25")
        .join(format!("rollout-2025-11-25T00-33-35-{}.jsonl", CODEX_UUID));

    fs::create_dir_all(target.parent().expect("missing fixture parent"))
        .expect("failed to create codex fixture directories");
    fs::copy(core_fixture("codex/minimal-session.jsonl"), target)
        .expect("failed to copy codex fixture");
}

fn seed_claude_fixture(home: &Path) {
    let target = home
        .join(".claude/projects/-Users-me-code-demo")
        .join("tool-session.jsonl");

    fs::create_dir_all(target.parent().expect("missing fixture parent"))
        .expect("failed to create claude fixture directories");
    fs::copy(core_fixture("claude-code/tool-session.jsonl"), target)
        .expect("failed to copy claude fixture");
}

fn run_sync(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("agentlog-sync"));

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute agentlog-sync: {e}"))
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
        "agentlog-sync {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

#[test]
fn sync_ingests_fixtures_and_populates_db() {
    let env = CliTestEnv::new();

    let output = run_sync(&env, &[]);
    assert_success(&[], &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Sync complete:"));
    assert!(
        stdout.contains("Sessions synced:  2"),
        "expected sync summary in stdout, got:\n{stdout}"
    );

    let db_path = env.db_path();
    assert!(
        db_path.exists(),
        "database file should exist at {}",
        db_path.display()
    );

    let db = Database::open(&db_path).expect("failed to open db");
    db.migrate().expect("failed to migrate db");
    assert_eq!(db.count_sessions().expect("failed to count sessions"), 2);

    let codex = db
        .get_session_full(&format!("codex:{}", CODEX_UUID))
        .expect("failed to read session")
        .expect("codex session missing");
    assert_eq!(codex.agent, AgentKind::Codex);
    assert_eq!(codex.message_count, 4);

    // A second run finds nothing to do
    let output = run_sync(&env, &[]);
    assert_success(&[], &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("Files unchanged:  2"),
        "expected unchanged files on rerun, got:\n{stdout}"
    );
}

#[test]
fn dry_run_reports_sources_without_syncing() {
    let env = CliTestEnv::new();

    let output = run_sync(&env, &["--dry-run"]);
    assert_success(&["--dry-run"], &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Discovered 2 session file(s):"));
    assert!(stdout.contains("Dry run - no sync performed"));

    let db = Database::open(&env.db_path()).expect("failed to open db");
    db.migrate().expect("failed to migrate db");
    assert_eq!(db.count_sessions().expect("failed to count sessions"), 0);
}

#[test]
fn single_session_resync_keeps_project_override() {
    let env = CliTestEnv::new();
    assert_success(&[], &run_sync(&env, &[]));

    {
        let db = Database::open(&env.db_path()).expect("failed to open db");
        assert!(db
            .update_session_project("tool-session", "custom_proj")
            .expect("failed to update project"));
    }

    let args = ["--session", "tool-session"];
    let output = run_sync(&env, &args);
    assert_success(&args, &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Project:  custom_proj"), "got:\n{stdout}");
}

#[test]
fn single_session_unknown_id_fails() {
    let env = CliTestEnv::new();

    let output = run_sync(&env, &["--session", "does-not-exist"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("session not found"),
        "expected not-found error, got:\n{stderr}"
    );
}
