//! Integration tests for the agentlog sync pipeline
//!
//! These tests lay out temporary Claude and Codex roots (seeded from
//! `tests/fixtures/`) and drive the full discover → detect → parse → store
//! flow through [`SyncEngine`].

use agentlog_core::ingest::identity::{get_project_name, needs_project_reparse};
use agentlog_core::ingest::parsers::parse_file;
use agentlog_core::{
    discovery, AgentKind, Database, Error, Role, SourcesConfig, SyncEngine,
};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const CODEX_UUID: &str = "019ab86e-1e83-75b0-b2d7-d335492e7026";
const CLAUDE_PROJECT: &str = "-Users-me-code-demo";

/// Get the path to a fixture file
fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

struct SyncEnv {
    temp: TempDir,
}

impl SyncEnv {
    fn new() -> Self {
        agentlog_core::logging::init_test();
        Self {
            temp: TempDir::new().unwrap(),
        }
    }

    fn claude_root(&self) -> PathBuf {
        self.temp.path().join("claude")
    }

    fn codex_root(&self) -> PathBuf {
        self.temp.path().join("codex")
    }

    fn sources(&self) -> SourcesConfig {
        SourcesConfig::with_roots(self.claude_root(), self.codex_root())
    }

    /// Engine over a fresh on-disk database in the temp dir.
    fn engine(&self) -> SyncEngine {
        let db = Database::open(&self.temp.path().join("db/sessions.db")).unwrap();
        db.migrate().unwrap();
        SyncEngine::new(db, self.sources())
    }

    fn write_claude(&self, session_id: &str, contents: &str) -> PathBuf {
        let dir = self.claude_root().join(CLAUDE_PROJECT);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("{}.jsonl", session_id));
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn seed_claude_fixture(&self) -> PathBuf {
        let contents =
            std::fs::read_to_string(fixture_path("claude-code/tool-session.jsonl")).unwrap();
        self.write_claude("tool-session", &contents)
    }

    fn seed_codex_fixture(&self) -> PathBuf {
        let dir = self.codex_root().join("2025/11/25");
        std::fs::create_dir_all(&dir).unwrap();
        let target = dir.join(format!("rollout-2025-11-25T00-33-35-{}.jsonl", CODEX_UUID));
        std::fs::copy(fixture_path("codex/minimal-session.jsonl"), &target).unwrap();
        target
    }
}

fn append(path: &Path, line: &str) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    writeln!(file, "{}", line).unwrap();
}

const USER_LINE: &str = r#"{"type":"user","sessionId":"s1","timestamp":"2025-01-15T10:00:00Z","message":{"role":"user","content":"Explain the build"}}"#;
const ASSISTANT_LINE: &str = r#"{"type":"assistant","sessionId":"s1","timestamp":"2025-01-15T10:00:05Z","message":{"id":"msg_1","role":"assistant","content":[{"type":"text","text":"It uses cargo."}]}}"#;
const FOLLOWUP_LINE: &str = r#"{"type":"user","sessionId":"s1","timestamp":"2025-01-15T10:01:00Z","message":{"role":"user","content":"Thanks"}}"#;

// ============================================
// Sync pass lifecycle
// ============================================

#[test]
fn test_sync_skip_and_resync_after_append() {
    let env = SyncEnv::new();
    let path = env.write_claude("s1", &format!("{}\n{}\n", USER_LINE, ASSISTANT_LINE));
    let engine = env.engine();

    let first = engine.sync_all();
    assert_eq!((first.synced, first.skipped), (1, 0));

    let second = engine.sync_all();
    assert_eq!((second.synced, second.skipped), (0, 1));

    append(&path, FOLLOWUP_LINE);
    let third = engine.sync_all();
    assert_eq!((third.synced, third.skipped), (1, 0));

    let session = engine.db().get_session_full("s1").unwrap().unwrap();
    assert_eq!(session.message_count, 3);
    assert_eq!(session.user_message_count, 2);
    assert_eq!(session.project, "demo");
    assert_eq!(session.first_message, "Explain the build");
}

#[test]
fn test_unchanged_file_skipped_by_fresh_engine() {
    let env = SyncEnv::new();
    env.write_claude("s1", &format!("{}\n{}\n", USER_LINE, ASSISTANT_LINE));

    assert_eq!(env.engine().sync_all().synced, 1);

    // A new engine has an empty stat cache and falls back to hashing
    let stats = env.engine().sync_all();
    assert_eq!((stats.synced, stats.skipped), (0, 1));
}

#[test]
fn test_same_size_rewrite_is_resynced() {
    let env = SyncEnv::new();
    let path = env.write_claude("s1", &format!("{}\n{}\n", USER_LINE, ASSISTANT_LINE));
    let engine = env.engine();
    engine.sync_all();

    let rewritten = format!("{}\n{}\n", USER_LINE, ASSISTANT_LINE).replace("cargo.", "make!.");
    assert_eq!(
        rewritten.len() as u64,
        std::fs::metadata(&path).unwrap().len()
    );
    std::fs::write(&path, rewritten).unwrap();

    // Fresh engine so the stat cache cannot mask the change
    let engine = SyncEngine::new(
        Database::open(&env.temp.path().join("db/sessions.db")).unwrap(),
        env.sources(),
    );
    assert_eq!(engine.sync_all().synced, 1);
    let messages = engine.db().get_session_messages("s1").unwrap();
    assert_eq!(messages[1].content, "It uses make!.");
}

#[test]
fn test_empty_file_becomes_tombstone() {
    let env = SyncEnv::new();
    env.write_claude("empty", "{\"type\":\"summary\",\"summary\":\"nothing\"}\n");
    let engine = env.engine();

    assert_eq!(engine.sync_all().synced, 1);
    let session = engine.db().get_session_full("empty").unwrap().unwrap();
    assert!(session.is_tombstone());
    assert!(!session.file_hash.is_empty());

    // Stored tombstone suppresses reparsing
    assert_eq!(engine.sync_all().skipped, 1);
}

#[test]
fn test_unreadable_lines_do_not_fail_the_pass() {
    let env = SyncEnv::new();
    env.write_claude(
        "s1",
        &format!("{}\nnot json at all\n{}\n{{\"type\":", USER_LINE, ASSISTANT_LINE),
    );
    let engine = env.engine();

    let stats = engine.sync_all();
    assert_eq!(stats.synced, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(engine.db().get_session_messages("s1").unwrap().len(), 2);
}

#[test]
fn test_progress_counts_match_stats() {
    let env = SyncEnv::new();
    env.seed_claude_fixture();
    env.seed_codex_fixture();
    let engine = env.engine();

    let mut last = None;
    let stats = engine.sync_all_with_progress(|p, _| last = Some(*p));
    let last = last.unwrap();

    assert_eq!(last.files_total, 2);
    assert_eq!(last.files_scanned, 2);
    assert_eq!(last.sessions_synced, stats.synced);
    assert_eq!(stats.synced, 2);
}

// ============================================
// Project overrides
// ============================================

#[test]
fn test_project_override_survives_single_session_sync() {
    let env = SyncEnv::new();
    env.write_claude("s1", &format!("{}\n{}\n", USER_LINE, ASSISTANT_LINE));
    let engine = env.engine();
    engine.sync_all();

    assert!(engine
        .db()
        .update_session_project("s1", "custom_proj")
        .unwrap());

    let session = engine.sync_single_session("s1").unwrap();
    assert_eq!(session.project, "custom_proj");
    assert_eq!(
        engine.db().get_session_full("s1").unwrap().unwrap().project,
        "custom_proj"
    );
}

#[test]
fn test_bad_stored_project_is_rederived() {
    let env = SyncEnv::new();
    env.write_claude("s1", &format!("{}\n{}\n", USER_LINE, ASSISTANT_LINE));
    let engine = env.engine();
    engine.sync_all();

    engine
        .db()
        .update_session_project("s1", "_Users_me_code_demo")
        .unwrap();
    engine.sync_single_session("s1").unwrap();

    assert_eq!(
        engine.db().get_session_full("s1").unwrap().unwrap().project,
        "demo"
    );
}

#[test]
fn test_single_session_sync_unknown_id() {
    let env = SyncEnv::new();
    let engine = env.engine();

    for id in ["missing", "../../etc/passwd", "codex:not-a-uuid", ""] {
        let err = engine.sync_single_session(id).unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(_)), "id {:?}", id);
    }
}

// ============================================
// Fixture content
// ============================================

#[test]
fn test_claude_fixture_end_to_end() {
    let env = SyncEnv::new();
    env.seed_claude_fixture();
    let engine = env.engine();
    engine.sync_all();

    let session = engine.db().get_session_full("tool-session").unwrap().unwrap();
    assert_eq!(session.agent, AgentKind::Claude);
    assert_eq!(session.project, "demo");
    assert_eq!(session.message_count, 6);
    assert_eq!(session.user_message_count, 1);
    assert_eq!(session.first_message, "Count the Rust files in src");
    assert_eq!(session.parent_session_id, None);
    assert_eq!(session.mcp_servers, vec!["github"]);

    // msg_01 streamed twice: only its last usage counts
    assert_eq!(session.token_totals.input_tokens, 125);
    assert_eq!(session.token_totals.output_tokens, 68);
    assert_eq!(session.token_totals.cache_creation_tokens, 10);
    assert_eq!(session.token_totals.cache_read_tokens, 200);

    let messages = engine.db().get_session_messages("tool-session").unwrap();
    let ordinals: Vec<usize> = messages.iter().map(|m| m.ordinal).collect();
    assert_eq!(ordinals, (0..6).collect::<Vec<_>>());
    assert_eq!(messages[0].role, Role::System);

    let glob = &messages[3];
    assert_eq!(glob.content, "[Glob: src/**/*.rs]");
    assert_eq!(glob.tool_calls[0].result_content_length, 22);

    let mcp = &messages[4];
    assert_eq!(mcp.tool_calls[0].category, "github");
    assert_eq!(mcp.tool_calls[0].result_content_length, 0);
}

#[test]
fn test_codex_fixture_end_to_end() {
    let env = SyncEnv::new();
    env.seed_codex_fixture();
    let engine = env.engine();

    let stats = engine.sync_all();
    assert_eq!(stats.synced, 1);

    let id = format!("codex:{}", CODEX_UUID);
    let session = engine.db().get_session_full(&id).unwrap().unwrap();
    assert_eq!(session.agent, AgentKind::Codex);
    assert_eq!(session.project, "widget");
    assert_eq!(session.message_count, 4);
    assert_eq!(session.user_message_count, 1);
    assert_eq!(session.first_message, "What does main.rs print?");
    assert_eq!(session.token_totals.input_tokens, 3200);
    assert_eq!(session.token_totals.cache_read_tokens, 2000);
    assert_eq!(session.token_totals.output_tokens, 180);

    let messages = engine.db().get_session_messages(&id).unwrap();
    let shell = &messages[2];
    assert_eq!(shell.role, Role::Assistant);
    assert!(shell.has_thinking);
    assert!(shell.content.ends_with("[Bash]\n$ cat src/main.rs"));
    assert_eq!(shell.tool_calls[0].result_content_length, 30);

    // Resync by bare UUID resolves the same session
    let resynced = engine.sync_single_session(CODEX_UUID).unwrap();
    assert_eq!(resynced.id, id);
}

#[test]
fn test_reparse_is_deterministic() {
    let env = SyncEnv::new();
    let claude = env.seed_claude_fixture();
    let codex = env.seed_codex_fixture();

    for path in [claude, codex] {
        let file = discovery::discover_all(&env.sources())
            .into_iter()
            .find(|f| f.path == path)
            .unwrap();
        assert_eq!(parse_file(&file).unwrap(), parse_file(&file).unwrap());
    }
}

#[test]
fn test_token_usage_last_snapshot_wins() {
    let env = SyncEnv::new();
    let first = r#"{"type":"assistant","message":{"id":"msg_x","content":[{"type":"text","text":"partial"}],"usage":{"input_tokens":50,"output_tokens":0,"cache_creation_input_tokens":5,"cache_read_input_tokens":100}}}"#;
    let second = r#"{"type":"assistant","message":{"id":"msg_x","content":[{"type":"text","text":"complete"}],"usage":{"input_tokens":100,"output_tokens":50,"cache_creation_input_tokens":10,"cache_read_input_tokens":200}}}"#;
    env.write_claude("usage", &format!("{}\n{}\n", first, second));
    let engine = env.engine();
    engine.sync_all();

    let totals = engine
        .db()
        .get_session_full("usage")
        .unwrap()
        .unwrap()
        .token_totals;
    assert_eq!(totals.input_tokens, 100);
    assert_eq!(totals.output_tokens, 50);
    assert_eq!(totals.cache_creation_tokens, 10);
    assert_eq!(totals.cache_read_tokens, 200);
}

// ============================================
// Identity and discovery
// ============================================

#[test]
fn test_project_name_heuristics() {
    assert_eq!(get_project_name("-Users-me-code-my-app"), "my_app");
    assert_eq!(get_project_name("-Users-me-Code-my-app"), "my_app");
    assert!(needs_project_reparse("_Users_me_bad"));
    assert!(!needs_project_reparse("my_app"));
}

#[test]
fn test_rollout_uuid_extraction() {
    let name = format!("rollout-20240115-{}.jsonl", CODEX_UUID);
    assert_eq!(
        discovery::extract_uuid_from_rollout(&name).as_deref(),
        Some(CODEX_UUID)
    );

    let suffixed = format!("rollout-20240115-{}-suffix.jsonl", CODEX_UUID);
    assert_eq!(discovery::extract_uuid_from_rollout(&suffixed), None);
}

#[test]
fn test_agent_files_not_synced() {
    let env = SyncEnv::new();
    env.write_claude("s1", &format!("{}\n", USER_LINE));
    env.write_claude("agent-1234", &format!("{}\n", USER_LINE));
    let engine = env.engine();

    assert_eq!(engine.sync_all().synced, 1);
    assert!(engine.db().get_session_full("agent-1234").unwrap().is_none());
    assert_eq!(engine.db().count_sessions().unwrap(), 1);
}
