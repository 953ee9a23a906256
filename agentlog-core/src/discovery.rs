//! Source file discovery for both agents.
//!
//! ## Layouts
//!
//! ```text
//! Claude Code                          Codex
//! <root>/                              <root>/
//! └── -Users-me-code-app/              └── 2025/
//!     ├── <session-uuid>.jsonl             └── 01/
//!     └── agent-<id>.jsonl  (skipped)          └── 15/
//!                                                  └── rollout-<ts>-<uuid>.jsonl
//! ```
//!
//! A missing root is not an error: it yields an empty list so that an agent
//! the user never installed does not break sync.

use crate::config::SourcesConfig;
use crate::types::{AgentKind, DiscoveredFile, CODEX_ID_PREFIX};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

static ROLLOUT_UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^rollout-.+-([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})\.jsonl$",
    )
    .expect("rollout pattern is valid")
});

static UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
    )
    .expect("uuid pattern is valid")
});

/// Discover files for both agents, Claude first.
pub fn discover_all(sources: &SourcesConfig) -> Vec<DiscoveredFile> {
    let mut files = discover_claude_projects(&sources.claude_root());
    files.extend(discover_codex_sessions(&sources.codex_root()));
    files
}

/// Enumerate `<root>/<project>/*.jsonl`, skipping `agent-*` transcripts.
pub fn discover_claude_projects(root: &Path) -> Vec<DiscoveredFile> {
    if !root.is_dir() {
        tracing::debug!(root = %root.display(), "Claude projects root missing, skipping");
        return Vec::new();
    }

    // Escape the root so bracket characters in it are taken literally.
    let escaped_root = PathBuf::from(glob::Pattern::escape(&root.to_string_lossy()));
    let pattern = escaped_root
        .join("*")
        .join("*.jsonl")
        .to_string_lossy()
        .into_owned();

    let entries = match glob::glob(&pattern) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(pattern = %pattern, error = %e, "Invalid glob pattern");
            return Vec::new();
        }
    };

    let mut files: Vec<DiscoveredFile> = entries
        .flatten()
        .filter(|path| path.is_file() && !is_agent_file(path))
        .map(|path| {
            let project_hint = path
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .map(str::to_string);
            DiscoveredFile {
                path,
                project_hint,
                agent: AgentKind::Claude,
            }
        })
        .collect();

    files.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!(root = %root.display(), count = files.len(), "Discovered Claude sessions");
    files
}

/// Enumerate `<root>/YYYY/MM/DD/*.jsonl`.
///
/// Directory names that are not all digits are skipped at every level.
pub fn discover_codex_sessions(root: &Path) -> Vec<DiscoveredFile> {
    let mut files = Vec::new();
    for day in codex_day_dirs(root) {
        for path in jsonl_files(&day) {
            files.push(DiscoveredFile {
                path,
                project_hint: None,
                agent: AgentKind::Codex,
            });
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!(root = %root.display(), count = files.len(), "Discovered Codex sessions");
    files
}

/// Resolve a session ID to its source file, dispatching on the ID's agent.
///
/// A bare UUID that matches no Claude session is also tried as a Codex
/// rollout UUID.
pub fn find_source_file(sources: &SourcesConfig, session_id: &str) -> Option<DiscoveredFile> {
    let codex = || {
        find_codex_source_file(&sources.codex_root(), session_id).map(|path| DiscoveredFile {
            path,
            project_hint: None,
            agent: AgentKind::Codex,
        })
    };

    match AgentKind::from_session_id(session_id) {
        AgentKind::Claude => match find_claude_source_file(&sources.claude_root(), session_id) {
            Some(path) => {
                let project_hint = path
                    .parent()
                    .and_then(|p| p.file_name())
                    .and_then(|n| n.to_str())
                    .map(str::to_string);
                Some(DiscoveredFile {
                    path,
                    project_hint,
                    agent: AgentKind::Claude,
                })
            }
            None if UUID.is_match(session_id) => codex(),
            None => None,
        },
        AgentKind::Codex => codex(),
    }
}

/// Find `<root>/<any project>/<session_id>.jsonl`.
///
/// IDs outside `[A-Za-z0-9_-]` are rejected before any path is built.
pub fn find_claude_source_file(root: &Path, session_id: &str) -> Option<PathBuf> {
    if !is_valid_session_id(session_id) {
        tracing::warn!(session_id = %session_id, "Rejected invalid session ID");
        return None;
    }

    let file_name = format!("{}.jsonl", session_id);
    sorted_dirs(root)
        .into_iter()
        .map(|project| project.join(&file_name))
        .find(|candidate| candidate.is_file())
}

/// Find the rollout file whose UUID matches `session_id` (`codex:<uuid>` or `<uuid>`).
///
/// Stops at the first match.
pub fn find_codex_source_file(root: &Path, session_id: &str) -> Option<PathBuf> {
    let uuid = session_id
        .strip_prefix(CODEX_ID_PREFIX)
        .unwrap_or(session_id);
    if !UUID.is_match(uuid) {
        tracing::warn!(session_id = %session_id, "Rejected invalid Codex session ID");
        return None;
    }

    for day in codex_day_dirs(root) {
        for path in jsonl_files(&day) {
            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(extract_uuid_from_rollout)
                .is_some_and(|found| found.eq_ignore_ascii_case(uuid));
            if matches {
                return Some(path);
            }
        }
    }
    None
}

/// Extract the trailing UUID from `rollout-<anything>-<uuid>.jsonl`.
///
/// The UUID must be the last thing before `.jsonl`; a trailing `-extra` fails.
pub fn extract_uuid_from_rollout(file_name: &str) -> Option<String> {
    ROLLOUT_UUID
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Allow-list check for IDs used in path construction.
pub fn is_valid_session_id(session_id: &str) -> bool {
    !session_id.is_empty()
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Check if a file is a sub-agent transcript (`agent-*.jsonl`).
pub fn is_agent_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.starts_with("agent-"))
        .unwrap_or(false)
}

fn codex_day_dirs(root: &Path) -> Vec<PathBuf> {
    let mut days = Vec::new();
    for year in numeric_dirs(root) {
        for month in numeric_dirs(&year) {
            days.extend(numeric_dirs(&month));
        }
    }
    days
}

fn numeric_dirs(dir: &Path) -> Vec<PathBuf> {
    sorted_dirs(dir)
        .into_iter()
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        })
        .collect()
}

fn sorted_dirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs
}

fn jsonl_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "jsonl"))
        .collect();
    files.sort();
    files
}
