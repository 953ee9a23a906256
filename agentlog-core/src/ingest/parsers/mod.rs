//! Agent-specific parsers
//!
//! Each supported agent has a module exposing a plain `parse` function from a
//! line reader to the shared [`ParseOutcome`](super::parser::ParseOutcome).
//!
//! ## Supported Agents
//!
//! | Agent | Module | Layout |
//! |-------|--------|--------|
//! | Claude Code | [`claude`] | `<root>/<encoded-project>/<session>.jsonl` |
//! | Codex | [`codex`] | `<root>/YYYY/MM/DD/rollout-*.jsonl` |

pub mod claude;
pub mod codex;
pub mod tools;

use super::parser::ParseOutcome;
use crate::discovery::extract_uuid_from_rollout;
use crate::error::{Error, Result};
use crate::types::{AgentKind, DiscoveredFile, CODEX_ID_PREFIX};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Parse a discovered log file with the grammar for its agent.
pub fn parse_file(file: &DiscoveredFile) -> Result<ParseOutcome> {
    let path = &file.path;
    let reader = BufReader::new(File::open(path).map_err(|e| Error::file(path, e))?);
    let stem = file_stem(path);

    let outcome = match file.agent {
        AgentKind::Claude => claude::parse(reader, &stem, file.project_hint.as_deref()),
        AgentKind::Codex => {
            let uuid = file_name(path).and_then(extract_uuid_from_rollout);
            codex::parse(reader, uuid.as_deref(), &stem)
        }
    }
    .map_err(|e| Error::file(path, e))?;

    if outcome.skipped_lines > 0 {
        tracing::debug!(
            path = %path.display(),
            skipped = outcome.skipped_lines,
            "Skipped malformed lines"
        );
    }

    Ok(outcome)
}

/// Session ID a file will produce, when it can be known without parsing.
///
/// Codex rollouts without a UUID in the name take their ID from the file
/// contents, so they return `None`.
pub fn session_id_hint(file: &DiscoveredFile) -> Option<String> {
    match file.agent {
        AgentKind::Claude => Some(file_stem(&file.path)),
        AgentKind::Codex => file_name(&file.path)
            .and_then(extract_uuid_from_rollout)
            .map(|uuid| format!("{}{}", CODEX_ID_PREFIX, uuid)),
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const UUID: &str = "019ab86e-1e83-75b0-b2d7-d335492e7026";

    #[test]
    fn test_session_id_hint() {
        let claude = DiscoveredFile {
            path: PathBuf::from("/root/-Users-me-code-app/abc-123.jsonl"),
            project_hint: Some("-Users-me-code-app".to_string()),
            agent: AgentKind::Claude,
        };
        assert_eq!(session_id_hint(&claude).as_deref(), Some("abc-123"));

        let codex = DiscoveredFile {
            path: PathBuf::from(format!("/root/2025/01/15/rollout-2025-01-15T10-00-00-{}.jsonl", UUID)),
            project_hint: None,
            agent: AgentKind::Codex,
        };
        assert_eq!(session_id_hint(&codex), Some(format!("codex:{}", UUID)));

        let unnamed = DiscoveredFile {
            path: PathBuf::from("/root/2025/01/15/odd.jsonl"),
            project_hint: None,
            agent: AgentKind::Codex,
        };
        assert_eq!(session_id_hint(&unnamed), None);
    }

    #[test]
    fn test_parse_file_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("rollout-2025-01-15T10-00-00-{}.jsonl", UUID));
        std::fs::write(
            &path,
            r#"{"type":"response_item","payload":{"type":"message","role":"user","content":[{"type":"input_text","text":"hi"}]}}
"#,
        )
        .unwrap();

        let outcome = parse_file(&DiscoveredFile {
            path: path.clone(),
            project_hint: None,
            agent: AgentKind::Codex,
        })
        .unwrap();
        assert_eq!(outcome.session.id, format!("codex:{}", UUID));
        assert_eq!(outcome.messages.len(), 1);
    }

    #[test]
    fn test_parse_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_file(&DiscoveredFile {
            path: dir.path().join("gone.jsonl"),
            project_hint: None,
            agent: AgentKind::Claude,
        })
        .unwrap_err();
        assert!(matches!(err, Error::File { .. }));
    }
}
