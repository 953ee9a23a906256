//! Project naming for sessions.
//!
//! Claude encodes a project's absolute path as a directory name by replacing
//! separators with `-` (`/Users/me/code/my-app` becomes
//! `-Users-me-code-my-app`). The encoding is lossy, so the decoding here is a
//! heuristic table rather than a grammar.

/// Directory names after which the remaining path is taken as the project.
const PROJECT_MARKERS: &[&str] = &["code", "projects", "src", "work", "dev", "repos", "workspace"];

/// Segments that never name a project on their own.
const SYSTEM_DIRS: &[&str] = &["users", "home", "var", "tmp", "private"];

/// Stored names with these prefixes came from an older, naive decoding.
const REPARSE_PREFIXES: &[&str] = &["_Users", "_home", "_private", "_tmp", "_var"];
const REPARSE_FRAGMENTS: &[&str] = &["_var_folders_", "_var_tmp_"];

/// Derive a display project name from an encoded project directory name.
///
/// ```
/// use agentlog_core::ingest::identity::get_project_name;
///
/// assert_eq!(get_project_name("-Users-me-code-my-app"), "my_app");
/// assert_eq!(get_project_name("-home-alice-Code-tool"), "tool");
/// ```
pub fn get_project_name(encoded: &str) -> String {
    let segments: Vec<&str> = encoded.split('-').collect();

    let after_marker = segments
        .iter()
        .position(|s| {
            PROJECT_MARKERS
                .iter()
                .any(|marker| s.eq_ignore_ascii_case(marker))
        })
        .map(|idx| segments[idx + 1..].join("-"))
        .map(|rest| rest.trim_matches('-').to_string())
        .filter(|rest| !rest.is_empty());

    let name = after_marker
        .or_else(|| {
            segments
                .iter()
                .rev()
                .find(|s| !s.is_empty() && !is_system_dir(s))
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| encoded.to_string());

    normalize(&name)
}

/// Derive a project name from a working directory path (Codex `cwd`).
pub fn codex_project_name(cwd: &str) -> String {
    cwd.split(['/', '\\'])
        .rev()
        .find(|s| !s.is_empty())
        .map(normalize)
        .unwrap_or_default()
}

/// Whether a stored project name looks like a raw path that should be
/// re-derived rather than preserved.
pub fn needs_project_reparse(project: &str) -> bool {
    REPARSE_PREFIXES.iter().any(|p| project.starts_with(p))
        || REPARSE_FRAGMENTS.iter().any(|f| project.contains(f))
}

/// Choose between the stored and freshly derived project names.
///
/// A non-empty stored name wins unless it needs reparsing; this is what keeps
/// manual overrides alive across resyncs.
pub fn resolve_project(stored: Option<&str>, derived: &str) -> String {
    match stored {
        Some(stored) if !stored.is_empty() && !needs_project_reparse(stored) => stored.to_string(),
        _ => derived.to_string(),
    }
}

fn is_system_dir(segment: &str) -> bool {
    SYSTEM_DIRS.iter().any(|d| segment.eq_ignore_ascii_case(d))
}

fn normalize(name: &str) -> String {
    name.replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_after_marker() {
        assert_eq!(get_project_name("-Users-me-code-my-app"), "my_app");
        assert_eq!(get_project_name("-Users-me-Code-my-app"), "my_app");
        assert_eq!(get_project_name("-home-alice-projects-api"), "api");
        assert_eq!(get_project_name("-Users-bob-src-github-thing"), "github_thing");
    }

    #[test]
    fn test_first_marker_wins() {
        assert_eq!(get_project_name("-Users-me-code-dev-tools"), "dev_tools");
    }

    #[test]
    fn test_project_without_marker() {
        assert_eq!(get_project_name("-Users-me-notes"), "notes");
        assert_eq!(get_project_name("-tmp-scratch"), "scratch");
    }

    #[test]
    fn test_marker_at_end_falls_back() {
        // Nothing after the marker; last non-system segment is the marker itself
        assert_eq!(get_project_name("-Users-me-code"), "code");
    }

    #[test]
    fn test_only_system_segments() {
        assert_eq!(get_project_name("-Users"), "_Users");
        assert_eq!(get_project_name(""), "");
    }

    #[test]
    fn test_codex_project_name() {
        assert_eq!(codex_project_name("/Users/me/code/my-app"), "my_app");
        assert_eq!(codex_project_name("/srv/repo/"), "repo");
        assert_eq!(codex_project_name(""), "");
    }

    #[test]
    fn test_needs_project_reparse() {
        assert!(needs_project_reparse("_Users_me_bad"));
        assert!(needs_project_reparse("_home_alice_thing"));
        assert!(needs_project_reparse("x_var_folders_ab"));
        assert!(!needs_project_reparse("my_app"));
        assert!(!needs_project_reparse("custom_proj"));
    }

    #[test]
    fn test_resolve_project() {
        assert_eq!(resolve_project(Some("custom_proj"), "my_app"), "custom_proj");
        assert_eq!(resolve_project(Some("_Users_me_bad"), "my_app"), "my_app");
        assert_eq!(resolve_project(Some(""), "my_app"), "my_app");
        assert_eq!(resolve_project(None, "my_app"), "my_app");
    }
}
