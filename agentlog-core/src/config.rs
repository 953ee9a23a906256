//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/agentlog/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/agentlog/` (~/.config/agentlog/)
//! - Data: `$XDG_DATA_HOME/agentlog/` (~/.local/share/agentlog/)
//! - State/Logs: `$XDG_STATE_HOME/agentlog/` (~/.local/state/agentlog/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
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

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Where the agents write their session logs
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Database location override
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Root directories scanned by discovery.
///
/// A root that does not exist simply yields no files.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourcesConfig {
    /// Override for `~/.claude/projects`
    pub claude_projects_dir: Option<PathBuf>,
    /// Override for `~/.codex/sessions`
    pub codex_sessions_dir: Option<PathBuf>,
}

impl SourcesConfig {
    /// Sources rooted at explicit directories (used by tests and embedders).
    pub fn with_roots(claude: impl Into<PathBuf>, codex: impl Into<PathBuf>) -> Self {
        Self {
            claude_projects_dir: Some(claude.into()),
            codex_sessions_dir: Some(codex.into()),
        }
    }

    /// Claude Code projects root.
    pub fn claude_root(&self) -> PathBuf {
        self.claude_projects_dir
            .clone()
            .unwrap_or_else(|| home_dir().join(".claude").join("projects"))
    }

    /// Codex sessions root.
    pub fn codex_root(&self) -> PathBuf {
        self.codex_sessions_dir
            .clone()
            .unwrap_or_else(|| home_dir().join(".codex").join("sessions"))
    }
}

/// Database configuration
#[derive(Debug, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Explicit database file; defaults to [`Config::database_path`]
    pub path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
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

        if config.logging.max_files == 0 {
            return Err(Error::Config(
                "logging.max_files must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }

    /// Database file to open, honoring the `[database] path` override.
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(Self::database_path)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/agentlog/config.toml` (~/.config/agentlog/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("agentlog").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/agentlog/` (~/.local/share/agentlog/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("agentlog")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/agentlog/` (~/.local/state/agentlog/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("agentlog")
    }

    /// Returns the default database file path
    ///
    /// `$XDG_DATA_HOME/agentlog/sessions.db`
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("sessions.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.sources.claude_projects_dir.is_none());
        assert!(config.database.path.is_none());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.max_files, 5);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[sources]
claude_projects_dir = "/data/claude/projects"
codex_sessions_dir = "/data/codex/sessions"

[database]
path = "/tmp/agentlog.db"

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(
            config.sources.claude_root(),
            PathBuf::from("/data/claude/projects")
        );
        assert_eq!(
            config.sources.codex_root(),
            PathBuf::from("/data/codex/sessions")
        );
        assert_eq!(
            config.resolved_database_path(),
            PathBuf::from("/tmp/agentlog.db")
        );
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_default_roots() {
        let sources = SourcesConfig::default();
        assert!(sources.claude_root().ends_with(".claude/projects"));
        assert!(sources.codex_root().ends_with(".codex/sessions"));
    }

    #[test]
    fn test_load_from_rejects_zero_max_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[logging]\nmax_files = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = Config::load_from(Path::new("/nonexistent/agentlog.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
