//! Core domain types for agentlog
//!
//! These types are the normalized shape shared by both agent grammars.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Agent** | The coding-agent tool that wrote a log ([`AgentKind::Claude`], [`AgentKind::Codex`]) |
//! | **Session** | One continuous agent conversation, backed by exactly one source log file |
//! | **Ordinal** | Zero-based position of a message in its session's final, filtered sequence |
//! | **Tombstone** | A session stored with zero messages so its file is not reparsed every pass |
//! | **MCP server** | A tool provider namespaced in tool names as `mcp__<server>__<operation>` |
//! | **Rollout file** | A Codex session log, named `rollout-<timestamp>-<uuid>.jsonl` |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================
// Agents
// ============================================

/// Supported coding agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Claude,
    Codex,
}

impl AgentKind {
    /// Returns the display name for this agent
    pub fn display_name(&self) -> &'static str {
        match self {
            AgentKind::Claude => "Claude Code",
            AgentKind::Codex => "Codex",
        }
    }

    /// Returns the identifier used in database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Claude => "claude",
            AgentKind::Codex => "codex",
        }
    }

    /// Infer the agent from a session ID (`codex:` prefix or not).
    pub fn from_session_id(session_id: &str) -> Self {
        if session_id.starts_with(CODEX_ID_PREFIX) {
            AgentKind::Codex
        } else {
            AgentKind::Claude
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "claude" => Ok(AgentKind::Claude),
            "codex" => Ok(AgentKind::Codex),
            _ => Err(format!("unknown agent: {}", s)),
        }
    }
}

/// Prefix that namespaces Codex session IDs.
pub const CODEX_ID_PREFIX: &str = "codex:";

// ============================================
// Discovery
// ============================================

/// A candidate log file found by discovery. Produced fresh on every pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    /// Encoded project directory name (Claude only)
    pub project_hint: Option<String>,
    pub agent: AgentKind,
}

// ============================================
// Messages
// ============================================

/// Who authored a message after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            _ => Err(format!("unknown role: {}", s)),
        }
    }
}

/// A tool invocation made by the assistant.
///
/// `result_content_length` stays 0 until pairing finds a matching result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub category: String,
    pub input_json: String,
    pub result_content_length: usize,
    pub result_content: String,
}

/// Output of a tool, as it appears on the following user turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub id: String,
    pub content_length: usize,
    pub content: String,
}

impl ToolResult {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: id.into(),
            content_length: content.len(),
            content,
        }
    }
}

/// One normalized message.
///
/// `content` renders thinking and tool blocks as bracketed pseudo-markup
/// (`[Thinking]\n...`, `[Bash]\n$ ...`) so consumers can split it with a regex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedMessage {
    pub ordinal: usize,
    pub role: Role,
    pub content: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub has_thinking: bool,
    pub has_tool_use: bool,
    pub tool_calls: Vec<ToolCall>,
    pub tool_results: Vec<ToolResult>,
}

impl ParsedMessage {
    pub fn new(role: Role, content: impl Into<String>, timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            ordinal: 0,
            role,
            content: content.into(),
            timestamp,
            has_thinking: false,
            has_tool_use: false,
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
        }
    }

    /// Length of the rendered content in bytes.
    pub fn content_length(&self) -> usize {
        self.content.len()
    }
}

// ============================================
// Sessions
// ============================================

/// Token counters for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTotals {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cache_creation_tokens: i64,
    pub cache_read_tokens: i64,
}

impl TokenTotals {
    pub fn total(&self) -> i64 {
        self.input_tokens + self.output_tokens + self.cache_creation_tokens + self.cache_read_tokens
    }
}

impl std::ops::AddAssign for TokenTotals {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
        self.cache_creation_tokens += rhs.cache_creation_tokens;
        self.cache_read_tokens += rhs.cache_read_tokens;
    }
}

/// Session metadata derived from one parse of a log file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedSession {
    pub id: String,
    pub project: String,
    pub agent: AgentKind,
    pub first_message: String,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub message_count: usize,
    pub user_message_count: usize,
    pub parent_session_id: Option<String>,
    pub token_totals: TokenTotals,
    pub mcp_servers: Vec<String>,
}

/// Size and digest last recorded for a session's source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub size: u64,
    pub hash: String,
}

/// A session row as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub project: String,
    pub agent: AgentKind,
    pub first_message: String,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub message_count: usize,
    pub user_message_count: usize,
    pub parent_session_id: Option<String>,
    pub token_totals: TokenTotals,
    pub mcp_servers: Vec<String>,
    pub file_path: String,
    pub file_size: u64,
    pub file_mtime: Option<DateTime<Utc>>,
    pub file_hash: String,
}

impl Session {
    /// Build the stored row for a parsed session and the file it came from.
    pub fn from_parsed(
        parsed: ParsedSession,
        file_path: impl Into<String>,
        file_size: u64,
        file_mtime: Option<DateTime<Utc>>,
        file_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: parsed.id,
            project: parsed.project,
            agent: parsed.agent,
            first_message: parsed.first_message,
            started_at: parsed.started_at,
            ended_at: parsed.ended_at,
            message_count: parsed.message_count,
            user_message_count: parsed.user_message_count,
            parent_session_id: parsed.parent_session_id,
            token_totals: parsed.token_totals,
            mcp_servers: parsed.mcp_servers,
            file_path: file_path.into(),
            file_size,
            file_mtime,
            file_hash: file_hash.into(),
        }
    }

    /// A tombstone is a session whose file yielded no messages.
    pub fn is_tombstone(&self) -> bool {
        self.message_count == 0
    }
}
