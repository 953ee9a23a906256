//! Claude Code JSONL parser
//!
//! Parses session logs from `~/.claude/projects/[encoded-path]/*.jsonl`.
//!
//! # Record handling
//!
//! - **`user` records**: plain text or a block array of `text` and
//!   `tool_result` blocks. A record with no text and no tool results is
//!   dropped. Injected content (slash-command echoes, reminders, compaction
//!   summaries) is classified as [`Role::System`].
//!
//! - **`assistant` records**: `text`, `thinking` and `tool_use` blocks rendered
//!   into one canonical text. Usage is recorded per `message.id`; Claude
//!   rewrites the same message while streaming, so only the last snapshot
//!   counts.
//!
//! - **Everything else** (`summary`, `system`, `file-history-snapshot`,
//!   sidechain records) is ignored.

use crate::ingest::identity::get_project_name;
use crate::ingest::parser::{finalize, for_each_record, parse_timestamp, ParseOutcome, UsageLedger};
use crate::ingest::parsers::tools::{categorize, render_tool_use, result_text};
use crate::types::{
    AgentKind, ParsedMessage, ParsedSession, Role, TokenTotals, ToolCall, ToolResult,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::io::{self, BufRead};

/// Prefix of the first prompt in a session started from an approved plan.
const PLAN_PREFIX: &str = "Implement the following plan:";

/// Transcript reference inside a plan-implementation prompt.
static TRANSCRIPT_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z0-9_-]+)\.jsonl").expect("valid regex"));

/// Content prefixes that mark a user record as injected by the tool.
const SYSTEM_PREFIXES: &[&str] = &[
    "This session is being continued from a previous conversation",
    "[Request interrupted by user",
    "<command-name>",
    "<command-message>",
    "<command-args>",
    "<local-command-stdout>",
    "<local-command-stderr>",
    "<local-command-caveat>",
    "<task-notification>",
    "<system-reminder>",
    "Stop hook feedback:",
    "Caveat: The messages below were generated by the user while running local commands",
];

/// Check if user content was injected by Claude Code rather than typed.
fn is_system_content(text: &str) -> bool {
    let trimmed = text.trim_start();
    SYSTEM_PREFIXES.iter().any(|p| trimmed.starts_with(p))
}

// ============================================
// Raw JSONL record types (serde deserialization)
// ============================================

/// Represents a single line from Claude Code JSONL.
///
/// Uses `#[serde(default)]` liberally to handle missing fields gracefully.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawRecord {
    #[serde(rename = "type")]
    record_type: Option<String>,
    session_id: Option<String>,
    timestamp: Option<String>,
    is_sidechain: Option<bool>,
    is_meta: Option<bool>,
    is_compact_summary: Option<bool>,
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawMessage {
    id: Option<String>,
    content: Option<RawContent>,
    usage: Option<RawUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "thinking")]
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: serde_json::Value,
    },
    // Catch-all for images, redacted thinking and future block types
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawUsage {
    input_tokens: Option<i64>,
    output_tokens: Option<i64>,
    cache_creation_input_tokens: Option<i64>,
    cache_read_input_tokens: Option<i64>,
}

impl RawUsage {
    fn totals(&self) -> TokenTotals {
        TokenTotals {
            input_tokens: self.input_tokens.unwrap_or(0),
            output_tokens: self.output_tokens.unwrap_or(0),
            cache_creation_tokens: self.cache_creation_input_tokens.unwrap_or(0),
            cache_read_tokens: self.cache_read_input_tokens.unwrap_or(0),
        }
    }
}

// ============================================
// Parsing
// ============================================

/// Parse a Claude Code session log.
///
/// `session_id` is the file stem; `project_hint` the encoded project
/// directory the file was found in.
pub fn parse<R: BufRead>(
    reader: R,
    session_id: &str,
    project_hint: Option<&str>,
) -> io::Result<ParseOutcome> {
    let mut state = ClaudeState::new(session_id);

    let skipped_lines = for_each_record(reader, |line, record: RawRecord| {
        state.handle_record(line, record)
    })?;

    let session = ParsedSession {
        id: session_id.to_string(),
        project: get_project_name(project_hint.unwrap_or_default()),
        agent: AgentKind::Claude,
        first_message: String::new(),
        started_at: None,
        ended_at: None,
        message_count: 0,
        user_message_count: 0,
        parent_session_id: state.parent_session_id(),
        token_totals: state.usage.totals(),
        mcp_servers: Vec::new(),
    };

    Ok(finalize(session, state.messages, skipped_lines))
}

struct ClaudeState<'a> {
    session_id: &'a str,
    messages: Vec<ParsedMessage>,
    usage: UsageLedger,
    /// Parent from a user record whose `sessionId` differs from the file's
    record_parent: Option<String>,
    /// Parent from a plan-implementation first prompt
    plan_parent: Option<String>,
    seen_first_prompt: bool,
}

impl<'a> ClaudeState<'a> {
    fn new(session_id: &'a str) -> Self {
        Self {
            session_id,
            messages: Vec::new(),
            usage: UsageLedger::new(),
            record_parent: None,
            plan_parent: None,
            seen_first_prompt: false,
        }
    }

    fn parent_session_id(&self) -> Option<String> {
        self.record_parent.clone().or_else(|| self.plan_parent.clone())
    }

    fn handle_record(&mut self, line: usize, record: RawRecord) {
        if record.is_sidechain == Some(true) {
            return;
        }
        match record.record_type.as_deref() {
            Some("user") => self.handle_user(record),
            Some("assistant") => self.handle_assistant(line, record),
            _ => {}
        }
    }

    fn handle_user(&mut self, record: RawRecord) {
        if self.record_parent.is_none() {
            if let Some(sid) = record.session_id.as_deref() {
                if !sid.is_empty() && sid != self.session_id {
                    self.record_parent = Some(sid.to_string());
                }
            }
        }

        let mut texts = Vec::new();
        let mut results = Vec::new();
        match record.message.and_then(|m| m.content) {
            Some(RawContent::Text(text)) => texts.push(text),
            Some(RawContent::Blocks(blocks)) => {
                for block in blocks {
                    match block {
                        ContentBlock::Text { text } => texts.push(text),
                        ContentBlock::ToolResult {
                            tool_use_id,
                            content,
                        } => results.push(ToolResult::new(tool_use_id, result_text(&content))),
                        _ => {}
                    }
                }
            }
            None => {}
        }

        let content = texts.join("\n");
        if content.trim().is_empty() && results.is_empty() {
            return;
        }

        let is_system = record.is_meta == Some(true)
            || record.is_compact_summary == Some(true)
            || is_system_content(&content);
        let role = if is_system { Role::System } else { Role::User };

        if role == Role::User && !self.seen_first_prompt && !content.trim().is_empty() {
            self.seen_first_prompt = true;
            self.plan_parent = self.plan_reference(&content);
        }

        let mut message =
            ParsedMessage::new(role, content, record.timestamp.as_deref().and_then(parse_timestamp));
        message.tool_results = results;
        self.messages.push(message);
    }

    fn handle_assistant(&mut self, line: usize, record: RawRecord) {
        let Some(message) = record.message else {
            return;
        };

        if let Some(usage) = &message.usage {
            let key = message
                .id
                .clone()
                .unwrap_or_else(|| format!("line:{}", line));
            self.usage.record(key, usage.totals());
        }

        let mut parts = Vec::new();
        let mut has_thinking = false;
        let mut tool_calls = Vec::new();

        match message.content {
            Some(RawContent::Text(text)) => parts.push(text),
            Some(RawContent::Blocks(blocks)) => {
                for block in blocks {
                    match block {
                        ContentBlock::Text { text } => parts.push(text),
                        ContentBlock::Thinking { thinking } => {
                            has_thinking = true;
                            parts.push(format!("[Thinking]\n{}", thinking));
                        }
                        ContentBlock::ToolUse { id, name, input } => {
                            parts.push(render_tool_use(&name, &input));
                            tool_calls.push(ToolCall {
                                id,
                                category: categorize(&name),
                                input_json: input.to_string(),
                                name,
                                ..Default::default()
                            });
                        }
                        _ => {}
                    }
                }
            }
            None => {}
        }

        let content = parts
            .into_iter()
            .filter(|p| !p.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        if content.is_empty() && tool_calls.is_empty() {
            return;
        }

        let mut parsed = ParsedMessage::new(
            Role::Assistant,
            content,
            record.timestamp.as_deref().and_then(parse_timestamp),
        );
        parsed.has_thinking = has_thinking;
        parsed.has_tool_use = !tool_calls.is_empty();
        parsed.tool_calls = tool_calls;
        self.messages.push(parsed);
    }

    /// Session referenced by a plan-implementation prompt, if any.
    fn plan_reference(&self, content: &str) -> Option<String> {
        if !content.trim_start().starts_with(PLAN_PREFIX) {
            return None;
        }
        // The transcript line trails the plan body, which may name other logs
        TRANSCRIPT_REF
            .captures_iter(content)
            .last()
            .map(|caps| caps[1].to_string())
            .filter(|id| id != self.session_id)
    }
}
