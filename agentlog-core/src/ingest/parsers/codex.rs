//! Codex CLI JSONL parser
//!
//! Parses rollout files from `~/.codex/sessions/YYYY/MM/DD/rollout-*.jsonl`.
//!
//! Every line is an envelope `{timestamp, type, payload}`:
//!
//! | `type` | Handling |
//! |--------|----------|
//! | `session_meta` | session UUID, `cwd` (project), `originator` |
//! | `turn_context` | `cwd` fallback |
//! | `response_item` | messages, tool calls and outputs, reasoning summaries |
//! | `event_msg` | `token_count` snapshots; other events duplicate response items |

use crate::ingest::identity::codex_project_name;
use crate::ingest::parser::{finalize, for_each_record, parse_timestamp, ParseOutcome, UsageLedger};
use crate::ingest::parsers::tools::{categorize, render_tool_use, result_text};
use crate::types::{
    AgentKind, ParsedMessage, ParsedSession, Role, TokenTotals, ToolCall, ToolResult,
    CODEX_ID_PREFIX,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::io::{self, BufRead};

/// Usage key for the cumulative token snapshot.
const TOTAL_USAGE_KEY: &str = "total";

/// Check if user-role text was injected by the CLI rather than typed.
fn is_system_injected_context(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with("<environment_context>")
        || trimmed.starts_with("<user_shell_command>")
        || trimmed.starts_with("<INSTRUCTIONS>")
        || trimmed.starts_with("<user_instructions>")
        || trimmed.starts_with("<system")
        || trimmed.starts_with("# AGENTS.md instructions for")
}

// ============================================
// Raw JSONL record types (serde deserialization)
// ============================================

/// Top-level event container for Codex JSONL records.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawEvent {
    timestamp: Option<String>,
    #[serde(rename = "type")]
    event_type: Option<String>,
    payload: Value,
}

/// Session metadata payload (first record in file).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SessionMetaPayload {
    id: Option<String>,
    cwd: Option<String>,
    originator: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct TurnContextPayload {
    cwd: Option<String>,
}

/// Event message payload subtypes.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct EventMsgPayload {
    #[serde(rename = "type")]
    msg_type: Option<String>,
    info: Option<TokenInfo>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct TokenInfo {
    total_token_usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
struct TokenUsage {
    input_tokens: Option<i64>,
    cached_input_tokens: Option<i64>,
    output_tokens: Option<i64>,
}

impl TokenUsage {
    /// Codex reports cached tokens as part of the input count.
    fn totals(&self) -> TokenTotals {
        let cached = self.cached_input_tokens.unwrap_or(0);
        TokenTotals {
            input_tokens: (self.input_tokens.unwrap_or(0) - cached).max(0),
            output_tokens: self.output_tokens.unwrap_or(0),
            cache_creation_tokens: 0,
            cache_read_tokens: cached,
        }
    }
}

/// Response item payload subtypes.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ResponseItemPayload {
    #[serde(rename = "type")]
    item_type: Option<String>,
    id: Option<String>,
    role: Option<String>,
    content: Option<Vec<ContentBlock>>,
    name: Option<String>,
    arguments: Option<String>,
    input: Option<String>,
    action: Option<Value>,
    call_id: Option<String>,
    output: Option<Value>,
    summary: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "input_text")]
    InputText { text: String },
    #[serde(rename = "output_text")]
    OutputText { text: String },
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Unknown,
}

// ============================================
// Parsing
// ============================================

/// Parse a Codex rollout file.
///
/// The session ID is `codex:` plus the UUID from the file name when there is
/// one, else the `session_meta` id, else `file_stem`.
pub fn parse<R: BufRead>(
    reader: R,
    file_uuid: Option<&str>,
    file_stem: &str,
) -> io::Result<ParseOutcome> {
    let mut state = CodexState::default();

    let skipped_lines = for_each_record(reader, |_, event: RawEvent| state.handle_event(event))?;

    let uuid = file_uuid
        .map(str::to_string)
        .or_else(|| state.meta_id.clone())
        .unwrap_or_else(|| file_stem.to_string());

    let session = ParsedSession {
        id: format!("{}{}", CODEX_ID_PREFIX, uuid),
        project: codex_project_name(state.cwd.as_deref().unwrap_or_default()),
        agent: AgentKind::Codex,
        first_message: String::new(),
        started_at: None,
        ended_at: None,
        message_count: 0,
        user_message_count: 0,
        parent_session_id: None,
        token_totals: state.usage.totals(),
        mcp_servers: Vec::new(),
    };

    Ok(finalize(session, state.messages, skipped_lines))
}

#[derive(Default)]
struct CodexState {
    messages: Vec<ParsedMessage>,
    usage: UsageLedger,
    meta_id: Option<String>,
    cwd: Option<String>,
    originator: Option<String>,
}

impl CodexState {
    fn handle_event(&mut self, event: RawEvent) {
        let ts = event.timestamp.as_deref().and_then(parse_timestamp);

        match event.event_type.as_deref() {
            Some("session_meta") => {
                let meta: SessionMetaPayload =
                    serde_json::from_value(event.payload).unwrap_or_default();
                if self.meta_id.is_none() {
                    self.meta_id = meta.id.filter(|id| !id.is_empty());
                }
                if let Some(cwd) = meta.cwd.filter(|c| !c.is_empty()) {
                    self.cwd = Some(cwd);
                }
                if meta.originator.is_some() {
                    self.originator = meta.originator;
                }
            }
            Some("turn_context") => {
                let ctx: TurnContextPayload =
                    serde_json::from_value(event.payload).unwrap_or_default();
                if self.cwd.is_none() {
                    self.cwd = ctx.cwd.filter(|c| !c.is_empty());
                }
            }
            Some("response_item") => {
                if let Ok(item) = serde_json::from_value::<ResponseItemPayload>(event.payload) {
                    self.handle_response_item(item, ts);
                }
            }
            Some("event_msg") => {
                let msg: EventMsgPayload =
                    serde_json::from_value(event.payload).unwrap_or_default();
                // user_message/agent_message duplicate response items
                if msg.msg_type.as_deref() == Some("token_count") {
                    if let Some(usage) = msg.info.and_then(|i| i.total_token_usage) {
                        self.usage.record(TOTAL_USAGE_KEY, usage.totals());
                    }
                }
            }
            _ => {}
        }
    }

    fn handle_response_item(&mut self, item: ResponseItemPayload, ts: Option<DateTime<Utc>>) {
        match item.item_type.as_deref() {
            Some("message") => self.handle_message(item, ts),
            Some("function_call") | Some("custom_tool_call") | Some("local_shell_call") => {
                self.handle_tool_call(item, ts)
            }
            Some("function_call_output") | Some("custom_tool_call_output") => {
                let content = item.output.as_ref().map(result_text).unwrap_or_default();
                let call_id = item.call_id.unwrap_or_default();
                let mut placeholder = ParsedMessage::new(Role::User, "", ts);
                placeholder.tool_results.push(ToolResult::new(call_id, content));
                self.messages.push(placeholder);
            }
            Some("reasoning") => {
                let summary = item
                    .summary
                    .iter()
                    .flatten()
                    .filter_map(|s| s.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("\n");
                if summary.trim().is_empty() {
                    return;
                }
                let mut message =
                    ParsedMessage::new(Role::Assistant, format!("[Thinking]\n{}", summary), ts);
                message.has_thinking = true;
                self.messages.push(message);
            }
            _ => {}
        }
    }

    fn handle_message(&mut self, item: ResponseItemPayload, ts: Option<DateTime<Utc>>) {
        let blocks = item.content.unwrap_or_default();
        let text = blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::InputText { text }
                | ContentBlock::OutputText { text }
                | ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Unknown => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        if text.trim().is_empty() {
            return;
        }

        let role = match item.role.as_deref() {
            Some("assistant") => Role::Assistant,
            Some("user") => Role::User,
            Some("developer") | Some("system") => Role::System,
            _ => self.infer_role(&blocks),
        };
        let role = if role == Role::User && is_system_injected_context(&text) {
            Role::System
        } else {
            role
        };

        self.messages.push(ParsedMessage::new(role, text, ts));
    }

    /// Role for a message without a usable `role` field.
    fn infer_role(&self, blocks: &[ContentBlock]) -> Role {
        if blocks
            .iter()
            .any(|b| matches!(b, ContentBlock::OutputText { .. }))
        {
            Role::Assistant
        } else if blocks
            .iter()
            .any(|b| matches!(b, ContentBlock::InputText { .. }))
        {
            Role::User
        } else if self.originator.is_some() {
            Role::Assistant
        } else {
            Role::User
        }
    }

    fn handle_tool_call(&mut self, item: ResponseItemPayload, ts: Option<DateTime<Utc>>) {
        let (name, input, input_json) = match item.item_type.as_deref() {
            Some("local_shell_call") => {
                let action = item.action.unwrap_or(Value::Null);
                let json = action.to_string();
                ("local_shell".to_string(), action, json)
            }
            Some("custom_tool_call") => {
                let raw = item.input.unwrap_or_default();
                let name = item.name.unwrap_or_default();
                (name, Value::String(raw.clone()), raw)
            }
            _ => {
                let raw = item.arguments.unwrap_or_default();
                let input = serde_json::from_str(&raw).unwrap_or(Value::String(raw.clone()));
                (item.name.unwrap_or_default(), input, raw)
            }
        };

        let rendered = render_tool_use(&name, &input);
        let call = ToolCall {
            id: item.call_id.or(item.id).unwrap_or_default(),
            category: categorize(&name),
            name,
            input_json,
            ..Default::default()
        };

        match self.messages.last_mut() {
            Some(last) if last.role == Role::Assistant => {
                if !last.content.is_empty() {
                    last.content.push_str("\n\n");
                }
                last.content.push_str(&rendered);
                last.has_tool_use = true;
                last.tool_calls.push(call);
            }
            _ => {
                let mut message = ParsedMessage::new(Role::Assistant, rendered, ts);
                message.has_tool_use = true;
                message.tool_calls.push(call);
                self.messages.push(message);
            }
        }
    }
}
