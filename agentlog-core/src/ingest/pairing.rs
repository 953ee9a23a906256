//! Tool call/result pairing and message filtering.
//!
//! Runs over a parsed message list in three steps: decorate calls with the
//! results that answer them, drop the user turns that only existed to carry
//! results, then renumber.

use crate::ingest::parsers::tools::mcp_server_name;
use crate::types::{ParsedMessage, Role};
use std::collections::{BTreeSet, HashMap};

/// Pair, filter and renumber. Returns the surviving messages and the sorted
/// MCP servers their tool calls reference.
pub fn postprocess(mut messages: Vec<ParsedMessage>) -> (Vec<ParsedMessage>, Vec<String>) {
    pair_tool_results(&mut messages);
    let mut messages = filter_result_carriers(messages);
    assign_ordinals(&mut messages);
    let servers = extract_mcp_servers(&messages);
    (messages, servers)
}

/// Copy each tool result onto the earlier call with the same id.
///
/// A call is decorated at most once. Results stay on their own message;
/// results with no matching call are left alone.
pub fn pair_tool_results(messages: &mut [ParsedMessage]) {
    // call id -> (message index, call index)
    let mut pending: HashMap<String, (usize, usize)> = HashMap::new();

    for i in 0..messages.len() {
        let (earlier, rest) = messages.split_at_mut(i);
        let current = &mut rest[0];

        for result in &current.tool_results {
            if let Some((mi, ci)) = pending.remove(&result.id) {
                let call = &mut earlier[mi].tool_calls[ci];
                call.result_content = result.content.clone();
                call.result_content_length = result.content_length;
            }
        }

        for (ci, call) in current.tool_calls.iter().enumerate() {
            if !call.id.is_empty() {
                pending.entry(call.id.clone()).or_insert((i, ci));
            }
        }
    }
}

/// Drop user messages whose only purpose was carrying tool results.
///
/// Assistant messages and user messages without results always survive.
pub fn filter_result_carriers(messages: Vec<ParsedMessage>) -> Vec<ParsedMessage> {
    messages
        .into_iter()
        .filter(|m| {
            !(m.role == Role::User && !m.tool_results.is_empty() && m.content.trim().is_empty())
        })
        .collect()
}

/// Number messages `0..N-1` in their current order.
pub fn assign_ordinals(messages: &mut [ParsedMessage]) {
    for (ordinal, message) in messages.iter_mut().enumerate() {
        message.ordinal = ordinal;
    }
}

/// Distinct MCP server names referenced by tool calls, sorted.
pub fn extract_mcp_servers(messages: &[ParsedMessage]) -> Vec<String> {
    messages
        .iter()
        .flat_map(|m| &m.tool_calls)
        .filter_map(|call| mcp_server_name(&call.name))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
