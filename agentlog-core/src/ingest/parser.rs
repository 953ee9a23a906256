//! Shared parsing machinery for both agent grammars.
//!
//! Each grammar is a plain function from a line reader to a [`ParseOutcome`];
//! everything they have in common lives here.

use crate::ingest::pairing;
use crate::types::{ParsedMessage, ParsedSession, Role, TokenTotals};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::io::{self, BufRead};

/// Maximum characters kept for a session's first message.
pub const FIRST_MESSAGE_MAX_CHARS: usize = 300;

/// Result of parsing one log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOutcome {
    pub session: ParsedSession,
    /// Messages after pairing and filtering, ordinals `0..N-1`
    pub messages: Vec<ParsedMessage>,
    /// Lines that were not valid JSON records
    pub skipped_lines: usize,
}

/// Feed every JSONL record in `reader` to `on_record` with its 1-based line
/// number.
///
/// Blank lines are ignored. Lines that fail to deserialize (bad JSON,
/// truncated writes, invalid UTF-8) are skipped and counted; the count is
/// returned. Only a failing read is an error.
pub fn for_each_record<T, R, F>(mut reader: R, mut on_record: F) -> io::Result<usize>
where
    T: DeserializeOwned,
    R: BufRead,
    F: FnMut(usize, T),
{
    let mut buf = Vec::new();
    let mut line_number = 0;
    let mut skipped = 0;

    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf)?;
        if n == 0 {
            break;
        }
        line_number += 1;

        if buf.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        match serde_json::from_slice::<T>(&buf) {
            Ok(record) => on_record(line_number, record),
            Err(_) => skipped += 1,
        }
    }

    Ok(skipped)
}

/// Parse a log timestamp into UTC.
///
/// Accepts RFC 3339, space-separated date-times with an offset, and naive
/// date-times (taken as UTC). Returns `None` for empty or unrecognized input.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f %z"];
    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.fZ",
    ];

    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// Truncate to at most `max` characters, appending `...` when cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Token usage keyed by upstream message identifier.
///
/// Streaming writes the same message several times with growing usage, so
/// each key keeps only its last snapshot.
#[derive(Debug, Default)]
pub struct UsageLedger {
    snapshots: HashMap<String, TokenTotals>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: impl Into<String>, usage: TokenTotals) {
        self.snapshots.insert(key.into(), usage);
    }

    pub fn totals(&self) -> TokenTotals {
        let mut totals = TokenTotals::default();
        for usage in self.snapshots.values() {
            totals += *usage;
        }
        totals
    }
}

/// Run pairing and filtering, then fill in the session fields derived from
/// the final message list.
pub fn finalize(
    mut session: ParsedSession,
    messages: Vec<ParsedMessage>,
    skipped_lines: usize,
) -> ParseOutcome {
    let (messages, mcp_servers) = pairing::postprocess(messages);

    session.message_count = messages.len();
    session.user_message_count = messages.iter().filter(|m| m.role == Role::User).count();
    session.first_message = messages
        .iter()
        .find(|m| m.role == Role::User && !m.content.trim().is_empty())
        .map(|m| truncate_chars(m.content.trim(), FIRST_MESSAGE_MAX_CHARS))
        .unwrap_or_default();
    session.started_at = messages.iter().filter_map(|m| m.timestamp).min();
    session.ended_at = messages.iter().filter_map(|m| m.timestamp).max();
    session.mcp_servers = mcp_servers;

    ParseOutcome {
        session,
        messages,
        skipped_lines,
    }
}
