//! Database repository layer
//!
//! The write path used by the sync engine plus the handful of reads it needs
//! for change detection and override precedence.

use crate::error::{Error, Result};
use crate::types::*;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;

const SESSION_COLUMNS: &str = "id, project, agent, first_message, started_at, ended_at, \
     message_count, user_message_count, parent_session_id, input_tokens, output_tokens, \
     cache_creation_tokens, cache_read_tokens, mcp_servers, file_path, file_size, file_mtime, \
     file_hash";

/// Database handle.
///
/// The single connection behind the mutex is the one write serialization
/// point; the store does not assume multiple writers.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    // ============================================
    // Write path
    // ============================================

    /// Insert or update a session row.
    ///
    /// Every column is overwritten; callers resolve project overrides first.
    pub fn upsert_session(&self, session: &Session) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        Self::upsert_session_on(&conn, session)
    }

    /// Replace all messages (and their tool calls) of a session.
    pub fn replace_session_messages(
        &self,
        session_id: &str,
        messages: &[ParsedMessage],
    ) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        Self::replace_messages_on(&tx, session_id, messages)?;
        tx.commit()?;
        Ok(())
    }

    /// Upsert the session row and replace its messages in one transaction.
    ///
    /// A failure rolls back both, so a session row never disagrees with its
    /// message set.
    pub fn write_session(&self, session: &Session, messages: &[ParsedMessage]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        Self::upsert_session_on(&tx, session)?;
        Self::replace_messages_on(&tx, &session.id, messages)?;
        tx.commit()?;
        Ok(())
    }

    /// Set a session's project label (the manual override path).
    ///
    /// Returns `false` if no such session exists.
    pub fn update_session_project(&self, session_id: &str, project: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE sessions SET project = ?1, updated_at = ?2 WHERE id = ?3",
            params![project, format_ts(Utc::now()), session_id],
        )?;
        Ok(changed > 0)
    }

    fn upsert_session_on(conn: &Connection, session: &Session) -> Result<()> {
        let mcp_servers = serde_json::to_string(&session.mcp_servers)?;
        let now = format_ts(Utc::now());
        conn.execute(
            r#"
            INSERT INTO sessions (id, project, agent, first_message, started_at, ended_at,
                                  message_count, user_message_count, parent_session_id,
                                  input_tokens, output_tokens, cache_creation_tokens,
                                  cache_read_tokens, mcp_servers, file_path, file_size,
                                  file_mtime, file_hash, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                    ?17, ?18, ?19, ?19)
            ON CONFLICT(id) DO UPDATE SET
                project = excluded.project,
                agent = excluded.agent,
                first_message = excluded.first_message,
                started_at = excluded.started_at,
                ended_at = excluded.ended_at,
                message_count = excluded.message_count,
                user_message_count = excluded.user_message_count,
                parent_session_id = excluded.parent_session_id,
                input_tokens = excluded.input_tokens,
                output_tokens = excluded.output_tokens,
                cache_creation_tokens = excluded.cache_creation_tokens,
                cache_read_tokens = excluded.cache_read_tokens,
                mcp_servers = excluded.mcp_servers,
                file_path = excluded.file_path,
                file_size = excluded.file_size,
                file_mtime = excluded.file_mtime,
                file_hash = excluded.file_hash,
                updated_at = excluded.updated_at
            "#,
            params![
                session.id,
                session.project,
                session.agent.as_str(),
                session.first_message,
                session.started_at.map(format_ts),
                session.ended_at.map(format_ts),
                session.message_count as i64,
                session.user_message_count as i64,
                session.parent_session_id,
                session.token_totals.input_tokens,
                session.token_totals.output_tokens,
                session.token_totals.cache_creation_tokens,
                session.token_totals.cache_read_tokens,
                mcp_servers,
                session.file_path,
                session.file_size as i64,
                session.file_mtime.map(format_ts),
                session.file_hash,
                now,
            ],
        )?;
        Ok(())
    }

    fn replace_messages_on(
        conn: &Connection,
        session_id: &str,
        messages: &[ParsedMessage],
    ) -> Result<()> {
        conn.execute("DELETE FROM tool_calls WHERE session_id = ?", [session_id])?;
        conn.execute("DELETE FROM messages WHERE session_id = ?", [session_id])?;

        let mut insert_message = conn.prepare(
            r#"
            INSERT INTO messages (session_id, ordinal, role, content, timestamp,
                                  has_thinking, has_tool_use, content_length)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )?;
        let mut insert_call = conn.prepare(
            r#"
            INSERT INTO tool_calls (session_id, message_ordinal, call_index, tool_use_id,
                                    tool_name, category, input_json,
                                    result_content_length, result_content)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )?;

        for message in messages {
            insert_message.execute(params![
                session_id,
                message.ordinal as i64,
                message.role.as_str(),
                message.content,
                message.timestamp.map(format_ts),
                message.has_thinking,
                message.has_tool_use,
                message.content_length() as i64,
            ])?;

            for (index, call) in message.tool_calls.iter().enumerate() {
                insert_call.execute(params![
                    session_id,
                    message.ordinal as i64,
                    index as i64,
                    call.id,
                    call.name,
                    call.category,
                    call.input_json,
                    call.result_content_length as i64,
                    call.result_content,
                ])?;
            }
        }

        Ok(())
    }

    // ============================================
    // Read path
    // ============================================

    /// Size and hash recorded for a session's source file.
    pub fn get_session_file_info(&self, session_id: &str) -> Result<Option<FileInfo>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT file_size, file_hash FROM sessions WHERE id = ?",
            [session_id],
            |row| {
                Ok(FileInfo {
                    size: row.get::<_, i64>(0)? as u64,
                    hash: row.get(1)?,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    /// Full session row by ID
    pub fn get_session_full(&self, session_id: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {} FROM sessions WHERE id = ?", SESSION_COLUMNS),
            [session_id],
            Self::row_to_session,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Messages of a session in ordinal order, with their tool calls.
    ///
    /// Tool results are transient and come back empty.
    pub fn get_session_messages(&self, session_id: &str) -> Result<Vec<ParsedMessage>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            r#"
            SELECT ordinal, role, content, timestamp, has_thinking, has_tool_use
            FROM messages WHERE session_id = ? ORDER BY ordinal ASC
            "#,
        )?;
        let mut messages = stmt
            .query_map([session_id], Self::row_to_message)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT message_ordinal, tool_use_id, tool_name, category, input_json,
                   result_content_length, result_content
            FROM tool_calls WHERE session_id = ? ORDER BY message_ordinal, call_index
            "#,
        )?;
        let calls = stmt
            .query_map([session_id], |row| {
                Ok((
                    row.get::<_, i64>(0)? as usize,
                    ToolCall {
                        id: row.get(1)?,
                        name: row.get(2)?,
                        category: row.get(3)?,
                        input_json: row.get(4)?,
                        result_content_length: row.get::<_, i64>(5)? as usize,
                        result_content: row.get(6)?,
                    },
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for (ordinal, call) in calls {
            if let Some(message) = messages.get_mut(ordinal) {
                message.tool_calls.push(call);
            }
        }

        Ok(messages)
    }

    /// Count stored sessions (tombstones included)
    pub fn count_sessions(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))?;
        Ok(count)
    }

    fn row_to_session(row: &Row) -> rusqlite::Result<Session> {
        let agent_str: String = row.get("agent")?;
        let mcp_servers_str: String = row.get("mcp_servers")?;

        Ok(Session {
            id: row.get("id")?,
            project: row.get("project")?,
            agent: agent_str.parse().unwrap_or(AgentKind::Claude),
            first_message: row.get("first_message")?,
            started_at: parse_ts(row.get("started_at")?),
            ended_at: parse_ts(row.get("ended_at")?),
            message_count: row.get::<_, i64>("message_count")? as usize,
            user_message_count: row.get::<_, i64>("user_message_count")? as usize,
            parent_session_id: row.get("parent_session_id")?,
            token_totals: TokenTotals {
                input_tokens: row.get("input_tokens")?,
                output_tokens: row.get("output_tokens")?,
                cache_creation_tokens: row.get("cache_creation_tokens")?,
                cache_read_tokens: row.get("cache_read_tokens")?,
            },
            mcp_servers: serde_json::from_str(&mcp_servers_str).unwrap_or_default(),
            file_path: row.get("file_path")?,
            file_size: row.get::<_, i64>("file_size")? as u64,
            file_mtime: parse_ts(row.get("file_mtime")?),
            file_hash: row.get("file_hash")?,
        })
    }

    fn row_to_message(row: &Row) -> rusqlite::Result<ParsedMessage> {
        let role_str: String = row.get("role")?;

        Ok(ParsedMessage {
            ordinal: row.get::<_, i64>("ordinal")? as usize,
            role: role_str.parse().unwrap_or(Role::User),
            content: row.get("content")?,
            timestamp: parse_ts(row.get("timestamp")?),
            has_thinking: row.get("has_thinking")?,
            has_tool_use: row.get("has_tool_use")?,
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
        })
    }
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
