//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: sessions, messages, tool calls
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id                    TEXT PRIMARY KEY,
        project               TEXT NOT NULL DEFAULT '',
        agent                 TEXT NOT NULL,
        first_message         TEXT NOT NULL DEFAULT '',
        started_at            TEXT,
        ended_at              TEXT,
        message_count         INTEGER NOT NULL DEFAULT 0,
        user_message_count    INTEGER NOT NULL DEFAULT 0,
        parent_session_id     TEXT,

        -- Token rollups (last snapshot per upstream message id)
        input_tokens          INTEGER NOT NULL DEFAULT 0,
        output_tokens         INTEGER NOT NULL DEFAULT 0,
        cache_creation_tokens INTEGER NOT NULL DEFAULT 0,
        cache_read_tokens     INTEGER NOT NULL DEFAULT 0,

        -- JSON array of MCP server names
        mcp_servers           TEXT NOT NULL DEFAULT '[]',

        -- Change detection
        file_path             TEXT NOT NULL DEFAULT '',
        file_size             INTEGER NOT NULL DEFAULT 0,
        file_mtime            TEXT,
        file_hash             TEXT NOT NULL DEFAULT '',

        created_at            TEXT NOT NULL,
        updated_at            TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS messages (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id      TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        ordinal         INTEGER NOT NULL,
        role            TEXT NOT NULL,
        content         TEXT NOT NULL,
        timestamp       TEXT,
        has_thinking    INTEGER NOT NULL DEFAULT 0,
        has_tool_use    INTEGER NOT NULL DEFAULT 0,
        content_length  INTEGER NOT NULL DEFAULT 0,

        UNIQUE(session_id, ordinal)
    );

    CREATE TABLE IF NOT EXISTS tool_calls (
        id                    INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id            TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        message_ordinal       INTEGER NOT NULL,
        call_index            INTEGER NOT NULL,
        tool_use_id           TEXT NOT NULL,
        tool_name             TEXT NOT NULL,
        category              TEXT NOT NULL,
        input_json            TEXT NOT NULL DEFAULT '',
        result_content_length INTEGER NOT NULL DEFAULT 0,
        result_content        TEXT NOT NULL DEFAULT ''
    );

    CREATE INDEX IF NOT EXISTS idx_sessions_agent ON sessions(agent);
    CREATE INDEX IF NOT EXISTS idx_sessions_project ON sessions(project);
    CREATE INDEX IF NOT EXISTS idx_sessions_ended ON sessions(ended_at DESC);
    CREATE INDEX IF NOT EXISTS idx_messages_session_ordinal ON messages(session_id, ordinal);
    CREATE INDEX IF NOT EXISTS idx_tool_calls_session ON tool_calls(session_id, message_ordinal);
    CREATE INDEX IF NOT EXISTS idx_tool_calls_category ON tool_calls(category);
    CREATE INDEX IF NOT EXISTS idx_sessions_parent ON sessions(parent_session_id)
        WHERE parent_session_id IS NOT NULL;
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute_batch(&format!("PRAGMA user_version = {}", version))?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
