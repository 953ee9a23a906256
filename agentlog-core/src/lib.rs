//! # agentlog-core
//!
//! Core library for agentlog: keeps a local SQLite store of coding-agent
//! sessions in step with the JSONL logs Claude Code and Codex write to disk.
//!
//! This library provides:
//! - Discovery of session logs for both agents
//! - Per-agent parsers into one normalized message shape
//! - Hash-based change detection and a sync engine
//! - Database storage layer with SQLite
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Example
//!
//! ```rust,no_run
//! use agentlog_core::{Config, Database, SyncEngine};
//!
//! let config = Config::load().expect("failed to load config");
//!
//! let db = Database::open(&config.resolved_database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! let engine = SyncEngine::new(db, config.sources);
//! let stats = engine.sync_all();
//! println!("{} synced, {} skipped, {} failed", stats.synced, stats.skipped, stats.failed);
//! ```

// Re-export commonly used items at the crate root
pub use config::{Config, SourcesConfig};
pub use db::Database;
pub use error::{Error, Result};
pub use ingest::{SyncEngine, SyncProgress, SyncStats};
pub use types::*;

// Public modules
pub mod config;
pub mod db;
pub mod discovery;
pub mod error;
pub mod hash;
pub mod ingest;
pub mod logging;
pub mod types;
