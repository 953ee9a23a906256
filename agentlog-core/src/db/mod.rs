//! Database layer for agentlog
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - The session write path (one transaction per session)
//! - File size/hash lookups for change detection

pub mod repo;
pub mod schema;

pub use repo::Database;
