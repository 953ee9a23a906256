//! Ingestion layer: source log files in, session rows out.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌─────────────────┐
//! │  Source Files   │ ──► │    SyncEngine    │ ──► │    Database     │
//! │ (~/.claude/...) │     │                  │     │ (sessions, etc) │
//! └─────────────────┘     └──────────────────┘     └─────────────────┘
//!                               │
//!                     ┌─────────┴──────────┐
//!                     ▼                    ▼
//!              change detection     parsers::{claude, codex}
//!              (size, hash)                │
//!                                          ▼
//!                                   pairing + filter
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agentlog_core::{Config, Database, SyncEngine};
//!
//! let config = Config::load()?;
//! let db = Database::open(&config.resolved_database_path())?;
//! db.migrate()?;
//!
//! let engine = SyncEngine::new(db, config.sources);
//! let stats = engine.sync_all();
//! println!("synced {} sessions, {} unchanged", stats.synced, stats.skipped);
//! ```

pub mod change;
pub mod identity;
pub mod pairing;
pub mod parser;
pub mod parsers;

pub use parser::ParseOutcome;

use crate::config::SourcesConfig;
use crate::db::Database;
use crate::discovery;
use crate::error::{Error, Result};
use crate::types::{DiscoveredFile, Session};
use change::{apply_cache_update, detect_change, CacheUpdate, Change, StatCache};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Result of a full sync pass.
#[derive(Debug, Default)]
pub struct SyncStats {
    /// Sessions parsed and written
    pub synced: usize,
    /// Files unchanged since the last pass (or gone)
    pub skipped: usize,
    /// Files that could not be read, parsed or written
    pub failed: usize,
    /// Whether the pass stopped early on request
    pub cancelled: bool,
    /// Errors encountered (file path → error message)
    pub errors: Vec<(PathBuf, String)>,
}

/// Progress snapshot handed to the callback after each file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncProgress {
    pub files_total: usize,
    pub files_scanned: usize,
    pub sessions_synced: usize,
    pub sessions_skipped: usize,
}

/// Outcome of one file within a pass.
#[derive(Debug)]
enum FileOutcome {
    Synced(Box<Session>),
    Skipped,
}

/// Keeps the session store in step with the agents' log files.
///
/// The engine owns the database handle and the stat cache; passes run on the
/// calling thread, one file at a time.
pub struct SyncEngine {
    db: Database,
    sources: SourcesConfig,
    stat_cache: Mutex<StatCache>,
    cancel: Option<Arc<AtomicBool>>,
}

impl SyncEngine {
    pub fn new(db: Database, sources: SourcesConfig) -> Self {
        Self {
            db,
            sources,
            stat_cache: Mutex::new(StatCache::new()),
            cancel: None,
        }
    }

    /// Stop passes between files once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn sources(&self) -> &SourcesConfig {
        &self.sources
    }

    /// Discover every source file for both agents.
    pub fn discover(&self) -> Vec<DiscoveredFile> {
        discovery::discover_all(&self.sources)
    }

    /// Sync all discovered files.
    pub fn sync_all(&self) -> SyncStats {
        self.sync_all_with_progress(|_, _| {})
    }

    /// Sync all discovered files, reporting progress and the file just
    /// handled after each one.
    ///
    /// Per-file failures are recorded in the returned stats; the pass itself
    /// never fails.
    pub fn sync_all_with_progress<F>(&self, mut on_progress: F) -> SyncStats
    where
        F: FnMut(&SyncProgress, &Path),
    {
        let files = self.discover();
        let mut stats = SyncStats::default();
        let mut progress = SyncProgress {
            files_total: files.len(),
            ..Default::default()
        };

        tracing::info!(files = files.len(), "Starting sync pass");

        for file in &files {
            if self.is_cancelled() {
                tracing::info!(
                    scanned = progress.files_scanned,
                    total = progress.files_total,
                    "Sync cancelled"
                );
                stats.cancelled = true;
                break;
            }

            match self.sync_file(file, false) {
                Ok(FileOutcome::Synced(_)) => stats.synced += 1,
                Ok(FileOutcome::Skipped) => stats.skipped += 1,
                Err(e) => {
                    tracing::warn!(path = %file.path.display(), error = %e, "Failed to sync file");
                    stats.failed += 1;
                    stats.errors.push((file.path.clone(), e.to_string()));
                }
            }

            progress.files_scanned += 1;
            progress.sessions_synced = stats.synced;
            progress.sessions_skipped = stats.skipped;
            on_progress(&progress, &file.path);
        }

        tracing::info!(
            synced = stats.synced,
            skipped = stats.skipped,
            failed = stats.failed,
            "Sync pass complete"
        );

        stats
    }

    /// Reparse and rewrite one session regardless of change detection.
    ///
    /// Accepts a Claude session ID or a Codex ID with or without the
    /// `codex:` prefix. A stored project override is still honored.
    pub fn sync_single_session(&self, session_id: &str) -> Result<Session> {
        let file = discovery::find_source_file(&self.sources, session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;

        match self.sync_file(&file, true)? {
            FileOutcome::Synced(session) => Ok(*session),
            FileOutcome::Skipped => Err(Error::SessionNotFound(session_id.to_string())),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn sync_file(&self, file: &DiscoveredFile, force: bool) -> Result<FileOutcome> {
        let path = &file.path;

        // Forced syncs ignore both the stored info and the stamp cache
        let (stored, cached) = if force {
            (None, None)
        } else {
            let stored = match parsers::session_id_hint(file) {
                Some(id) => self.db.get_session_file_info(&id)?,
                None => {
                    tracing::debug!(
                        path = %path.display(),
                        "No session ID in file name, reparsing every pass"
                    );
                    None
                }
            };
            let cached = self.stat_cache.lock().unwrap().get(path).copied();
            (stored, cached)
        };

        let decision = detect_change(path, stored.as_ref(), cached.as_ref())?;
        let (size, mtime, hash) = match decision.change {
            Change::Changed { size, mtime, hash } => (size, mtime, hash),
            Change::Gone => {
                tracing::debug!(path = %path.display(), "Source file disappeared");
                self.update_cache(path, decision.cache);
                return Ok(FileOutcome::Skipped);
            }
            Change::Unchanged => {
                self.update_cache(path, decision.cache);
                return Ok(FileOutcome::Skipped);
            }
        };

        let outcome = parsers::parse_file(file)?;
        let parsed = outcome.session;

        let stored_project = self
            .db
            .get_session_full(&parsed.id)?
            .map(|s| s.project);
        let project = identity::resolve_project(stored_project.as_deref(), &parsed.project);

        let mut session = Session::from_parsed(
            parsed,
            path.to_string_lossy().into_owned(),
            size,
            mtime,
            hash,
        );
        session.project = project;

        if let Err(e) = self.db.write_session(&session, &outcome.messages) {
            self.update_cache(path, CacheUpdate::Clear);
            return Err(e);
        }
        self.update_cache(path, decision.cache);

        if session.is_tombstone() {
            tracing::debug!(session_id = %session.id, path = %path.display(), "Stored empty session");
        } else {
            tracing::debug!(
                session_id = %session.id,
                messages = session.message_count,
                "Synced session"
            );
        }

        Ok(FileOutcome::Synced(Box::new(session)))
    }

    fn update_cache(&self, path: &Path, update: CacheUpdate) {
        let mut cache = self.stat_cache.lock().unwrap();
        apply_cache_update(&mut cache, path, update);
    }
}
