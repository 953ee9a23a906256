//! Change detection for source files.
//!
//! Decides whether a file needs reparsing by comparing it against the size
//! and hash stored for its session. A `(size, mtime)` stamp cache lets
//! unchanged files skip hashing; the cache is passed in and the update handed
//! back, so the decision itself is a pure function of its inputs and the
//! filesystem.

use crate::error::Result;
use crate::hash;
use crate::types::FileInfo;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Cheap identity of a file's last seen state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub size: u64,
    pub mtime: Option<SystemTime>,
}

/// Path-keyed stamps for files already known to match the store.
pub type StatCache = HashMap<PathBuf, FileStamp>;

/// What happened to the file since it was last stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Matches the stored size and hash.
    Unchanged,
    /// New or modified; carries what the stored row should record.
    Changed {
        size: u64,
        mtime: Option<DateTime<Utc>>,
        hash: String,
    },
    /// No longer exists.
    Gone,
}

/// How the caller should update its stamp cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheUpdate {
    Keep,
    Set(FileStamp),
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub change: Change,
    pub cache: CacheUpdate,
}

impl Decision {
    fn new(change: Change, cache: CacheUpdate) -> Self {
        Self { change, cache }
    }
}

/// Compare a file on disk against its stored info and cached stamp.
///
/// Fails only when the file exists but cannot be hashed.
pub fn detect_change(
    path: &Path,
    stored: Option<&FileInfo>,
    cached: Option<&FileStamp>,
) -> Result<Decision> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) => return Ok(stat_failure(path, &e)),
    };

    let stamp = FileStamp {
        size: metadata.len(),
        mtime: metadata.modified().ok(),
    };

    let same_size = stored.is_some_and(|info| info.size == stamp.size);
    if same_size && cached == Some(&stamp) {
        return Ok(Decision::new(Change::Unchanged, CacheUpdate::Keep));
    }

    let digest = hash::digest_file(path)?;
    if same_size && stored.is_some_and(|info| info.hash == digest) {
        return Ok(Decision::new(Change::Unchanged, CacheUpdate::Set(stamp)));
    }

    Ok(Decision::new(
        Change::Changed {
            size: stamp.size,
            mtime: stamp.mtime.map(DateTime::<Utc>::from),
            hash: digest,
        },
        CacheUpdate::Set(stamp),
    ))
}

/// Apply a cache update for `path`.
pub fn apply_cache_update(cache: &mut StatCache, path: &Path, update: CacheUpdate) {
    match update {
        CacheUpdate::Keep => {}
        CacheUpdate::Set(stamp) => {
            cache.insert(path.to_path_buf(), stamp);
        }
        CacheUpdate::Clear => {
            cache.remove(path);
        }
    }
}

/// Decision for a file that could not be stat'ed.
fn stat_failure(path: &Path, e: &io::Error) -> Decision {
    if is_gone(e) {
        return Decision::new(Change::Gone, CacheUpdate::Clear);
    }
    // Permission or transient failure: assume nothing changed
    tracing::warn!(path = %path.display(), error = %e, "Cannot stat file");
    Decision::new(Change::Unchanged, CacheUpdate::Keep)
}

fn is_gone(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}
