//! Content digests for change detection.
//!
//! Files are streamed through SHA-256 and compared by lowercase hex digest.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Digest every byte of `reader` and return the lowercase hex encoding.
pub fn digest<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Digest a file on disk.
///
/// Directories are rejected up front instead of being handed to `read`.
pub fn digest_file(path: &Path) -> Result<String> {
    let metadata = std::fs::metadata(path).map_err(|e| Error::file(path, e))?;
    if metadata.is_dir() {
        return Err(Error::Hash {
            path: path.to_path_buf(),
            message: "path is a directory".to_string(),
        });
    }

    let file = File::open(path).map_err(|e| Error::file(path, e))?;
    digest(BufReader::new(file)).map_err(|e| Error::file(path, e))
}
