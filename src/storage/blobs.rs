//! Content-addressed storage for image payloads
//!
//! Each blob is a file named `<hash>.png` under the blob directory. The store
//! keeps no reference counts: callers decide when a blob is no longer
//! referenced and only then call [`BlobStore::release`].

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::write_atomic;
use crate::models::{BlobRef, ContentHash};

/// Fixed extension for stored blobs (payloads are canonical PNG)
pub const BLOB_EXTENSION: &str = "png";

/// Blob store errors
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("Blob not found: {0}")]
    NotFound(BlobRef),

    #[error("Failed to write blob {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read blob {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to remove blob {path:?}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to scan blob directory {path:?}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Trait for payload storage keyed by content hash
pub trait BlobStore: Send {
    /// Store `bytes` under `hash`; returns the existing reference if present
    fn put(&self, hash: &ContentHash, bytes: &[u8]) -> Result<BlobRef, BlobError>;

    /// Read the bytes behind a reference
    fn get(&self, blob: &BlobRef) -> Result<Vec<u8>, BlobError>;

    /// Delete a blob. Missing blobs are not an error.
    fn release(&self, blob: &BlobRef) -> Result<(), BlobError>;

    /// Check whether bytes exist behind a reference
    fn contains(&self, blob: &BlobRef) -> bool;

    /// Delete every stored blob not in `live` and any leftovers of interrupted
    /// writes; returns how many files were removed
    fn sweep(&self, live: &HashSet<BlobRef>) -> Result<usize, BlobError>;
}

/// Filesystem implementation of BlobStore
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    /// Create a store rooted at `dir`; the directory is created on first write
    pub fn new(dir: PathBuf) -> Self {
        FsBlobStore { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reference for a hash
    pub fn blob_ref(hash: &ContentHash) -> BlobRef {
        BlobRef::new(format!("{}.{}", hash, BLOB_EXTENSION))
    }

    /// Filesystem location of a reference
    pub fn path_for(&self, blob: &BlobRef) -> PathBuf {
        let key = Path::new(blob.as_str());
        if key.is_absolute() {
            key.to_path_buf()
        } else {
            self.dir.join(key)
        }
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, hash: &ContentHash, bytes: &[u8]) -> Result<BlobRef, BlobError> {
        let blob = Self::blob_ref(hash);
        let path = self.path_for(&blob);

        // Content-addressed: an existing file already holds these bytes
        if path.exists() {
            log::debug!("Blob {} already stored, skipping write", hash);
            return Ok(blob);
        }

        fs::create_dir_all(&self.dir).map_err(|source| BlobError::Write {
            path: self.dir.clone(),
            source,
        })?;
        write_atomic(&path, bytes).map_err(|source| BlobError::Write {
            path: path.clone(),
            source,
        })?;

        log::debug!("Stored blob {} ({} bytes)", hash, bytes.len());
        Ok(blob)
    }

    fn get(&self, blob: &BlobRef) -> Result<Vec<u8>, BlobError> {
        let path = self.path_for(blob);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(BlobError::NotFound(blob.clone())),
            Err(source) => Err(BlobError::Read { path, source }),
        }
    }

    fn release(&self, blob: &BlobRef) -> Result<(), BlobError> {
        let path = self.path_for(blob);
        match fs::remove_file(&path) {
            Ok(()) => {
                log::debug!("Released blob {}", blob);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("Blob {} already gone", blob);
                Ok(())
            }
            Err(source) => Err(BlobError::Remove { path, source }),
        }
    }

    fn contains(&self, blob: &BlobRef) -> bool {
        self.path_for(blob).is_file()
    }

    fn sweep(&self, live: &HashSet<BlobRef>) -> Result<usize, BlobError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(BlobError::Scan {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        // Live refs may be relative keys or legacy absolute paths
        let live_paths: HashSet<PathBuf> = live.iter().map(|b| self.path_for(b)).collect();

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !is_blob_file(&path) && !is_interrupted_write(&path) {
                continue;
            }
            if live_paths.contains(&path) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    log::debug!("Swept orphaned blob {:?}", path);
                    removed += 1;
                }
                Err(e) => log::warn!("Failed to sweep orphaned blob {:?}: {}", path, e),
            }
        }

        Ok(removed)
    }
}

fn is_blob_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == BLOB_EXTENSION)
}

/// `<hash>.png.tmp` left behind when a write died before its rename
fn is_interrupted_write(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "tmp")
        && path.file_stem().map(Path::new).is_some_and(is_blob_file)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, FsBlobStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().join("images"));
        (dir, store)
    }

    #[test]
    fn test_put_is_idempotent() {
        let (_dir, store) = store();
        let hash = ContentHash::of(b"png bytes");

        let first = store.put(&hash, b"png bytes").unwrap();
        let second = store.put(&hash, b"png bytes").unwrap();

        assert_eq!(first, second);
        assert_eq!(first.as_str(), format!("{}.png", hash));
        assert_eq!(fs::read_dir(store.dir()).unwrap().count(), 1);
    }

    #[test]
    fn test_put_does_not_rewrite_existing_blob() {
        let (_dir, store) = store();
        let hash = ContentHash::of(b"original");

        let blob = store.put(&hash, b"original").unwrap();
        store.put(&hash, b"different").unwrap();

        assert_eq!(store.get(&blob).unwrap(), b"original");
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let (_dir, store) = store();
        let blob = BlobRef::new("deadbeef.png");

        assert!(matches!(store.get(&blob), Err(BlobError::NotFound(_))));
        assert!(!store.contains(&blob));
    }

    #[test]
    fn test_release_removes_file_and_tolerates_missing() {
        let (_dir, store) = store();
        let hash = ContentHash::of(b"bytes");
        let blob = store.put(&hash, b"bytes").unwrap();

        store.release(&blob).unwrap();
        assert!(!store.contains(&blob));

        // Second release is a no-op
        store.release(&blob).unwrap();
    }

    #[test]
    fn test_put_into_unwritable_location_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the blob directory should be
        let blocker = dir.path().join("images");
        fs::write(&blocker, b"not a directory").unwrap();
        let store = FsBlobStore::new(blocker);

        let result = store.put(&ContentHash::of(b"x"), b"x");
        assert!(matches!(result, Err(BlobError::Write { .. })));
    }

    #[test]
    fn test_sweep_keeps_live_blobs() {
        let (_dir, store) = store();
        let live = store.put(&ContentHash::of(b"live"), b"live").unwrap();
        let orphan = store.put(&ContentHash::of(b"orphan"), b"orphan").unwrap();

        let removed = store.sweep(&HashSet::from([live.clone()])).unwrap();

        assert_eq!(removed, 1);
        assert!(store.contains(&live));
        assert!(!store.contains(&orphan));
    }

    #[test]
    fn test_sweep_collects_interrupted_writes() {
        let (_dir, store) = store();
        let live = store.put(&ContentHash::of(b"live"), b"live").unwrap();

        let partial = store.dir().join(format!("{}.png.tmp", ContentHash::of(b"cut off")));
        let unrelated = store.dir().join("notes.tmp");
        fs::write(&partial, b"half a png").unwrap();
        fs::write(&unrelated, b"keep").unwrap();

        let removed = store.sweep(&HashSet::from([live.clone()])).unwrap();

        assert_eq!(removed, 1);
        assert!(!partial.exists());
        assert!(unrelated.exists());
        assert!(store.contains(&live));
    }

    #[test]
    fn test_sweep_without_directory() {
        let (_dir, store) = store();
        assert_eq!(store.sweep(&HashSet::new()).unwrap(), 0);
    }

    #[test]
    fn test_absolute_ref_is_honoured() {
        let (dir, store) = store();
        let legacy = dir.path().join("legacy.png");
        fs::write(&legacy, b"old").unwrap();

        let blob = BlobRef::new(legacy.to_string_lossy());
        assert_eq!(store.get(&blob).unwrap(), b"old");
    }
}
