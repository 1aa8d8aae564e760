pub mod blobs;
pub mod config;
pub mod history;

use anyhow::{Context, Result};
use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub use blobs::{BlobError, BlobStore, FsBlobStore};
pub use config::{ActivationConfig, Config, ConfigStorage, GeneralConfig, TomlConfigStorage};
pub use history::{HistoryStorage, JsonHistoryStorage};

/// Metadata file name inside the data directory
pub const HISTORY_FILE: &str = "items.json";
/// Blob directory name inside the data directory
pub const IMAGES_DIR: &str = "images";
/// Lock file guarding the data directory
pub const LOCK_FILE: &str = ".lock";

/// Resolve the XDG data and config directories without creating them
/// Returns (data_dir, config_dir)
///
/// XDG Base Directory Specification:
/// - Data: $XDG_DATA_HOME/clipstash (default: ~/.local/share/clipstash)
/// - Config: $XDG_CONFIG_HOME/clipstash (default: ~/.config/clipstash)
pub fn default_directories() -> Result<(PathBuf, PathBuf)> {
    let home = env::var("HOME").context("HOME environment variable not set")?;
    let home_path = PathBuf::from(home);

    let data_dir = match env::var("XDG_DATA_HOME") {
        Ok(xdg_data) if !xdg_data.is_empty() => PathBuf::from(xdg_data).join("clipstash"),
        _ => home_path.join(".local/share/clipstash"),
    };

    let config_dir = match env::var("XDG_CONFIG_HOME") {
        Ok(xdg_config) if !xdg_config.is_empty() => PathBuf::from(xdg_config).join("clipstash"),
        _ => home_path.join(".config/clipstash"),
    };

    Ok((data_dir, config_dir))
}

/// Create the data directory and its blob subdirectory
pub fn ensure_data_dir(data_dir: &Path) -> Result<()> {
    let images = data_dir.join(IMAGES_DIR);
    fs::create_dir_all(&images)
        .with_context(|| format!("Failed to create data directory {:?}", images))?;
    log::debug!("Data directory: {:?}", data_dir);
    Ok(())
}

/// Exclusive lock on a data directory, released on drop
///
/// Every process holds it from opening the history until its last save,
/// so read-modify-write cycles from concurrent invocations never interleave.
#[derive(Debug)]
pub struct HistoryLock {
    _file: File,
}

impl HistoryLock {
    /// Block until the lock on `data_dir` is ours
    pub fn acquire(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("Failed to open lock file {:?}", path))?;
        file.lock()
            .with_context(|| format!("Failed to lock {:?}", path))?;

        log::debug!("Acquired history lock {:?}", path);
        Ok(HistoryLock { _file: file })
    }
}

/// Write `bytes` to `path` so that readers see either the old or the new file
///
/// Writes a sibling `.tmp` file, syncs it, then renames it over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp_path = tmp_path_for(path);

    let result = (|| {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert!(!dir.path().join("items.json.tmp").exists());
    }

    #[test]
    fn test_write_atomic_missing_parent_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("items.json");

        assert!(write_atomic(&path, b"data").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_ensure_data_dir_creates_images_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("clipstash");

        ensure_data_dir(&data_dir).unwrap();
        assert!(data_dir.join(IMAGES_DIR).is_dir());
    }

    #[test]
    fn test_history_lock_is_exclusive_until_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let lock = HistoryLock::acquire(dir.path()).unwrap();

        let other = OpenOptions::new()
            .write(true)
            .open(dir.path().join(LOCK_FILE))
            .unwrap();
        assert!(other.try_lock().is_err());

        drop(lock);
        assert!(other.try_lock().is_ok());
    }
}
