use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::PathBuf;

use super::write_atomic;
use crate::models::HistoryEntry;

/// Trait for clipboard history persistence
///
/// Stores entry metadata only; image payloads live in a blob store.
pub trait HistoryStorage: Send {
    /// Load the ordered entry list (most recent first)
    ///
    /// A missing or unparseable file yields an empty list, not an error.
    fn load(&self) -> Result<Vec<HistoryEntry>>;

    /// Replace the stored entry list atomically
    fn save(&self, entries: &[HistoryEntry]) -> Result<()>;

    /// Get the storage file path
    fn path(&self) -> &PathBuf;
}

/// JSON-based implementation of HistoryStorage
/// Uses atomic write pattern with .tmp file for safety
pub struct JsonHistoryStorage {
    path: PathBuf,
}

impl JsonHistoryStorage {
    /// Create a new JsonHistoryStorage with the given path
    pub fn new(path: PathBuf) -> Self {
        JsonHistoryStorage { path }
    }
}

impl HistoryStorage for JsonHistoryStorage {
    fn load(&self) -> Result<Vec<HistoryEntry>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("History file not found at {:?}, starting empty", self.path);
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read history from {:?}", self.path));
            }
        };

        match serde_json::from_slice::<Vec<HistoryEntry>>(&bytes) {
            Ok(entries) => {
                log::info!("Loaded {} clips from {:?}", entries.len(), self.path);
                Ok(entries)
            }
            Err(e) => {
                // Corrupted file - backup and return empty history
                let backup_path = self.path.with_extension("json.corrupted");
                log::warn!(
                    "History file corrupted, backing up to {:?}: {}",
                    backup_path,
                    e
                );

                if let Err(backup_err) = fs::rename(&self.path, &backup_path) {
                    log::error!("Failed to backup corrupted file: {}", backup_err);
                }

                Ok(Vec::new())
            }
        }
    }

    fn save(&self, entries: &[HistoryEntry]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(entries)
            .with_context(|| "Failed to serialize clipboard history")?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        write_atomic(&self.path, &bytes)
            .with_context(|| format!("Failed to write history to {:?}", self.path))?;

        log::debug!("Saved {} clips to {:?}", entries.len(), self.path);

        Ok(())
    }

    fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BlobRef, ContentHash, ContentType};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn sample_entries() -> Vec<HistoryEntry> {
        vec![
            HistoryEntry {
                id: Uuid::new_v4(),
                created_at: Utc::now(),
                content_type: ContentType::Text,
                text: Some("hello".to_string()),
                image_ref: None,
                source_app_id: Some("org.gnome.TextEditor".to_string()),
                source_app_name: Some("Text Editor".to_string()),
                content_hash: ContentHash::of(b"hello"),
            },
            HistoryEntry {
                id: Uuid::new_v4(),
                created_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
                content_type: ContentType::Image,
                text: None,
                image_ref: Some(BlobRef::new("abc.png")),
                source_app_id: None,
                source_app_name: None,
                content_hash: ContentHash::of(b"png"),
            },
        ]
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonHistoryStorage::new(dir.path().join("items.json"));

        assert!(storage.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonHistoryStorage::new(dir.path().join("items.json"));
        let entries = sample_entries();

        storage.save(&entries).unwrap();
        let loaded = storage.load().unwrap();

        assert_eq!(loaded, entries);
    }

    #[test]
    fn test_save_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonHistoryStorage::new(dir.path().join("nested").join("items.json"));

        storage.save(&sample_entries()).unwrap();
        assert!(storage.path().exists());
    }

    #[test]
    fn test_corrupt_file_is_backed_up_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");
        fs::write(&path, b"{ not json").unwrap();
        let storage = JsonHistoryStorage::new(path.clone());

        assert!(storage.load().unwrap().is_empty());
        assert!(!path.exists());
        assert!(dir.path().join("items.json.corrupted").exists());
    }

    #[test]
    fn test_persisted_layout() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonHistoryStorage::new(dir.path().join("items.json"));
        let entries = sample_entries();
        storage.save(&entries).unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(storage.path()).unwrap()).unwrap();
        let array = raw.as_array().unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array[0]["id"], entries[0].id.to_string());
        assert_eq!(array[0]["contentType"], "text");
        assert_eq!(array[1]["createdAt"], "2024-01-02T03:04:05Z");
        assert_eq!(array[1]["imageRef"], "abc.png");
    }
}
