//! The clipboard history engine
//!
//! Owns the ordered, deduplicated, size-bounded entry list. All mutations
//! take `&mut self`, so they are serialized by the borrow checker and no
//! reader can observe a half-applied change. Every committed mutation is
//! persisted and then published to registered observers.

use chrono::Utc;
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

use crate::models::{
    BlobRef, Capture, CaptureContent, ContentType, HistoryEntry, ResolvedContent,
};
use crate::storage::{
    BlobError, BlobStore, FsBlobStore, HISTORY_FILE, HistoryStorage, IMAGES_DIR,
    JsonHistoryStorage,
};

/// Default maximum number of entries
pub const DEFAULT_MAX_ENTRIES: usize = 200;

/// A non-fatal problem encountered while committing a mutation
#[derive(Debug, thiserror::Error)]
pub enum Degraded {
    /// The entry was saved without its image payload
    #[error("Image payload not stored: {0}")]
    BlobWrite(#[source] BlobError),

    /// The in-memory list is correct but the history file is stale
    #[error("History not persisted: {0}")]
    Persist(String),
}

/// Result of a mutation together with any degraded conditions
#[derive(Debug)]
#[must_use]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<Degraded>,
}

impl<T> Outcome<T> {
    fn new(value: T, warnings: Vec<Degraded>) -> Self {
        Outcome { value, warnings }
    }

    /// True if any part of the mutation could not be completed
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}

type ChangeCallback = Box<dyn Fn(&[HistoryEntry]) + Send>;

/// Clipboard history engine
/// Entries are kept in recency order (most recent first)
pub struct HistoryEngine {
    entries: Vec<HistoryEntry>,
    max_entries: usize,
    storage: Box<dyn HistoryStorage>,
    blobs: Box<dyn BlobStore>,
    observers: Vec<ChangeCallback>,
}

impl HistoryEngine {
    /// Load persisted history and repair it
    ///
    /// An unreadable history starts empty. Duplicate keys are collapsed
    /// (first occurrence wins) and the list is trimmed to `max_entries`;
    /// if either changed anything the cleaned list is saved right away.
    pub fn open(
        storage: Box<dyn HistoryStorage>,
        blobs: Box<dyn BlobStore>,
        max_entries: usize,
    ) -> Self {
        let loaded = storage.load().unwrap_or_else(|e| {
            log::warn!("Failed to load history, starting empty: {:#}", e);
            Vec::new()
        });

        let mut engine = HistoryEngine {
            entries: Vec::new(),
            max_entries: max_entries.max(1),
            storage,
            blobs,
            observers: Vec::new(),
        };

        let (unique, duplicates) = dedupe(loaded);
        engine.entries = unique;
        if !duplicates.is_empty() {
            log::info!("Collapsed {} duplicate entries on load", duplicates.len());
        }

        let evicted = engine.trim_to_capacity();
        if !evicted.is_empty() {
            log::info!(
                "Trimmed {} entries over the limit of {}",
                evicted.len(),
                engine.max_entries
            );
        }

        if !duplicates.is_empty() || !evicted.is_empty() {
            engine.release_unreferenced(duplicates.iter().chain(&evicted));
            if let Err(e) = engine.storage.save(&engine.entries) {
                log::warn!("Failed to save cleaned history: {:#}", e);
            }
        }

        engine
    }

    /// Open the default on-disk layout under `data_dir`
    pub fn open_dir(data_dir: &Path, max_entries: usize) -> Self {
        Self::open(
            Box::new(JsonHistoryStorage::new(data_dir.join(HISTORY_FILE))),
            Box::new(FsBlobStore::new(data_dir.join(IMAGES_DIR))),
            max_entries,
        )
    }

    /// Register a callback invoked with the full list after every mutation
    pub fn on_changed<F>(&mut self, callback: F)
    where
        F: Fn(&[HistoryEntry]) + Send + 'static,
    {
        self.observers.push(Box::new(callback));
    }

    /// Entry point for the clipboard monitor
    pub fn submit_capture(&mut self, capture: Capture) -> Outcome<HistoryEntry> {
        log::debug!(
            "Capture submitted: {} {}",
            capture.content_type(),
            capture.content_hash
        );
        self.add(capture)
    }

    /// Insert a capture at the head, merging with any existing duplicate
    ///
    /// A duplicate keeps its id and blob, gets a fresh timestamp, and only
    /// takes source metadata the new capture actually carries.
    pub fn add(&mut self, capture: Capture) -> Outcome<HistoryEntry> {
        let mut warnings = Vec::new();

        let (matching, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|e| e.key() == capture.key());
        self.entries = rest;

        let mut matching = matching.into_iter();
        let previous = matching.next();
        let mut displaced: Vec<HistoryEntry> = matching.collect();

        if let Some(prev) = &previous {
            log::debug!("Duplicate detected, refreshing entry {}", prev.id);
        }

        let image_ref = match &capture.content {
            CaptureContent::Text(_) => None,
            CaptureContent::Image(bytes) => {
                let reusable = previous
                    .as_ref()
                    .and_then(|p| p.image_ref.clone())
                    .filter(|blob| self.blobs.contains(blob));
                match reusable {
                    Some(blob) => Some(blob),
                    None => match self.blobs.put(&capture.content_hash, bytes) {
                        Ok(blob) => Some(blob),
                        Err(e) => {
                            log::warn!(
                                "Storing image {} failed, keeping entry without payload: {}",
                                capture.content_hash,
                                e
                            );
                            warnings.push(Degraded::BlobWrite(e));
                            None
                        }
                    },
                }
            }
        };

        let Capture {
            content,
            content_hash,
            source_app_id,
            source_app_name,
        } = capture;

        let (content_type, text) = match content {
            CaptureContent::Text(text) => (ContentType::Text, Some(text)),
            CaptureContent::Image(_) => (ContentType::Image, None),
        };

        let entry = HistoryEntry {
            id: previous.as_ref().map_or_else(Uuid::new_v4, |p| p.id),
            created_at: Utc::now(),
            content_type,
            text,
            image_ref,
            source_app_id: source_app_id
                .or_else(|| previous.as_ref().and_then(|p| p.source_app_id.clone())),
            source_app_name: source_app_name
                .or_else(|| previous.as_ref().and_then(|p| p.source_app_name.clone())),
            content_hash,
        };

        self.entries.insert(0, entry.clone());

        let evicted = self.trim_to_capacity();
        if !evicted.is_empty() {
            log::debug!("Evicted {} entries over the limit", evicted.len());
        }
        displaced.extend(previous);
        self.release_unreferenced(displaced.iter().chain(&evicted));

        self.commit(&mut warnings);
        Outcome::new(entry, warnings)
    }

    /// Remove entries by id; unknown ids are ignored
    /// Returns the number of entries removed
    pub fn remove<I>(&mut self, ids: I) -> Outcome<usize>
    where
        I: IntoIterator<Item = Uuid>,
    {
        let ids: HashSet<Uuid> = ids.into_iter().collect();

        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|e| ids.contains(&e.id));
        self.entries = kept;

        if removed.is_empty() {
            return Outcome::new(0, Vec::new());
        }

        log::info!("Removed {} entries", removed.len());
        self.release_unreferenced(&removed);

        let mut warnings = Vec::new();
        self.commit(&mut warnings);
        Outcome::new(removed.len(), warnings)
    }

    /// Remove every entry and its blob
    /// Returns the number of entries removed
    pub fn clear_all(&mut self) -> Outcome<usize> {
        let removed = std::mem::take(&mut self.entries);
        log::info!("Cleared {} entries", removed.len());
        self.release_unreferenced(&removed);

        let mut warnings = Vec::new();
        self.commit(&mut warnings);
        Outcome::new(removed.len(), warnings)
    }

    /// Fetch playable content for an entry
    ///
    /// Returns `None` for unknown ids. An image entry whose payload is gone
    /// resolves to [`ResolvedContent::MissingImage`] and stays in history.
    pub fn resolve(&self, id: Uuid) -> Option<ResolvedContent> {
        let entry = self.get(id)?;

        let resolved = match entry.content_type {
            ContentType::Text => ResolvedContent::Text(entry.text.clone().unwrap_or_default()),
            ContentType::Image => match &entry.image_ref {
                None => ResolvedContent::MissingImage,
                Some(blob) => match self.blobs.get(blob) {
                    Ok(bytes) => ResolvedContent::Image(bytes),
                    Err(BlobError::NotFound(_)) => {
                        log::warn!("Image payload for entry {} is missing", id);
                        ResolvedContent::MissingImage
                    }
                    Err(e) => {
                        log::warn!("Failed to read image payload for entry {}: {}", id, e);
                        ResolvedContent::MissingImage
                    }
                },
            },
        };

        Some(resolved)
    }

    /// Filter the current list by a search string, keeping recency order
    ///
    /// Case-insensitive substring match on text. Image entries match only
    /// the token "image". A blank query yields every entry. The iterator is
    /// `Clone`, so it can be restarted, and never touches engine state.
    pub fn query<'a>(
        &'a self,
        search: &str,
    ) -> impl Iterator<Item = &'a HistoryEntry> + Clone + use<'a> {
        let needle = search.trim().to_lowercase();
        self.entries
            .iter()
            .filter(move |entry| entry.matches_needle(&needle))
    }

    /// Delete blob files no live entry references
    pub fn sweep_orphaned_blobs(&self) -> Result<usize, BlobError> {
        let live: HashSet<BlobRef> = self
            .entries
            .iter()
            .filter_map(|e| e.image_ref.clone())
            .collect();
        let removed = self.blobs.sweep(&live)?;
        if removed > 0 {
            log::info!("Swept {} orphaned blobs", removed);
        }
        Ok(removed)
    }

    /// Get entry by id
    pub fn get(&self, id: Uuid) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Entries whose id starts with `prefix` (hyphenated form)
    pub fn find_by_prefix(&self, prefix: &str) -> Vec<&HistoryEntry> {
        let prefix = prefix.to_lowercase();
        self.entries
            .iter()
            .filter(|e| e.id.to_string().starts_with(&prefix))
            .collect()
    }

    /// Get a reference to all entries
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Get the number of entries in the history
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if history is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn trim_to_capacity(&mut self) -> Vec<HistoryEntry> {
        if self.entries.len() > self.max_entries {
            self.entries.split_off(self.max_entries)
        } else {
            Vec::new()
        }
    }

    /// Release blobs of dropped entries that no live entry still holds
    fn release_unreferenced<'a, I>(&self, dropped: I)
    where
        I: IntoIterator<Item = &'a HistoryEntry>,
    {
        let live: HashSet<&BlobRef> = self
            .entries
            .iter()
            .filter_map(|e| e.image_ref.as_ref())
            .collect();
        let mut released: HashSet<&BlobRef> = HashSet::new();

        for blob in dropped.into_iter().filter_map(|e| e.image_ref.as_ref()) {
            if live.contains(blob) || !released.insert(blob) {
                continue;
            }
            if let Err(e) = self.blobs.release(blob) {
                log::warn!("Failed to release blob {}: {}", blob, e);
            }
        }
    }

    fn commit(&self, warnings: &mut Vec<Degraded>) {
        if let Err(e) = self.storage.save(&self.entries) {
            log::warn!("Failed to persist history: {:#}", e);
            warnings.push(Degraded::Persist(format!("{:#}", e)));
        }
        for observer in &self.observers {
            observer(&self.entries);
        }
    }
}

/// Split into (first occurrence of each key, later duplicates)
fn dedupe(entries: Vec<HistoryEntry>) -> (Vec<HistoryEntry>, Vec<HistoryEntry>) {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(entries.len());
    let mut duplicates = Vec::new();

    for entry in entries {
        if seen.insert((entry.content_type, entry.content_hash.clone())) {
            unique.push(entry);
        } else {
            duplicates.push(entry);
        }
    }

    (unique, duplicates)
}
