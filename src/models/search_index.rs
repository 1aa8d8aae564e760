use nucleo_matcher::pattern::{CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Config, Matcher, Utf32String};
use uuid::Uuid;

use super::clip::{ContentType, HistoryEntry};

/// Search case sensitivity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Smart case: case-insensitive unless query contains uppercase letters
    #[default]
    SmartCase,
    /// Case-sensitive search (always)
    CaseSensitive,
}

/// Fuzzy ranking over history entries
///
/// Complements the plain substring filter of the engine: results are
/// ordered by match score instead of recency.
pub struct SearchIndex {
    matcher: Matcher,
    mode: SearchMode,
}

impl SearchIndex {
    /// Create a new search index with default mode (SmartCase)
    pub fn new() -> Self {
        SearchIndex {
            matcher: Matcher::new(Config::DEFAULT),
            mode: SearchMode::default(),
        }
    }

    /// Set the search mode
    pub fn set_mode(&mut self, mode: SearchMode) {
        self.mode = mode;
    }

    /// Get the current search mode
    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    /// Search entries by query string
    /// Returns (entry_id, score) pairs, best match first
    pub fn search(&mut self, entries: &[HistoryEntry], query: &str) -> Vec<(Uuid, u32)> {
        let query = query.trim();
        if query.is_empty() {
            return entries.iter().map(|e| (e.id, u32::MAX)).collect();
        }

        let case_matching = match self.mode {
            SearchMode::SmartCase => CaseMatching::Smart,
            SearchMode::CaseSensitive => CaseMatching::Respect,
        };
        let pattern = Pattern::parse(query, case_matching, Normalization::Smart);

        let mut results: Vec<(Uuid, u32)> = entries
            .iter()
            .filter_map(|entry| {
                let haystack = Utf32String::from(searchable_text(entry));
                pattern
                    .score(haystack.slice(..), &mut self.matcher)
                    .map(|score| (entry.id, score))
            })
            .collect();

        // Stable sort keeps recency order among equal scores
        results.sort_by(|a, b| b.1.cmp(&a.1));

        results
    }
}

impl Default for SearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Text the fuzzy matcher sees for an entry
fn searchable_text(entry: &HistoryEntry) -> &str {
    match (&entry.text, entry.content_type) {
        (Some(text), _) => text,
        (None, ContentType::Image) => "image",
        (None, ContentType::Text) => "",
    }
}
